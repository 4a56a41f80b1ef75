//! Authorization middleware enforcing route policies.
//!
//! Installed as a route layer so the matched path template is available. The
//! policy for `(method, template)` is looked up in the registry, target ids are
//! pulled from the path parameters and, where the route says so, from the JSON
//! body. Denials get a fixed 403 body; lookup failures get a 500.
//!
//! A route that names a target but whose target cannot be read is denied
//! without consulting the engine, unless its requirement never looks at
//! targets (public, or no roles declared).

use std::{net::SocketAddr, time::Instant};

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, FromRequestParts, MatchedPath, RawPathParams, Request, State},
    middleware::Next,
    response::Response,
};
use http::{HeaderMap, header, request::Parts};
use http_body_util::LengthLimitError;

use crate::{
    AppState,
    authz::{AccessRequest, AuthzDecision, DecisionRule, PolicyRequirement, RouteTarget},
    error::ApiError,
    models::Caller,
    observability::metrics,
    services::DecisionRecord,
};

/// Why a declared target could not be read from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MalformedTarget {
    /// Path parameters were rejected, e.g. invalid UTF-8 after percent-decoding.
    PathParams,
    MissingPathParam,
    NotJson,
    InvalidJson,
    NonScalarField,
}

impl MalformedTarget {
    fn as_str(&self) -> &'static str {
        match self {
            MalformedTarget::PathParams => "path_params",
            MalformedTarget::MissingPathParam => "missing_path_param",
            MalformedTarget::NotJson => "not_json",
            MalformedTarget::InvalidJson => "invalid_json",
            MalformedTarget::NonScalarField => "non_scalar_field",
        }
    }
}

pub async fn authz_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let started = Instant::now();
    let method = req.method().clone();
    let matched = req
        .extensions()
        .get::<MatchedPath>()
        .map(|m| m.as_str().to_string());

    let policy = matched
        .as_deref()
        .and_then(|path| state.registry.resolve(&method, path));

    let (route_id, requirement, target) = match policy {
        Some(p) => (Some(p.id.clone()), p.requirement.clone(), p.target.clone()),
        None => {
            tracing::debug!(
                method = %method,
                path = ?matched,
                "No route policy registered, using empty requirement"
            );
            (None, PolicyRequirement::default(), RouteTarget::none())
        }
    };

    let (mut parts, body) = req.into_parts();
    let mut access = AccessRequest::new(method);

    let mut malformed = path_targets(&mut parts, &state, &target, &mut access)
        .await
        .err();

    let body = if target.reads_body() {
        let bytes = axum::body::to_bytes(body, state.config.server.body_limit_bytes)
            .await
            .map_err(|e| {
                if is_length_limit(&e) {
                    ApiError::PayloadTooLarge(format!(
                        "Request body exceeds {} bytes",
                        state.config.server.body_limit_bytes
                    ))
                } else {
                    tracing::debug!(error = %e, "Failed to buffer request body for authorization");
                    ApiError::BadRequest("Failed to read request body".to_string())
                }
            })?;

        if malformed.is_none() {
            malformed = body_targets(&bytes, &parts.headers, &target, &mut access).err();
        }

        Body::from(bytes)
    } else {
        body
    };

    let caller = parts.extensions.get::<Caller>().copied();
    let decision = match malformed {
        Some(reason) if !requirement.is_public && requirement.declares_roles() => {
            tracing::debug!(
                reason = reason.as_str(),
                route = ?route_id,
                method = %access.method,
                "Request target could not be read, denying"
            );
            let decision = AuthzDecision::deny(DecisionRule::MalformedTarget);
            metrics::record_authz_decision(&decision, started.elapsed());
            decision
        }
        _ => state
            .engine
            .decide(&requirement, caller.as_ref(), &access)
            .await
            .map_err(|_| ApiError::Internal("Authorization check failed".to_string()))?,
    };

    if state.config.authz.audit.should_log(decision.allowed) {
        audit_decision(
            &state,
            DecisionRecord {
                route_id,
                caller,
                request: access,
                decision,
                ip_address: parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.ip().to_string()),
                user_agent: parts
                    .headers
                    .get(header::USER_AGENT)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from),
            },
        );
    }

    if !decision.allowed {
        return Err(ApiError::Forbidden);
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}

/// Write an audit entry in the background. Failures are logged and never
/// affect the decision already made.
pub(crate) fn audit_decision(state: &AppState, record: DecisionRecord) {
    let audit_logs = state.audit_logs.clone();
    let rule = record.decision.rule;
    state.task_tracker.spawn(async move {
        if let Err(e) = audit_logs.record_decision(record).await {
            tracing::warn!(
                error = %e,
                rule = %rule,
                "Failed to log authorization decision to audit log"
            );
            metrics::record_audit_write_failure();
        }
    });
}

/// Fill targets from the path parameters the route declares.
async fn path_targets(
    parts: &mut Parts,
    state: &AppState,
    target: &RouteTarget,
    access: &mut AccessRequest,
) -> Result<(), MalformedTarget> {
    if target.path_document.is_none() && target.path_group.is_none() {
        return Ok(());
    }

    let params = RawPathParams::from_request_parts(parts, state)
        .await
        .map_err(|_| MalformedTarget::PathParams)?;

    for (name, value) in &params {
        if target.path_document.as_deref() == Some(name) {
            access.target_document_id = Some(value.to_string());
        }
        if target.path_group.as_deref() == Some(name) {
            access.target_group_id = Some(value.to_string());
        }
    }

    if (target.path_document.is_some() && access.target_document_id.is_none())
        || (target.path_group.is_some() && access.target_group_id.is_none())
    {
        return Err(MalformedTarget::MissingPathParam);
    }
    Ok(())
}

/// Fill targets still unset from the declared body fields.
///
/// An empty body names no target. Anything else must be a JSON object whose
/// declared fields, when present, are strings or numbers.
fn body_targets(
    bytes: &Bytes,
    headers: &HeaderMap,
    target: &RouteTarget,
    access: &mut AccessRequest,
) -> Result<(), MalformedTarget> {
    let wants_document = access.target_document_id.is_none() && target.body_document.is_some();
    let wants_group = access.target_group_id.is_none() && target.body_group.is_some();
    if !(wants_document || wants_group) || bytes.is_empty() {
        return Ok(());
    }
    if !is_json(headers) {
        return Err(MalformedTarget::NotJson);
    }

    let value: serde_json::Value =
        serde_json::from_slice(bytes).map_err(|_| MalformedTarget::InvalidJson)?;
    let object = value.as_object().ok_or(MalformedTarget::InvalidJson)?;

    if wants_document && let Some(field) = &target.body_document {
        access.target_document_id = json_field(object, field)?;
    }
    if wants_group && let Some(field) = &target.body_group {
        access.target_group_id = json_field(object, field)?;
    }
    Ok(())
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
}

/// A top-level string or number field. Absent and null mean no target.
fn json_field(
    object: &serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Result<Option<String>, MalformedTarget> {
    match object.get(field) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s.clone())),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(MalformedTarget::NonScalarField),
    }
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        Router,
        routing::{get, post},
    };
    use http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use rstest::rstest;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;
    use crate::{
        config::{DocguardConfig, TrustedHeadersConfig},
        db::{DbPool, InMemoryStore},
        models::{AUTHZ_ALLOW, AUTHZ_DENY, AccessType, DocumentAccess, GroupRole, PermissionType},
        routes::with_authorization,
    };

    struct TestApp {
        store: Arc<InMemoryStore>,
        state: AppState,
        router: Router,
    }

    fn test_app(log_allowed: bool) -> TestApp {
        test_app_with(|config| config.authz.audit.log_allowed = log_allowed)
    }

    fn test_app_with(configure: impl FnOnce(&mut DocguardConfig)) -> TestApp {
        let store = Arc::new(InMemoryStore::new());
        let mut config = DocguardConfig::default();
        config.auth.trusted_headers = Some(TrustedHeadersConfig::default());
        configure(&mut config);

        let db = Arc::new(DbPool::from_memory(store.clone()));
        let state = AppState::new(config, db).unwrap();

        // Echo handler returns the body it was given, so tests can see it was restored
        let echo = |body: String| async move { body };
        let routes = Router::new()
            .route("/documents/{id}", get(|| async { "doc" }).delete(|| async { "deleted" }))
            .route("/tags/document", post(echo))
            .route("/groups/{id}", get(|| async { "group" }))
            .route("/categories", get(|| async { "categories" }))
            .route("/unregistered", get(|| async { "open" }));
        let router = with_authorization(routes, &state).with_state(state.clone());

        TestApp {
            store,
            state,
            router,
        }
    }

    fn request(method: Method, uri: &str, caller: Option<Caller>) -> http::request::Builder {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(caller) = caller {
            builder = builder
                .header("x-user-id", caller.id.to_string())
                .header("x-user-role", caller.system_role.as_str());
        }
        builder
    }

    async fn send(app: &TestApp, req: http::Request<Body>) -> (StatusCode, String) {
        let response = app.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn drain_audit(app: &TestApp) {
        app.state.task_tracker.close();
        app.state.task_tracker.wait().await;
    }

    #[tokio::test]
    async fn test_public_route_needs_no_caller() {
        let app = test_app(false);
        let req = request(Method::GET, "/categories", None)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await, (StatusCode::OK, "categories".into()));
    }

    #[tokio::test]
    async fn test_unregistered_route_is_open() {
        let app = test_app(false);
        let req = request(Method::GET, "/unregistered", None)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_delete_without_grant_is_forbidden() {
        let app = test_app(false);
        let owner = Uuid::new_v4();
        let doc = Uuid::new_v4();
        app.store
            .insert_document(DocumentAccess::new(doc, AccessType::Private).with_owner(owner));

        let stranger = Caller::user(Uuid::new_v4());
        let req = request(Method::DELETE, &format!("/documents/{doc}"), Some(stranger))
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": {"type": "forbidden", "message": "Forbidden"}})
        );
    }

    #[tokio::test]
    async fn test_owner_can_delete() {
        let app = test_app(false);
        let owner = Uuid::new_v4();
        let doc = Uuid::new_v4();
        app.store
            .insert_document(DocumentAccess::new(doc, AccessType::Private).with_owner(owner));

        let req = request(Method::DELETE, &format!("/documents/{doc}"), Some(Caller::user(owner)))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await, (StatusCode::OK, "deleted".into()));
    }

    #[tokio::test]
    async fn test_missing_caller_denied_on_protected_route() {
        let app = test_app(false);
        let req = request(Method::DELETE, &format!("/documents/{}", Uuid::new_v4()), None)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_body_target_used_and_body_restored() {
        let app = test_app(false);
        let user = Uuid::new_v4();
        let doc = Uuid::new_v4();
        app.store.insert_document(DocumentAccess::new(doc, AccessType::Private));
        app.store.grant(doc, user, PermissionType::Write);

        let payload = serde_json::json!({"document_id": doc, "tag_id": "t1"}).to_string();
        let req = request(Method::POST, "/tags/document", Some(Caller::user(user)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.clone()))
            .unwrap();
        assert_eq!(send(&app, req).await, (StatusCode::OK, payload));
    }

    #[tokio::test]
    async fn test_body_target_requires_write_grant() {
        let app = test_app(false);
        let user = Uuid::new_v4();
        let doc = Uuid::new_v4();
        app.store.insert_document(DocumentAccess::new(doc, AccessType::Private));
        app.store.grant(doc, user, PermissionType::Read);

        let payload = serde_json::json!({"document_id": doc}).to_string();
        let req = request(Method::POST, "/tags/document", Some(Caller::user(user)))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_group_route_uses_group_param() {
        let app = test_app(false);
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let group = Uuid::new_v4();
        app.store.add_member(group, member, GroupRole::Member);

        let req = request(Method::GET, &format!("/groups/{group}"), Some(Caller::user(member)))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::OK);

        let req = request(Method::GET, &format!("/groups/{group}"), Some(Caller::user(outsider)))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_lookup_failure_is_500() {
        let app = test_app(false);
        app.store.set_unavailable(true);

        let req = request(
            Method::DELETE,
            &format!("/documents/{}", Uuid::new_v4()),
            Some(Caller::user(Uuid::new_v4())),
        )
        .body(Body::empty())
        .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_denial_audited() {
        let app = test_app(false);
        let caller = Caller::guest(Uuid::new_v4());
        let req = request(Method::DELETE, &format!("/documents/{}", Uuid::new_v4()), Some(caller))
            .header(header::USER_AGENT, "docguard-test")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);

        drain_audit(&app).await;
        let entries = app.store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AUTHZ_DENY);
        assert_eq!(entries[0].actor_id, Some(caller.id));
        assert_eq!(entries[0].details["route"], "documents.delete");
        assert_eq!(entries[0].user_agent.as_deref(), Some("docguard-test"));
    }

    #[tokio::test]
    async fn test_allow_audited_only_when_enabled() {
        let quiet = test_app(false);
        let req = request(Method::GET, "/categories", None)
            .body(Body::empty())
            .unwrap();
        send(&quiet, req).await;
        drain_audit(&quiet).await;
        assert!(quiet.store.audit_entries().is_empty());

        let verbose = test_app(true);
        let req = request(Method::GET, "/categories", None)
            .body(Body::empty())
            .unwrap();
        send(&verbose, req).await;
        drain_audit(&verbose).await;
        let entries = verbose.store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AUTHZ_ALLOW);
    }

    #[tokio::test]
    async fn test_undecodable_path_param_is_denied() {
        let app = test_app(false);
        let req = request(Method::DELETE, "/documents/%FF", Some(Caller::user(Uuid::new_v4())))
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);

        drain_audit(&app).await;
        let entries = app.store.audit_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, AUTHZ_DENY);
        assert_eq!(entries[0].details["rule"], "malformed_target");
        assert_eq!(entries[0].details["route"], "documents.delete");
    }

    #[tokio::test]
    async fn test_undecodable_path_param_on_public_route_passes() {
        let app = test_app(false);
        let req = request(Method::GET, "/documents/%FF", None)
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await, (StatusCode::OK, "doc".into()));
    }

    #[tokio::test]
    async fn test_form_encoded_body_target_is_denied() {
        let app = test_app(false);
        let doc = Uuid::new_v4();
        let req = request(Method::POST, "/tags/document", Some(Caller::user(Uuid::new_v4())))
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("document_id={doc}&tag_id=t1")))
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);
    }

    #[rstest]
    #[case::not_json("document_id=")]
    #[case::truncated(r#"{"document_id": "#)]
    #[case::array(r#"["document_id"]"#)]
    #[case::object_field(r#"{"document_id": {"id": "x"}}"#)]
    #[case::array_field(r#"{"document_id": ["x"]}"#)]
    #[case::bool_field(r#"{"document_id": true}"#)]
    #[tokio::test]
    async fn test_unreadable_json_body_target_is_denied(#[case] payload: &str) {
        let app = test_app(false);
        let req = request(Method::POST, "/tags/document", Some(Caller::user(Uuid::new_v4())))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_body_without_target_field_reaches_handler() {
        let app = test_app(false);
        let payload = serde_json::json!({"tag_id": "t1"}).to_string();
        let req = request(Method::POST, "/tags/document", Some(Caller::user(Uuid::new_v4())))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.clone()))
            .unwrap();
        assert_eq!(send(&app, req).await, (StatusCode::OK, payload));
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let app = test_app_with(|config| config.server.body_limit_bytes = 16);
        let payload = serde_json::json!({"document_id": Uuid::new_v4()}).to_string();
        let req = request(Method::POST, "/tags/document", Some(Caller::user(Uuid::new_v4())))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload))
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["error"]["type"], "request_too_large");
    }

    #[test]
    fn test_body_targets() {
        let json = {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
            headers
        };
        let target = RouteTarget::body_document("document_id");
        let read = |payload: &'static str, headers: &HeaderMap| {
            let mut access = AccessRequest::new(Method::POST);
            body_targets(&Bytes::from(payload), headers, &target, &mut access)
                .map(|()| access.target_document_id)
        };

        assert_eq!(read(r#"{"document_id": "abc"}"#, &json), Ok(Some("abc".into())));
        assert_eq!(read(r#"{"document_id": 7}"#, &json), Ok(Some("7".into())));
        assert_eq!(read(r#"{"document_id": null}"#, &json), Ok(None));
        assert_eq!(read("", &HeaderMap::new()), Ok(None));
        assert_eq!(read("not json", &json), Err(MalformedTarget::InvalidJson));
        assert_eq!(read("[1, 2]", &json), Err(MalformedTarget::InvalidJson));
        assert_eq!(read(r#"{"document_id": "abc"}"#, &HeaderMap::new()), Err(MalformedTarget::NotJson));
        assert_eq!(read(r#"{"document_id": false}"#, &json), Err(MalformedTarget::NonScalarField));
    }

    #[test]
    fn test_path_target_wins_over_body() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let mut access = AccessRequest::new(Method::POST).with_document("from-path");

        // The body is never parsed once the path supplied the id.
        body_targets(
            &Bytes::from_static(b"not json"),
            &headers,
            &RouteTarget::body_document("document_id"),
            &mut access,
        )
        .unwrap();
        assert_eq!(access.target_document_id.as_deref(), Some("from-path"));
    }
}
