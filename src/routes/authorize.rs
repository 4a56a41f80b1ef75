//! Decision service endpoints.
//!
//! `POST /v1/authorize` lets a backend that does its own routing ask for a
//! verdict. The answer is a bare boolean: the rule that decided is logged
//! and audited, never returned.

use axum::{Json, extract::State};
use http::Method;
use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    authz::{AccessRequest, PolicyRequirement, RoutePolicy},
    error::ApiError,
    middleware::audit_decision,
    models::Caller,
    services::DecisionRecord,
};

/// Caller as sent by the client. Malformed values mean "no caller".
#[derive(Debug, Deserialize)]
pub struct CallerInput {
    pub id: String,
    pub role: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthorizeRequest {
    /// Id of a registered route policy.
    #[serde(default)]
    pub route: Option<String>,
    /// An inline requirement, instead of `route`.
    #[serde(default)]
    pub requirement: Option<PolicyRequirement>,
    #[serde(default)]
    pub caller: Option<CallerInput>,
    pub method: String,
    #[serde(default)]
    pub document_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthorizeResponse {
    pub allowed: bool,
}

#[tracing::instrument(name = "authz.authorize", skip_all)]
pub async fn authorize(
    State(state): State<AppState>,
    Json(body): Json<AuthorizeRequest>,
) -> Result<Json<AuthorizeResponse>, ApiError> {
    let requirement = match (&body.route, body.requirement) {
        (Some(route), None) => state
            .registry
            .get(route)
            .map(|p| p.requirement.clone())
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown route '{route}'")))?,
        (None, Some(requirement)) => requirement,
        _ => {
            return Err(ApiError::BadRequest(
                "Exactly one of 'route' or 'requirement' must be given".to_string(),
            ));
        }
    };

    let method = Method::from_bytes(body.method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ApiError::BadRequest(format!("Invalid method '{}'", body.method)))?;

    let caller = body
        .caller
        .as_ref()
        .and_then(|c| Caller::parse(&c.id, &c.role));

    let mut request = AccessRequest::new(method);
    request.target_document_id = body.document_id;
    request.target_group_id = body.group_id;

    let decision = state
        .engine
        .decide(&requirement, caller.as_ref(), &request)
        .await
        .map_err(|_| ApiError::Internal("Authorization check failed".to_string()))?;

    if state.config.authz.audit.should_log(decision.allowed) {
        audit_decision(
            &state,
            DecisionRecord {
                route_id: body.route,
                caller,
                request,
                decision,
                ip_address: None,
                user_agent: None,
            },
        );
    }

    Ok(Json(AuthorizeResponse {
        allowed: decision.allowed,
    }))
}

/// The route policy table, sorted by id.
pub async fn list_policies(State(state): State<AppState>) -> Json<Vec<RoutePolicy>> {
    Json(state.registry.iter().cloned().collect())
}
