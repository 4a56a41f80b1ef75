pub mod authorize;
pub mod health;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::{
    AppState,
    config::DocguardConfig,
    middleware::{authz_middleware, identity_middleware},
};

/// The standalone decision service.
pub fn build_app(config: &DocguardConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .route("/v1/authorize", post(authorize::authorize))
        .route("/v1/policies", get(authorize::list_policies));

    if config.observability.metrics.enabled {
        app = app.route(&config.observability.metrics.path, get(health::metrics));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(RequestBodyLimitLayer::new(config.server.body_limit_bytes))
        .with_state(state)
}

/// Enforce route policies on an application's own routes.
///
/// Call after all routes are added: the authorization check is a route layer
/// and only applies to routes that exist at that point. Caller resolution
/// wraps everything.
pub fn with_authorization(router: Router<AppState>, state: &AppState) -> Router<AppState> {
    router
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            authz_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ))
}
