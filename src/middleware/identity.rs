//! Caller resolution.
//!
//! Authentication is done upstream. This layer only turns what the upstream
//! left behind into a [`Caller`] in the request extensions: either a caller
//! an embedding application already inserted, or one built from trusted
//! proxy headers when `auth.trusted_headers` is configured.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::HeaderMap;

use crate::{AppState, config::TrustedHeadersConfig, models::Caller};

pub async fn identity_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if req.extensions().get::<Caller>().is_none()
        && let Some(config) = &state.config.auth.trusted_headers
        && let Some(caller) = caller_from_headers(req.headers(), config)
    {
        req.extensions_mut().insert(caller);
    }

    next.run(req).await
}

/// Build a caller from the configured identity headers.
///
/// Missing headers, a malformed id, or an unknown role all yield `None`: the
/// request continues as anonymous and the policy decides.
pub fn caller_from_headers(headers: &HeaderMap, config: &TrustedHeadersConfig) -> Option<Caller> {
    let id = headers.get(&config.user_id_header)?.to_str().ok()?;
    let role = headers.get(&config.role_header)?.to_str().ok()?;

    let caller = Caller::parse(id, role);
    if caller.is_none() {
        tracing::debug!(
            user_id_header = %config.user_id_header,
            role_header = %config.role_header,
            "Ignoring malformed identity headers"
        );
    }
    caller
}
