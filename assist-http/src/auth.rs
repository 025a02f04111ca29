use assist_core::{config::AuthSettings, AssistError, ANONYMOUS};
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{ErrorResponse, ServerState};

/// The authenticated user behind a request
#[derive(Debug, Clone)]
pub struct Caller {
    pub username: String,
}

/// Resolve the caller from an `Authorization: Bearer <token>` header
pub fn authenticate(auth: &AuthSettings, headers: &HeaderMap) -> Result<Caller, AssistError> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        if auth.allow_anonymous {
            return Ok(Caller {
                username: ANONYMOUS.to_string(),
            });
        }
        return Err(AssistError::Unauthorized);
    };

    let token = header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AssistError::Unauthorized)?;

    auth.tokens
        .get(token)
        .map(|username| Caller {
            username: username.clone(),
        })
        .ok_or(AssistError::Unauthorized)
}

/// Rejects unauthenticated requests before they reach a handler and
/// attaches the [`Caller`] to the request extensions
pub async fn require_auth(
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ErrorResponse> {
    match authenticate(&state.auth, request.headers()) {
        Ok(caller) => {
            request.extensions_mut().insert(caller);
            Ok(next.run(request).await)
        }
        Err(e) => {
            warn!("Rejected {} {}: {}", request.method(), request.uri().path(), e);
            Err(e.into())
        }
    }
}
