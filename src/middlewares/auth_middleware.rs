use axum::{body::Body, extract::State, http::Request, middleware::Next, response::Response};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::model::user::Actor;
use crate::util::error::HandlerError;
use crate::util::jwt::{JwtTokenUtils, JwtTokenUtilsImpl};

pub struct AuthState {
    pub jwt_utils: Arc<JwtTokenUtilsImpl>,
}

impl AuthState {
    pub fn new(jwt_utils: JwtTokenUtilsImpl) -> Self {
        AuthState {
            jwt_utils: Arc::new(jwt_utils),
        }
    }

    fn resolve(&self, auth_header: &str) -> Result<Actor, HandlerError> {
        let token = self
            .jwt_utils
            .extract_token_from_header(auth_header)
            .map_err(|e| HandlerError::unauthorized(e.to_string()))?;
        let claims = self.jwt_utils.validate_access_token(&token).map_err(|e| {
            warn!("Rejected bearer token: {}", e);
            HandlerError::unauthorized(e.to_string())
        })?;
        claims
            .to_actor()
            .map_err(|e| HandlerError::unauthorized(e.to_string()))
    }
}

/// Caller of a route that accepts anonymous requests.
#[derive(Debug, Clone)]
pub struct MaybeActor(pub Option<Actor>);

fn authorization(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
}

/// Rejects requests without a valid access token and attaches the [`Actor`].
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, HandlerError> {
    let auth_header = authorization(&req).ok_or_else(|| HandlerError::unauthorized("Missing authorization header"))?;
    let actor = state.resolve(auth_header)?;
    debug!(actor = %actor.id, role = %actor.role, "Authenticated request");
    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

/// Attaches a [`MaybeActor`]. A missing header is anonymous; a header that
/// is present must still carry a valid token.
pub async fn optional_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, HandlerError> {
    let actor = match authorization(&req) {
        Some(auth_header) => Some(state.resolve(auth_header)?),
        None => None,
    };
    req.extensions_mut().insert(MaybeActor(actor));
    Ok(next.run(req).await)
}
