use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{jwt::JwtKeys, repo_types::Principal};
use crate::{
    error::{AppError, AuthError},
    state::AppState,
    store::UserStore,
};

/// Splits `Bearer <token>`. No header at all is `MissingHeader`; anything
/// present but not of that shape is `MalformedHeader`.
pub fn bearer_token(raw_header: Option<&str>) -> Result<&str, AuthError> {
    let raw = raw_header.ok_or(AuthError::MissingHeader)?;
    let mut parts = raw.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// Resolves the acting principal from a raw `Authorization` value.
pub async fn authenticate<U>(
    keys: &JwtKeys,
    users: &U,
    raw_header: Option<&str>,
) -> Result<Principal, AppError>
where
    U: UserStore + ?Sized,
{
    let token = bearer_token(raw_header)?;
    let claims = keys.verify(token)?;
    let user = users
        .find_user(claims.user_id)
        .await?
        .ok_or(AuthError::PrincipalNotFound)?;
    Ok(Principal::from(&user))
}

/// Verified caller of a gated route. Handlers that mutate state take this
/// as an argument; identity is never read from the request body.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);
        let keys = JwtKeys::from_ref(&state);

        let raw = match parts.headers.get(AUTHORIZATION) {
            None => None,
            Some(v) => Some(v.to_str().map_err(|_| AuthError::MalformedHeader)?),
        };

        match authenticate(&keys, state.store.as_ref(), raw).await {
            Ok(principal) => Ok(AuthUser(principal)),
            Err(AppError::Auth(kind)) => {
                warn!(reason = ?kind, "request not authenticated");
                Err(AppError::Auth(kind))
            }
            Err(other) => Err(other),
        }
    }
}
