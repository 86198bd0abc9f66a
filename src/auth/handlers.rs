use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, SignUpRequest},
        jwt::JwtKeys,
        services::Credentials,
    },
    dto::Message,
    error::{AppError, AuthError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/login", post(login))
}

#[instrument(skip(creds, payload))]
pub async fn sign_up(
    State(creds): State<Credentials>,
    payload: Option<Json<SignUpRequest>>,
) -> Result<(StatusCode, Json<Message>), AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let username = payload.username.unwrap_or_default();
    let password = payload.password.unwrap_or_default();

    creds.create_user(&username, &password).await?;
    Ok((StatusCode::CREATED, Json(Message::new("User created successfully"))))
}

#[instrument(skip(creds, keys, payload))]
pub async fn login(
    State(creds): State<Credentials>,
    State(keys): State<JwtKeys>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Json<LoginResponse>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let (Some(username), Some(password)) = (
        payload.username.filter(|u| !u.is_empty()),
        payload.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(AuthError::MissingCredentials.into());
    };

    let user = creds.verify(&username, &password).await?;
    let token = keys
        .issue(&user)
        .map_err(|e| AppError::internal("jwt sign", e))?;

    info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        token,
        user: PublicUser { id: user.id },
    }))
}
