mod app;
mod auth;
mod config;
mod dto;
mod error;
mod filter;
mod ratings;
mod recipes;
mod state;
mod store;

use crate::{auth::services::Credentials, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "recipebox=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init().await?;

    if let Some(seed) = app_state.config.seed_user.clone() {
        let creds = Credentials::new(app_state.store.clone(), app_state.config.password.clone());
        match creds.ensure_user(&seed.username, &seed.password).await {
            Ok(()) => tracing::info!(username = %seed.username, "seed user ready"),
            Err(e) => tracing::warn!(error = %e, "could not create seed user; continuing"),
        }
    }

    app::serve(app::build_app(app_state)).await
}
