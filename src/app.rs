use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth, ratings, recipes, state::AppState};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .merge(auth::router())
        .merge(recipes::router())
        .merge(ratings::router())
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{header, Method, Request, StatusCode},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn call(
        app: &Router,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn register_and_login(app: &Router, username: &str, password: &str) -> String {
        let creds = json!({ "username": username, "password": password });
        let (status, body) = call(app, Method::POST, "/sign-up", None, Some(creds.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["message"], "User created successfully");

        let (status, body) = call(app, Method::POST, "/login", None, Some(creds)).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (state, _) = AppState::fake();
        let app = build_app(state);
        let res = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rating_flow_end_to_end() {
        let (state, store) = AppState::fake();
        let app = build_app(state);

        let alice = register_and_login(&app, "alice", "secret1").await;
        let bob = register_and_login(&app, "bob", "hunter22").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/recipes",
            Some(&alice),
            Some(json!({
                "RecipeName": "Soup",
                "Instructions": "Boil",
                "Ingredients": "Water"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["recipe"]["Rating"], 5);
        let id = body["recipe"]["RecipeID"].as_str().unwrap().to_string();

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/rate_recipe/{id}"),
            Some(&bob),
            Some(json!({ "rating": 5 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Rating submitted successfully");

        let (_, body) = call(&app, Method::GET, &format!("/recipes/{id}/rating"), None, None).await;
        assert_eq!(body["average_rating"], 5.0);

        let (status, body) = call(
            &app,
            Method::POST,
            &format!("/rate_recipe/{id}"),
            Some(&bob),
            Some(json!({ "rating": 2 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Rating updated successfully");
        assert_eq!(body["recipe_average_rating"], 2.0);

        let (_, body) = call(&app, Method::GET, &format!("/recipes/{id}/rating"), None, None).await;
        assert_eq!(body["average_rating"], 2.0);
        assert_eq!(store.rating_count().await, 1);
    }

    #[tokio::test]
    async fn gated_routes_need_a_token() {
        let (state, _) = AppState::fake();
        let app = build_app(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/recipes",
            None,
            Some(json!({ "RecipeName": "x", "Instructions": "y", "Ingredients": "z" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Token is missing");

        let (status, _) = call(&app, Method::POST, "/recipes", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn only_owner_may_change_a_recipe() {
        let (state, _) = AppState::fake();
        let app = build_app(state);
        let alice = register_and_login(&app, "alice", "secret1").await;
        let bob = register_and_login(&app, "bob", "hunter22").await;

        let (_, body) = call(
            &app,
            Method::POST,
            "/recipes",
            Some(&alice),
            Some(json!({ "RecipeName": "Pie", "Instructions": "Bake", "Ingredients": "Apples" })),
        )
        .await;
        let id = body["recipe"]["RecipeID"].as_str().unwrap().to_string();
        let uri = format!("/recipes/{id}");

        let (status, body) = call(&app, Method::DELETE, &uri, Some(&bob), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Forbidden: You are not the owner of this recipe");

        let (status, body) = call(
            &app,
            Method::PUT,
            &uri,
            Some(&alice),
            Some(json!({ "RecipeName": "Apple pie" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recipe"]["RecipeName"], "Apple pie");
        assert_eq!(body["recipe"]["Instructions"], "Bake");

        let (status, _) = call(&app, Method::DELETE, &uri, Some(&alice), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn login_failures_are_unauthorized() {
        let (state, _) = AppState::fake();
        let app = build_app(state);
        register_and_login(&app, "alice", "secret1").await;

        let (status, body) = call(
            &app,
            Method::POST,
            "/login",
            None,
            Some(json!({ "username": "alice", "password": "wrong-one" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid username or password");

        let (status, body) = call(&app, Method::POST, "/login", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Could not verify");

        let (status, _) = call(
            &app,
            Method::POST,
            "/sign-up",
            None,
            Some(json!({ "username": "alice", "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn reports_validate_filters() {
        let (state, _) = AppState::fake();
        let app = build_app(state);

        let (status, body) = call(
            &app,
            Method::POST,
            "/recipes/average_rating_report",
            None,
            Some(json!({ "start_date": "2024-13-40" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid start date format. Use YYYY-MM-DD");

        let (status, body) = call(
            &app,
            Method::POST,
            "/filter_recipes",
            None,
            Some(json!({ "min_rating": -1 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid minimum rating. Must be a non-negative integer");

        let (status, body) =
            call(&app, Method::POST, "/recipes/average_rating_report", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["average_rating"], 0.0);

        let (status, body) =
            call(&app, Method::POST, "/recipes/max_recipes_per_day_report", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "No recipes found matching the criteria");
    }

    #[tokio::test]
    async fn non_uuid_recipe_id_is_json_not_found() {
        let (state, _) = AppState::fake();
        let app = build_app(state);
        let alice = register_and_login(&app, "alice", "secret1").await;

        for (method, uri, token) in [
            (Method::GET, "/recipes/42", None),
            (Method::GET, "/recipes/42/rating", None),
            (Method::DELETE, "/recipes/42", Some(alice.as_str())),
            (Method::POST, "/rate_recipe/not-an-id", Some(alice.as_str())),
        ] {
            let res = app
                .clone()
                .oneshot({
                    let mut req = Request::builder().method(method).uri(uri);
                    if let Some(t) = token {
                        req = req.header(header::AUTHORIZATION, format!("Bearer {t}"));
                    }
                    req.body(Body::empty()).unwrap()
                })
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::NOT_FOUND, "{uri}");
            assert!(res.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("application/json"));
            let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["message"], "Recipe not found");
        }
    }

    #[tokio::test]
    async fn report_body_must_be_a_json_object() {
        let (state, _) = AppState::fake();
        let app = build_app(state);

        for raw in ["{not json", "[1]"] {
            let req = Request::post("/recipes/average_rating_report")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(raw))
                .unwrap();
            let res = app.clone().oneshot(req).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{raw}");
            let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["message"], "Request body must be a JSON object");
        }

        let (status, body) = call(
            &app,
            Method::POST,
            "/filter_recipes",
            None,
            Some(json!({ "min_rating": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recipes"], json!([]));
    }
}
