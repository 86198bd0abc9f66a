use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use super::{
    dto::{RecipeChanged, RecipeList, RecipeRequest, RecipeResponse},
    extractors::RecipeId,
    services::Recipes,
};
use crate::{auth::extractors::AuthUser, dto::Message, error::AppError, state::AppState};

pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/recipes/:id",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
}

#[instrument(skip(recipes))]
pub async fn list_recipes(State(recipes): State<Recipes>) -> Result<Json<RecipeList>, AppError> {
    let recipes = recipes.list().await?;
    Ok(Json(RecipeList { recipes }))
}

#[instrument(skip(recipes))]
pub async fn get_recipe(
    State(recipes): State<Recipes>,
    RecipeId(id): RecipeId,
) -> Result<Json<RecipeResponse>, AppError> {
    let recipe = recipes.get(id).await?;
    Ok(Json(RecipeResponse { recipe }))
}

#[instrument(skip(recipes, payload))]
pub async fn create_recipe(
    State(recipes): State<Recipes>,
    AuthUser(user): AuthUser,
    payload: Option<Json<RecipeRequest>>,
) -> Result<(StatusCode, Json<RecipeChanged>), AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let recipe = recipes.create(&user, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(RecipeChanged {
            message: "Recipe created",
            recipe,
        }),
    ))
}

#[instrument(skip(recipes, payload))]
pub async fn update_recipe(
    State(recipes): State<Recipes>,
    AuthUser(user): AuthUser,
    RecipeId(id): RecipeId,
    payload: Option<Json<RecipeRequest>>,
) -> Result<Json<RecipeChanged>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let recipe = recipes.update(&user, id, payload).await?;
    Ok(Json(RecipeChanged {
        message: "Recipe updated",
        recipe,
    }))
}

#[instrument(skip(recipes))]
pub async fn delete_recipe(
    State(recipes): State<Recipes>,
    AuthUser(user): AuthUser,
    RecipeId(id): RecipeId,
) -> Result<Json<Message>, AppError> {
    recipes.delete(&user, id).await?;
    Ok(Json(Message::new("Recipe deleted")))
}
