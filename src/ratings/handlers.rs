use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{
    dto::{AverageRating, BusiestDayReport, RateRequest, RateResponse},
    repo_types::UpsertAction,
    services::RatingEngine,
};
use crate::{
    auth::extractors::AuthUser,
    error::AppError,
    filter::{FilterParams, ReportFilter},
    recipes::{dto::RecipeList, extractors::RecipeId},
    state::AppState,
};

pub fn rating_routes() -> Router<AppState> {
    Router::new()
        .route("/rate_recipe/:id", post(rate_recipe))
        .route("/recipes/:id/rating", get(recipe_rating))
        .route("/recipes/average_rating_report", post(average_rating_report))
        .route(
            "/recipes/max_recipes_per_day_report",
            post(max_recipes_per_day_report),
        )
        .route("/filter_recipes", post(filter_recipes))
}

/// An empty body means "no filters".
fn report_filter(body: &[u8]) -> Result<ReportFilter, AppError> {
    let params = FilterParams::from_body(body)?;
    Ok(ReportFilter::from_params(&params)?)
}

#[instrument(skip(engine, payload))]
pub async fn rate_recipe(
    State(engine): State<RatingEngine>,
    AuthUser(user): AuthUser,
    RecipeId(id): RecipeId,
    payload: Option<Json<RateRequest>>,
) -> Result<Json<RateResponse>, AppError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();
    let submitted = engine.submit(&user, id, payload.rating.as_ref()).await?;
    let verb = match submitted.action {
        UpsertAction::Created => "submitted",
        UpsertAction::Updated => "updated",
    };
    Ok(Json(RateResponse {
        message: format!("Rating {verb} successfully"),
        recipe_average_rating: submitted.reported,
    }))
}

#[instrument(skip(engine))]
pub async fn recipe_rating(
    State(engine): State<RatingEngine>,
    RecipeId(id): RecipeId,
) -> Result<Json<AverageRating>, AppError> {
    let average_rating = engine.average_for_recipe(id).await?;
    Ok(Json(AverageRating { average_rating }))
}

#[instrument(skip(engine, body))]
pub async fn average_rating_report(
    State(engine): State<RatingEngine>,
    body: Bytes,
) -> Result<Json<AverageRating>, AppError> {
    let filter = report_filter(&body)?;
    let average = engine.filtered_average(&filter).await?;
    info!(?filter, average, "average rating report");
    Ok(Json(AverageRating {
        average_rating: Some(average),
    }))
}

#[instrument(skip(engine, body))]
pub async fn max_recipes_per_day_report(
    State(engine): State<RatingEngine>,
    body: Bytes,
) -> Result<Json<BusiestDayReport>, AppError> {
    let filter = report_filter(&body)?;
    let report = match engine.busiest_day(&filter).await? {
        Some(best) => BusiestDayReport::Day {
            day: best.day.to_string(),
            count: best.count,
        },
        None => BusiestDayReport::Empty {
            message: "No recipes found matching the criteria",
        },
    };
    Ok(Json(report))
}

#[instrument(skip(engine, body))]
pub async fn filter_recipes(
    State(engine): State<RatingEngine>,
    body: Bytes,
) -> Result<Json<RecipeList>, AppError> {
    let filter = report_filter(&body)?;
    let recipes = engine.filter_recipes_by_rating(&filter).await?;
    Ok(Json(RecipeList { recipes }))
}
