use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;

/// `:id` path segment naming a recipe. An id that cannot be a recipe id is
/// reported like any other missing recipe.
#[derive(Debug, Clone, Copy)]
pub struct RecipeId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for RecipeId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<Uuid>::from_request_parts(parts, state).await {
            Ok(Path(id)) => Ok(RecipeId(id)),
            Err(rejection) => {
                debug!(reason = %rejection.body_text(), "unparsable recipe id");
                Err(AppError::NotFound("Recipe not found".into()))
            }
        }
    }
}
