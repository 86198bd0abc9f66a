use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::repo_types::Recipe;

/// Create and update body. Every field is optional on the wire; which ones
/// are required depends on the operation.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeRequest {
    #[serde(rename = "RecipeName", default)]
    pub name: Option<String>,
    #[serde(rename = "Instructions", default)]
    pub instructions: Option<String>,
    #[serde(rename = "Ingredients", default)]
    pub ingredients: Option<String>,
    #[serde(rename = "Rating", default)]
    pub rating: Option<Value>,
}

impl RecipeRequest {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.instructions.is_none()
            && self.ingredients.is_none()
            && self.rating.as_ref().map_or(true, Value::is_null)
    }
}

#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub recipe: Recipe,
}

#[derive(Debug, Serialize)]
pub struct RecipeList {
    pub recipes: Vec<Recipe>,
}

#[derive(Debug, Serialize)]
pub struct RecipeChanged {
    pub message: &'static str,
    pub recipe: Recipe,
}
