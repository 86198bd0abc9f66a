use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

/// Recipe record, serialized with the catalog's wire names.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recipe {
    #[serde(rename = "RecipeID")]
    pub id: Uuid,
    #[serde(rename = "RecipeName")]
    pub name: String,
    #[serde(rename = "Instructions")]
    pub instructions: String,
    #[serde(rename = "Ingredients")]
    pub ingredients: String,
    /// Author-supplied default, not the computed average.
    #[serde(rename = "Rating")]
    pub base_rating: i32,
    #[serde(rename = "DateCreated", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(rename = "UserID")]
    pub owner_id: Uuid,
}

/// Complete set of owner-editable fields, used for insert and update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeFields {
    pub name: String,
    pub instructions: String,
    pub ingredients: String,
    pub base_rating: i32,
}

impl From<&Recipe> for RecipeFields {
    fn from(r: &Recipe) -> Self {
        Self {
            name: r.name.clone(),
            instructions: r.instructions.clone(),
            ingredients: r.ingredients.clone(),
            base_rating: r.base_rating,
        }
    }
}
