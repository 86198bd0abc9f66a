use std::sync::Arc;

use axum::extract::FromRef;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::RecipeRequest,
    repo_types::{Recipe, RecipeFields},
};
use crate::{
    auth::repo_types::Principal,
    error::AppError,
    state::AppState,
    store::Store,
};

const DEFAULT_BASE_RATING: i32 = 5;

/// Recipe Catalog: CRUD with owner-only mutation.
#[derive(Clone)]
pub struct Recipes {
    store: Arc<dyn Store>,
}

impl FromRef<AppState> for Recipes {
    fn from_ref(state: &AppState) -> Self {
        Self::new(state.store.clone())
    }
}

impl Recipes {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, owner: &Principal, req: RecipeRequest) -> Result<Recipe, AppError> {
        let (Some(name), Some(instructions), Some(ingredients)) = (
            non_blank(req.name),
            non_blank(req.instructions),
            non_blank(req.ingredients),
        ) else {
            return Err(AppError::validation("Missing recipe data"));
        };
        let base_rating = match req.rating.as_ref() {
            None | Some(Value::Null) => DEFAULT_BASE_RATING,
            Some(v) => parse_base_rating(v)?,
        };

        let fields = RecipeFields {
            name,
            instructions,
            ingredients,
            base_rating,
        };
        let recipe = self.store.insert_recipe(owner.id, &fields).await?;
        info!(recipe_id = %recipe.id, owner = %owner.username, "recipe created");
        Ok(recipe)
    }

    pub async fn get(&self, id: Uuid) -> Result<Recipe, AppError> {
        self.store
            .find_recipe(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe not found".into()))
    }

    pub async fn list(&self) -> Result<Vec<Recipe>, AppError> {
        Ok(self.store.list_recipes().await?)
    }

    /// Existence, then ownership, then the patch itself.
    pub async fn update(
        &self,
        actor: &Principal,
        id: Uuid,
        patch: RecipeRequest,
    ) -> Result<Recipe, AppError> {
        let current = self.owned(actor, id).await?;
        if patch.is_empty() {
            return Err(AppError::validation("No data provided for update"));
        }

        let mut fields = RecipeFields::from(&current);
        if let Some(name) = patch.name {
            fields.name = required(name)?;
        }
        if let Some(instructions) = patch.instructions {
            fields.instructions = required(instructions)?;
        }
        if let Some(ingredients) = patch.ingredients {
            fields.ingredients = required(ingredients)?;
        }
        if let Some(v) = patch.rating.as_ref().filter(|v| !v.is_null()) {
            fields.base_rating = parse_base_rating(v)?;
        }

        let updated = self
            .store
            .update_recipe(id, &fields)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe not found".into()))?;
        info!(recipe_id = %id, "recipe updated");
        Ok(updated)
    }

    pub async fn delete(&self, actor: &Principal, id: Uuid) -> Result<(), AppError> {
        self.owned(actor, id).await?;
        if !self.store.delete_recipe(id).await? {
            return Err(AppError::NotFound("Recipe not found".into()));
        }
        info!(recipe_id = %id, "recipe deleted");
        Ok(())
    }

    async fn owned(&self, actor: &Principal, id: Uuid) -> Result<Recipe, AppError> {
        let recipe = self.get(id).await?;
        if recipe.owner_id != actor.id {
            warn!(recipe_id = %id, actor = %actor.id, "mutation by non-owner");
            return Err(AppError::Forbidden(
                "Forbidden: You are not the owner of this recipe".into(),
            ));
        }
        Ok(recipe)
    }
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn required(v: String) -> Result<String, AppError> {
    non_blank(Some(v)).ok_or_else(|| AppError::validation("Recipe fields cannot be empty"))
}

fn parse_base_rating(v: &Value) -> Result<i32, AppError> {
    v.as_i64()
        .filter(|n| (0..=5).contains(n))
        .map(|n| n as i32)
        .ok_or_else(|| AppError::validation("Invalid recipe rating. Must be an integer between 0 and 5"))
}
