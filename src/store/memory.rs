//! In-process store. One async lock guards all tables, so every operation
//! runs as if under serializable isolation.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{RatingStore, RecipeStore, StoreError, UserStore};
use crate::{
    auth::repo_types::User,
    filter::ReportFilter,
    ratings::repo_types::{DayCount, Rating, UpsertAction, UpsertOutcome},
    recipes::repo_types::{Recipe, RecipeFields},
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    recipes: Vec<Recipe>,
    ratings: Vec<Rating>,
}

impl Tables {
    fn recipe_average(&self, recipe_id: Uuid) -> Option<f64> {
        mean(
            self.ratings
                .iter()
                .filter(|r| r.recipe_id == recipe_id)
                .map(|r| r.value),
        )
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    pending_conflicts: AtomicU32,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` rating upserts fail with `StoreError::Conflict`,
    /// as a serializable backend does when a concurrent transaction wins.
    #[cfg(test)]
    pub fn inject_conflicts(&self, n: u32) {
        self.pending_conflicts.store(n, Ordering::SeqCst);
    }

    fn take_conflict(&self) -> bool {
        self.pending_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    #[cfg(test)]
    pub async fn ratings_for(&self, user_id: Uuid, recipe_id: Uuid) -> Vec<Rating> {
        let t = self.tables.lock().await;
        t.ratings
            .iter()
            .filter(|r| r.user_id == user_id && r.recipe_id == recipe_id)
            .cloned()
            .collect()
    }

    #[cfg(test)]
    pub async fn rating_count(&self) -> usize {
        self.tables.lock().await.ratings.len()
    }

    #[cfg(test)]
    pub async fn backdate_recipe(&self, recipe_id: Uuid, at: OffsetDateTime) {
        let mut t = self.tables.lock().await;
        if let Some(r) = t.recipes.iter_mut().find(|r| r.id == recipe_id) {
            r.created_at = at;
        }
    }

    #[cfg(test)]
    pub async fn backdate_rating(&self, user_id: Uuid, recipe_id: Uuid, at: OffsetDateTime) {
        let mut t = self.tables.lock().await;
        if let Some(r) = t
            .ratings
            .iter_mut()
            .find(|r| r.user_id == user_id && r.recipe_id == recipe_id)
        {
            r.created_at = at;
        }
    }
}

fn mean(values: impl Iterator<Item = i32>) -> Option<f64> {
    let (sum, n) = values.fold((0i64, 0i64), |(s, n), v| (s + v as i64, n + 1));
    (n > 0).then(|| sum as f64 / n as f64)
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let mut t = self.tables.lock().await;
        if t.users.iter().any(|u| u.username == username) {
            return Err(StoreError::UniqueViolation);
        }
        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.username == username).cloned())
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn insert_recipe(&self, owner_id: Uuid, fields: &RecipeFields) -> Result<Recipe, StoreError> {
        let mut t = self.tables.lock().await;
        if !t.users.iter().any(|u| u.id == owner_id) {
            return Err(StoreError::MissingReference);
        }
        let recipe = Recipe {
            id: Uuid::new_v4(),
            name: fields.name.clone(),
            instructions: fields.instructions.clone(),
            ingredients: fields.ingredients.clone(),
            base_rating: fields.base_rating,
            created_at: OffsetDateTime::now_utc(),
            owner_id,
        };
        t.recipes.push(recipe.clone());
        Ok(recipe)
    }

    async fn find_recipe(&self, id: Uuid) -> Result<Option<Recipe>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn list_recipes(&self) -> Result<Vec<Recipe>, StoreError> {
        Ok(self.tables.lock().await.recipes.clone())
    }

    async fn update_recipe(&self, id: Uuid, fields: &RecipeFields) -> Result<Option<Recipe>, StoreError> {
        let mut t = self.tables.lock().await;
        let Some(recipe) = t.recipes.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        recipe.name = fields.name.clone();
        recipe.instructions = fields.instructions.clone();
        recipe.ingredients = fields.ingredients.clone();
        recipe.base_rating = fields.base_rating;
        Ok(Some(recipe.clone()))
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut t = self.tables.lock().await;
        let before = t.recipes.len();
        t.recipes.retain(|r| r.id != id);
        if t.recipes.len() == before {
            return Ok(false);
        }
        t.ratings.retain(|r| r.recipe_id != id);
        Ok(true)
    }
}

#[async_trait]
impl RatingStore for MemoryStore {
    async fn upsert_rating(&self, user_id: Uuid, recipe_id: Uuid, value: i32) -> Result<UpsertOutcome, StoreError> {
        if self.take_conflict() {
            return Err(StoreError::Conflict);
        }
        let mut guard = self.tables.lock().await;
        let t = &mut *guard;
        let Some(base_rating) = t
            .recipes
            .iter()
            .find(|r| r.id == recipe_id)
            .map(|r| r.base_rating)
        else {
            return Err(StoreError::MissingReference);
        };
        let now = OffsetDateTime::now_utc();
        let action = match t
            .ratings
            .iter_mut()
            .find(|r| r.user_id == user_id && r.recipe_id == recipe_id)
        {
            Some(existing) => {
                existing.value = value;
                existing.created_at = now;
                UpsertAction::Updated
            }
            None => {
                t.ratings.push(Rating {
                    id: Uuid::new_v4(),
                    recipe_id,
                    user_id,
                    value,
                    created_at: now,
                });
                UpsertAction::Created
            }
        };
        Ok(UpsertOutcome {
            action,
            average: t.recipe_average(recipe_id),
            base_rating,
        })
    }

    async fn recipe_average(&self, recipe_id: Uuid) -> Result<Option<f64>, StoreError> {
        Ok(self.tables.lock().await.recipe_average(recipe_id))
    }

    async fn filtered_average(&self, filter: &ReportFilter) -> Result<Option<f64>, StoreError> {
        let t = self.tables.lock().await;
        Ok(mean(
            t.ratings
                .iter()
                .filter(|r| filter.covers(r.created_at) && filter.admits_rating(r.value as f64))
                .map(|r| r.value),
        ))
    }

    async fn busiest_day(&self, filter: &ReportFilter) -> Result<Option<DayCount>, StoreError> {
        let t = self.tables.lock().await;
        let mut per_day = BTreeMap::new();
        for r in t
            .recipes
            .iter()
            .filter(|r| filter.covers(r.created_at) && filter.admits_rating(r.base_rating as f64))
        {
            *per_day
                .entry(r.created_at.to_offset(UtcOffset::UTC).date())
                .or_insert(0i64) += 1;
        }
        // Ascending day order plus a strict comparison keeps the earliest day on ties.
        let mut best: Option<DayCount> = None;
        for (day, count) in per_day {
            if best.map_or(true, |b| count > b.count) {
                best = Some(DayCount { day, count });
            }
        }
        Ok(best)
    }

    async fn recipes_by_rating(&self, filter: &ReportFilter) -> Result<Vec<Recipe>, StoreError> {
        let t = self.tables.lock().await;
        Ok(t.recipes
            .iter()
            .filter(|r| filter.covers(r.created_at))
            .filter(|r| {
                t.recipe_average(r.id)
                    .is_some_and(|avg| filter.admits_rating(avg))
            })
            .cloned()
            .collect())
    }
}
