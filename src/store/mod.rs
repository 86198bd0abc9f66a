//! Persistence seam. Each trait method is one unit of work at the storage
//! boundary: it either commits completely or leaves nothing behind.
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::{
    auth::repo_types::User,
    error::AppError,
    filter::ReportFilter,
    ratings::repo_types::{DayCount, UpsertOutcome},
    recipes::repo_types::{Recipe, RecipeFields},
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("unique constraint violated")]
    UniqueViolation,

    /// The transaction lost a race with a concurrent one and was rolled back.
    #[error("transaction conflict, retry")]
    Conflict,

    #[error("referenced row does not exist")]
    MissingReference,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        AppError::internal("store", e)
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with `UniqueViolation` when the username is taken.
    async fn insert_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
}

#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn insert_recipe(&self, owner_id: Uuid, fields: &RecipeFields) -> Result<Recipe, StoreError>;
    async fn find_recipe(&self, id: Uuid) -> Result<Option<Recipe>, StoreError>;
    /// All recipes in creation order.
    async fn list_recipes(&self) -> Result<Vec<Recipe>, StoreError>;
    async fn update_recipe(&self, id: Uuid, fields: &RecipeFields) -> Result<Option<Recipe>, StoreError>;
    /// Removes the recipe together with its ratings. `false` if it did not exist.
    async fn delete_recipe(&self, id: Uuid) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait RatingStore: Send + Sync {
    /// Insert or overwrite the (user, recipe) rating under serializable
    /// isolation. A lost race surfaces as `Conflict`; a missing recipe as
    /// `MissingReference`.
    async fn upsert_rating(&self, user_id: Uuid, recipe_id: Uuid, value: i32) -> Result<UpsertOutcome, StoreError>;
    async fn recipe_average(&self, recipe_id: Uuid) -> Result<Option<f64>, StoreError>;
    /// Mean of rating values created within the filter's date range whose
    /// value meets `min_rating`.
    async fn filtered_average(&self, filter: &ReportFilter) -> Result<Option<f64>, StoreError>;
    /// Calendar day (UTC) with most recipes created, filtered on recipe
    /// creation date and the recipe's own base rating. Ties go to the
    /// earliest day.
    async fn busiest_day(&self, filter: &ReportFilter) -> Result<Option<DayCount>, StoreError>;
    /// Recipes with at least one rating, created within the date range, whose
    /// mean rating meets `min_rating`.
    async fn recipes_by_rating(&self, filter: &ReportFilter) -> Result<Vec<Recipe>, StoreError>;
}

pub trait Store: UserStore + RecipeStore + RatingStore {}

impl<T: UserStore + RecipeStore + RatingStore> Store for T {}
