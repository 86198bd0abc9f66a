use std::{sync::Arc, time::Duration};

use axum::extract::FromRef;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::repo_types::{DayCount, UpsertAction};
use crate::{
    auth::repo_types::Principal,
    error::AppError,
    filter::ReportFilter,
    recipes::repo_types::Recipe,
    state::AppState,
    store::{Store, StoreError},
};

const BACKOFF_STEP: Duration = Duration::from_millis(10);

/// Result of a rating submission as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Submitted {
    pub action: UpsertAction,
    /// Recomputed average, or the recipe's base rating in echo mode.
    pub reported: Option<f64>,
}

/// Rating Engine: per-(user, recipe) upsert and the aggregate reports.
#[derive(Clone)]
pub struct RatingEngine {
    store: Arc<dyn Store>,
    max_retries: u32,
    echo_base_rating: bool,
}

impl FromRef<AppState> for RatingEngine {
    fn from_ref(state: &AppState) -> Self {
        Self::new(
            state.store.clone(),
            state.config.ratings.max_retries,
            state.config.ratings.echo_base_rating,
        )
    }
}

impl RatingEngine {
    pub fn new(store: Arc<dyn Store>, max_retries: u32, echo_base_rating: bool) -> Self {
        Self {
            store,
            max_retries,
            echo_base_rating,
        }
    }

    /// Creates or overwrites `actor`'s rating of `recipe_id`. A transaction
    /// that loses a race is retried `max_retries` times with linear backoff.
    pub async fn submit(
        &self,
        actor: &Principal,
        recipe_id: Uuid,
        raw: Option<&Value>,
    ) -> Result<Submitted, AppError> {
        let value = parse_rating(raw)?;
        if self.store.find_recipe(recipe_id).await?.is_none() {
            return Err(AppError::NotFound("Recipe not found".into()));
        }

        let mut attempt = 0;
        let outcome = loop {
            match self.store.upsert_rating(actor.id, recipe_id, value).await {
                Ok(outcome) => break outcome,
                Err(StoreError::Conflict) if attempt < self.max_retries => {
                    attempt += 1;
                    debug!(%recipe_id, attempt, "rating upsert conflicted; retrying");
                    tokio::time::sleep(BACKOFF_STEP * attempt).await;
                }
                Err(StoreError::Conflict) => {
                    error!(%recipe_id, user_id = %actor.id, attempts = attempt + 1, "rating upsert kept conflicting");
                    return Err(AppError::internal("rating upsert", StoreError::Conflict));
                }
                Err(StoreError::MissingReference) => {
                    return Err(AppError::NotFound("Recipe not found".into()))
                }
                Err(e) => return Err(e.into()),
            }
        };

        info!(%recipe_id, user_id = %actor.id, action = ?outcome.action, value, "rating stored");
        let reported = if self.echo_base_rating {
            Some(f64::from(outcome.base_rating))
        } else {
            outcome.average.map(round1)
        };
        Ok(Submitted {
            action: outcome.action,
            reported,
        })
    }

    /// Mean rating of one recipe to one decimal; `None` when it has no ratings.
    pub async fn average_for_recipe(&self, recipe_id: Uuid) -> Result<Option<f64>, AppError> {
        Ok(self.store.recipe_average(recipe_id).await?.map(round1))
    }

    /// Mean of all ratings admitted by `filter`; 0 when none are.
    pub async fn filtered_average(&self, filter: &ReportFilter) -> Result<f64, AppError> {
        Ok(self.store.filtered_average(filter).await?.unwrap_or(0.0))
    }

    pub async fn busiest_day(&self, filter: &ReportFilter) -> Result<Option<DayCount>, AppError> {
        Ok(self.store.busiest_day(filter).await?)
    }

    pub async fn filter_recipes_by_rating(&self, filter: &ReportFilter) -> Result<Vec<Recipe>, AppError> {
        Ok(self.store.recipes_by_rating(filter).await?)
    }
}

/// Accepts a JSON integer or an integer string in 1..=5.
pub fn parse_rating(raw: Option<&Value>) -> Result<i32, AppError> {
    let invalid = || AppError::validation("Invalid rating value. Must be an integer between 1 and 5");
    let n = match raw {
        None | Some(Value::Null) => return Err(AppError::validation("Missing rating data")),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(invalid)?,
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| invalid())?,
        Some(other) => {
            warn!(rating = %other, "rating of unexpected type");
            return Err(invalid());
        }
    };
    if !(1..=5).contains(&n) {
        return Err(invalid());
    }
    Ok(n as i32)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
