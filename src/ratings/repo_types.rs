use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// One user's rating of one recipe. At most one exists per (user, recipe).
#[derive(Debug, Clone, PartialEq)]
pub struct Rating {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub user_id: Uuid,
    pub value: i32,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    Created,
    Updated,
}

/// Result of a committed upsert, read inside the same transaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpsertOutcome {
    pub action: UpsertAction,
    pub average: Option<f64>,
    pub base_rating: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayCount {
    pub day: Date,
    pub count: i64,
}
