use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    FromRow, PgPool, Postgres, QueryBuilder,
};
use time::{Date, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use super::{RatingStore, RecipeStore, StoreError, UserStore};
use crate::{
    auth::repo_types::User,
    config::DbConfig,
    filter::{Predicate, ReportFilter},
    ratings::repo_types::{DayCount, UpsertAction, UpsertOutcome},
    recipes::repo_types::{Recipe, RecipeFields},
};

const RECIPE_COLUMNS: &str =
    "id, owner_id, name, instructions, ingredients, base_rating, created_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    created_at: OffsetDateTime,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id,
            username: r.username,
            password_hash: r.password_hash,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct RecipeRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    instructions: String,
    ingredients: String,
    base_rating: i32,
    created_at: OffsetDateTime,
}

impl From<RecipeRow> for Recipe {
    fn from(r: RecipeRow) -> Self {
        Self {
            id: r.id,
            name: r.name,
            instructions: r.instructions,
            ingredients: r.ingredients,
            base_rating: r.base_rating,
            created_at: r.created_at,
            owner_id: r.owner_id,
        }
    }
}

/// Maps SQLSTATEs the callers act on; everything else stays opaque.
fn classify(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some("40001") | Some("40P01") => return StoreError::Conflict,
            Some("23505") => return StoreError::UniqueViolation,
            Some("23503") => return StoreError::MissingReference,
            _ => {}
        }
    }
    StoreError::Database(e)
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str, cfg: &DbConfig) -> anyhow::Result<Self> {
        let options = PgConnectOptions::from_str(url)
            .context("parse DATABASE_URL")?
            .options([("statement_timeout", cfg.statement_timeout_ms.to_string())]);
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs))
            .connect_with(options)
            .await
            .context("connect to database")?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("run migrations")?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, username: &str, password_hash: &str) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.into())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(User::from))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"SELECT id, username, password_hash, created_at FROM users WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(User::from))
    }
}

#[async_trait]
impl RecipeStore for PgStore {
    async fn insert_recipe(&self, owner_id: Uuid, fields: &RecipeFields) -> Result<Recipe, StoreError> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            r#"
            INSERT INTO recipes (id, owner_id, name, instructions, ingredients, base_rating)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&fields.name)
        .bind(&fields.instructions)
        .bind(&fields.ingredients)
        .bind(fields.base_rating)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.into())
    }

    async fn find_recipe(&self, id: Uuid) -> Result<Option<Recipe>, StoreError> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Recipe::from))
    }

    async fn list_recipes(&self) -> Result<Vec<Recipe>, StoreError> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(classify)?;
        Ok(rows.into_iter().map(Recipe::from).collect())
    }

    async fn update_recipe(&self, id: Uuid, fields: &RecipeFields) -> Result<Option<Recipe>, StoreError> {
        let row = sqlx::query_as::<_, RecipeRow>(&format!(
            r#"
            UPDATE recipes
               SET name = $2, instructions = $3, ingredients = $4, base_rating = $5
             WHERE id = $1
            RETURNING {RECIPE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&fields.name)
        .bind(&fields.instructions)
        .bind(&fields.ingredients)
        .bind(fields.base_rating)
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)?;
        Ok(row.map(Recipe::from))
    }

    async fn delete_recipe(&self, id: Uuid) -> Result<bool, StoreError> {
        // ratings.recipe_id is ON DELETE CASCADE
        let done = sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(classify)?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl RatingStore for PgStore {
    async fn upsert_rating(&self, user_id: Uuid, recipe_id: Uuid, value: i32) -> Result<UpsertOutcome, StoreError> {
        // Dropping `tx` on any early return rolls it back.
        let mut tx = self.pool.begin().await.map_err(classify)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(classify)?;

        let base_rating: i32 =
            sqlx::query_scalar::<_, i32>("SELECT base_rating FROM recipes WHERE id = $1")
                .bind(recipe_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(classify)?
                .ok_or(StoreError::MissingReference)?;

        let existing = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM ratings WHERE user_id = $1 AND recipe_id = $2",
        )
        .bind(user_id)
        .bind(recipe_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(classify)?;

        let action = match existing {
            Some(rating_id) => {
                sqlx::query("UPDATE ratings SET value = $1, created_at = now() WHERE id = $2")
                    .bind(value)
                    .bind(rating_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(classify)?;
                UpsertAction::Updated
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO ratings (id, recipe_id, user_id, value)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(recipe_id)
                .bind(user_id)
                .bind(value)
                .execute(&mut *tx)
                .await
                .map_err(|e| match classify(e) {
                    // the (user_id, recipe_id) key was taken by a concurrent insert
                    StoreError::UniqueViolation => StoreError::Conflict,
                    other => other,
                })?;
                UpsertAction::Created
            }
        };

        let average = sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(value)::float8 FROM ratings WHERE recipe_id = $1",
        )
        .bind(recipe_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        tx.commit().await.map_err(classify)?;
        debug!(%user_id, %recipe_id, ?action, "rating upserted");
        Ok(UpsertOutcome {
            action,
            average,
            base_rating,
        })
    }

    async fn recipe_average(&self, recipe_id: Uuid) -> Result<Option<f64>, StoreError> {
        sqlx::query_scalar::<_, Option<f64>>(
            "SELECT AVG(value)::float8 FROM ratings WHERE recipe_id = $1",
        )
        .bind(recipe_id)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn filtered_average(&self, filter: &ReportFilter) -> Result<Option<f64>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT AVG(value)::float8 FROM ratings");
        {
            let mut p = Predicate::where_clause(&mut qb);
            filter.push_date_range(&mut p, "created_at");
            filter.push_min_rating(&mut p, "value");
        }
        qb.build_query_scalar::<Option<f64>>()
            .fetch_one(&self.pool)
            .await
            .map_err(classify)
    }

    async fn busiest_day(&self, filter: &ReportFilter) -> Result<Option<DayCount>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT (created_at AT TIME ZONE 'UTC')::date AS day, COUNT(*) AS recipe_count FROM recipes",
        );
        {
            let mut p = Predicate::where_clause(&mut qb);
            filter.push_date_range(&mut p, "created_at");
            filter.push_min_rating(&mut p, "base_rating");
        }
        qb.push(" GROUP BY day ORDER BY recipe_count DESC, day ASC LIMIT 1");
        let row = qb
            .build_query_as::<(Date, i64)>()
            .fetch_optional(&self.pool)
            .await
            .map_err(classify)?;
        Ok(row.map(|(day, count)| DayCount { day, count }))
    }

    async fn recipes_by_rating(&self, filter: &ReportFilter) -> Result<Vec<Recipe>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT r.id, r.owner_id, r.name, r.instructions, r.ingredients, r.base_rating, r.created_at \
             FROM recipes r JOIN ratings g ON g.recipe_id = r.id",
        );
        filter.push_date_range(&mut Predicate::where_clause(&mut qb), "r.created_at");
        qb.push(" GROUP BY r.id");
        filter.push_min_rating(&mut Predicate::having(&mut qb), "AVG(g.value)");
        qb.push(" ORDER BY r.created_at, r.id");
        let rows = qb
            .build_query_as::<RecipeRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(classify)?;
        Ok(rows.into_iter().map(Recipe::from).collect())
    }
}
