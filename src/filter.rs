//! Report filters: parsing of the optional `start_date` / `end_date` /
//! `min_rating` inputs, and rendering them as parameter-bound SQL.
//!
//! Only the clause structure depends on which filters are present. Every
//! value reaches the database through `push_bind`.
use serde::Deserialize;
use serde_json::Value;
use sqlx::{Encode, Postgres, QueryBuilder, Type};
use thiserror::Error;
use time::{macros::format_description, Date, OffsetDateTime};

use crate::error::AppError;

/// Raw filter fields as they arrive in a report request body.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    #[serde(default)]
    pub start_date: Option<Value>,
    #[serde(default)]
    pub end_date: Option<Value>,
    #[serde(default)]
    pub min_rating: Option<Value>,
}

impl FilterParams {
    /// Raw report body. Empty or `null` means no filters; anything else must
    /// be a JSON object.
    pub fn from_body(body: &[u8]) -> Result<Self, FilterError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        match serde_json::from_slice::<Value>(body).map_err(|_| FilterError::Body)? {
            Value::Null => Ok(Self::default()),
            obj @ Value::Object(_) => serde_json::from_value(obj).map_err(|_| FilterError::Body),
            _ => Err(FilterError::Body),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid start date format. Use YYYY-MM-DD")]
    StartDate,
    #[error("Invalid end date format. Use YYYY-MM-DD")]
    EndDate,
    #[error("Invalid minimum rating. Must be a non-negative integer")]
    MinRating,
    #[error("Request body must be a JSON object")]
    Body,
}

impl From<FilterError> for AppError {
    fn from(e: FilterError) -> Self {
        AppError::Validation(e.to_string())
    }
}

/// Validated filter. Each dimension is independent; the predicate is the
/// conjunction of those present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
    pub min_rating: Option<i64>,
}

impl ReportFilter {
    pub fn build(
        start_date: Option<&Value>,
        end_date: Option<&Value>,
        min_rating: Option<&Value>,
    ) -> Result<Self, FilterError> {
        Ok(Self {
            start_date: parse_date(start_date).map_err(|_| FilterError::StartDate)?,
            end_date: parse_date(end_date).map_err(|_| FilterError::EndDate)?,
            min_rating: parse_min_rating(min_rating)?,
        })
    }

    pub fn from_params(params: &FilterParams) -> Result<Self, FilterError> {
        Self::build(
            params.start_date.as_ref(),
            params.end_date.as_ref(),
            params.min_rating.as_ref(),
        )
    }

    /// Inclusive lower bound: midnight UTC of `start_date`.
    pub fn lower_bound(&self) -> Option<OffsetDateTime> {
        self.start_date.map(|d| d.midnight().assume_utc())
    }

    /// Exclusive upper bound: midnight UTC of the day after `end_date`.
    pub fn upper_bound(&self) -> Option<OffsetDateTime> {
        self.end_date
            .and_then(|d| d.next_day())
            .map(|d| d.midnight().assume_utc())
    }

    pub fn covers(&self, ts: OffsetDateTime) -> bool {
        self.lower_bound().map_or(true, |lo| ts >= lo)
            && self.upper_bound().map_or(true, |hi| ts < hi)
    }

    pub fn admits_rating(&self, value: f64) -> bool {
        self.min_rating.map_or(true, |min| value >= min as f64)
    }

    /// Adds the date-range comparisons on `column` to `predicate`.
    pub fn push_date_range(&self, predicate: &mut Predicate<'_, '_>, column: &'static str) {
        if let Some(lo) = self.lower_bound() {
            predicate.compare(column, Comparison::AtLeast, lo);
        }
        if let Some(hi) = self.upper_bound() {
            predicate.compare(column, Comparison::Below, hi);
        }
    }

    /// Adds `expr >= min_rating` to `predicate` when a threshold is set.
    pub fn push_min_rating(&self, predicate: &mut Predicate<'_, '_>, expr: &'static str) {
        if let Some(min) = self.min_rating {
            predicate.compare(expr, Comparison::AtLeast, min);
        }
    }
}

fn parse_date(raw: Option<&Value>) -> Result<Option<Date>, ()> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Date::parse(s.trim(), format_description!("[year]-[month]-[day]"))
            .map(Some)
            .map_err(|_| ()),
        Some(_) => Err(()),
    }
}

fn parse_min_rating(raw: Option<&Value>) -> Result<Option<i64>, FilterError> {
    let parsed = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };
    match parsed {
        Some(v) if v >= 0 => Ok(Some(v)),
        _ => Err(FilterError::MinRating),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    AtLeast,
    Below,
}

impl Comparison {
    fn as_sql(self) -> &'static str {
        match self {
            Comparison::AtLeast => " >= ",
            Comparison::Below => " < ",
        }
    }
}

/// Conjunction of comparisons appended to a `QueryBuilder` under a leading
/// `WHERE` or `HAVING`. Nothing is written until the first comparison.
pub struct Predicate<'q, 'args> {
    qb: &'q mut QueryBuilder<'args, Postgres>,
    keyword: &'static str,
    started: bool,
}

impl<'q, 'args> Predicate<'q, 'args> {
    pub fn where_clause(qb: &'q mut QueryBuilder<'args, Postgres>) -> Self {
        Self {
            qb,
            keyword: " WHERE ",
            started: false,
        }
    }

    pub fn having(qb: &'q mut QueryBuilder<'args, Postgres>) -> Self {
        Self {
            qb,
            keyword: " HAVING ",
            started: false,
        }
    }

    pub fn compare<T>(&mut self, expr: &'static str, op: Comparison, value: T)
    where
        T: 'args + Encode<'args, Postgres> + Send + Type<Postgres>,
    {
        self.qb.push(if self.started { " AND " } else { self.keyword });
        self.started = true;
        self.qb.push(expr).push(op.as_sql()).push_bind(value);
    }
}
