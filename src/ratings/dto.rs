use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
pub struct RateRequest {
    #[serde(default)]
    pub rating: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct RateResponse {
    pub message: String,
    pub recipe_average_rating: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AverageRating {
    pub average_rating: Option<f64>,
}

/// Busiest-day report: either the winning day or a message when nothing
/// matched the filter.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BusiestDayReport {
    Day { day: String, count: i64 },
    Empty { message: &'static str },
}
