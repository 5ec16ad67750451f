pub mod replay;
pub mod repository;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::OutcomeCategory;

/// One transition taken during a walk: the node the trainee stood on and the
/// option they picked there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStep {
    pub node_id: String,
    pub option_id: String,
}

impl PathStep {
    pub fn new(node_id: &str, option_id: &str) -> Self {
        Self {
            node_id: node_id.into(),
            option_id: option_id.into(),
        }
    }
}

/// What a successful replay produces. Pure data; persisting it is up to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub path: Vec<PathStep>,
    pub total_score: i64,
    pub terminal_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_hint: Option<String>,
}

/// A user's recorded walk through one version of a scenario. Immutable once
/// created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: String,
    pub user_id: String,
    pub scenario_id: String,
    pub scenario_version: u32,
    pub path: Vec<PathStep>,
    pub total_score: i64,
    pub outcome: OutcomeCategory,
    pub terminal_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_hint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

impl Attempt {
    /// Minutes between the client-reported start and completion, rounded to
    /// two decimals.
    pub fn duration_minutes(&self) -> Option<f64> {
        let started = self.started_at?;
        let secs = (self.completed_at - started).num_milliseconds() as f64 / 1000.0;
        Some(round2(secs / 60.0))
    }
}

/// Score as a percentage of `max_score`, rounded to two decimals. Zero when
/// the scenario declares no maximum.
pub fn percentage_score(total_score: i64, max_score: u32) -> f64 {
    if max_score == 0 {
        return 0.0;
    }
    round2(total_score as f64 / f64::from(max_score) * 100.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
