use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Structural rules a scenario must satisfy before it can be published.
/// Checked in numeric order; the first violation wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TreeRule {
    RootPresent,
    NextNodeExists,
    UniqueOptionIds,
    TerminalShape,
    Reachability,
    PathBound,
    Thresholds,
    IdentifierSyntax,
}

impl TreeRule {
    pub fn number(self) -> u8 {
        match self {
            TreeRule::RootPresent => 1,
            TreeRule::NextNodeExists => 2,
            TreeRule::UniqueOptionIds => 3,
            TreeRule::TerminalShape => 4,
            TreeRule::Reachability => 5,
            TreeRule::PathBound => 6,
            TreeRule::Thresholds => 7,
            TreeRule::IdentifierSyntax => 8,
        }
    }
}

impl fmt::Display for TreeRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rule {}", self.number())
    }
}

/// Authoring-time rejection of a candidate scenario.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("malformed tree ({rule}): {detail}")]
pub struct MalformedTreeError {
    pub rule: TreeRule,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option_id: Option<String>,
    pub detail: String,
}

impl MalformedTreeError {
    pub fn new(rule: TreeRule, detail: impl Into<String>) -> Self {
        Self {
            rule,
            node_id: None,
            option_id: None,
            detail: detail.into(),
        }
    }

    pub fn at_node(mut self, node_id: &str) -> Self {
        self.node_id = Some(node_id.to_string());
        self
    }

    pub fn at_option(mut self, option_id: &str) -> Self {
        self.option_id = Some(option_id.to_string());
        self
    }
}

/// Opaque failure reported by a storage adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored record could not be (de)serialized: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    LockPoisoned,
}

pub const REASON_UNKNOWN_OPTION: &str = "unknown option";
pub const REASON_PATH_TOO_LONG: &str = "path too long";
pub const REASON_PAST_TERMINAL: &str = "choice after terminal node";

/// Everything the drill engine can hand back to a caller.
#[derive(Debug, Error)]
pub enum DrillError {
    #[error(transparent)]
    MalformedTree(#[from] MalformedTreeError),

    #[error("invalid transition at step {at_step} (node '{node_id}', option '{option_id}'): {reason}")]
    InvalidTransition {
        at_step: usize,
        node_id: String,
        option_id: String,
        reason: &'static str,
    },

    #[error("attempt ended at non-terminal node '{last_node_id}'")]
    IncompleteAttempt { last_node_id: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("scenario '{scenario_id}' not found")]
    ScenarioNotFound { scenario_id: String },

    #[error("scenario '{scenario_id}' is not active")]
    ScenarioInactive { scenario_id: String },

    #[error("scenario '{scenario_id}' already exists")]
    ScenarioExists { scenario_id: String },
}

impl DrillError {
    /// Stable identifier for the error kind, for callers that map errors
    /// onto a transport.
    pub fn code(&self) -> &'static str {
        match self {
            DrillError::MalformedTree(_) => "MALFORMED_TREE",
            DrillError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DrillError::IncompleteAttempt { .. } => "INCOMPLETE_ATTEMPT",
            DrillError::Storage(_) => "STORAGE",
            DrillError::ScenarioNotFound { .. } => "SCENARIO_NOT_FOUND",
            DrillError::ScenarioInactive { .. } => "SCENARIO_INACTIVE",
            DrillError::ScenarioExists { .. } => "SCENARIO_EXISTS",
        }
    }
}

pub type DrillResult<T> = Result<T, DrillError>;
