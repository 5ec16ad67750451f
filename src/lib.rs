//! Disaster-response drill engine: scenario trees, attempt replay, scoring
//! and outcome classification.

pub mod attempt;
pub mod catalog;
pub mod config;
pub mod console;
pub mod error;
pub mod outcome;
pub mod scenario;
pub mod service;

pub use attempt::replay::replay;
pub use attempt::repository::{AttemptRepository, InMemoryAttemptRepository, JsonlAttemptRepository};
pub use attempt::{Attempt, AttemptResult, PathStep};
pub use catalog::{ScenarioCatalog, ScenarioFilter};
pub use config::DrillConfig;
pub use error::{DrillError, DrillResult, MalformedTreeError, StorageError, TreeRule};
pub use outcome::{classify, OutcomeCategory, Threshold, ThresholdTable};
pub use scenario::node::{DrillOption, Node};
pub use scenario::tree::{ScenarioTree, ValidatedTree};
pub use scenario::validator::{validate, validate_with_thresholds};
pub use scenario::{Difficulty, ScenarioDraft, ScenarioMeta};
pub use service::{AttemptReceipt, DrillService, SubmitAttempt};
