use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::attempt::replay::replay;
use crate::attempt::repository::AttemptRepository;
use crate::attempt::{percentage_score, Attempt, PathStep};
use crate::catalog::{ScenarioCatalog, ScenarioFilter};
use crate::error::{DrillError, DrillResult};
use crate::outcome::{classify, OutcomeCategory};
use crate::scenario::{ScenarioDraft, ScenarioSummary, ScenarioView};

// ---------------------------------------------------------------------------
// Request / response shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttempt {
    pub scenario_id: String,
    pub choices: Vec<String>,
    /// When the trainee opened the drill, as reported by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl SubmitAttempt {
    pub fn new(scenario_id: &str, choices: &[&str]) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
            started_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptReceipt {
    pub attempt_id: String,
    pub scenario_id: String,
    pub scenario_version: u32,
    pub path: Vec<PathStep>,
    pub total_score: i64,
    pub outcome: OutcomeCategory,
    pub terminal_node_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_hint: Option<String>,
    pub percentage_score: f64,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptSummary {
    pub id: String,
    pub scenario_id: String,
    pub scenario_version: u32,
    pub scenario_title: Option<String>,
    pub total_score: i64,
    pub percentage_score: Option<f64>,
    pub outcome: OutcomeCategory,
    pub steps: usize,
    pub completed_at: DateTime<Utc>,
    pub duration_minutes: Option<f64>,
}

// ---------------------------------------------------------------------------
// Drill service
// ---------------------------------------------------------------------------

/// Entry point for the drill operations. Caller identity and authorization
/// are established upstream; this layer only receives the resulting user id.
pub struct DrillService {
    catalog: Arc<ScenarioCatalog>,
    attempts: Arc<dyn AttemptRepository>,
}

impl DrillService {
    pub fn new(catalog: Arc<ScenarioCatalog>, attempts: Arc<dyn AttemptRepository>) -> Self {
        Self { catalog, attempts }
    }

    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    /// Authoring: validate and store a new scenario. Returns its id.
    pub fn publish_scenario(&self, draft: ScenarioDraft) -> DrillResult<String> {
        Ok(self.catalog.publish(draft)?.id.clone())
    }

    /// Authoring: store a new version of an existing scenario.
    pub fn revise_scenario(&self, scenario_id: &str, draft: ScenarioDraft) -> DrillResult<u32> {
        Ok(self.catalog.revise(scenario_id, draft)?.version)
    }

    pub fn list_scenarios(&self, filter: &ScenarioFilter) -> DrillResult<Vec<ScenarioSummary>> {
        self.catalog.list(filter)
    }

    /// The latest version of a scenario, with scoring weights stripped.
    pub fn get_scenario(&self, scenario_id: &str) -> DrillResult<ScenarioView> {
        let scenario = self.catalog.get(scenario_id)?;
        if !scenario.meta.active {
            return Err(DrillError::ScenarioInactive {
                scenario_id: scenario_id.to_string(),
            });
        }
        Ok(scenario.view())
    }

    /// Replay the submitted choices against the latest version of the
    /// scenario, classify the score and persist the attempt. Nothing is
    /// stored unless the whole walk is valid.
    pub fn submit_attempt(
        &self,
        user_id: &str,
        request: &SubmitAttempt,
    ) -> DrillResult<AttemptReceipt> {
        let scenario = self.catalog.get(&request.scenario_id)?;
        if !scenario.meta.active {
            return Err(DrillError::ScenarioInactive {
                scenario_id: request.scenario_id.clone(),
            });
        }

        let result = replay(&scenario.tree, &request.choices).map_err(|e| {
            warn!(
                "Attempt by '{}' on '{}' rejected [{}]: {}",
                user_id,
                request.scenario_id,
                e.code(),
                e
            );
            e
        })?;
        let outcome = classify(result.total_score, &scenario.thresholds);

        let attempt = Attempt {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            scenario_id: scenario.id.clone(),
            scenario_version: scenario.version,
            path: result.path,
            total_score: result.total_score,
            outcome,
            terminal_node_id: result.terminal_node_id,
            outcome_hint: result.outcome_hint,
            started_at: request.started_at,
            completed_at: Utc::now(),
        };
        self.attempts.save(&attempt)?;

        info!(
            "Attempt {} by '{}' on '{}' v{}: score {} ({})",
            attempt.id,
            user_id,
            attempt.scenario_id,
            attempt.scenario_version,
            attempt.total_score,
            attempt.outcome.name
        );

        Ok(AttemptReceipt {
            percentage_score: percentage_score(attempt.total_score, scenario.meta.max_score),
            attempt_id: attempt.id,
            scenario_id: attempt.scenario_id,
            scenario_version: attempt.scenario_version,
            path: attempt.path,
            total_score: attempt.total_score,
            outcome: attempt.outcome,
            terminal_node_id: attempt.terminal_node_id,
            outcome_hint: attempt.outcome_hint,
            completed_at: attempt.completed_at,
        })
    }

    /// The caller's attempts at one scenario, most recent first.
    pub fn list_attempts(
        &self,
        user_id: &str,
        scenario_id: &str,
    ) -> DrillResult<Vec<AttemptSummary>> {
        let attempts = self
            .attempts
            .find_by_user_and_scenario(user_id, scenario_id)?;
        Ok(attempts.iter().map(|a| self.summarize(a)).collect())
    }

    /// All of the caller's attempts, most recent first.
    pub fn list_my_attempts(&self, user_id: &str) -> DrillResult<Vec<AttemptSummary>> {
        let attempts = self.attempts.find_by_user(user_id)?;
        Ok(attempts.iter().map(|a| self.summarize(a)).collect())
    }

    // Scored against the version the attempt was taken on.
    fn summarize(&self, attempt: &Attempt) -> AttemptSummary {
        let scenario = self
            .catalog
            .get_version(&attempt.scenario_id, attempt.scenario_version)
            .ok();
        AttemptSummary {
            id: attempt.id.clone(),
            scenario_id: attempt.scenario_id.clone(),
            scenario_version: attempt.scenario_version,
            scenario_title: scenario.as_ref().map(|s| s.meta.title.clone()),
            total_score: attempt.total_score,
            percentage_score: scenario
                .as_ref()
                .map(|s| percentage_score(attempt.total_score, s.meta.max_score)),
            outcome: attempt.outcome.clone(),
            steps: attempt.path.len(),
            completed_at: attempt.completed_at,
            duration_minutes: attempt.duration_minutes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attempt::repository::InMemoryAttemptRepository;
    use crate::error::StorageError;
    use crate::outcome::ThresholdTable;
    use crate::scenario::tree::earthquake_evacuation_scenario;
    use crate::scenario::ScenarioMeta;

    struct FailingRepository;

    impl AttemptRepository for FailingRepository {
        fn save(&self, _attempt: &Attempt) -> Result<(), StorageError> {
            Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }

        fn find_by_user_and_scenario(
            &self,
            _user_id: &str,
            _scenario_id: &str,
        ) -> Result<Vec<Attempt>, StorageError> {
            Ok(Vec::new())
        }

        fn find_by_user(&self, _user_id: &str) -> Result<Vec<Attempt>, StorageError> {
            Ok(Vec::new())
        }
    }

    fn service_with(repo: Arc<dyn AttemptRepository>) -> DrillService {
        let catalog = Arc::new(ScenarioCatalog::new(4, ThresholdTable::default()));
        let mut meta = ScenarioMeta::titled("Earthquake Evacuation Drill");
        meta.max_score = 50;
        catalog
            .publish_with_id(
                "quake",
                ScenarioDraft::new(meta, earthquake_evacuation_scenario()),
            )
            .unwrap();
        DrillService::new(catalog, repo)
    }

    #[test]
    fn test_submit_persists_and_classifies() {
        let repo = Arc::new(InMemoryAttemptRepository::new());
        let service = service_with(repo.clone());

        let receipt = service
            .submit_attempt("ana", &SubmitAttempt::new("quake", &["c1", "c3"]))
            .unwrap();
        assert_eq!(receipt.total_score, 20);
        assert_eq!(receipt.outcome.name, "Excellent");
        assert_eq!(receipt.percentage_score, 40.0);
        assert_eq!(receipt.outcome_hint.as_deref(), Some("success"));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_rejected_attempt_is_not_persisted() {
        let repo = Arc::new(InMemoryAttemptRepository::new());
        let service = service_with(repo.clone());

        let err = service
            .submit_attempt("ana", &SubmitAttempt::new("quake", &["c1"]))
            .unwrap_err();
        assert_eq!(err.code(), "INCOMPLETE_ATTEMPT");
        let err = service
            .submit_attempt("ana", &SubmitAttempt::new("quake", &["zzz"]))
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert!(repo.is_empty());
    }

    #[test]
    fn test_storage_error_is_surfaced() {
        let service = service_with(Arc::new(FailingRepository));
        let err = service
            .submit_attempt("ana", &SubmitAttempt::new("quake", &["c2"]))
            .unwrap_err();
        assert!(matches!(err, DrillError::Storage(_)));
    }

    #[test]
    fn test_unknown_and_inactive_scenarios() {
        let service = service_with(Arc::new(InMemoryAttemptRepository::new()));
        let err = service
            .submit_attempt("ana", &SubmitAttempt::new("nope", &["c1"]))
            .unwrap_err();
        assert_eq!(err.code(), "SCENARIO_NOT_FOUND");

        let mut meta = ScenarioMeta::titled("Retired");
        meta.active = false;
        service
            .catalog()
            .publish_with_id(
                "retired",
                ScenarioDraft::new(meta, earthquake_evacuation_scenario()),
            )
            .unwrap();
        let err = service
            .submit_attempt("ana", &SubmitAttempt::new("retired", &["c2"]))
            .unwrap_err();
        assert_eq!(err.code(), "SCENARIO_INACTIVE");
        assert!(service.get_scenario("retired").is_err());
    }

    #[test]
    fn test_list_attempts_uses_attempted_version() {
        let service = service_with(Arc::new(InMemoryAttemptRepository::new()));
        service
            .submit_attempt("ana", &SubmitAttempt::new("quake", &["c2"]))
            .unwrap();

        let mut meta = ScenarioMeta::titled("Earthquake Drill (revised)");
        meta.max_score = 20;
        let version = service
            .revise_scenario(
                "quake",
                ScenarioDraft::new(meta, earthquake_evacuation_scenario()),
            )
            .unwrap();
        assert_eq!(version, 2);
        service
            .submit_attempt("ana", &SubmitAttempt::new("quake", &["c1", "c3"]))
            .unwrap();

        let listed = service.list_attempts("ana", "quake").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].scenario_version, 2);
        assert_eq!(listed[0].percentage_score, Some(100.0));
        assert_eq!(listed[1].scenario_version, 1);
        assert_eq!(
            listed[1].scenario_title.as_deref(),
            Some("Earthquake Evacuation Drill")
        );
        assert_eq!(listed[1].percentage_score, Some(-10.0));

        assert!(service.list_attempts("ben", "quake").unwrap().is_empty());
        assert_eq!(service.list_my_attempts("ana").unwrap().len(), 2);
    }

    #[test]
    fn test_publish_and_view() {
        let service = service_with(Arc::new(InMemoryAttemptRepository::new()));
        let id = service
            .publish_scenario(ScenarioDraft::new(
                ScenarioMeta::titled("Second quake"),
                earthquake_evacuation_scenario(),
            ))
            .unwrap();
        let view = service.get_scenario(&id).unwrap();
        assert_eq!(view.meta.title, "Second quake");
        assert_eq!(service.list_scenarios(&ScenarioFilter::default()).unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_publish_and_submit_keep_every_attempt() {
        let repo = Arc::new(InMemoryAttemptRepository::new());
        let service = service_with(repo.clone());
        let users: Vec<String> = (0..8).map(|i| format!("trainee-{i}")).collect();

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..10 {
                    service
                        .publish_scenario(ScenarioDraft::new(
                            ScenarioMeta::titled(&format!("Aftershock {i}")),
                            earthquake_evacuation_scenario(),
                        ))
                        .unwrap();
                }
            });
            for user in &users {
                let service = &service;
                scope.spawn(move || {
                    for _ in 0..25 {
                        service
                            .submit_attempt(user, &SubmitAttempt::new("quake", &["c1", "c3"]))
                            .unwrap();
                    }
                });
            }
        });

        assert_eq!(repo.len(), users.len() * 25);
        for user in &users {
            assert_eq!(service.list_attempts(user, "quake").unwrap().len(), 25);
        }
        assert_eq!(service.list_scenarios(&ScenarioFilter::default()).unwrap().len(), 11);
    }
}
