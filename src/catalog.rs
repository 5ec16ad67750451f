use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use log::{info, warn};

use crate::error::{DrillError, DrillResult, StorageError};
use crate::outcome::ThresholdTable;
use crate::scenario::validator::validate_with_thresholds;
use crate::scenario::{Difficulty, PublishedScenario, ScenarioDraft, ScenarioSummary};

/// Listing filter; `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    pub region: Option<String>,
    pub difficulty: Option<Difficulty>,
}

impl ScenarioFilter {
    fn matches(&self, scenario: &PublishedScenario) -> bool {
        if !scenario.meta.active {
            return false;
        }
        if let Some(region) = &self.region {
            if !scenario.meta.region_tags.iter().any(|t| t == region) {
                return false;
            }
        }
        match self.difficulty {
            Some(d) => scenario.meta.difficulty == d,
            None => true,
        }
    }
}

#[derive(Debug, Default)]
struct CatalogState {
    /// Every version of every scenario, oldest version first.
    versions: HashMap<String, Vec<Arc<PublishedScenario>>>,
    /// Scenario ids in creation order.
    order: Vec<String>,
}

/// Whether a store call opens a new scenario id or extends an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StoreMode {
    Create,
    Revise,
}

/// Versioned store of published scenarios.
///
/// Drafts are validated before the write lock is taken; only the version
/// bump and insert run under it, so readers only ever see fully validated
/// versions. Published versions are shared as `Arc`s and never change.
#[derive(Debug)]
pub struct ScenarioCatalog {
    state: RwLock<CatalogState>,
    revisit_allowance: usize,
    default_thresholds: ThresholdTable,
}

impl ScenarioCatalog {
    pub fn new(revisit_allowance: usize, default_thresholds: ThresholdTable) -> Self {
        Self {
            state: RwLock::new(CatalogState::default()),
            revisit_allowance,
            default_thresholds,
        }
    }

    /// Publish a brand new scenario under a fresh id.
    pub fn publish(&self, draft: ScenarioDraft) -> DrillResult<Arc<PublishedScenario>> {
        let id = uuid::Uuid::new_v4().to_string();
        self.store(&id, draft, StoreMode::Create)
    }

    /// Publish version 1 under a caller-chosen id. Fails with
    /// `SCENARIO_EXISTS` if the id is taken; use [`Self::revise`] for that.
    pub fn publish_with_id(
        &self,
        id: &str,
        draft: ScenarioDraft,
    ) -> DrillResult<Arc<PublishedScenario>> {
        self.store(id, draft, StoreMode::Create)
    }

    /// Publish a new version of an existing scenario. Earlier versions stay
    /// readable so historical attempts can be interpreted against them.
    pub fn revise(&self, id: &str, draft: ScenarioDraft) -> DrillResult<Arc<PublishedScenario>> {
        self.store(id, draft, StoreMode::Revise)
    }

    fn store(
        &self,
        id: &str,
        draft: ScenarioDraft,
        mode: StoreMode,
    ) -> DrillResult<Arc<PublishedScenario>> {
        let thresholds = draft
            .thresholds
            .unwrap_or_else(|| self.default_thresholds.clone());
        let tree = validate_with_thresholds(draft.tree, &thresholds, self.revisit_allowance)
            .map_err(|e| {
                warn!("Rejected scenario '{}': {}", id, e);
                e
            })?;

        let mut state = self.state.write().map_err(|_| StorageError::LockPoisoned)?;

        let next_version = match (state.versions.get(id), mode) {
            (Some(existing), StoreMode::Revise) => existing.len() as u32 + 1,
            (Some(_), StoreMode::Create) => {
                return Err(DrillError::ScenarioExists {
                    scenario_id: id.to_string(),
                })
            }
            (None, StoreMode::Revise) => {
                return Err(DrillError::ScenarioNotFound {
                    scenario_id: id.to_string(),
                })
            }
            (None, StoreMode::Create) => 1,
        };

        let published = Arc::new(PublishedScenario {
            id: id.to_string(),
            version: next_version,
            meta: draft.meta,
            tree,
            thresholds,
            published_at: Utc::now(),
        });

        if next_version == 1 {
            state.order.push(id.to_string());
        }
        state
            .versions
            .entry(id.to_string())
            .or_default()
            .push(Arc::clone(&published));

        info!(
            "Published scenario '{}' v{} ({} steps, bound {})",
            id,
            next_version,
            published.tree.total_steps(),
            published.tree.max_steps()
        );
        Ok(published)
    }

    /// Latest version of a scenario.
    pub fn get(&self, id: &str) -> DrillResult<Arc<PublishedScenario>> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        state
            .versions
            .get(id)
            .and_then(|v| v.last())
            .cloned()
            .ok_or_else(|| DrillError::ScenarioNotFound {
                scenario_id: id.to_string(),
            })
    }

    pub fn get_version(&self, id: &str, version: u32) -> DrillResult<Arc<PublishedScenario>> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        state
            .versions
            .get(id)
            .and_then(|v| v.iter().find(|s| s.version == version))
            .cloned()
            .ok_or_else(|| DrillError::ScenarioNotFound {
                scenario_id: format!("{id}@v{version}"),
            })
    }

    /// Active scenarios matching `filter`, newest first.
    pub fn list(&self, filter: &ScenarioFilter) -> DrillResult<Vec<ScenarioSummary>> {
        let state = self.state.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(state
            .order
            .iter()
            .rev()
            .filter_map(|id| state.versions.get(id).and_then(|v| v.last()))
            .filter(|s| filter.matches(s))
            .map(|s| s.summary())
            .collect())
    }
}
