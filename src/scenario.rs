pub mod node;
pub mod tree;
pub mod validator;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::outcome::ThresholdTable;
use crate::scenario::node::Node;
use crate::scenario::tree::{ScenarioTree, ValidatedTree};

// ---------------------------------------------------------------------------
// Scenario metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

/// Descriptive fields shown in scenario listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScenarioMeta {
    pub title: String,
    pub description: String,
    /// Regions where this drill is relevant.
    pub region_tags: Vec<String>,
    pub difficulty: Difficulty,
    pub estimated_minutes: u32,
    /// Reference maximum, used only to express scores as a percentage.
    pub max_score: u32,
    /// Inactive scenarios are hidden from listings and refuse submissions.
    pub active: bool,
}

impl Default for ScenarioMeta {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            region_tags: Vec::new(),
            difficulty: Difficulty::Beginner,
            estimated_minutes: 5,
            max_score: 100,
            active: true,
        }
    }
}

impl ScenarioMeta {
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Draft and published forms
// ---------------------------------------------------------------------------

/// What an author submits for publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioDraft {
    #[serde(default)]
    pub meta: ScenarioMeta,
    pub tree: ScenarioTree,
    /// Falls back to the configured default table when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<ThresholdTable>,
}

impl ScenarioDraft {
    pub fn new(meta: ScenarioMeta, tree: ScenarioTree) -> Self {
        Self {
            meta,
            tree,
            thresholds: None,
        }
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdTable) -> Self {
        self.thresholds = Some(thresholds);
        self
    }
}

/// One immutable version of a scenario. Revisions are new values with a
/// higher `version`; nothing here changes after publication.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedScenario {
    pub id: String,
    pub version: u32,
    pub meta: ScenarioMeta,
    pub tree: ValidatedTree,
    pub thresholds: ThresholdTable,
    pub published_at: DateTime<Utc>,
}

impl PublishedScenario {
    /// Player-facing view: prompts, options and endings, but no scoring
    /// weights.
    pub fn view(&self) -> ScenarioView {
        ScenarioView {
            id: self.id.clone(),
            version: self.version,
            meta: self.meta.clone(),
            root_node_id: self.tree.root_node_id().to_string(),
            total_steps: self.tree.total_steps(),
            nodes: self
                .tree
                .nodes()
                .map(|n| (n.id.clone(), NodeView::from(n)))
                .collect(),
        }
    }

    pub fn summary(&self) -> ScenarioSummary {
        ScenarioSummary {
            id: self.id.clone(),
            version: self.version,
            meta: self.meta.clone(),
            total_steps: self.tree.total_steps(),
            published_at: self.published_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioView {
    pub id: String,
    pub version: u32,
    pub meta: ScenarioMeta,
    pub root_node_id: String,
    pub total_steps: usize,
    pub nodes: BTreeMap<String, NodeView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeView {
    pub id: String,
    pub prompt: String,
    pub options: Vec<OptionView>,
    pub terminal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_hint: Option<String>,
}

/// An option without its score delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionView {
    pub id: String,
    pub label: String,
    pub next_node_id: String,
}

impl From<&Node> for NodeView {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            prompt: node.prompt.clone(),
            options: node
                .options
                .iter()
                .map(|o| OptionView {
                    id: o.id.clone(),
                    label: o.label.clone(),
                    next_node_id: o.next_node_id.clone(),
                })
                .collect(),
            terminal: node.terminal,
            outcome_hint: node.outcome_hint.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioSummary {
    pub id: String,
    pub version: u32,
    pub meta: ScenarioMeta,
    pub total_steps: usize,
    pub published_at: DateTime<Utc>,
}
