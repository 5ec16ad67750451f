use serde::{Deserialize, Serialize};

/// A single decision point (or ending) in a drill scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier for this node (e.g. "s1", "SHAKING", "SAFE_EXIT").
    pub id: String,
    /// The situation described to the trainee when entering this node.
    pub prompt: String,
    /// Responses offered at this node, in display order.
    #[serde(default)]
    pub options: Vec<DrillOption>,
    /// If true, the drill ends at this node.
    #[serde(default)]
    pub terminal: bool,
    /// Semantic tag of an ending ("success", "injured", ...). Terminal nodes only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_hint: Option<String>,
}

/// A response the trainee can pick at a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrillOption {
    // Unique within the owning node only
    pub id: String,
    pub label: String,
    /// Points gained (or lost) by picking this response.
    pub score_delta: i64,
    /// ID of an existing node; may be terminal.
    pub next_node_id: String,
}

impl Node {
    /// Decision node with the given options.
    pub fn decision(id: &str, prompt: &str, options: Vec<DrillOption>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            options,
            terminal: false,
            outcome_hint: None,
        }
    }

    /// Ending node, optionally tagged with an outcome hint.
    pub fn ending(id: &str, prompt: &str, outcome_hint: Option<&str>) -> Self {
        Self {
            id: id.into(),
            prompt: prompt.into(),
            options: Vec::new(),
            terminal: true,
            outcome_hint: outcome_hint.map(str::to_string),
        }
    }

    pub fn option(&self, option_id: &str) -> Option<&DrillOption> {
        self.options.iter().find(|o| o.id == option_id)
    }
}

impl DrillOption {
    pub fn new(id: &str, label: &str, score_delta: i64, next_node_id: &str) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            score_delta,
            next_node_id: next_node_id.into(),
        }
    }
}
