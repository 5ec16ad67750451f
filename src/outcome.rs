use serde::{Deserialize, Serialize};

use crate::error::{MalformedTreeError, TreeRule};

/// One boundary of a threshold table: scores at or above `min_score`
/// earn `category` (until the next boundary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Threshold {
    pub min_score: i64,
    pub category: String,
}

/// Score boundaries for a scenario, lowest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdTable(Vec<Threshold>);

/// Named classification of a finished attempt. `rank` is the index of the
/// category in its table, so a higher rank is a better outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCategory {
    pub name: String,
    pub rank: usize,
}

impl ThresholdTable {
    pub fn new(thresholds: Vec<Threshold>) -> Self {
        Self(thresholds)
    }

    /// Convenience for `(min_score, category)` literals.
    pub fn from_pairs(pairs: &[(i64, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(min_score, category)| Threshold {
                    min_score: *min_score,
                    category: category.to_string(),
                })
                .collect(),
        )
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.0
    }

    /// Authoring-time configuration check: non-empty, named categories,
    /// strictly increasing boundaries.
    pub fn check(&self) -> Result<(), MalformedTreeError> {
        if self.0.is_empty() {
            return Err(MalformedTreeError::new(
                TreeRule::Thresholds,
                "threshold table is empty",
            ));
        }
        for t in &self.0 {
            if t.category.trim().is_empty() {
                return Err(MalformedTreeError::new(
                    TreeRule::Thresholds,
                    format!("threshold at {} has no category name", t.min_score),
                ));
            }
        }
        for pair in self.0.windows(2) {
            if pair[1].min_score <= pair[0].min_score {
                return Err(MalformedTreeError::new(
                    TreeRule::Thresholds,
                    format!(
                        "threshold boundaries must strictly increase ({} then {})",
                        pair[0].min_score, pair[1].min_score
                    ),
                ));
            }
        }
        Ok(())
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::from_pairs(&[(0, "Poor"), (10, "Fair"), (20, "Excellent")])
    }
}

/// Map a total score onto the table. Scores below the lowest boundary get the
/// lowest category. The table must have passed [`ThresholdTable::check`].
pub fn classify(total_score: i64, table: &ThresholdTable) -> OutcomeCategory {
    let rank = table
        .0
        .iter()
        .rposition(|t| t.min_score <= total_score)
        .unwrap_or(0);
    OutcomeCategory {
        name: table
            .0
            .get(rank)
            .map(|t| t.category.clone())
            .unwrap_or_default(),
        rank,
    }
}
