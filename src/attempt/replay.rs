use log::debug;

use crate::attempt::{AttemptResult, PathStep};
use crate::error::{
    DrillError, DrillResult, REASON_PAST_TERMINAL, REASON_PATH_TOO_LONG, REASON_UNKNOWN_OPTION,
};
use crate::scenario::tree::ValidatedTree;

/// Walk `choices` through `tree` from the root, checking every transition.
///
/// The whole sequence is judged in one pass: either the walk ends on a
/// terminal node with every choice consumed, or nothing is produced. The
/// result depends only on the inputs, so replaying the same pair twice
/// always gives the same answer.
pub fn replay<S: AsRef<str>>(tree: &ValidatedTree, choices: &[S]) -> DrillResult<AttemptResult> {
    let mut node = tree.root();
    let mut path = Vec::with_capacity(choices.len());
    let mut total_score: i64 = 0;

    for (step, choice) in choices.iter().enumerate() {
        let option_id = choice.as_ref();

        if node.terminal {
            return Err(invalid(step, &node.id, option_id, REASON_PAST_TERMINAL));
        }
        if step >= tree.max_steps() {
            return Err(invalid(step, &node.id, option_id, REASON_PATH_TOO_LONG));
        }

        let option = node
            .option(option_id)
            .ok_or_else(|| invalid(step, &node.id, option_id, REASON_UNKNOWN_OPTION))?;

        // Validation caps max_steps * |scoreDelta| at i64::MAX.
        total_score += option.score_delta;
        path.push(PathStep {
            node_id: node.id.clone(),
            option_id: option.id.clone(),
        });

        // Validation guarantees every next_node_id resolves.
        let next = tree.get(&option.next_node_id).ok_or_else(|| {
            invalid(step, &node.id, option_id, REASON_UNKNOWN_OPTION)
        })?;
        debug!(
            "Step {step}: {} -[{}:{:+}]-> {}",
            node.id, option.id, option.score_delta, next.id
        );
        node = next;
    }

    if !node.terminal {
        return Err(DrillError::IncompleteAttempt {
            last_node_id: node.id.clone(),
        });
    }

    Ok(AttemptResult {
        path,
        total_score,
        terminal_node_id: node.id.clone(),
        outcome_hint: node.outcome_hint.clone(),
    })
}

fn invalid(step: usize, node_id: &str, option_id: &str, reason: &'static str) -> DrillError {
    DrillError::InvalidTransition {
        at_step: step,
        node_id: node_id.to_string(),
        option_id: option_id.to_string(),
        reason,
    }
}
