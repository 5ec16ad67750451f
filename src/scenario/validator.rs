use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::OnceLock;

use log::{debug, warn};
use regex::Regex;

use crate::error::{MalformedTreeError, TreeRule};
use crate::outcome::ThresholdTable;
use crate::scenario::tree::{ScenarioTree, ValidatedTree};

/// Node expansions the longest-path search may spend before the bound falls
/// back to the count of decision nodes.
pub const LONGEST_PATH_BUDGET: usize = 100_000;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]*$").unwrap())
}

/// Run every structural check against a candidate tree, in rule order,
/// stopping at the first failure. On success the tree is frozen together
/// with its step bound: the longest acyclic path plus `revisit_allowance`.
pub fn validate(
    tree: ScenarioTree,
    revisit_allowance: usize,
) -> Result<ValidatedTree, MalformedTreeError> {
    run_checks(tree, None, revisit_allowance)
}

/// Same as [`validate`], also checking the threshold table the scenario will
/// be scored with (rule 7).
pub fn validate_with_thresholds(
    tree: ScenarioTree,
    thresholds: &ThresholdTable,
    revisit_allowance: usize,
) -> Result<ValidatedTree, MalformedTreeError> {
    run_checks(tree, Some(thresholds), revisit_allowance)
}

fn run_checks(
    tree: ScenarioTree,
    thresholds: Option<&ThresholdTable>,
    revisit_allowance: usize,
) -> Result<ValidatedTree, MalformedTreeError> {
    check_root(&tree)?;
    check_next_nodes(&tree)?;
    check_unique_options(&tree)?;
    check_terminal_shape(&tree)?;
    check_reachability(&tree)?;
    check_terminal_reachable(&tree)?;
    let (total_steps, max_steps) = step_bound(&tree, revisit_allowance);
    check_score_range(&tree, max_steps)?;
    if let Some(table) = thresholds {
        table.check()?;
    }
    check_identifiers(&tree)?;

    debug!(
        "Tree rooted at '{}' accepted: {} nodes, longest path {}, bound {}",
        tree.root_node_id,
        tree.nodes.len(),
        total_steps,
        max_steps
    );
    Ok(ValidatedTree::new(tree, total_steps, max_steps))
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

fn check_root(tree: &ScenarioTree) -> Result<(), MalformedTreeError> {
    let root = tree.get(&tree.root_node_id).ok_or_else(|| {
        MalformedTreeError::new(
            TreeRule::RootPresent,
            format!("root node '{}' is not defined", tree.root_node_id),
        )
        .at_node(&tree.root_node_id)
    })?;
    if root.terminal {
        return Err(MalformedTreeError::new(
            TreeRule::RootPresent,
            "root node is terminal, so no choice can ever be made",
        )
        .at_node(&root.id));
    }
    Ok(())
}

fn check_next_nodes(tree: &ScenarioTree) -> Result<(), MalformedTreeError> {
    for node in tree.nodes.values() {
        for opt in &node.options {
            if !tree.nodes.contains_key(&opt.next_node_id) {
                return Err(MalformedTreeError::new(
                    TreeRule::NextNodeExists,
                    format!("option leads to undefined node '{}'", opt.next_node_id),
                )
                .at_node(&node.id)
                .at_option(&opt.id));
            }
        }
    }
    Ok(())
}

fn check_unique_options(tree: &ScenarioTree) -> Result<(), MalformedTreeError> {
    for node in tree.nodes.values() {
        let mut seen = HashSet::new();
        for opt in &node.options {
            if !seen.insert(opt.id.as_str()) {
                return Err(MalformedTreeError::new(
                    TreeRule::UniqueOptionIds,
                    format!("option id '{}' appears more than once", opt.id),
                )
                .at_node(&node.id)
                .at_option(&opt.id));
            }
        }
    }
    Ok(())
}

fn check_terminal_shape(tree: &ScenarioTree) -> Result<(), MalformedTreeError> {
    for node in tree.nodes.values() {
        let detail = match (node.terminal, node.options.is_empty()) {
            (true, false) => "terminal node must not offer options",
            (false, true) => "non-terminal node must offer at least one option",
            (false, false) if node.outcome_hint.is_some() => {
                "outcome hint is only allowed on terminal nodes"
            }
            _ => continue,
        };
        return Err(MalformedTreeError::new(TreeRule::TerminalShape, detail).at_node(&node.id));
    }
    Ok(())
}

/// Breadth-first walk from the root; returns visited node ids.
fn reachable_from_root(tree: &ScenarioTree) -> HashSet<&str> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(tree.root_node_id.as_str());
    queue.push_back(tree.root_node_id.as_str());

    while let Some(id) = queue.pop_front() {
        let Some(node) = tree.get(id) else {
            continue;
        };
        for opt in &node.options {
            if seen.insert(opt.next_node_id.as_str()) {
                queue.push_back(opt.next_node_id.as_str());
            }
        }
    }
    seen
}

fn check_reachability(tree: &ScenarioTree) -> Result<(), MalformedTreeError> {
    let reachable = reachable_from_root(tree);
    match tree.nodes.keys().find(|id| !reachable.contains(id.as_str())) {
        Some(orphan) => Err(MalformedTreeError::new(
            TreeRule::Reachability,
            format!("node '{orphan}' cannot be reached from the root"),
        )
        .at_node(orphan)),
        None => Ok(()),
    }
}

/// Walk the options backwards from every ending. A node left unmarked has no
/// way to finish, so a trainee who enters it can only run into the step bound.
fn check_terminal_reachable(tree: &ScenarioTree) -> Result<(), MalformedTreeError> {
    let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in tree.nodes.values() {
        for opt in &node.options {
            incoming
                .entry(opt.next_node_id.as_str())
                .or_default()
                .push(node.id.as_str());
        }
    }

    let mut finishes: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    for node in tree.nodes.values().filter(|n| n.terminal) {
        finishes.insert(node.id.as_str());
        queue.push_back(node.id.as_str());
    }
    while let Some(id) = queue.pop_front() {
        for &from in incoming.get(id).into_iter().flatten() {
            if finishes.insert(from) {
                queue.push_back(from);
            }
        }
    }

    match tree.nodes.keys().find(|id| !finishes.contains(id.as_str())) {
        Some(trapped) => Err(MalformedTreeError::new(
            TreeRule::PathBound,
            format!("no terminal node can be reached from '{trapped}', so an attempt entering it could never finish"),
        )
        .at_node(trapped)),
        None => Ok(()),
    }
}

/// Longest acyclic path plus the revisit allowance. When the exact search runs
/// out of budget the decision-node count stands in, which is never shorter.
fn step_bound(tree: &ScenarioTree, revisit_allowance: usize) -> (usize, usize) {
    let total_steps = match tree.longest_acyclic_steps_within(LONGEST_PATH_BUDGET) {
        Some(steps) => steps,
        None => {
            let fallback = tree.decision_node_count();
            warn!(
                "Longest-path search for tree rooted at '{}' gave up after {} expansions, bounding by {} decision nodes",
                tree.root_node_id, LONGEST_PATH_BUDGET, fallback
            );
            fallback
        }
    };
    (total_steps, total_steps.saturating_add(revisit_allowance))
}

/// A walk of `max_steps` choices must not be able to leave the i64 range.
fn check_score_range(tree: &ScenarioTree, max_steps: usize) -> Result<(), MalformedTreeError> {
    let widest = tree
        .nodes
        .values()
        .flat_map(|n| n.options.iter().map(move |o| (n, o)))
        .max_by_key(|(_, o)| o.score_delta.unsigned_abs());
    let Some((node, opt)) = widest else {
        return Ok(());
    };
    let reach = max_steps as u128 * opt.score_delta.unsigned_abs() as u128;
    if reach > i64::MAX as u128 {
        return Err(MalformedTreeError::new(
            TreeRule::PathBound,
            format!(
                "score delta {} over up to {} steps could overflow the attempt total",
                opt.score_delta, max_steps
            ),
        )
        .at_node(&node.id)
        .at_option(&opt.id));
    }
    Ok(())
}

fn check_identifiers(tree: &ScenarioTree) -> Result<(), MalformedTreeError> {
    let re = identifier_re();
    for (key, node) in &tree.nodes {
        if key != &node.id {
            return Err(MalformedTreeError::new(
                TreeRule::IdentifierSyntax,
                format!("node stored under '{key}' declares id '{}'", node.id),
            )
            .at_node(key));
        }
        if !re.is_match(&node.id) {
            return Err(MalformedTreeError::new(
                TreeRule::IdentifierSyntax,
                format!("node id '{}' is not a valid identifier", node.id),
            )
            .at_node(&node.id));
        }
        if let Some(opt) = node.options.iter().find(|o| !re.is_match(&o.id)) {
            return Err(MalformedTreeError::new(
                TreeRule::IdentifierSyntax,
                format!("option id '{}' is not a valid identifier", opt.id),
            )
            .at_node(&node.id)
            .at_option(&opt.id));
        }
    }
    Ok(())
}
