use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::scenario::node::{DrillOption, Node};

/// A candidate scenario tree as authored: a map of node-id -> Node.
///
/// Nothing about this shape is trusted until it has gone through
/// [`crate::scenario::validator::validate`], which yields a [`ValidatedTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioTree {
    pub root_node_id: String,
    pub nodes: BTreeMap<String, Node>,
}

impl ScenarioTree {
    pub fn from_nodes(root_node_id: &str, nodes: Vec<Node>) -> Self {
        let mut map = BTreeMap::new();
        for node in nodes {
            map.insert(node.id.clone(), node);
        }
        Self {
            root_node_id: root_node_id.into(),
            nodes: map,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Number of decisions on the longest path from the root that never
    /// visits a node twice, or `None` once the search has expanded more than
    /// `budget` nodes.
    pub fn longest_acyclic_steps_within(&self, budget: usize) -> Option<usize> {
        let mut on_path = HashSet::new();
        let mut remaining = budget;
        self.longest_from(&self.root_node_id, &mut on_path, &mut remaining)
    }

    /// Non-terminal nodes in the tree. Each step of an acyclic walk leaves a
    /// different one, so this never undercounts the longest acyclic path.
    pub fn decision_node_count(&self) -> usize {
        self.nodes.values().filter(|n| !n.terminal).count()
    }

    fn longest_from<'a>(
        &'a self,
        node_id: &'a str,
        on_path: &mut HashSet<&'a str>,
        remaining: &mut usize,
    ) -> Option<usize> {
        let node = match self.nodes.get(node_id) {
            Some(n) => n,
            None => return Some(0),
        };
        if node.terminal || on_path.contains(node_id) {
            return Some(0);
        }
        *remaining = remaining.checked_sub(1)?;
        on_path.insert(node_id);
        let mut max_child = 0;
        for opt in &node.options {
            let next = opt.next_node_id.as_str();
            if on_path.contains(next) {
                continue;
            }
            let child = self.longest_from(next, on_path, remaining)?;
            max_child = max_child.max(1 + child);
        }
        on_path.remove(node_id);
        Some(max_child)
    }
}

// ---------------------------------------------------------------------------
// Validated tree
// ---------------------------------------------------------------------------

/// A tree that passed every structural check, together with the step bound
/// computed for it. Only the validator can build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTree {
    tree: ScenarioTree,
    total_steps: usize,
    max_steps: usize,
}

impl ValidatedTree {
    pub(crate) fn new(tree: ScenarioTree, total_steps: usize, max_steps: usize) -> Self {
        Self {
            tree,
            total_steps,
            max_steps,
        }
    }

    pub fn root(&self) -> &Node {
        // Presence of the root is rule 1 of validation.
        &self.tree.nodes[&self.tree.root_node_id]
    }

    pub fn root_node_id(&self) -> &str {
        &self.tree.root_node_id
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.tree.get(id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.tree.nodes.values()
    }

    /// Decisions on the longest acyclic path from the root.
    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    /// Upper bound on the number of steps any attempt may take.
    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub fn as_tree(&self) -> &ScenarioTree {
        &self.tree
    }
}

// ---------------------------------------------------------------------------
// Earthquake evacuation scenario
// ---------------------------------------------------------------------------

/// Built-in sample drill, used by the binary when no scenario file is given.
pub fn earthquake_evacuation_scenario() -> ScenarioTree {
    let nodes = vec![
        Node::decision(
            "s1",
            "The ground starts shaking. What do you do?",
            vec![
                DrillOption::new("c1", "Drop, cover, hold on", 10, "s2"),
                DrillOption::new("c2", "Run outside immediately", -5, "s3"),
            ],
        ),
        Node::decision(
            "s2",
            "Good! The shaking has stopped. How do you evacuate?",
            vec![
                DrillOption::new("c3", "Use the stairs", 10, "s4"),
                DrillOption::new("c4", "Use the elevator", -10, "s5"),
            ],
        ),
        // --- Terminal: failures ---
        Node::ending("s3", "You got injured by falling debris. Seek help.", Some("failure")),
        Node::ending(
            "s5",
            "The elevator is dangerous during earthquakes! You are stuck.",
            Some("failure"),
        ),
        // --- Terminal: success ---
        Node::ending("s4", "You safely evacuated!", Some("success")),
    ];

    ScenarioTree::from_nodes("s1", nodes)
}
