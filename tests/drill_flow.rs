use std::sync::Arc;

use drills::error::{REASON_PATH_TOO_LONG, REASON_UNKNOWN_OPTION};
use drills::{
    classify, replay, validate, DrillError, DrillOption, DrillService, InMemoryAttemptRepository,
    JsonlAttemptRepository, Node, PathStep, ScenarioCatalog, ScenarioDraft, ScenarioMeta,
    ScenarioTree, SubmitAttempt, ThresholdTable, TreeRule,
};

fn left_right_tree() -> ScenarioTree {
    ScenarioTree::from_nodes(
        "R",
        vec![
            Node::decision(
                "R",
                "A wildfire is approaching the village.",
                vec![
                    DrillOption::new("go-left", "Follow the marked evacuation route", 10, "success"),
                    DrillOption::new("go-right", "Drive through the smoke", -5, "failure"),
                ],
            ),
            Node::ending("success", "You reached the shelter.", Some("success")),
            Node::ending("failure", "The road was blocked by fire.", Some("failure")),
        ],
    )
}

fn poor_excellent() -> ThresholdTable {
    ThresholdTable::from_pairs(&[(0, "Poor"), (8, "Excellent")])
}

#[test]
fn scenario_a_left_is_excellent() {
    let tree = validate(left_right_tree(), 4).unwrap();
    let result = replay(&tree, &["go-left"]).unwrap();
    assert_eq!(result.path, vec![PathStep::new("R", "go-left")]);
    assert_eq!(result.total_score, 10);
    assert_eq!(classify(result.total_score, &poor_excellent()).name, "Excellent");
}

#[test]
fn scenario_b_right_is_poor() {
    let tree = validate(left_right_tree(), 4).unwrap();
    let result = replay(&tree, &["go-right"]).unwrap();
    assert_eq!(result.total_score, -5);
    assert_eq!(classify(result.total_score, &poor_excellent()).name, "Poor");
}

#[test]
fn scenario_c_unknown_option_at_root() {
    let tree = validate(left_right_tree(), 4).unwrap();
    match replay(&tree, &["unknown-option"]).unwrap_err() {
        DrillError::InvalidTransition {
            at_step,
            node_id,
            reason,
            ..
        } => {
            assert_eq!(at_step, 0);
            assert_eq!(node_id, "R");
            assert_eq!(reason, REASON_UNKNOWN_OPTION);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn scenario_d_cycle_past_bound() {
    let tree = ScenarioTree::from_nodes(
        "R",
        vec![
            Node::decision(
                "R",
                "Flood water is rising.",
                vec![
                    DrillOption::new("toMid", "Go upstairs", 2, "mid"),
                    DrillOption::new("leave", "Wade out", -5, "done"),
                ],
            ),
            Node::decision(
                "mid",
                "Upstairs, the power is out.",
                vec![
                    DrillOption::new("toRoot", "Go back down", -1, "R"),
                    DrillOption::new("leave", "Signal rescuers from the roof", 5, "done"),
                ],
            ),
            Node::ending("done", "The drill is over.", None),
        ],
    );
    let tree = validate(tree, 2).unwrap();
    assert_eq!(tree.max_steps(), 4);

    let err = replay(&tree, &["toMid", "toRoot", "toMid", "toRoot", "toMid"]).unwrap_err();
    assert!(matches!(
        err,
        DrillError::InvalidTransition { reason, .. } if reason == REASON_PATH_TOO_LONG
    ));
}

#[test]
fn scenario_e_incomplete_walk() {
    let mut tree = left_right_tree();
    tree.nodes.insert(
        "corridor".into(),
        Node::decision(
            "corridor",
            "You are in the corridor.",
            vec![DrillOption::new("exit", "Leave the building", 1, "success")],
        ),
    );
    tree.nodes.get_mut("R").unwrap().options[0].next_node_id = "corridor".into();
    let tree = validate(tree, 4).unwrap();

    match replay(&tree, &["go-left"]).unwrap_err() {
        DrillError::IncompleteAttempt { last_node_id } => assert_eq!(last_node_id, "corridor"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn validator_rejects_dangling_and_misshapen_nodes() {
    let mut dangling = left_right_tree();
    dangling.nodes.get_mut("R").unwrap().options[1].next_node_id = "nowhere".into();
    assert_eq!(validate(dangling, 0).unwrap_err().rule, TreeRule::NextNodeExists);

    let mut empty_decision = left_right_tree();
    empty_decision.nodes.get_mut("success").unwrap().terminal = false;
    empty_decision.nodes.get_mut("success").unwrap().outcome_hint = None;
    assert_eq!(validate(empty_decision, 0).unwrap_err().rule, TreeRule::TerminalShape);

    let mut busy_ending = left_right_tree();
    busy_ending
        .nodes
        .get_mut("failure")
        .unwrap()
        .options
        .push(DrillOption::new("again", "Try again", 0, "R"));
    assert_eq!(validate(busy_ending, 0).unwrap_err().rule, TreeRule::TerminalShape);
}

#[test]
fn service_round_trip_with_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(ScenarioCatalog::new(4, ThresholdTable::default()));
    let repo = Arc::new(JsonlAttemptRepository::new(dir.path().join("attempts.jsonl")));
    let service = DrillService::new(catalog, repo);

    let id = service
        .publish_scenario(
            ScenarioDraft::new(ScenarioMeta::titled("Wildfire"), left_right_tree())
                .with_thresholds(poor_excellent()),
        )
        .unwrap();

    let first = service
        .submit_attempt("ana", &SubmitAttempt::new(&id, &["go-right"]))
        .unwrap();
    let second = service
        .submit_attempt("ana", &SubmitAttempt::new(&id, &["go-left"]))
        .unwrap();
    assert_eq!(first.outcome.name, "Poor");
    assert_eq!(second.outcome.name, "Excellent");

    let listed = service.list_attempts("ana", &id).unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.attempt_id);
    assert_eq!(listed[1].id, first.attempt_id);
}

#[test]
fn resubmission_is_idempotent_in_score() {
    let catalog = Arc::new(ScenarioCatalog::new(4, ThresholdTable::default()));
    let service = DrillService::new(catalog, Arc::new(InMemoryAttemptRepository::new()));
    let id = service
        .publish_scenario(ScenarioDraft::new(ScenarioMeta::titled("Wildfire"), left_right_tree()))
        .unwrap();

    let a = service
        .submit_attempt("ana", &SubmitAttempt::new(&id, &["go-left"]))
        .unwrap();
    let b = service
        .submit_attempt("ana", &SubmitAttempt::new(&id, &["go-left"]))
        .unwrap();
    assert_eq!(a.total_score, b.total_score);
    assert_eq!(a.path, b.path);
    assert_eq!(a.outcome, b.outcome);
    assert_ne!(a.attempt_id, b.attempt_id);
}
