use std::io::{BufRead, Write};
use std::sync::OnceLock;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::{debug, info, warn};
use regex::Regex;

use crate::error::DrillError;
use crate::scenario::{NodeView, ScenarioView};
use crate::service::{AttemptReceipt, DrillService, SubmitAttempt};

// ---------------------------------------------------------------------------
// Answer parsing
// ---------------------------------------------------------------------------

fn numbered_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^\s*(?:option\s*)?[\[(]?(\d+)[\])]?[.:]?\s*$").unwrap())
}

/// Turn what the trainee typed into an option id of `node`. Accepts the
/// 1-based number shown on screen ("2", "[2]", "option 2") or the option id.
pub fn parse_choice(raw: &str, node: &NodeView) -> Result<String> {
    let trimmed = raw.trim();

    if let Some(caps) = numbered_re().captures(trimmed) {
        let n: usize = caps[1].parse().context("choice number out of range")?;
        return match n.checked_sub(1).and_then(|i| node.options.get(i)) {
            Some(opt) => Ok(opt.id.clone()),
            None => bail!("pick a number between 1 and {}", node.options.len()),
        };
    }

    node.options
        .iter()
        .find(|o| o.id.eq_ignore_ascii_case(trimmed))
        .map(|o| o.id.clone())
        .with_context(|| format!("'{trimmed}' is not one of the offered responses"))
}

// ---------------------------------------------------------------------------
// Drill over screen
// ---------------------------------------------------------------------------

/// Outcome of a single console round.
enum RoundOutcome {
    /// Trainee reached an ending and the attempt was recorded.
    Recorded(AttemptReceipt),
    /// Trainee reached an ending but the engine refused the walk.
    Rejected(DrillError),
    /// Trainee typed quit mid-drill.
    Quit,
}

fn show_drill_over<W: Write>(out: &mut W, outcome: &RoundOutcome) -> Result<()> {
    writeln!(out, "\n========================================")?;
    writeln!(out, "             DRILL OVER")?;
    writeln!(out, "========================================")?;

    match outcome {
        RoundOutcome::Recorded(receipt) => {
            writeln!(out, "  Outcome: {}", receipt.outcome.name)?;
            writeln!(
                out,
                "  Score:   {} ({}%)",
                receipt.total_score, receipt.percentage_score
            )?;
            writeln!(out, "  Steps:   {}", receipt.path.len())?;
            if let Some(hint) = &receipt.outcome_hint {
                writeln!(out, "  Ending:  {} ({})", receipt.terminal_node_id, hint)?;
            } else {
                writeln!(out, "  Ending:  {}", receipt.terminal_node_id)?;
            }
        }
        RoundOutcome::Rejected(err) => {
            writeln!(out, "  Attempt not recorded [{}]: {}", err.code(), err)?;
        }
        RoundOutcome::Quit => {
            writeln!(out, "  You left the drill before it ended.")?;
        }
    }

    writeln!(out, "========================================\n")?;
    writeln!(out, "  [r] Restart    [q] Quit\n")?;
    Ok(())
}

/// Read the trainee's post-drill choice. Returns `true` to restart, `false` to quit.
fn prompt_restart<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<bool> {
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_lowercase().as_str() {
            "r" => return Ok(true),
            "q" => return Ok(false),
            _ => writeln!(out, "  Press [r] to restart or [q] to quit.")?,
        }
    }
}

// ---------------------------------------------------------------------------
// Single drill round
// ---------------------------------------------------------------------------

fn show_node<W: Write>(out: &mut W, node: &NodeView) -> Result<()> {
    writeln!(out, "\n[Situation]: {}", node.prompt)?;
    for (i, opt) in node.options.iter().enumerate() {
        writeln!(out, "  {}. {}", i + 1, opt.label)?;
    }
    Ok(())
}

fn play_round<R: BufRead, W: Write>(
    service: &DrillService,
    view: &ScenarioView,
    user_id: &str,
    input: &mut R,
    out: &mut W,
) -> Result<RoundOutcome> {
    let started_at = Utc::now();
    let mut current = view.root_node_id.clone();
    let mut choices: Vec<String> = Vec::new();

    info!("Drill '{}' started by '{}'", view.id, user_id);

    loop {
        let node = view
            .nodes
            .get(&current)
            .with_context(|| format!("scenario view has no node '{current}'"))?;
        show_node(out, node)?;

        // Terminal node -> submit the whole walk
        if node.terminal {
            let request = SubmitAttempt {
                scenario_id: view.id.clone(),
                choices,
                started_at: Some(started_at),
            };
            return match service.submit_attempt(user_id, &request) {
                Ok(receipt) => Ok(RoundOutcome::Recorded(receipt)),
                Err(DrillError::Storage(e)) => Err(e).context("failed to record attempt"),
                Err(e) => Ok(RoundOutcome::Rejected(e)),
            };
        }

        write!(out, "\n[You]: ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(RoundOutcome::Quit);
        }
        let line = line.trim();

        if line.is_empty() {
            writeln!(out, "(Please pick a response.)")?;
            continue;
        }
        if line.eq_ignore_ascii_case("quit") || line.eq_ignore_ascii_case("exit") {
            return Ok(RoundOutcome::Quit);
        }

        let option_id = match parse_choice(line, node) {
            Ok(id) => id,
            Err(e) => {
                warn!("Unusable answer {line:?} at node {}: {e}", node.id);
                writeln!(out, "({e})")?;
                continue;
            }
        };

        let next = node
            .options
            .iter()
            .find(|o| o.id == option_id)
            .map(|o| o.next_node_id.clone())
            .with_context(|| format!("option '{option_id}' vanished from node '{}'", node.id))?;
        debug!("Transition: {} -[{}]-> {}", node.id, option_id, next);

        choices.push(option_id);
        current = next;
    }
}

// ---------------------------------------------------------------------------
// Public entry point: runs drills in a loop until the trainee quits
// ---------------------------------------------------------------------------

pub fn run<R: BufRead, W: Write>(
    service: &DrillService,
    scenario_id: &str,
    user_id: &str,
    input: &mut R,
    out: &mut W,
) -> Result<()> {
    let view = service
        .get_scenario(scenario_id)
        .with_context(|| format!("cannot open scenario '{scenario_id}'"))?;

    loop {
        writeln!(out, "\n========================================")?;
        writeln!(out, "   {}", view.meta.title.to_uppercase())?;
        writeln!(out, "========================================")?;
        if !view.meta.description.is_empty() {
            writeln!(out, "{}", view.meta.description)?;
        }
        writeln!(out, "Type the number of your response, or 'quit'.\n")?;

        let outcome = play_round(service, &view, user_id, input, out)?;
        show_drill_over(out, &outcome)?;

        if !prompt_restart(input, out)? {
            writeln!(out, "Stay safe!")?;
            break;
        }

        info!("Trainee chose to restart");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;

    use crate::attempt::repository::InMemoryAttemptRepository;
    use crate::catalog::ScenarioCatalog;
    use crate::outcome::ThresholdTable;
    use crate::scenario::tree::earthquake_evacuation_scenario;
    use crate::scenario::{ScenarioDraft, ScenarioMeta};

    fn service() -> (DrillService, Arc<InMemoryAttemptRepository>) {
        let catalog = Arc::new(ScenarioCatalog::new(4, ThresholdTable::default()));
        catalog
            .publish_with_id(
                "quake",
                ScenarioDraft::new(
                    ScenarioMeta::titled("Earthquake Evacuation Drill"),
                    earthquake_evacuation_scenario(),
                ),
            )
            .unwrap();
        let repo = Arc::new(InMemoryAttemptRepository::new());
        (DrillService::new(catalog, repo.clone()), repo)
    }

    #[test]
    fn test_parse_choice_number_and_id() {
        let (service, _) = service();
        let view = service.get_scenario("quake").unwrap();
        let node = &view.nodes["s1"];
        assert_eq!(parse_choice("1", node).unwrap(), "c1");
        assert_eq!(parse_choice(" [2] ", node).unwrap(), "c2");
        assert_eq!(parse_choice("Option 2.", node).unwrap(), "c2");
        assert_eq!(parse_choice("C1", node).unwrap(), "c1");
    }

    #[test]
    fn test_parse_choice_rejects_out_of_range_and_unknown() {
        let (service, _) = service();
        let view = service.get_scenario("quake").unwrap();
        let node = &view.nodes["s1"];
        assert!(parse_choice("0", node).is_err());
        assert!(parse_choice("3", node).is_err());
        assert!(parse_choice("hide under the bed", node).is_err());
    }

    #[test]
    fn test_console_round_records_attempt() {
        let (service, repo) = service();
        let mut input = Cursor::new("1\nnonsense\n1\nq\n");
        let mut out = Vec::new();

        run(&service, "quake", "ana", &mut input, &mut out).unwrap();

        let screen = String::from_utf8(out).unwrap();
        assert!(screen.contains("EARTHQUAKE EVACUATION DRILL"));
        assert!(screen.contains("Outcome: Excellent"));
        assert!(screen.contains("is not one of the offered responses"));
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn test_console_quit_records_nothing() {
        let (service, repo) = service();
        let mut input = Cursor::new("quit\nq\n");
        let mut out = Vec::new();

        run(&service, "quake", "ana", &mut input, &mut out).unwrap();

        let screen = String::from_utf8(out).unwrap();
        assert!(screen.contains("You left the drill"));
        assert!(repo.is_empty());
    }
}
