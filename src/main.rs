use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;

use drills::scenario::tree::earthquake_evacuation_scenario;
use drills::{
    AttemptRepository, DrillConfig, DrillService, InMemoryAttemptRepository,
    JsonlAttemptRepository, ScenarioCatalog, ScenarioDraft, ScenarioMeta, ScenarioTree,
    SubmitAttempt,
};

const USAGE: &str = "\
Usage: drills [scenario.json] [--config <file>] [--user <id>] [--choices a,b,c] [--validate]

  scenario.json   scenario draft (meta + tree + thresholds) or a bare tree;
                  the built-in earthquake drill is used when omitted
  --config        JSON engine configuration
  --user          trainee id recorded on attempts
  --choices       submit these option ids once and print the receipt as JSON
  --validate      only validate the scenario and print its summary

Logging: set RUST_LOG=debug or RUST_LOG=trace for verbose output";

#[derive(Debug, Default)]
struct Args {
    scenario: Option<PathBuf>,
    config: Option<PathBuf>,
    user: Option<String>,
    choices: Option<Vec<String>>,
    validate_only: bool,
}

fn parse_args() -> Result<Args> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = Some(it.next().context(USAGE)?.into()),
            "--user" => args.user = Some(it.next().context(USAGE)?),
            "--choices" => {
                let raw = it.next().context(USAGE)?;
                args.choices = Some(
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                );
            }
            "--validate" => args.validate_only = true,
            "-h" | "--help" => bail!("{USAGE}"),
            other if other.starts_with("--") => bail!("unknown flag {other}\n\n{USAGE}"),
            other => args.scenario = Some(other.into()),
        }
    }
    Ok(args)
}

/// A file with a top-level "tree" key is a full draft; anything else is read
/// as a bare tree titled after the file name.
fn load_draft(path: &Path) -> Result<ScenarioDraft> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .with_context(|| format!("scenario {} is not valid JSON", path.display()))?;

    if value.get("tree").is_some() {
        return serde_json::from_value(value)
            .with_context(|| format!("failed to parse scenario draft {}", path.display()));
    }

    let tree: ScenarioTree = serde_json::from_value(value)
        .with_context(|| format!("failed to parse scenario tree {}", path.display()))?;
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Drill".into());
    Ok(ScenarioDraft::new(ScenarioMeta::titled(&title), tree))
}

fn main() -> Result<()> {
    // Initialize logging. Control verbosity with RUST_LOG env var:
    //   RUST_LOG=info   drills quake.json   # publication + submissions
    //   RUST_LOG=debug  drills quake.json   # + every transition
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let args = parse_args()?;

    let config = match &args.config {
        Some(path) => DrillConfig::from_file(path)?,
        None => DrillConfig::default(),
    };

    let draft = match &args.scenario {
        Some(path) => load_draft(path)?,
        None => {
            let mut meta = ScenarioMeta::titled("Earthquake Evacuation Drill");
            meta.description = "Practice earthquake evacuation procedures.".into();
            ScenarioDraft::new(meta, earthquake_evacuation_scenario())
        }
    };

    let catalog = Arc::new(ScenarioCatalog::new(
        config.revisit_allowance,
        config.default_thresholds.clone(),
    ));
    let scenario = catalog
        .publish(draft)
        .context("scenario failed validation")?;

    if args.validate_only {
        println!("{}", serde_json::to_string_pretty(&scenario.summary())?);
        println!("Step bound: {}", scenario.tree.max_steps());
        return Ok(());
    }

    let attempts: Arc<dyn AttemptRepository> = match &config.attempt_log {
        Some(path) => {
            info!("Recording attempts to {}", path.display());
            Arc::new(JsonlAttemptRepository::new(path))
        }
        None => Arc::new(InMemoryAttemptRepository::new()),
    };
    let service = DrillService::new(catalog, attempts);
    let user = args.user.unwrap_or_else(|| config.default_user.clone());

    if let Some(choices) = args.choices {
        let request = SubmitAttempt {
            scenario_id: scenario.id.clone(),
            choices,
            started_at: None,
        };
        let receipt = service
            .submit_attempt(&user, &request)
            .context("attempt rejected")?;
        println!("{}", serde_json::to_string_pretty(&receipt)?);
        return Ok(());
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut out = io::stdout();
    drills::console::run(&service, &scenario.id, &user, &mut input, &mut out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_load_bare_tree_takes_title_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::to_string(&earthquake_evacuation_scenario()).unwrap();
        let draft = load_draft(&write(&dir, "quake.json", &body)).unwrap();
        assert_eq!(draft.meta.title, "quake");
        assert_eq!(draft.tree.root_node_id, "s1");
        assert!(draft.thresholds.is_none());
    }

    #[test]
    fn test_load_draft_with_bad_thresholds_reports_draft_error() {
        let dir = tempfile::tempdir().unwrap();
        let body = serde_json::json!({
            "meta": { "title": "Quake" },
            "tree": earthquake_evacuation_scenario(),
            "thresholds": "not a table",
        })
        .to_string();
        let err = load_draft(&write(&dir, "quake.json", &body)).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("failed to parse scenario draft"), "{message}");
        assert!(!message.contains("scenario tree"), "{message}");
    }
}
