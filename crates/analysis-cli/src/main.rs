//! chess-analyze - analyse a position with a configured UCI engine.
//!
//! Prints every published evaluation as it arrives and the final one as JSON
//! on stdout. Logs go to stderr; set `RUST_LOG` for more detail.

use anyhow::{bail, Context};
use chess_analysis::{
    AnalysisEvent, AnalysisService, AnalysisTask, DynamicPvPolicy, Evaluation, ServiceConfig,
};
use chess_core::FenRecord;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Analyse a chess position with an external UCI engine.
#[derive(Parser, Debug)]
#[command(name = "chess-analyze")]
#[command(about = "Analyses a chess position with a UCI engine")]
struct Args {
    /// Service configuration (engines, timeouts)
    #[arg(long, default_value = "analysis.toml")]
    config: PathBuf,

    /// Engine to use, as named in the configuration
    #[arg(long)]
    engine: Option<String>,

    /// Position to analyse
    #[arg(long)]
    fen: Option<String>,

    /// PGN file whose final position is analysed
    #[arg(long)]
    pgn: Option<PathBuf>,

    /// Search depth
    #[arg(long)]
    depth: Option<u32>,

    /// Search time in milliseconds
    #[arg(long)]
    movetime: Option<u64>,

    /// Number of lines to report
    #[arg(long, default_value = "1")]
    lines: u32,

    /// Engine option override, NAME=VALUE (repeatable)
    #[arg(long = "option", value_parser = parse_option)]
    options: Vec<(String, String)>,

    /// Depth from which the line count may be narrowed
    #[arg(long)]
    narrow_depth: Option<u32>,

    /// Never narrow below this many lines
    #[arg(long, default_value = "1")]
    narrow_min_lines: u32,

    /// Lines within this many centipawns of the best are kept
    #[arg(long, default_value = "30")]
    narrow_cutoff: i32,

    /// Print the engine's static evaluation instead of searching
    #[arg(long)]
    eval: bool,
}

fn parse_option(text: &str) -> Result<(String, String), String> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{text}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("option name is empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn load_config(path: &Path) -> anyhow::Result<ServiceConfig> {
    if path.exists() {
        Ok(ServiceConfig::load(path)?)
    } else {
        tracing::warn!("{} not found, using defaults", path.display());
        Ok(ServiceConfig::default())
    }
}

/// Explicit choice, then the configured default, then the only engine.
fn choose_engine(args: &Args, config: &ServiceConfig) -> anyhow::Result<String> {
    if let Some(engine) = args.engine.clone().or_else(|| config.default_engine.clone()) {
        return Ok(engine);
    }
    let mut names = config.engines.keys();
    match (names.next(), names.next()) {
        (Some(only), None) => Ok(only.clone()),
        (None, _) => bail!("no engines configured"),
        _ => bail!("several engines configured, pick one with --engine"),
    }
}

fn build_task(args: &Args, engine: String) -> anyhow::Result<AnalysisTask> {
    let mut task = AnalysisTask::new(engine).with_lines(args.lines);
    if let Some(fen) = &args.fen {
        task = task.with_fen(fen.clone());
    }
    if let Some(path) = &args.pgn {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        task = task.with_pgn(text);
    }
    if let Some(depth) = args.depth {
        task = task.with_depth(depth);
    }
    if let Some(ms) = args.movetime {
        task = task.with_movetime(ms);
    }
    for (name, value) in &args.options {
        task = task.with_option(name.clone(), value.clone());
    }
    if let Some(required_depth) = args.narrow_depth {
        task = task.with_dynamic_pv(DynamicPvPolicy {
            required_depth,
            min_lines: args.narrow_min_lines,
            cutoff_cp: args.narrow_cutoff,
        });
    }
    Ok(task)
}

fn print_evaluation(evaluation: &Evaluation) {
    for variation in &evaluation.variations {
        println!(
            "depth {:>3}  {:>7}  {}",
            variation.depth, variation.display_score, variation.san_line
        );
    }
}

/// Prints evaluations until the task completes and returns the final one.
async fn follow(mut events: broadcast::Receiver<AnalysisEvent>) -> Option<Evaluation> {
    loop {
        match events.recv().await {
            Ok(AnalysisEvent::EvaluationPublished(evaluation)) => print_evaluation(&evaluation),
            Ok(AnalysisEvent::LinesShrunk { lines, .. }) => {
                tracing::info!("narrowed to {lines} lines")
            }
            Ok(AnalysisEvent::Completed { evaluation, .. }) => return evaluation,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("skipped {n} events")
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let config = load_config(&args.config)?;
    let service = AnalysisService::new(Arc::new(config.registry()), &config);

    if args.eval {
        let fen = args.fen.as_deref().unwrap_or(FenRecord::STARTPOS);
        let text = service.static_evaluation(fen).await?;
        println!("{text}");
        return Ok(());
    }

    let engine = choose_engine(&args, &config)?;
    let task = build_task(&args, engine)?;
    tracing::info!("Analysing with {} ({} lines)", task.engine, task.lines);

    let printer = tokio::spawn(follow(service.subscribe()));
    let stopper = {
        let service = service.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, stopping search");
                service.stop().await;
            }
        })
    };

    let id = service
        .start_sync(task)
        .await?
        .context("task was not started")?;
    stopper.abort();
    tracing::info!("Task {id} finished");

    match printer.await? {
        Some(evaluation) => println!("{}", serde_json::to_string_pretty(&evaluation)?),
        None => bail!("the engine reported no complete evaluation"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["chess-analyze"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn option_pairs() {
        assert_eq!(
            parse_option("Threads=4"),
            Ok(("Threads".to_string(), "4".to_string()))
        );
        assert_eq!(
            parse_option("SyzygyPath = /tb"),
            Ok(("SyzygyPath".to_string(), "/tb".to_string()))
        );
        assert!(parse_option("Threads").is_err());
        assert!(parse_option("=4").is_err());
    }

    #[test]
    fn task_from_flags() {
        let a = args(&[
            "--fen",
            "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1",
            "--depth",
            "18",
            "--lines",
            "3",
            "--option",
            "Hash=64",
            "--narrow-depth",
            "12",
            "--narrow-min-lines",
            "2",
        ]);
        let task = build_task(&a, "sf".into()).unwrap();
        assert_eq!(task.depth, Some(18));
        assert_eq!(task.lines, 3);
        assert_eq!(task.options, vec![("Hash".to_string(), "64".to_string())]);
        assert_eq!(
            task.dynamic_pv,
            Some(DynamicPvPolicy {
                required_depth: 12,
                min_lines: 2,
                cutoff_cp: 30
            })
        );
        assert!(task.validate().is_ok());
    }

    #[test]
    fn engine_choice() {
        let config = ServiceConfig::from_toml_str("[engines.sf]\npath = \"stockfish\"").unwrap();
        assert_eq!(choose_engine(&args(&[]), &config).unwrap(), "sf");
        assert_eq!(
            choose_engine(&args(&["--engine", "lc0"]), &config).unwrap(),
            "lc0"
        );
        assert!(choose_engine(&args(&[]), &ServiceConfig::default()).is_err());

        let two = ServiceConfig::from_toml_str(
            "default_engine = \"b\"\n[engines.a]\npath = \"a\"\n[engines.b]\npath = \"b\"",
        )
        .unwrap();
        assert_eq!(choose_engine(&args(&[]), &two).unwrap(), "b");
    }

    #[test]
    fn missing_pgn_file_is_an_error() {
        let a = args(&["--pgn", "/definitely/not/here.pgn"]);
        assert!(build_task(&a, "sf".into()).is_err());
    }
}
