// src/main.rs
//
// Curriculum training entrypoint.
//
// Constraints:
// - Config precedence: CLI flags > HPA_RL_* env > --config YAML > defaults.
// - Deterministic runs via --seed (single ChaCha8Rng for agent and env).
// - Print a concise run header (config version/hash, seed, stages).
// - Save the Q-table at the end; --resume loads one before training.
//
// Run examples:
//   cargo run --release --bin hpa_rl -- --seed 7
//   cargo run --release --bin hpa_rl -- --config curriculum.yaml --episode-scale 0.1 -v
//   HPA_RL_TELEMETRY_MODE=jsonl HPA_RL_TELEMETRY_PATH=runs/t.jsonl cargo run --bin hpa_rl

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};

use hpa_rl::config::{config_hash, RunConfig};
use hpa_rl::logging::{init_tracing, EventSink, JsonlSink, NoopSink};
use hpa_rl::rl::{Agent, CurriculumRunner, RLTelemetry};

#[derive(Debug, Parser)]
#[command(
    name = "hpa_rl",
    about = "Curriculum Q-learning over a simulated HPA stress axis",
    version
)]
struct Args {
    /// YAML run configuration (defaults to the built-in 3-stage curriculum).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deterministic seed for the run.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Q-table to load before training.
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Where to save the trained Q-table (overrides config).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Greedy evaluation episodes per stage (overrides config).
    #[arg(long)]
    test_episodes: Option<usize>,

    /// Multiply every stage's episode count.
    #[arg(long)]
    episode_scale: Option<f64>,

    /// Per-step JSONL telemetry file.
    #[arg(long)]
    telemetry: Option<PathBuf>,

    /// Episode/stage summary JSONL file.
    #[arg(long)]
    events: Option<PathBuf>,

    /// Write the final run report as JSON.
    #[arg(long)]
    report: Option<PathBuf>,

    /// Suppress progress lines.
    #[arg(long)]
    quiet: bool,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn load_config(args: &Args) -> Result<RunConfig> {
    let mut cfg = match &args.config {
        Some(path) => RunConfig::from_yaml_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => RunConfig::default(),
    };
    cfg.apply_env_overrides();

    if let Some(n) = args.test_episodes {
        cfg.test_episodes = n;
    }
    if let Some(scale) = args.episode_scale {
        cfg.scale_episodes(scale);
    }
    if let Some(out) = &args.out {
        cfg.qtable_path = out.clone();
    }
    cfg.validate().context("invalid run configuration")?;
    Ok(cfg)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cfg = load_config(&args)?;

    println!(
        "hpa_rl | cfg={} | cfg_hash=0x{:016x} | seed={} | dt={}h | stages={} | episodes={} | tests/stage={}",
        cfg.version,
        config_hash(&cfg),
        args.seed,
        cfg.time_step_hours,
        cfg.stages
            .iter()
            .map(|s| format!("{}x{}", s.name, s.episodes))
            .collect::<Vec<_>>()
            .join(","),
        cfg.total_episodes(),
        cfg.test_episodes,
    );

    let mut agent = Agent::new(cfg.agent.clone());
    if let Some(path) = &args.resume {
        let report = agent
            .load(path)
            .with_context(|| format!("loading Q-table {}", path.display()))?;
        if !report.is_complete() {
            eprintln!(
                "warning: {} truncated ({} of {} entries loaded)",
                path.display(),
                report.loaded,
                report.declared
            );
        }
        println!("resumed {} states from {}", report.loaded, path.display());
    }

    let telemetry = match &args.telemetry {
        Some(path) => RLTelemetry::enable(path.clone()),
        None => RLTelemetry::from_env(),
    };

    let sink: Box<dyn EventSink> = match &args.events {
        Some(path) => Box::new(
            JsonlSink::create(path).with_context(|| format!("creating {}", path.display()))?,
        ),
        None => Box::new(NoopSink),
    };

    let qtable_path = cfg.qtable_path.clone();
    let mut runner = CurriculumRunner::new(cfg, args.seed, sink)?
        .with_agent(agent)
        .with_telemetry(telemetry)
        .quiet(args.quiet);

    let report = runner.run().context("curriculum run failed")?;

    println!("\n=== Curriculum complete ===");
    for stage in &report.stages {
        println!(
            "  {:<12} final avg {:8.2} | test {:8.2} +/- {:6.2} | load/hr {:.3}",
            stage.training.name,
            stage.training.final_avg_score,
            stage.evaluation.mean_score,
            stage.evaluation.std_score,
            stage.evaluation.mean_load_per_hour,
        );
    }

    let agent = runner.into_agent();
    let saved = agent
        .save(&qtable_path)
        .with_context(|| format!("saving Q-table {}", qtable_path.display()))?;
    println!("saved {} states to {}", saved, qtable_path.display());

    if let Some(path) = &args.report {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
    }

    Ok(())
}
