// src/bin/hpa_eval.rs
//
// Greedy evaluation of a saved Q-table on one developmental stage.
//
// Run examples:
//   cargo run --bin hpa_eval -- --qtable curriculum_qtable.dat --stage adult --episodes 20
//   cargo run --bin hpa_eval -- --qtable q.dat --stage child --seed 3 --json

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, ValueEnum};

use hpa_rl::config::{RunConfig, StageConfig};
use hpa_rl::logging::{init_tracing, NoopSink};
use hpa_rl::rl::{Agent, CurriculumRunner, DevelopmentalStage};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum StageArg {
    Child,
    Adolescent,
    Adult,
}

impl From<StageArg> for DevelopmentalStage {
    fn from(s: StageArg) -> Self {
        match s {
            StageArg::Child => DevelopmentalStage::Child,
            StageArg::Adolescent => DevelopmentalStage::Adolescent,
            StageArg::Adult => DevelopmentalStage::Adult,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "hpa_eval",
    about = "Evaluate a saved HPA Q-table greedily",
    version
)]
struct Args {
    /// Q-table file written by hpa_rl.
    #[arg(long)]
    qtable: PathBuf,

    #[arg(long, value_enum, default_value_t = StageArg::Adult)]
    stage: StageArg,

    /// Number of greedy episodes.
    #[arg(long, default_value_t = 10)]
    episodes: usize,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Simulated hours per step.
    #[arg(long, default_value_t = 0.1)]
    dt: f64,

    /// Print the summary as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Verbosity: -v, -vv
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    if args.episodes == 0 {
        bail!("--episodes must be positive");
    }

    let stage: DevelopmentalStage = args.stage.into();
    let cfg = RunConfig {
        time_step_hours: args.dt,
        stages: vec![StageConfig::new(stage, 1)],
        test_episodes: args.episodes,
        ..RunConfig::default()
    };

    let mut agent = Agent::new(cfg.agent.clone());
    let loaded = agent
        .load(&args.qtable)
        .with_context(|| format!("loading Q-table {}", args.qtable.display()))?;
    if !loaded.is_complete() {
        eprintln!(
            "warning: {} truncated ({} of {} entries loaded)",
            args.qtable.display(),
            loaded.loaded,
            loaded.declared
        );
    }

    let mut runner = CurriculumRunner::new(cfg, args.seed, NoopSink)?
        .with_agent(agent)
        .quiet(args.json);
    let summary = runner.evaluate_stage(stage, args.episodes)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "hpa_eval | stage={} | states={} | episodes={} | score {:.2} +/- {:.2} | load/hr {:.3}",
            stage,
            runner.agent().q_table_size(),
            summary.episodes,
            summary.mean_score,
            summary.std_score,
            summary.mean_load_per_hour,
        );
    }
    Ok(())
}
