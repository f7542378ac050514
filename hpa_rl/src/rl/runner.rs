// src/rl/runner.rs
//
// Curriculum driver.
//
// One agent is carried through a sequence of stages. For each stage:
// - apply the stage's exploration reset (all but the first stage)
// - train: fresh environment per episode, select/step/remember/learn
// - evaluate: greedy episodes with learning off, epsilon restored after
//
// All randomness comes from one ChaCha8Rng seeded at construction, so a
// run is reproducible from (config, seed).

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{RunConfig, StageConfig};
use crate::error::{HpaError, Result};
use crate::logging::EventSink;

use super::agent::{Agent, EpsilonReset};
use super::physiology::DevelopmentalStage;
use super::sim_env::{HpaEnv, TerminationReason};
use super::telemetry::{RLTelemetry, TickRecord};

/// Window for the progress line's running average.
const PROGRESS_WINDOW: usize = 50;
/// Window for a stage's final average score.
const FINAL_WINDOW: usize = 20;

/// Summary of a completed episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeSummary {
    pub stage: DevelopmentalStage,
    /// Index within the stage.
    pub episode: usize,
    /// Run-wide episode id (training and evaluation share the counter).
    pub episode_id: u64,
    pub evaluation: bool,
    /// Sum of rewards.
    pub score: f64,
    pub cumulative_load: f64,
    /// Cumulative load per simulated hour.
    pub load_per_hour: f64,
    pub steps: u64,
    pub termination_reason: Option<TerminationReason>,
    pub epsilon: f64,
    pub q_table_size: usize,
}

/// Training results for one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSummary {
    pub name: String,
    pub stage: DevelopmentalStage,
    pub episodes: usize,
    pub mean_score: f64,
    /// Mean of the last 20 episode scores.
    pub final_avg_score: f64,
    pub best_score: f64,
    pub epsilon_start: f64,
    pub epsilon_end: f64,
    pub q_table_size: usize,
    pub learn_steps: u64,
}

/// Greedy evaluation results for one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationSummary {
    pub stage: DevelopmentalStage,
    pub episodes: usize,
    pub mean_score: f64,
    /// Population standard deviation.
    pub std_score: f64,
    pub mean_load_per_hour: f64,
    pub scores: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageReport {
    pub training: StageSummary,
    pub evaluation: EvaluationSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurriculumReport {
    pub config_version: String,
    pub seed: u64,
    pub stages: Vec<StageReport>,
    pub q_table_size: usize,
    pub total_steps: u64,
    pub learn_steps: u64,
    pub epsilon: f64,
}

pub struct CurriculumRunner<S: EventSink> {
    config: RunConfig,
    agent: Agent,
    rng: ChaCha8Rng,
    seed: u64,
    sink: S,
    telemetry: RLTelemetry,
    next_episode_id: u64,
    quiet: bool,
}

impl<S: EventSink> CurriculumRunner<S> {
    /// Runner with a fresh agent. Rejects invalid configurations.
    pub fn new(config: RunConfig, seed: u64, sink: S) -> Result<Self> {
        config.validate()?;
        let agent = Agent::new(config.agent.clone());
        Ok(Self {
            config,
            agent,
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
            sink,
            telemetry: RLTelemetry::new(),
            next_episode_id: 0,
            quiet: false,
        })
    }

    /// Continue from an existing agent (e.g. one loaded from disk).
    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_telemetry(mut self, telemetry: RLTelemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Suppress console progress output.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Train and evaluate every configured stage in order.
    pub fn run(&mut self) -> Result<CurriculumReport> {
        let stages = self.config.stages.clone();
        let mut reports = Vec::with_capacity(stages.len());

        for (i, stage_cfg) in stages.iter().enumerate() {
            if i > 0 {
                if let Some(reset) = stage_cfg.epsilon_reset() {
                    let before = self.agent.epsilon();
                    self.agent.reset_epsilon(reset);
                    info!(
                        stage = %stage_cfg.stage,
                        before,
                        after = self.agent.epsilon(),
                        "epsilon reset on stage entry"
                    );
                }
            }
            self.agent.set_current_stage(i);

            let training = self.train_stage(stage_cfg)?;
            let evaluation = self.evaluate_stage(stage_cfg.stage, self.config.test_episodes)?;
            reports.push(StageReport {
                training,
                evaluation,
            });
        }

        self.telemetry.flush();

        Ok(CurriculumReport {
            config_version: self.config.version.clone(),
            seed: self.seed,
            stages: reports,
            q_table_size: self.agent.q_table_size(),
            total_steps: self.agent.total_steps(),
            learn_steps: self.agent.learn_steps(),
            epsilon: self.agent.epsilon(),
        })
    }

    /// Train the agent for `stage_cfg.episodes` episodes.
    pub fn train_stage(&mut self, stage_cfg: &StageConfig) -> Result<StageSummary> {
        if stage_cfg.episodes == 0 {
            return Err(HpaError::validation("episodes", "must be positive"));
        }

        let params = stage_cfg.stage.params();
        if !self.quiet {
            println!(
                "\n=== Stage {}: {} | episodes={} | max_steps={} | maturity={:.2} | resilience={:.2} ===",
                self.agent.current_stage() + 1,
                stage_cfg.name,
                stage_cfg.episodes,
                params.max_steps,
                params.feedback_maturity,
                params.stress_resilience,
            );
        }
        info!(stage = %stage_cfg.stage, episodes = stage_cfg.episodes, "training stage");

        let epsilon_start = self.agent.epsilon();
        let mut scores = Vec::with_capacity(stage_cfg.episodes);

        for episode in 0..stage_cfg.episodes {
            let summary = self.run_episode(stage_cfg.stage, episode, true)?;
            scores.push(summary.score);
            self.sink.log_episode(&summary);

            let every = self.config.progress_every;
            if !self.quiet && every > 0 && (episode + 1) % every == 0 {
                println!(
                    "  Episode {:4} | Avg Score: {:8.2} | Load/hr: {:.3} | eps: {:.3} | Q-size: {}",
                    episode + 1,
                    tail_mean(&scores, PROGRESS_WINDOW),
                    summary.load_per_hour,
                    self.agent.epsilon(),
                    self.agent.q_table_size(),
                );
            }
        }

        let summary = StageSummary {
            name: stage_cfg.name.clone(),
            stage: stage_cfg.stage,
            episodes: scores.len(),
            mean_score: mean(&scores),
            final_avg_score: tail_mean(&scores, FINAL_WINDOW),
            best_score: scores.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            epsilon_start,
            epsilon_end: self.agent.epsilon(),
            q_table_size: self.agent.q_table_size(),
            learn_steps: self.agent.learn_steps(),
        };

        if !self.quiet {
            println!(
                "  {} complete | final avg (last {}): {:.2} | Q-size: {}",
                stage_cfg.name, FINAL_WINDOW, summary.final_avg_score, summary.q_table_size
            );
        }
        self.sink.log_stage(&summary);
        Ok(summary)
    }

    /// Run `episodes` greedy episodes without learning.
    ///
    /// Epsilon is forced to zero for the duration and restored afterwards,
    /// including on error.
    pub fn evaluate_stage(
        &mut self,
        stage: DevelopmentalStage,
        episodes: usize,
    ) -> Result<EvaluationSummary> {
        if episodes == 0 {
            return Err(HpaError::validation("test_episodes", "must be positive"));
        }

        let saved_epsilon = self.agent.epsilon();
        self.agent.reset_epsilon(EpsilonReset::To(0.0));

        let mut outcome = Ok(Vec::with_capacity(episodes));
        for episode in 0..episodes {
            match self.run_episode(stage, episode, false) {
                Ok(summary) => {
                    self.sink.log_episode(&summary);
                    if let Ok(done) = outcome.as_mut() {
                        done.push(summary);
                    }
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }
        self.agent.reset_epsilon(EpsilonReset::To(saved_epsilon));
        let episodes_run = outcome?;

        let scores: Vec<f64> = episodes_run.iter().map(|s| s.score).collect();
        let loads: Vec<f64> = episodes_run.iter().map(|s| s.load_per_hour).collect();
        let summary = EvaluationSummary {
            stage,
            episodes: scores.len(),
            mean_score: mean(&scores),
            std_score: population_std(&scores),
            mean_load_per_hour: mean(&loads),
            scores,
        };

        if !self.quiet {
            println!(
                "  Test ({} episodes): {:.2} +/- {:.2} | Load/hr: {:.3}",
                summary.episodes, summary.mean_score, summary.std_score, summary.mean_load_per_hour
            );
        }
        self.sink.log_evaluation(&summary);
        Ok(summary)
    }

    fn run_episode(
        &mut self,
        stage: DevelopmentalStage,
        episode: usize,
        learn: bool,
    ) -> Result<EpisodeSummary> {
        let episode_id = self.next_episode_id;
        self.next_episode_id += 1;

        let mut env = HpaEnv::new(self.config.time_step_hours, stage);
        let mut state = env.reset(&mut self.rng).to_features();
        self.telemetry.log_episode_start(episode_id, stage, !learn);

        let mut score = 0.0;
        let termination_reason = loop {
            let action = self.agent.select_action(&state, &mut self.rng);
            let result = env.step(action, &mut self.rng)?;
            let next_state = result.observation.to_features();

            if self.telemetry.logs_ticks() {
                let record =
                    TickRecord::new(episode_id, stage, state, action, &result, self.agent.epsilon());
                self.telemetry.log_tick(&record);
            }

            if learn {
                self.agent
                    .remember(state, action, result.reward, next_state, result.done);
                if let Some(report) = self.agent.learn(&mut self.rng) {
                    debug!(
                        learn_step = self.agent.learn_steps(),
                        td = report.mean_abs_td_error,
                        "learn"
                    );
                }
            }

            score += result.reward;
            state = next_state;
            if result.done {
                break result.info.termination_reason;
            }
        };

        let hours = env.step_count() as f64 * env.time_step();
        let summary = EpisodeSummary {
            stage,
            episode,
            episode_id,
            evaluation: !learn,
            score,
            cumulative_load: env.cumulative_load(),
            load_per_hour: if hours > 0.0 {
                env.cumulative_load() / hours
            } else {
                0.0
            },
            steps: env.step_count(),
            termination_reason,
            epsilon: self.agent.epsilon(),
            q_table_size: self.agent.q_table_size(),
        };
        self.telemetry.log_episode_end(
            episode_id,
            stage,
            !learn,
            termination_reason,
            score,
            summary.cumulative_load,
            summary.steps,
        );
        Ok(summary)
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Hand the trained agent back, e.g. for saving.
    pub fn into_agent(self) -> Agent {
        self.agent
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

fn population_std(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    (xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64).sqrt()
}

/// Mean of the last `window` values.
fn tail_mean(xs: &[f64], window: usize) -> f64 {
    mean(&xs[xs.len().saturating_sub(window)..])
}
