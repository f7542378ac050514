// src/config.rs
//
// Run configuration for curriculum training.
//
// Sources, lowest to highest precedence:
//   built-in defaults < YAML file < HPA_RL_* environment variables < CLI flags
//
// The defaults reproduce the three-stage curriculum: child (100 episodes),
// adolescent (150, epsilon reset to 0.2), adult (200, epsilon boost).

use std::env;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{HpaError, Result};
use crate::rl::agent::{AgentConfig, EpsilonReset};
use crate::rl::physiology::DevelopmentalStage;

pub const CONFIG_VERSION: &str = "hpa-curriculum-v1";
pub const DEFAULT_QTABLE_PATH: &str = "curriculum_qtable.dat";

/// One curriculum stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub name: String,
    pub stage: DevelopmentalStage,
    pub episodes: usize,
    /// Exploration rate applied on entering this stage. Negative boosts the
    /// current rate instead. Ignored for the first stage.
    #[serde(default)]
    pub epsilon_on_entry: Option<f64>,
}

impl StageConfig {
    pub fn new(stage: DevelopmentalStage, episodes: usize) -> Self {
        Self {
            name: stage.as_str().to_string(),
            stage,
            episodes,
            epsilon_on_entry: None,
        }
    }

    pub fn with_epsilon_on_entry(mut self, epsilon: f64) -> Self {
        self.epsilon_on_entry = Some(epsilon);
        self
    }

    pub fn epsilon_reset(&self) -> Option<EpsilonReset> {
        self.epsilon_on_entry.map(EpsilonReset::from)
    }
}

/// Default stage sequence.
pub fn default_curriculum() -> Vec<StageConfig> {
    vec![
        StageConfig::new(DevelopmentalStage::Child, 100),
        StageConfig::new(DevelopmentalStage::Adolescent, 150).with_epsilon_on_entry(0.2),
        StageConfig::new(DevelopmentalStage::Adult, 200).with_epsilon_on_entry(-1.0),
    ]
}

fn default_version() -> String {
    CONFIG_VERSION.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub version: String,
    /// Simulated hours per environment step.
    pub time_step_hours: f64,
    pub agent: AgentConfig,
    pub stages: Vec<StageConfig>,
    /// Greedy evaluation episodes after each stage.
    pub test_episodes: usize,
    pub qtable_path: PathBuf,
    /// Progress line every N training episodes (0 = silent).
    pub progress_every: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            time_step_hours: 0.1,
            agent: AgentConfig::default(),
            stages: default_curriculum(),
            test_episodes: 10,
            qtable_path: PathBuf::from(DEFAULT_QTABLE_PATH),
            progress_every: 10,
        }
    }
}

impl RunConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: RunConfig = serde_yaml::from_str(yaml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| HpaError::io(path, e))?;
        Self::from_yaml_str(&text)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env_or_default() -> Self {
        let mut cfg = Self::default();
        cfg.apply_env_overrides();
        cfg
    }

    /// Reject configurations that cannot drive a run.
    pub fn validate(&self) -> Result<()> {
        if !(self.time_step_hours.is_finite() && self.time_step_hours > 0.0) {
            return Err(HpaError::validation("time_step_hours", "must be positive"));
        }
        if self.stages.is_empty() {
            return Err(HpaError::validation("stages", "at least one stage is required"));
        }
        for (i, s) in self.stages.iter().enumerate() {
            if s.episodes == 0 {
                return Err(HpaError::validation(
                    &format!("stages[{i}].episodes"),
                    "must be positive",
                ));
            }
            if let Some(eps) = s.epsilon_on_entry {
                if !eps.is_finite() || eps > 1.0 {
                    return Err(HpaError::validation(
                        &format!("stages[{i}].epsilon_on_entry"),
                        "must be <= 1 (negative requests a boost)",
                    ));
                }
            }
        }
        if self.test_episodes == 0 {
            return Err(HpaError::validation("test_episodes", "must be positive"));
        }
        self.agent.validate()
    }

    /// Apply HPA_RL_* environment overrides, logging each one.
    pub fn apply_env_overrides(&mut self) {
        env_override("HPA_RL_TIME_STEP", &mut self.time_step_hours);
        env_override("HPA_RL_TEST_EPISODES", &mut self.test_episodes);
        env_override("HPA_RL_LEARNING_RATE", &mut self.agent.learning_rate);
        env_override("HPA_RL_GAMMA", &mut self.agent.gamma);
        env_override("HPA_RL_PROGRESS_EVERY", &mut self.progress_every);

        if let Ok(raw) = env::var("HPA_RL_QTABLE_PATH") {
            info!(var = "HPA_RL_QTABLE_PATH", value = %raw, "config override");
            self.qtable_path = PathBuf::from(raw);
        }

        let mut scale = 1.0_f64;
        if env_override("HPA_RL_EPISODE_SCALE", &mut scale) {
            self.scale_episodes(scale);
        }
    }

    /// Multiply every stage's episode count by `scale`, keeping at least one.
    pub fn scale_episodes(&mut self, scale: f64) {
        if !(scale.is_finite() && scale > 0.0) {
            warn!(scale, "ignoring non-positive episode scale");
            return;
        }
        for s in &mut self.stages {
            s.episodes = ((s.episodes as f64 * scale).round() as usize).max(1);
        }
    }

    pub fn total_episodes(&self) -> usize {
        self.stages.iter().map(|s| s.episodes).sum()
    }
}

/// Parse `name` into `target` if set. Returns true when applied.
fn env_override<T>(name: &str, target: &mut T) -> bool
where
    T: FromStr + Display,
{
    let Ok(raw) = env::var(name) else {
        return false;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => {
            info!(var = name, value = %v, "config override");
            *target = v;
            true
        }
        Err(_) => {
            warn!(var = name, raw = %raw, default = %target, "could not parse override; keeping default");
            false
        }
    }
}

/// FNV-1a 64 over the debug rendering; a stable fingerprint for run headers.
pub fn config_hash(cfg: &RunConfig) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    format!("{cfg:?}")
        .bytes()
        .fold(FNV_OFFSET, |h, b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_curriculum() {
        let cfg = RunConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.stages.len(), 3);
        assert_eq!(cfg.total_episodes(), 450);
        assert_eq!(cfg.stages[0].epsilon_reset(), None);
        assert_eq!(cfg.stages[1].epsilon_reset(), Some(EpsilonReset::To(0.2)));
        assert_eq!(cfg.stages[2].epsilon_reset(), Some(EpsilonReset::Boost));
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let cfg = RunConfig::from_yaml_str(
            r#"
time_step_hours: 0.25
stages:
  - name: warmup
    stage: child
    episodes: 3
  - name: final
    stage: adult
    episodes: 2
    epsilon_on_entry: -1.0
agent:
  learning_rate: 0.01
"#,
        )
        .unwrap();
        assert_eq!(cfg.time_step_hours, 0.25);
        assert_eq!(cfg.stages[1].stage, DevelopmentalStage::Adult);
        assert_eq!(cfg.agent.learning_rate, 0.01);
        assert_eq!(cfg.agent.batch_size, 128);
        assert_eq!(cfg.test_episodes, 10);
    }

    #[test]
    fn test_zero_counts_rejected() {
        let mut cfg = RunConfig::default();
        cfg.test_episodes = 0;
        assert!(matches!(cfg.validate(), Err(HpaError::Validation { .. })));

        let mut cfg = RunConfig::default();
        cfg.stages[1].episodes = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("stages[1].episodes"));

        let mut cfg = RunConfig::default();
        cfg.stages.clear();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_yaml_is_parse_error() {
        assert!(matches!(
            RunConfig::from_yaml_str("stages: [1, 2"),
            Err(HpaError::Parse(_))
        ));
        assert!(matches!(
            RunConfig::from_yaml_str("stages:\n  - {name: x, stage: infant, episodes: 1}"),
            Err(HpaError::Parse(_))
        ));
    }

    #[test]
    fn test_scale_episodes() {
        let mut cfg = RunConfig::default();
        cfg.scale_episodes(0.01);
        assert_eq!(
            cfg.stages.iter().map(|s| s.episodes).collect::<Vec<_>>(),
            vec![1, 2, 2]
        );
        cfg.scale_episodes(-3.0);
        assert_eq!(cfg.total_episodes(), 5);
    }

    #[test]
    fn test_config_hash_tracks_changes() {
        let a = RunConfig::default();
        let mut b = RunConfig::default();
        assert_eq!(config_hash(&a), config_hash(&b));
        b.test_episodes = 11;
        assert_ne!(config_hash(&a), config_hash(&b));
    }
}
