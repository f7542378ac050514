// src/rl/sim_env.rs
//
// Gym-style HPA-axis environment.
//
// - HpaEnv: reset(rng) -> Observation, step(action, rng) -> StepResult
// - HpaEnvConfig: time step, stage preset, constants and reset jitter
//
// The environment never owns a generator. Every stochastic term (reset
// jitter, ultradian noise, stress events) is drawn from the caller's
// generator, so one seeded generator reproduces an entire run.

use std::f64::consts::PI;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;

use super::action_encoding::ActionModifiers;
use super::allostatic::LoadComponents;
use super::domain_rand::{sample_bool, sample_normal, DomainRandConfig};
use super::observation::Observation;
use super::physiology::{
    clamp_to, DevelopmentalStage, HpaState, Physiology, StageParams, ACTH_BOUNDS, CORTISOL_BOUNDS,
    CRH_BOUNDS, GLAND_MASS_BOUNDS, GR_DENSITY_BOUNDS, MR_DENSITY_BOUNDS, STRESS_CEILING,
};

/// Per-step probability of an acute stressor.
const STRESS_EVENT_PROB: f64 = 0.02;
/// Stressor magnitudes and their cumulative selection probabilities.
const STRESS_EVENTS: [(f64, f64); 3] = [(2.0, 0.6), (5.0, 0.9), (8.0, 1.0)];
const STRESS_DECAY: f64 = 0.98;
const STRESS_RELIEF: f64 = 0.05;

const ULTRADIAN_AMPLITUDE: f64 = 3.0;
const ULTRADIAN_NOISE_STD: f64 = 0.5;

/// Why an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Stage step budget exhausted.
    MaxSteps,
}

/// Result of a single environment step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    /// The observation after taking the action.
    pub observation: Observation,
    /// `5 - allostatic load`.
    pub reward: f64,
    /// Whether the episode has terminated.
    pub done: bool,
    pub info: StepInfo,
}

/// Additional information returned from a step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepInfo {
    pub step: u64,
    pub termination_reason: Option<TerminationReason>,
    pub allostatic_load: f64,
    pub load_components: Option<LoadComponents>,
    pub cumulative_load: f64,
    pub crh: f64,
    pub acth: f64,
    pub cortisol: f64,
    pub stress: f64,
}

/// Configuration for one environment instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HpaEnvConfig {
    /// Simulated hours per step.
    pub time_step: f64,
    pub stage: DevelopmentalStage,
    pub physiology: Physiology,
    pub domain_rand: DomainRandConfig,
}

impl HpaEnvConfig {
    pub fn new(time_step: f64, stage: DevelopmentalStage) -> Self {
        Self {
            time_step,
            stage,
            physiology: Physiology::default(),
            domain_rand: DomainRandConfig::default(),
        }
    }

    /// No reset jitter (for deterministic tests).
    pub fn deterministic(time_step: f64, stage: DevelopmentalStage) -> Self {
        Self {
            domain_rand: DomainRandConfig::deterministic(),
            ..Self::new(time_step, stage)
        }
    }
}

/// HPA-axis simulator.
///
/// Holds no reference to the agent; the only coupling is the
/// observation/action/reward contract of `reset` and `step`.
#[derive(Debug, Clone)]
pub struct HpaEnv {
    config: HpaEnvConfig,
    params: StageParams,
    state: HpaState,
    step_count: u64,
    cumulative_load: f64,
    done: bool,
}

impl HpaEnv {
    /// Environment at `stage` advancing `time_step` hours per step.
    pub fn new(time_step: f64, stage: DevelopmentalStage) -> Self {
        Self::with_config(HpaEnvConfig::new(time_step, stage))
    }

    pub fn with_config(config: HpaEnvConfig) -> Self {
        let params = config.stage.params();
        let mut state = HpaState::default();
        state.fill_history(state.cortisol);
        Self {
            config,
            params,
            state,
            step_count: 0,
            cumulative_load: 0.0,
            done: false,
        }
    }

    /// Start a new episode. Returns the initial observation.
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Observation {
        let sample = self.config.domain_rand.sample(rng);

        let cortisol = clamp_to(sample.cortisol, CORTISOL_BOUNDS);
        self.state = HpaState {
            crh: clamp_to(sample.crh, CRH_BOUNDS),
            acth: clamp_to(sample.acth, ACTH_BOUNDS),
            cortisol,
            stress: sample.stress.clamp(0.0, STRESS_CEILING),
            time_of_day: sample.time_of_day,
            day: 0,
            ultradian_phase: sample.ultradian_phase,
            ..HpaState::default()
        };
        self.state.fill_history(cortisol);

        self.step_count = 0;
        self.cumulative_load = 0.0;
        self.done = false;

        self.observation()
    }

    /// Advance one time step under `action`.
    ///
    /// Stepping a finished episode returns the terminal observation with
    /// zero reward and leaves the state untouched.
    pub fn step<R: Rng + ?Sized>(&mut self, action: usize, rng: &mut R) -> Result<StepResult> {
        let modifiers = ActionModifiers::decode(action)?;

        if self.done {
            return Ok(StepResult {
                observation: self.observation(),
                reward: 0.0,
                done: true,
                info: self.step_info(Some(TerminationReason::MaxSteps), 0.0, None),
            });
        }

        let dt = self.config.time_step;
        let feedback = self.total_feedback();
        self.advance_hormones(&modifiers, feedback, dt, rng);

        let cortisol = self.state.cortisol;
        self.state.push_history(cortisol);

        self.adapt_glands(dt);
        self.adapt_receptors(dt);
        self.advance_clock(dt);
        self.advance_stress(rng);

        self.step_count += 1;
        let components =
            LoadComponents::from_state(&self.state, &self.config.physiology, &self.params);
        let load = components.total();
        self.cumulative_load += load;

        let termination_reason = self.check_termination();
        self.done = termination_reason.is_some();

        Ok(StepResult {
            observation: self.observation(),
            reward: components.reward(),
            done: self.done,
            info: self.step_info(termination_reason, load, Some(components)),
        })
    }

    pub fn observation(&self) -> Observation {
        Observation::from_state(&self.state, &self.config.physiology)
    }

    /// Current allostatic load without advancing the simulation.
    pub fn allostatic_load(&self) -> f64 {
        LoadComponents::from_state(&self.state, &self.config.physiology, &self.params).total()
    }

    /// Combined MR/GR negative feedback signal at current cortisol.
    fn total_feedback(&self) -> f64 {
        let (mr_occ, gr_occ) = self.config.physiology.receptor_occupancy(self.state.cortisol);
        let mr = self.params.mr_feedback_strength() * mr_occ * self.state.mr_density;
        let gr = self.params.gr_feedback_strength() * gr_occ * self.state.gr_density;
        (mr + gr) * self.params.receptor_sensitivity
    }

    /// Explicit Euler update of CRH, then ACTH, then cortisol.
    fn advance_hormones<R: Rng + ?Sized>(
        &mut self,
        m: &ActionModifiers,
        feedback: f64,
        dt: f64,
        rng: &mut R,
    ) {
        let p = &self.config.physiology;
        let s = &mut self.state;

        let crh_production = p.crh_basal + p.stress_to_crh * s.stress - p.crh_basal * feedback
            + m.crh * 20.0;
        s.crh = clamp_to(s.crh + (crh_production - p.k_crh * s.crh) * dt, CRH_BOUNDS);

        let crh_drive = 0.2 * (s.crh - p.crh_optimal);
        let acth_production = p.acth_basal * s.pituitary_mass + crh_drive
            - p.acth_basal * feedback * 0.5
            + m.acth * 10.0;
        s.acth = clamp_to(s.acth + (acth_production - p.k_acth * s.acth) * dt, ACTH_BOUNDS);

        let circadian = p.circadian_amplitude(s.time_of_day);
        s.ultradian_phase += 2.0 * PI * dt / p.ultradian_period;
        let ultradian = ULTRADIAN_AMPLITUDE * s.ultradian_phase.sin()
            + sample_normal(rng, 0.0, ULTRADIAN_NOISE_STD);
        let acth_drive = 0.15 * (s.acth - p.acth_optimal);

        let cortisol_production = (circadian / 12.0) * p.cortisol_basal
            + acth_drive * s.adrenal_mass
            + p.stress_to_cortisol * s.stress
            + ultradian * 0.3
            + m.cortisol * 2.0;
        s.cortisol = clamp_to(
            s.cortisol + (cortisol_production - p.k_cortisol * s.cortisol) * dt,
            CORTISOL_BOUNDS,
        );
    }

    fn adapt_glands(&mut self, dt: f64) {
        let p = &self.config.physiology;
        let s = &mut self.state;

        if s.acth > 40.0 {
            s.adrenal_mass += p.gland_growth_rate * dt;
        } else if s.acth < 15.0 {
            s.adrenal_mass -= p.gland_atrophy_rate * dt;
        }

        if s.cortisol > 25.0 {
            s.pituitary_mass -= p.gland_atrophy_rate * dt;
        } else if s.cortisol < 10.0 {
            s.pituitary_mass += p.gland_growth_rate * dt;
        }

        s.adrenal_mass = clamp_to(s.adrenal_mass, GLAND_MASS_BOUNDS);
        s.pituitary_mass = clamp_to(s.pituitary_mass, GLAND_MASS_BOUNDS);
    }

    fn adapt_receptors(&mut self, dt: f64) {
        let s = &mut self.state;
        if self.config.physiology.cortisol_nm(s.cortisol) > 100.0 {
            s.gr_density *= 1.0 - 0.0001 * dt;
            s.mr_density *= 1.0 - 0.00005 * dt;
        } else {
            s.gr_density += 0.0001 * dt * (1.0 - s.gr_density);
            s.mr_density += 0.00005 * dt * (1.0 - s.mr_density);
        }
        s.gr_density = clamp_to(s.gr_density, GR_DENSITY_BOUNDS);
        s.mr_density = clamp_to(s.mr_density, MR_DENSITY_BOUNDS);
    }

    fn advance_clock(&mut self, dt: f64) {
        let t = self.state.time_of_day + dt;
        self.state.day += (t / 24.0).floor() as u32;
        self.state.time_of_day = t.rem_euclid(24.0);
    }

    fn advance_stress<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let s = &mut self.state;
        s.stress = (s.stress * STRESS_DECAY - STRESS_RELIEF).max(0.0);

        if sample_bool(rng, STRESS_EVENT_PROB) {
            let u: f64 = rng.gen();
            let magnitude = STRESS_EVENTS
                .iter()
                .find(|(_, cumulative)| u < *cumulative)
                .map(|(m, _)| *m)
                .unwrap_or(STRESS_EVENTS[STRESS_EVENTS.len() - 1].0);
            s.stress = (s.stress + magnitude).min(STRESS_CEILING);
        }
    }

    fn check_termination(&self) -> Option<TerminationReason> {
        (self.step_count >= self.params.max_steps).then_some(TerminationReason::MaxSteps)
    }

    fn step_info(
        &self,
        termination_reason: Option<TerminationReason>,
        allostatic_load: f64,
        load_components: Option<LoadComponents>,
    ) -> StepInfo {
        StepInfo {
            step: self.step_count,
            termination_reason,
            allostatic_load,
            load_components,
            cumulative_load: self.cumulative_load,
            crh: self.state.crh,
            acth: self.state.acth,
            cortisol: self.state.cortisol,
            stress: self.state.stress,
        }
    }

    pub fn state(&self) -> &HpaState {
        &self.state
    }

    pub fn stage(&self) -> DevelopmentalStage {
        self.config.stage
    }

    pub fn params(&self) -> &StageParams {
        &self.params
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn max_steps(&self) -> u64 {
        self.params.max_steps
    }

    pub fn time_step(&self) -> f64 {
        self.config.time_step
    }

    pub fn cumulative_load(&self) -> f64 {
        self.cumulative_load
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}
