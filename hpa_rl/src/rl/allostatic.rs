// src/rl/allostatic.rs
//
// Allostatic load: the per-step physiological cost of the current state.
//
// Each penalty is kept as its own component so telemetry can reconstruct
// the total. Reward is `REWARD_OFFSET - total()`.

use serde::{Deserialize, Serialize};

use super::physiology::{HpaState, Physiology, StageParams};

/// Reward offset; a perfectly regulated step earns slightly under this.
pub const REWARD_OFFSET: f64 = 5.0;

const BASAL_COST: f64 = 0.05;

const HYPER_THRESHOLD: f64 = 25.0;
const HYPER_CRISIS_THRESHOLD: f64 = 35.0;
const HYPO_THRESHOLD: f64 = 5.0;
const HYPO_CRISIS_THRESHOLD: f64 = 2.0;

const MR_OCCUPANCY_OPTIMAL: f64 = 0.8;
const GR_OCCUPANCY_OPTIMAL_STRESSED: f64 = 0.7;
const GR_OCCUPANCY_OPTIMAL_CALM: f64 = 0.3;

const VARIANCE_THRESHOLD: f64 = 25.0;

/// Breakdown of one step's allostatic load, before the vulnerability scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadComponents {
    pub basal: f64,
    pub cortisol_deviation: f64,
    /// Hyper/hypocortisolism damage, including crisis terms.
    pub tissue_damage: f64,
    pub acth_dysregulation: f64,
    pub crh_dysregulation: f64,
    pub mr_dysfunction: f64,
    pub gr_dysfunction: f64,
    pub receptor_downregulation: f64,
    pub gland_pathology: f64,
    pub instability: f64,
    pub stress_response: f64,
    /// `2 - stress_resilience`.
    pub vulnerability: f64,
}

impl LoadComponents {
    /// Evaluate every penalty against the current state. Pure.
    pub fn from_state(state: &HpaState, physiology: &Physiology, stage: &StageParams) -> Self {
        let cortisol = state.cortisol;
        let (mr_occ, gr_occ) = physiology.receptor_occupancy(cortisol);

        let dev = cortisol - physiology.cortisol_optimal;
        let tol = physiology.cortisol_tolerance;
        let cortisol_deviation = if dev.abs() <= tol {
            0.01 * (dev / tol).powi(2)
        } else {
            0.5 * ((dev.abs() - tol) / tol).powi(2)
        };

        let mut tissue_damage = 0.0;
        if cortisol > HYPER_THRESHOLD {
            tissue_damage += (cortisol - HYPER_THRESHOLD) * 0.3;
            if cortisol > HYPER_CRISIS_THRESHOLD {
                tissue_damage += ((cortisol - HYPER_CRISIS_THRESHOLD) / 10.0).powi(2) * 2.0;
            }
        } else if cortisol < HYPO_THRESHOLD {
            tissue_damage += (HYPO_THRESHOLD - cortisol) * 0.7;
            if cortisol < HYPO_CRISIS_THRESHOLD {
                tissue_damage += ((HYPO_CRISIS_THRESHOLD - cortisol) / 2.0).powi(2) * 5.0;
            }
        }

        let acth_dysregulation = band_penalty(
            state.acth,
            physiology.acth_optimal,
            physiology.acth_tolerance,
            0.02,
        );
        let crh_dysregulation = band_penalty(
            state.crh,
            physiology.crh_optimal,
            physiology.crh_tolerance,
            0.01,
        );

        let gr_optimal = if state.stress > 5.0 {
            GR_OCCUPANCY_OPTIMAL_STRESSED
        } else {
            GR_OCCUPANCY_OPTIMAL_CALM
        };
        let mr_dysfunction = 0.5 * (mr_occ - MR_OCCUPANCY_OPTIMAL).powi(2);
        let gr_dysfunction = 0.3 * (gr_occ - gr_optimal).powi(2);

        let receptor_downregulation =
            0.5 * ((1.0 - state.gr_density).powi(2) + (1.0 - state.mr_density).powi(2));

        let gland_pathology =
            0.3 * (gland_penalty(state.adrenal_mass) + gland_penalty(state.pituitary_mass));

        let variance = state.recent_variance();
        let instability = if variance > VARIANCE_THRESHOLD {
            (variance - VARIANCE_THRESHOLD) / 100.0
        } else {
            0.0
        };

        let stress_response = if state.stress > 6.0 {
            let expected = 20.0 + state.stress * 2.0;
            let miss = (cortisol - expected).abs();
            if miss > 10.0 {
                0.5 * (miss / 10.0).powi(2)
            } else {
                0.0
            }
        } else if state.stress < 2.0 && cortisol > HYPER_THRESHOLD {
            0.3 * ((cortisol - HYPER_THRESHOLD) / 10.0).powi(2)
        } else {
            0.0
        };

        Self {
            basal: BASAL_COST,
            cortisol_deviation,
            tissue_damage,
            acth_dysregulation,
            crh_dysregulation,
            mr_dysfunction,
            gr_dysfunction,
            receptor_downregulation,
            gland_pathology,
            instability,
            stress_response,
            vulnerability: stage.vulnerability(),
        }
    }

    /// Sum of all penalties before the vulnerability multiplier.
    pub fn raw_total(&self) -> f64 {
        self.basal
            + self.cortisol_deviation
            + self.tissue_damage
            + self.acth_dysregulation
            + self.crh_dysregulation
            + self.mr_dysfunction
            + self.gr_dysfunction
            + self.receptor_downregulation
            + self.gland_pathology
            + self.instability
            + self.stress_response
    }

    pub fn total(&self) -> f64 {
        self.raw_total() * self.vulnerability
    }

    pub fn reward(&self) -> f64 {
        REWARD_OFFSET - self.total()
    }
}

/// Quadratic penalty on the excess beyond a tolerance band.
fn band_penalty(value: f64, optimal: f64, tolerance: f64, weight: f64) -> f64 {
    let deviation = (value - optimal).abs();
    if deviation > tolerance {
        weight * ((deviation - tolerance) / tolerance).powi(2)
    } else {
        0.0
    }
}

fn gland_penalty(mass: f64) -> f64 {
    let base = (mass - 1.0).powi(2);
    if !(0.5..=1.5).contains(&mass) {
        base * 3.0
    } else {
        base
    }
}

/// Total allostatic load of `state`.
pub fn allostatic_load(state: &HpaState, physiology: &Physiology, stage: &StageParams) -> f64 {
    LoadComponents::from_state(state, physiology, stage).total()
}
