// src/rl/observation.rs
//
// Versioned observation schema for the HPA environment.
//
// Twelve normalised features in a fixed order; the agent only ever sees
// the flat `StateVector` produced by `to_features()`.

use serde::{Deserialize, Serialize};

use super::physiology::{HpaState, Physiology};

/// Current observation schema version.
/// Increment when adding/removing/reordering features.
pub const OBS_VERSION: u32 = 1;

/// Number of observation features.
pub const STATE_DIM: usize = 12;

/// Flat observation as consumed by the agent.
pub type StateVector = [f64; STATE_DIM];

/// Feature names in vector order.
pub const FEATURE_NAMES: [&str; STATE_DIM] = [
    "stress",
    "crh",
    "acth",
    "cortisol",
    "time_of_day",
    "cortisol_trend",
    "circadian_amplitude",
    "mr_occupancy",
    "gr_occupancy",
    "pituitary_mass",
    "adrenal_mass",
    "day",
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// stress / 10
    pub stress: f64,
    /// CRH / 300
    pub crh: f64,
    /// ACTH / 100
    pub acth: f64,
    /// cortisol / 40
    pub cortisol: f64,
    /// hour / 24
    pub time_of_day: f64,
    /// (cortisol - mean of 50-sample history) / 10
    pub cortisol_trend: f64,
    /// circadian drive / 20
    pub circadian_amplitude: f64,
    pub mr_occupancy: f64,
    pub gr_occupancy: f64,
    /// mass / 2
    pub pituitary_mass: f64,
    /// mass / 2
    pub adrenal_mass: f64,
    /// day / 10
    pub day: f64,
}

impl Observation {
    /// Build the observation from the current physiological state.
    pub fn from_state(state: &HpaState, physiology: &Physiology) -> Self {
        let (mr_occupancy, gr_occupancy) = physiology.receptor_occupancy(state.cortisol);

        Self {
            stress: state.stress / 10.0,
            crh: state.crh / 300.0,
            acth: state.acth / 100.0,
            cortisol: state.cortisol / 40.0,
            time_of_day: state.time_of_day / 24.0,
            cortisol_trend: (state.cortisol - state.history_mean()) / 10.0,
            circadian_amplitude: physiology.circadian_amplitude(state.time_of_day) / 20.0,
            mr_occupancy,
            gr_occupancy,
            pituitary_mass: state.pituitary_mass / 2.0,
            adrenal_mass: state.adrenal_mass / 2.0,
            day: state.day as f64 / 10.0,
        }
    }

    pub fn to_features(&self) -> StateVector {
        [
            self.stress,
            self.crh,
            self.acth,
            self.cortisol,
            self.time_of_day,
            self.cortisol_trend,
            self.circadian_amplitude,
            self.mr_occupancy,
            self.gr_occupancy,
            self.pituitary_mass,
            self.adrenal_mass,
            self.day,
        ]
    }

    pub fn from_features(f: &StateVector) -> Self {
        Self {
            stress: f[0],
            crh: f[1],
            acth: f[2],
            cortisol: f[3],
            time_of_day: f[4],
            cortisol_trend: f[5],
            circadian_amplitude: f[6],
            mr_occupancy: f[7],
            gr_occupancy: f[8],
            pituitary_mass: f[9],
            adrenal_mass: f[10],
            day: f[11],
        }
    }
}
