// src/rl/physiology.rs
//
// Physiological constants, developmental stage presets and the mutable
// HPA-axis state record.
//
// - Physiology: fixed kinetic/binding/set-point constants
// - DevelopmentalStage / StageParams: child, adolescent, adult presets
// - HpaState: hormones, gland masses, receptors, stress, clock, history
//
// Concentrations: CRH in pg/mL, ACTH in pg/mL, cortisol in µg/dL.

use std::f64::consts::{LN_2, PI};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Length of the circular cortisol history.
pub const HISTORY_LEN: usize = 50;

/// Number of recent history samples used for the instability penalty.
pub const VARIANCE_WINDOW: usize = 10;

/// Inclusive (min, max) bounds applied after every update.
pub const CRH_BOUNDS: (f64, f64) = (0.0, 400.0);
pub const ACTH_BOUNDS: (f64, f64) = (0.0, 200.0);
pub const CORTISOL_BOUNDS: (f64, f64) = (0.0, 60.0);
pub const GLAND_MASS_BOUNDS: (f64, f64) = (0.5, 2.0);
pub const GR_DENSITY_BOUNDS: (f64, f64) = (0.3, 1.5);
pub const MR_DENSITY_BOUNDS: (f64, f64) = (0.5, 1.2);
pub const STRESS_CEILING: f64 = 10.0;

/// Kinetic, binding and set-point constants of the simulated axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Physiology {
    // ----- Clearance (per hour) -----
    pub k_cortisol: f64,
    pub k_acth: f64,
    pub k_crh: f64,

    // ----- Secretion -----
    pub crh_basal: f64,
    pub acth_basal: f64,
    pub cortisol_basal: f64,
    pub stress_to_crh: f64,
    pub stress_to_cortisol: f64,

    // ----- Receptor binding (nM) -----
    pub mr_kd: f64,
    pub gr_kd: f64,
    /// µg/dL to nM conversion for cortisol.
    pub cortisol_nm_per_ug_dl: f64,

    // ----- Chronic adaptation (per hour) -----
    pub gland_growth_rate: f64,
    pub gland_atrophy_rate: f64,

    // ----- Set-points -----
    pub cortisol_optimal: f64,
    pub acth_optimal: f64,
    pub crh_optimal: f64,
    pub cortisol_tolerance: f64,
    pub acth_tolerance: f64,
    pub crh_tolerance: f64,

    /// Ultradian pulse period in hours.
    pub ultradian_period: f64,
}

impl Default for Physiology {
    fn default() -> Self {
        Self {
            k_cortisol: LN_2 / 1.25,
            k_acth: LN_2 / 0.17,
            k_crh: LN_2 / 0.25,

            crh_basal: 50.0,
            acth_basal: 15.0,
            cortisol_basal: 8.0,
            stress_to_crh: 10.0,
            stress_to_cortisol: 2.0,

            mr_kd: 0.5,
            gr_kd: 5.0,
            cortisol_nm_per_ug_dl: 27.6,

            gland_growth_rate: 0.001,
            gland_atrophy_rate: 0.0008,

            cortisol_optimal: 15.0,
            acth_optimal: 25.0,
            crh_optimal: 100.0,
            cortisol_tolerance: 7.0,
            acth_tolerance: 15.0,
            crh_tolerance: 50.0,

            ultradian_period: 1.5,
        }
    }
}

impl Physiology {
    pub fn cortisol_nm(&self, cortisol_ug_dl: f64) -> f64 {
        cortisol_ug_dl * self.cortisol_nm_per_ug_dl
    }

    /// Saturation binding `nM / (Kd + nM)` for (MR, GR).
    pub fn receptor_occupancy(&self, cortisol_ug_dl: f64) -> (f64, f64) {
        let nm = self.cortisol_nm(cortisol_ug_dl);
        (nm / (self.mr_kd + nm), nm / (self.gr_kd + nm))
    }

    /// Circadian cortisol drive, peaking at 08:00.
    pub fn circadian_amplitude(&self, time_of_day: f64) -> f64 {
        9.0 + 9.0 * (2.0 * PI * (time_of_day - 8.0) / 24.0).cos()
    }
}

/// Maturational stage of the simulated organism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevelopmentalStage {
    Child,
    Adolescent,
    Adult,
}

impl DevelopmentalStage {
    pub const ALL: [DevelopmentalStage; 3] = [
        DevelopmentalStage::Child,
        DevelopmentalStage::Adolescent,
        DevelopmentalStage::Adult,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DevelopmentalStage::Child => "child",
            DevelopmentalStage::Adolescent => "adolescent",
            DevelopmentalStage::Adult => "adult",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            DevelopmentalStage::Child => 0,
            DevelopmentalStage::Adolescent => 1,
            DevelopmentalStage::Adult => 2,
        }
    }

    /// Parameter preset for this stage.
    pub fn params(&self) -> StageParams {
        match self {
            DevelopmentalStage::Child => StageParams {
                max_steps: 240,
                feedback_maturity: 0.4,
                receptor_sensitivity: 0.6,
                stress_resilience: 0.5,
            },
            DevelopmentalStage::Adolescent => StageParams {
                max_steps: 720,
                feedback_maturity: 0.9,
                receptor_sensitivity: 0.95,
                stress_resilience: 0.85,
            },
            DevelopmentalStage::Adult => StageParams {
                max_steps: 2400,
                feedback_maturity: 1.0,
                receptor_sensitivity: 1.0,
                stress_resilience: 1.0,
            },
        }
    }
}

impl fmt::Display for DevelopmentalStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DevelopmentalStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "child" => Ok(DevelopmentalStage::Child),
            "adolescent" | "teen" => Ok(DevelopmentalStage::Adolescent),
            "adult" => Ok(DevelopmentalStage::Adult),
            other => Err(format!("unknown developmental stage {other:?}")),
        }
    }
}

/// Stage-dependent parameters fixed at environment initialisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageParams {
    /// Episode length in steps.
    pub max_steps: u64,
    /// Scales MR/GR negative feedback strength.
    pub feedback_maturity: f64,
    pub receptor_sensitivity: f64,
    /// Vulnerability multiplier is `2 - stress_resilience`.
    pub stress_resilience: f64,
}

impl StageParams {
    pub fn mr_feedback_strength(&self) -> f64 {
        0.3 * self.feedback_maturity
    }

    pub fn gr_feedback_strength(&self) -> f64 {
        0.7 * self.feedback_maturity
    }

    pub fn vulnerability(&self) -> f64 {
        2.0 - self.stress_resilience
    }
}

/// Mutable physiological state of one simulated organism.
#[derive(Debug, Clone, PartialEq)]
pub struct HpaState {
    pub crh: f64,
    pub acth: f64,
    pub cortisol: f64,

    pub pituitary_mass: f64,
    pub adrenal_mass: f64,

    pub gr_density: f64,
    pub mr_density: f64,

    /// Stress level in [0, STRESS_CEILING].
    pub stress: f64,
    /// Hours since midnight, [0, 24).
    pub time_of_day: f64,
    pub day: u32,
    pub ultradian_phase: f64,

    pub history: [f64; HISTORY_LEN],
    /// Next write slot in `history`.
    pub history_index: usize,
}

impl Default for HpaState {
    fn default() -> Self {
        Self {
            crh: 100.0,
            acth: 25.0,
            cortisol: 12.0,
            pituitary_mass: 1.0,
            adrenal_mass: 1.0,
            gr_density: 1.0,
            mr_density: 1.0,
            stress: 0.0,
            time_of_day: 8.0,
            day: 0,
            ultradian_phase: 0.0,
            history: [12.0; HISTORY_LEN],
            history_index: 0,
        }
    }
}

impl HpaState {
    pub fn push_history(&mut self, cortisol: f64) {
        self.history[self.history_index] = cortisol;
        self.history_index = (self.history_index + 1) % HISTORY_LEN;
    }

    pub fn fill_history(&mut self, cortisol: f64) {
        self.history = [cortisol; HISTORY_LEN];
        self.history_index = 0;
    }

    pub fn history_mean(&self) -> f64 {
        self.history.iter().sum::<f64>() / HISTORY_LEN as f64
    }

    /// Population variance of the `VARIANCE_WINDOW` most recent samples.
    pub fn recent_variance(&self) -> f64 {
        let recent: Vec<f64> = (1..=VARIANCE_WINDOW)
            .map(|back| self.history[(self.history_index + HISTORY_LEN - back) % HISTORY_LEN])
            .collect();
        let mean = recent.iter().sum::<f64>() / VARIANCE_WINDOW as f64;
        recent.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / VARIANCE_WINDOW as f64
    }

    /// True when every clamped quantity lies within its documented range.
    pub fn within_bounds(&self) -> bool {
        let inside = |v: f64, (lo, hi): (f64, f64)| v >= lo && v <= hi;
        inside(self.crh, CRH_BOUNDS)
            && inside(self.acth, ACTH_BOUNDS)
            && inside(self.cortisol, CORTISOL_BOUNDS)
            && inside(self.pituitary_mass, GLAND_MASS_BOUNDS)
            && inside(self.adrenal_mass, GLAND_MASS_BOUNDS)
            && inside(self.gr_density, GR_DENSITY_BOUNDS)
            && inside(self.mr_density, MR_DENSITY_BOUNDS)
            && (0.0..=STRESS_CEILING).contains(&self.stress)
    }
}

pub(crate) fn clamp_to(value: f64, (lo, hi): (f64, f64)) -> f64 {
    value.clamp(lo, hi)
}
