// src/rl/action_encoding.rs
//
// Discrete action space of the HPA environment.
//
// An action index is decomposed into base-3 digits, each shifted by -1 so
// that 0/1/2 mean decrease/hold/increase:
// - digit 0 (a % 3):       CRH production modifier, scale 0.3
// - digit 1 ((a / 3) % 3): ACTH production modifier, scale 0.5
// - digit 2 ((a / 9) % 3): cortisol production modifier, scale 0.8
//
// With nine actions the third digit is always 0, so every action carries
// the decreasing cortisol modifier. Action 4 holds CRH and ACTH.

use serde::{Deserialize, Serialize};

use crate::error::{HpaError, Result};

/// Current action encoding version.
pub const ACTION_VERSION: u32 = 1;

/// Number of discrete actions.
pub const ACTION_COUNT: usize = 9;

/// Action that leaves CRH and ACTH production unmodified.
pub const HOLD_ACTION: usize = 4;

const CRH_SCALE: f64 = 0.3;
const ACTH_SCALE: f64 = 0.5;
const CORTISOL_SCALE: f64 = 0.8;

/// Production modifiers applied by one action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionModifiers {
    pub crh: f64,
    pub acth: f64,
    pub cortisol: f64,
}

impl ActionModifiers {
    /// Decode an action index. Fails for indices outside `[0, ACTION_COUNT)`.
    pub fn decode(action: usize) -> Result<Self> {
        if action >= ACTION_COUNT {
            return Err(HpaError::InvalidAction(action));
        }
        Ok(Self {
            crh: ternary_digit(action, 0) * CRH_SCALE,
            acth: ternary_digit(action, 1) * ACTH_SCALE,
            cortisol: ternary_digit(action, 2) * CORTISOL_SCALE,
        })
    }
}

/// Base-3 digit `position` of `action`, offset to {-1, 0, 1}.
fn ternary_digit(action: usize, position: u32) -> f64 {
    ((action / 3usize.pow(position)) % 3) as f64 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_action_leaves_crh_and_acth() {
        let m = ActionModifiers::decode(HOLD_ACTION).unwrap();
        assert_eq!(m.crh, 0.0);
        assert_eq!(m.acth, 0.0);
    }

    #[test]
    fn test_digit_decomposition() {
        let m0 = ActionModifiers::decode(0).unwrap();
        assert!((m0.crh + 0.3).abs() < 1e-12);
        assert!((m0.acth + 0.5).abs() < 1e-12);

        let m8 = ActionModifiers::decode(8).unwrap();
        assert!((m8.crh - 0.3).abs() < 1e-12);
        assert!((m8.acth - 0.5).abs() < 1e-12);

        let m5 = ActionModifiers::decode(5).unwrap();
        assert!((m5.crh - 0.3).abs() < 1e-12);
        assert_eq!(m5.acth, 0.0);
    }

    #[test]
    fn test_cortisol_digit_constant_over_action_space() {
        for a in 0..ACTION_COUNT {
            let m = ActionModifiers::decode(a).unwrap();
            assert!((m.cortisol + 0.8).abs() < 1e-12);
        }
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            ActionModifiers::decode(9),
            Err(HpaError::InvalidAction(9))
        ));
    }
}
