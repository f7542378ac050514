// src/rl/state_key.rs
//
// Coarse tiling of the continuous observation space.
//
// Each feature is scaled by 10 and rounded to the nearest integer, so
// observations closer than 0.05 per feature share a key.

use serde::{Deserialize, Serialize};

use super::observation::{StateVector, STATE_DIM};

const FNV_OFFSET: u32 = 2_166_136_261;
const FNV_PRIME: u32 = 16_777_619;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey(pub [i32; STATE_DIM]);

impl StateKey {
    pub fn from_state(state: &StateVector) -> Self {
        let mut key = [0i32; STATE_DIM];
        for (k, x) in key.iter_mut().zip(state.iter()) {
            // Saturating cast; NaN maps to 0.
            *k = (x * 10.0).round() as i32;
        }
        StateKey(key)
    }

    pub fn components(&self) -> &[i32; STATE_DIM] {
        &self.0
    }

    /// FNV-1a over the raw 32-bit components.
    pub fn fnv1a(&self) -> u32 {
        self.0.iter().fold(FNV_OFFSET, |h, &v| {
            (h ^ v as u32).wrapping_mul(FNV_PRIME)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_rounds_to_nearest_tenth() {
        let mut s = [0.0; STATE_DIM];
        s[0] = 0.34;
        s[1] = 0.35;
        s[2] = -0.35;
        s[3] = 1.04;
        let k = StateKey::from_state(&s);
        assert_eq!(k.0[0], 3);
        assert_eq!(k.0[1], 4);
        assert_eq!(k.0[2], -4);
        assert_eq!(k.0[3], 10);
    }

    #[test]
    fn test_nearby_states_collide() {
        let a = [0.51; STATE_DIM];
        let b = [0.54; STATE_DIM];
        assert_eq!(StateKey::from_state(&a), StateKey::from_state(&b));
        assert_eq!(StateKey::from_state(&a).fnv1a(), StateKey::from_state(&b).fnv1a());
    }

    #[test]
    fn test_rediscretization_is_stable() {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        for _ in 0..1000 {
            let mut s = [0.0; STATE_DIM];
            for x in s.iter_mut() {
                *x = rng.gen_range(-5.0..5.0);
            }
            let k = StateKey::from_state(&s);
            let mut back = [0.0; STATE_DIM];
            for (b, v) in back.iter_mut().zip(k.0.iter()) {
                *b = *v as f64 / 10.0;
            }
            assert_eq!(StateKey::from_state(&back), k);
        }
    }

    #[test]
    fn test_fnv1a_known_value() {
        // All-zero key: basis multiplied by prime twelve times.
        let mut h = FNV_OFFSET;
        for _ in 0..STATE_DIM {
            h = h.wrapping_mul(FNV_PRIME);
        }
        assert_eq!(StateKey([0; STATE_DIM]).fnv1a(), h);
        assert_ne!(StateKey([1; STATE_DIM]).fnv1a(), h);
    }
}
