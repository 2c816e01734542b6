//! Seeded noise built on SplitMix64.
//!
//! Each draw is a pure function of `(seed, stream, index)`, so datasets stay
//! identical across platforms and test orderings.

use crate::{Real, Vec3};

/// Uniform noise in `[-max_abs, +max_abs]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UniformNoise {
    pub seed: u64,
    pub max_abs: Real,
}

impl UniformNoise {
    pub fn new(seed: u64, max_abs: Real) -> Self {
        Self { seed, max_abs }
    }

    /// Scalar draw for `(stream, index)`.
    pub fn sample(&self, stream: usize, index: usize) -> Real {
        let max_abs = self.max_abs.abs();
        if max_abs == 0.0 {
            return 0.0;
        }
        let u = unit_f64(splitmix64(mix_key(self.seed, stream, index)));
        (u - 0.5) * 2.0 * max_abs
    }

    /// Three independent draws for `(stream, index)`.
    pub fn sample_vec3(&self, stream: usize, index: usize) -> Vec3 {
        Vec3::new(
            self.sample(stream, 3 * index),
            self.sample(stream, 3 * index + 1),
            self.sample(stream, 3 * index + 2),
        )
    }
}

fn mix_key(seed: u64, stream: usize, index: usize) -> u64 {
    seed ^ (stream as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (index as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Map the top 53 bits to `[0, 1)`.
fn unit_f64(x: u64) -> f64 {
    (x >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
}
