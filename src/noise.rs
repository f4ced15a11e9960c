//! Coherent noise used for the turbulence field.
//!
//! A [`NoiseField`] wraps an OpenSimplex generator and builds vector and
//! multi-octave samples on top of it. The field is a pure function of its
//! seed, so a run stays bit-reproducible.
//!
//! ```ignore
//! use ant_colony::noise::NoiseField;
//! use glam::DVec3;
//!
//! let field = NoiseField::new(0);
//! let swirl = field.turbulence_vector(DVec3::new(0.3, 1.2, 0.0), 2, false, 1.0, 10.0);
//! ```

use glam::DVec3;
use noise::{NoiseFn, OpenSimplex};

/// Per-channel sample offsets for [`NoiseField::noise_vector`].
const CHANNEL_OFFSETS: [DVec3; 3] = [
    DVec3::ZERO,
    DVec3::new(31.416, -47.853, 12.679),
    DVec3::new(-29.811, 5.127, 42.337),
];

/// Seeded 3D simplex noise field.
#[derive(Clone, Debug)]
pub struct NoiseField {
    noise: OpenSimplex,
}

impl NoiseField {
    pub fn new(seed: u32) -> Self {
        Self {
            noise: OpenSimplex::new(seed),
        }
    }

    /// Scalar noise. Continuous, deterministic and roughly in `[-1, 1]`.
    #[inline]
    pub fn simplex3(&self, p: DVec3) -> f64 {
        self.noise.get(p.to_array())
    }

    /// Three decorrelated channels sampled around `p`.
    pub fn noise_vector(&self, p: DVec3) -> DVec3 {
        DVec3::new(
            self.simplex3(p + CHANNEL_OFFSETS[0]),
            self.simplex3(p + CHANNEL_OFFSETS[1]),
            self.simplex3(p + CHANNEL_OFFSETS[2]),
        )
    }

    /// Multi-octave turbulence vector.
    ///
    /// Octave `i` samples `noise_vector(p * frequency_scale^i)` weighted by
    /// `amplitude_scale^(i + 1)`. With `hard` set each octave is folded with
    /// `abs`, giving ridged turbulence.
    ///
    /// An `amplitude_scale` of zero yields an exactly zero field.
    pub fn turbulence_vector(
        &self,
        p: DVec3,
        octaves: u32,
        hard: bool,
        amplitude_scale: f64,
        frequency_scale: f64,
    ) -> DVec3 {
        let mut sum = DVec3::ZERO;
        let mut amplitude = amplitude_scale;
        let mut frequency = 1.0;

        for _ in 0..octaves {
            if amplitude == 0.0 {
                break;
            }
            let mut octave = self.noise_vector(p * frequency);
            if hard {
                octave = octave.abs();
            }
            sum += octave * amplitude;
            amplitude *= amplitude_scale;
            frequency *= frequency_scale;
        }

        sum
    }
}

impl Default for NoiseField {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simplex_bounded() {
        let field = NoiseField::default();
        for i in 0..500 {
            let t = i as f64 * 0.173;
            let v = field.simplex3(DVec3::new(t, t * 0.7 - 3.0, 11.0 - t * 1.3));
            assert!(v.is_finite());
            assert!(v.abs() <= 1.25, "noise out of range: {}", v);
        }
    }

    #[test]
    fn test_simplex_deterministic() {
        let p = DVec3::new(1.25, -4.5, 0.333);
        let a = NoiseField::new(3);
        let b = NoiseField::new(3);
        assert_eq!(a.simplex3(p).to_bits(), b.simplex3(p).to_bits());
    }

    #[test]
    fn test_simplex_continuous() {
        let field = NoiseField::default();
        let p = DVec3::new(0.41, 2.7, -1.9);
        let a = field.simplex3(p);
        let b = field.simplex3(p + DVec3::splat(1e-6));
        assert!((a - b).abs() < 1e-3);
    }

    #[test]
    fn test_simplex_not_constant() {
        let field = NoiseField::default();
        let samples: Vec<f64> = (0..32)
            .map(|i| field.simplex3(DVec3::new(i as f64 * 0.37, 0.5, 0.25)))
            .collect();
        let min = samples.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(max - min > 0.1);
    }

    #[test]
    fn test_noise_vector_channels_differ() {
        let v = NoiseField::default().noise_vector(DVec3::new(0.3, 0.6, 0.9));
        assert!(v.x != v.y || v.y != v.z);
    }

    #[test]
    fn test_turbulence_zero_amplitude() {
        let v = NoiseField::default().turbulence_vector(DVec3::new(1.0, 2.0, 3.0), 2, false, 0.0, 10.0);
        assert_eq!(v, DVec3::ZERO);
    }

    #[test]
    fn test_turbulence_single_octave_matches_noise() {
        let field = NoiseField::default();
        let p = DVec3::new(-0.8, 0.15, 4.2);
        let v = field.turbulence_vector(p, 1, false, 1.0, 10.0);
        assert_eq!(v, field.noise_vector(p));
    }

    #[test]
    fn test_turbulence_hard_is_non_negative() {
        let v = NoiseField::default().turbulence_vector(DVec3::new(0.7, -0.2, 1.1), 2, true, 1.0, 10.0);
        assert!(v.x >= 0.0 && v.y >= 0.0 && v.z >= 0.0);
    }
}
