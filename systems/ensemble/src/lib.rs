#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic ensemble initialization for decoherence runs.
//!
//! Particles are drawn as a matched Gaussian beam in normalized phase space,
//! mapped to physical coordinates where the kick is applied, and mapped back.
//! Each particle also receives its own tune, stored as the unit complex number
//! that rotates its normalized coordinate by one turn.
//!
//! The sampler can also fill a Twiss ellipse uniformly, which is how the
//! ellipse itself is visualized for a given set of optics.

use std::f64::consts::TAU;

use num_complex::Complex64;
use optics_lab_core::{NormalizedPoint, PhysicalPoint, SimulationParams, Twiss};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

/// Freshly drawn particle states together with their one-turn rotations.
#[derive(Clone, Debug, PartialEq)]
pub struct Ensemble {
    positions: Vec<Complex64>,
    rotations: Vec<Complex64>,
}

impl Ensemble {
    /// Assembles an ensemble from explicit positions and rotations.
    ///
    /// Returns `None` when the two vectors differ in length.
    #[must_use]
    pub fn from_parts(positions: Vec<Complex64>, rotations: Vec<Complex64>) -> Option<Self> {
        if positions.len() != rotations.len() {
            return None;
        }
        Some(Self {
            positions,
            rotations,
        })
    }

    /// Normalized coordinates `u + i·up` of every particle.
    #[must_use]
    pub fn positions(&self) -> &[Complex64] {
        &self.positions
    }

    /// One-turn rotation operators `e^{i·2π·Q}` of every particle.
    #[must_use]
    pub fn rotations(&self) -> &[Complex64] {
        &self.rotations
    }

    /// Number of particles in the ensemble.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` when the ensemble holds no particles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Splits the ensemble into its position and rotation vectors.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Complex64>, Vec<Complex64>) {
        (self.positions, self.rotations)
    }
}

/// Seeded sampler that draws matched, kicked ensembles.
#[derive(Clone, Debug)]
pub struct EnsembleSampler {
    rng: ChaCha8Rng,
}

impl EnsembleSampler {
    /// Creates a sampler whose draws are fully determined by `seed`.
    #[must_use]
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Draws `params.particle_count` particles using the provided optics.
    ///
    /// Per particle the draw order is position, momentum, then tune, so a
    /// given seed yields the same ensemble regardless of how many particles
    /// follow it.
    pub fn sample(&mut self, params: &SimulationParams, twiss: &Twiss) -> Ensemble {
        let count = params.particle_count;
        let sigma = params.emittance.max(0.0).sqrt();
        let mut positions = Vec::with_capacity(count);
        let mut rotations = Vec::with_capacity(count);

        for _ in 0..count {
            let u = sigma * self.standard_normal();
            let up = sigma * self.standard_normal();
            positions.push(kicked_position(
                NormalizedPoint::new(u, up),
                twiss,
                params.kick,
            ));

            let tune = params.tune + params.tune_spread * self.standard_normal();
            rotations.push(rotation_for_tune(tune));
        }

        Ensemble {
            positions,
            rotations,
        }
    }

    /// Draws `count` points spread uniformly over the phase-space ellipse
    /// `γq² + 2αqp + βp² ≤ emittance` of the provided optics.
    ///
    /// Each point draws its angle before its radius.
    pub fn sample_ellipse(
        &mut self,
        twiss: &Twiss,
        emittance: f64,
        count: usize,
    ) -> Vec<PhysicalPoint> {
        let radius = emittance.max(0.0).sqrt();
        (0..count)
            .map(|_| {
                let angle = TAU * self.rng.gen::<f64>();
                let scale = radius * self.rng.gen::<f64>().sqrt();
                let (sin, cos) = angle.sin_cos();
                twiss.to_physical(NormalizedPoint::new(scale * cos, scale * sin))
            })
            .collect()
    }

    fn standard_normal(&mut self) -> f64 {
        self.rng.sample(StandardNormal)
    }
}

/// Applies a momentum kick to a normalized coordinate and returns the result
/// as a complex normalized state.
#[must_use]
pub fn kicked_position(normalized: NormalizedPoint, twiss: &Twiss, kick: f64) -> Complex64 {
    let physical = twiss.to_physical(normalized);
    let kicked = PhysicalPoint::new(physical.q, physical.p + kick);
    let renormalized = twiss.to_normalized(kicked);
    Complex64::new(renormalized.u, renormalized.up)
}

/// Unit complex number that advances the phase by one turn at the given tune.
#[must_use]
pub fn rotation_for_tune(tune: f64) -> Complex64 {
    let omega = TAU * tune;
    Complex64::new(omega.cos(), omega.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_has_unit_modulus() {
        for &tune in &[0.0, 0.31, -0.17, 1.25, 42.001] {
            let rotation = rotation_for_tune(tune);
            assert!((rotation.norm() - 1.0).abs() < 1e-12, "tune {tune}");
        }
    }

    #[test]
    fn quarter_tune_rotates_by_right_angle() {
        let rotated = Complex64::new(1.0, 0.0) * rotation_for_tune(0.25);
        assert!(rotated.re.abs() < 1e-12);
        assert!((rotated.im - 1.0).abs() < 1e-12);
    }

    #[test]
    fn kick_shifts_normalized_momentum_by_sqrt_beta() {
        let twiss = Twiss::new(0.0, 4.0).expect("positive beta");
        let position = kicked_position(NormalizedPoint::new(0.0, 0.0), &twiss, 0.1);
        assert!(position.re.abs() < 1e-12);
        assert!((position.im - 0.2).abs() < 1e-12);
    }

    #[test]
    fn kick_is_exact_for_tilted_optics() {
        let twiss = Twiss::new(1.5, 2.0).expect("positive beta");
        let start = NormalizedPoint::new(0.03, -0.02);
        let position = kicked_position(start, &twiss, 0.0);
        assert!((position.re - start.u).abs() < 1e-12);
        assert!((position.im - start.up).abs() < 1e-12);
    }

    #[test]
    fn parts_must_have_matching_lengths() {
        let positions = vec![Complex64::new(0.0, 0.0); 3];
        let rotations = vec![Complex64::new(1.0, 0.0); 2];
        assert!(Ensemble::from_parts(positions.clone(), rotations).is_none());
        let ensemble =
            Ensemble::from_parts(positions, vec![Complex64::new(1.0, 0.0); 3]).expect("match");
        assert_eq!(ensemble.len(), 3);
        assert!(!ensemble.is_empty());
    }
}
