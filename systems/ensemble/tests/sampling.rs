use optics_lab_core::{SimulationParams, Twiss};
use optics_lab_system_ensemble::{rotation_for_tune, EnsembleSampler};

fn params(particle_count: usize) -> SimulationParams {
    SimulationParams {
        tune: 0.31,
        tune_spread: 0.01,
        kick: 0.0,
        emittance: 0.005,
        particle_count,
        ..SimulationParams::default()
    }
}

#[test]
fn identical_seeds_draw_identical_ensembles() {
    let params = params(500);
    let first = EnsembleSampler::from_seed(7).sample(&params, &Twiss::UPRIGHT);
    let second = EnsembleSampler::from_seed(7).sample(&params, &Twiss::UPRIGHT);
    assert_eq!(first, second, "ensemble draw diverged for the same seed");
}

#[test]
fn different_seeds_draw_different_ensembles() {
    let params = params(64);
    let first = EnsembleSampler::from_seed(1).sample(&params, &Twiss::UPRIGHT);
    let second = EnsembleSampler::from_seed(2).sample(&params, &Twiss::UPRIGHT);
    assert_ne!(first.positions(), second.positions());
}

#[test]
fn ensemble_size_matches_configuration() {
    let ensemble = EnsembleSampler::from_seed(3).sample(&params(123), &Twiss::UPRIGHT);
    assert_eq!(ensemble.len(), 123);
    assert_eq!(ensemble.rotations().len(), 123);
}

#[test]
fn every_rotation_is_norm_preserving() {
    let ensemble = EnsembleSampler::from_seed(11).sample(&params(1_000), &Twiss::UPRIGHT);
    for rotation in ensemble.rotations() {
        assert!((rotation.norm() - 1.0).abs() < 1e-12);
    }
}

#[test]
fn zero_tune_spread_shares_a_single_rotation() {
    let params = SimulationParams {
        tune_spread: 0.0,
        ..params(100)
    };
    let ensemble = EnsembleSampler::from_seed(5).sample(&params, &Twiss::UPRIGHT);
    let expected = rotation_for_tune(params.tune);
    for rotation in ensemble.rotations() {
        assert_eq!(*rotation, expected);
    }
}

#[test]
fn gaussian_draw_matches_emittance_statistics() {
    let params = params(20_000);
    let ensemble = EnsembleSampler::from_seed(99).sample(&params, &Twiss::UPRIGHT);
    let count = ensemble.len() as f64;

    let mean_u = ensemble.positions().iter().map(|z| z.re).sum::<f64>() / count;
    let mean_up = ensemble.positions().iter().map(|z| z.im).sum::<f64>() / count;
    let variance_u = ensemble
        .positions()
        .iter()
        .map(|z| (z.re - mean_u).powi(2))
        .sum::<f64>()
        / count;

    assert!(mean_u.abs() < 0.005, "mean u drifted: {mean_u}");
    assert!(mean_up.abs() < 0.005, "mean up drifted: {mean_up}");
    assert!(
        (variance_u - params.emittance).abs() < 0.1 * params.emittance,
        "variance {variance_u} far from emittance"
    );
}

#[test]
fn kick_offsets_mean_normalized_momentum() {
    let params = SimulationParams {
        kick: 0.1,
        ..params(20_000)
    };
    let twiss = Twiss::new(0.0, 2.25).expect("positive beta");
    let ensemble = EnsembleSampler::from_seed(17).sample(&params, &twiss);
    let count = ensemble.len() as f64;
    let mean_up = ensemble.positions().iter().map(|z| z.im).sum::<f64>() / count;

    // Normalized momentum scales the physical kick by sqrt(beta).
    assert!((mean_up - 0.15).abs() < 0.005, "mean up was {mean_up}");
}

#[test]
fn zero_emittance_collapses_onto_the_kick() {
    let params = SimulationParams {
        emittance: 0.0,
        kick: 0.05,
        ..params(10)
    };
    let ensemble = EnsembleSampler::from_seed(8).sample(&params, &Twiss::UPRIGHT);
    for position in ensemble.positions() {
        assert_eq!(position.re, 0.0);
        assert!((position.im - 0.05).abs() < 1e-15);
    }
}

#[test]
fn ellipse_points_stay_inside_the_twiss_ellipse() {
    let twiss = Twiss::new(-0.8, 0.5).expect("positive beta");
    let emittance = 0.005;
    let points = EnsembleSampler::from_seed(4).sample_ellipse(&twiss, emittance, 2_500);

    assert_eq!(points.len(), 2_500);
    let mut outer_half = 0;
    for point in &points {
        let invariant = twiss.gamma() * point.q * point.q
            + 2.0 * twiss.alpha() * point.q * point.p
            + twiss.beta() * point.p * point.p;
        assert!(invariant <= emittance * (1.0 + 1e-9), "{point:?} outside");
        if invariant > 0.5 * emittance {
            outer_half += 1;
        }
    }

    // Uniform filling puts half of the points outside the half-area ellipse.
    assert!((1_150..=1_350).contains(&outer_half), "{outer_half} in outer half");
}

#[test]
fn ellipse_draw_is_reproducible() {
    let twiss = Twiss::new(0.0, 0.5).expect("positive beta");
    let first = EnsembleSampler::from_seed(8).sample_ellipse(&twiss, 0.005, 100);
    let second = EnsembleSampler::from_seed(8).sample_ellipse(&twiss, 0.005, 100);

    assert_eq!(first, second);
}
