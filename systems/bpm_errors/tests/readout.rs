use glam::DVec2;
use optics_lab_system_bpm_errors::{BetatronSignal, BpmBench, BpmErrors, DEFAULT_TURNS};

fn bench(seed: u64) -> BpmBench {
    BpmBench::new(
        BetatronSignal::HORIZONTAL,
        BetatronSignal::VERTICAL,
        DEFAULT_TURNS,
        seed,
    )
}

#[test]
fn ideal_monitor_reports_the_beam() {
    let readings = bench(3).read(&BpmErrors::default()).expect("valid errors");

    assert_eq!(readings.len(), DEFAULT_TURNS);
    for reading in readings {
        assert_eq!(reading.measured, reading.truth, "turn {}", reading.turn);
    }
}

#[test]
fn pure_tilt_preserves_the_orbit_amplitude() {
    let errors = BpmErrors {
        tilt: 0.3,
        ..BpmErrors::default()
    };

    for reading in bench(3).read(&errors).expect("valid errors") {
        let before = reading.truth.length();
        let after = reading.measured.length();
        assert!((before - after).abs() < 1e-12, "turn {}", reading.turn);
    }
}

#[test]
fn noise_realization_persists_across_error_edits() {
    let bench = bench(11);
    let noisy = BpmErrors {
        noise_x: 0.01,
        noise_y: 0.02,
        ..BpmErrors::default()
    };
    let with_gain = BpmErrors {
        gain_x: 0.05,
        ..noisy
    };

    let first = bench.read(&noisy).expect("valid errors");
    let again = bench.read(&noisy).expect("valid errors");
    let gained = bench.read(&with_gain).expect("valid errors");

    assert_eq!(first, again);
    for (plain, gained) in first.iter().zip(&gained) {
        let shift = gained.measured - plain.measured;
        assert!((shift.x - 0.05 * plain.truth.x).abs() < 1e-12);
        assert!(shift.y.abs() < 1e-12);
    }
}

#[test]
fn resampling_draws_a_new_realization() {
    let mut bench = bench(5);
    let original = bench.noise().clone();
    assert_eq!(original.len(), DEFAULT_TURNS);
    assert!(!original.is_empty());

    bench.resample();

    assert_ne!(bench.noise(), &original);
    assert_eq!(bench.noise().len(), DEFAULT_TURNS);
}

#[test]
fn identical_seeds_replay_identically() {
    let mut first = bench(9);
    let mut second = bench(9);
    first.resample();
    second.resample();

    assert_eq!(first.noise(), second.noise());
}

#[test]
fn noise_amplitude_sets_reading_spread() {
    let turns = 20_000;
    let bench = BpmBench::new(
        BetatronSignal::HORIZONTAL,
        BetatronSignal::VERTICAL,
        turns,
        17,
    );
    let errors = BpmErrors {
        noise_x: 0.02,
        noise_y: 0.005,
        ..BpmErrors::default()
    };

    let readings = bench.read(&errors).expect("valid errors");
    let rms = |select: fn(DVec2) -> f64| {
        let sum: f64 = readings
            .iter()
            .map(|reading| select(reading.difference()).powi(2))
            .sum();
        (sum / turns as f64).sqrt()
    };

    assert!((rms(|d| d.x) - 0.02).abs() < 0.001);
    assert!((rms(|d| d.y) - 0.005).abs() < 0.00025);
}
