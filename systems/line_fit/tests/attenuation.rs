use optics_lab_system_line_fit::{ordinary_least_squares, total_least_squares, NoisyLine};

#[test]
fn total_least_squares_removes_attenuation_bias() {
    let line = NoisyLine {
        slope: 2.0,
        noise_x: 1.0,
        noise_y: 1.0,
        points: 4_000,
    };
    let observations = line.sample(42).expect("valid line");

    let ordinary = ordinary_least_squares(&observations.x, &observations.y).expect("fit");
    let total = total_least_squares(&observations.x, &observations.y).expect("fit");

    // var(x) ≈ 8.4 so the ordinary slope shrinks by about 8.4 / 9.4.
    assert!(ordinary.slope < 1.9, "ordinary slope {}", ordinary.slope);
    assert!((total.slope - 2.0).abs() < 0.1, "total slope {}", total.slope);
}

#[test]
fn without_abscissa_noise_both_fits_agree() {
    let line = NoisyLine {
        noise_x: 0.0,
        noise_y: 0.05,
        ..NoisyLine::default()
    };
    let observations = line.sample(7).expect("valid line");

    let ordinary = ordinary_least_squares(&observations.x, &observations.y).expect("fit");
    let total = total_least_squares(&observations.x, &observations.y).expect("fit");

    assert!((ordinary.slope - total.slope).abs() < 1e-3);
    assert!((ordinary.slope - 2.0).abs() < 0.01);
}

#[test]
fn identical_seeds_draw_identical_observations() {
    let line = NoisyLine::default();

    assert_eq!(line.sample(3), line.sample(3));
    assert_ne!(line.sample(3), line.sample(4));
}
