use optics_lab_system_ir_optics::{reconstruct_waist, IrOpticsError, MonitorErrors, Waist};

const TOLERANCE: f64 = 1e-9;

#[test]
fn exact_monitor_betas_recover_the_waist() {
    for &(beta_star, s_star) in &[(0.9, 0.0), (0.9, 0.3), (2.0, -1.2), (0.3, 0.5)] {
        let waist = Waist::new(beta_star, s_star).expect("positive beta*");
        let (beta_1, beta_2) = waist.monitor_betas();

        let reconstruction =
            reconstruct_waist(beta_1, beta_2, MonitorErrors::default()).expect("drift optics");

        assert!(
            (reconstruction.waist.beta_star() - beta_star).abs() < TOLERANCE,
            "beta* {beta_star} reconstructed as {}",
            reconstruction.waist.beta_star()
        );
        assert!(
            (reconstruction.waist.s_star() - s_star).abs() < TOLERANCE,
            "s* {s_star} reconstructed as {}",
            reconstruction.waist.s_star()
        );
    }
}

#[test]
fn zero_monitor_errors_give_zero_waist_errors() {
    let (beta_1, beta_2) = Waist::default().monitor_betas();

    let reconstruction =
        reconstruct_waist(beta_1, beta_2, MonitorErrors::default()).expect("drift optics");

    assert_eq!(reconstruction.beta_star_error, 0.0);
    assert_eq!(reconstruction.s_star_error, 0.0);
}

#[test]
fn propagated_errors_match_finite_differences() {
    let waist = Waist::new(0.6, 0.2).expect("positive beta*");
    let (beta_1, beta_2) = waist.monitor_betas();
    let step = 1e-4;

    let beta_star_at = |b1: f64, b2: f64| {
        reconstruct_waist(b1, b2, MonitorErrors::default())
            .expect("drift optics")
            .waist
            .beta_star()
    };
    let gradient_1 = (beta_star_at(beta_1 + step, beta_2) - beta_star_at(beta_1 - step, beta_2))
        / (2.0 * step);

    let sigma = 0.5;
    let only_upstream = reconstruct_waist(
        beta_1,
        beta_2,
        MonitorErrors {
            sigma_1: sigma,
            sigma_2: 0.0,
            correlation: 0.0,
        },
    )
    .expect("drift optics");

    let expected = (gradient_1 * sigma).abs();
    assert!(
        (only_upstream.beta_star_error - expected).abs() < 1e-6 * expected.max(1e-12),
        "analytic {} vs numeric {expected}",
        only_upstream.beta_star_error
    );
}

#[test]
fn correlation_changes_the_combined_error() {
    let waist = Waist::new(0.9, 0.25).expect("positive beta*");
    let (beta_1, beta_2) = waist.monitor_betas();
    let errors = |correlation| MonitorErrors {
        sigma_1: 1.0,
        sigma_2: 1.0,
        correlation,
    };

    let independent = reconstruct_waist(beta_1, beta_2, errors(0.0)).expect("drift optics");
    let correlated = reconstruct_waist(beta_1, beta_2, errors(0.8)).expect("drift optics");
    let anti = reconstruct_waist(beta_1, beta_2, errors(-0.8)).expect("drift optics");

    assert!(independent.s_star_error > 0.0);
    assert_ne!(correlated.s_star_error, independent.s_star_error);
    assert_ne!(anti.s_star_error, independent.s_star_error);
}

#[test]
fn betas_too_small_for_the_drift_are_rejected() {
    assert_eq!(
        reconstruct_waist(10.0, 10.0, MonitorErrors::default()),
        Err(IrOpticsError::NotADrift {
            beta_1: 10.0,
            beta_2: 10.0,
        })
    );
    assert_eq!(
        reconstruct_waist(-1.0, 400.0, MonitorErrors::default()),
        Err(IrOpticsError::NonPositiveMonitorBeta { value: -1.0 })
    );
}
