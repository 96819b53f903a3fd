use std::io::{self, Write};

use optics_lab_core::{CentroidSample, PhysicalPoint, Twiss};
use optics_lab_system_bpm_errors::TurnReading;
use optics_lab_system_ir_optics::{BetaSample, WaistReconstruction};
use optics_lab_system_line_fit::LineFit;
use optics_lab_system_luminosity::LuminosityScan;
use optics_lab_system_mcmillan::InvariantGrid;

/// Writes the centroid history as `turn,mean_q,mean_p` rows.
pub(crate) fn write_centroid_csv<W: Write>(
    out: &mut W,
    history: &[CentroidSample],
) -> io::Result<()> {
    writeln!(out, "turn,mean_q,mean_p")?;
    for sample in history {
        writeln!(out, "{},{},{}", sample.turn, sample.mean_q, sample.mean_p)?;
    }
    Ok(())
}

/// Writes a luminosity scan, adding a column for the saved scan when present.
pub(crate) fn write_scan_table<W: Write>(
    out: &mut W,
    live: &LuminosityScan,
    saved: Option<&LuminosityScan>,
) -> io::Result<()> {
    writeln!(out, "# {}", live.parameter.label())?;
    match saved {
        Some(_) => writeln!(out, "{:>12} {:>14} {:>14}", "value", "L", "L saved")?,
        None => writeln!(out, "{:>12} {:>14}", "value", "L")?,
    }
    for (index, point) in live.points.iter().enumerate() {
        write!(out, "{:>12.5} {:>14.6e}", point.value, point.luminosity)?;
        if let Some(saved) = saved.and_then(|scan| scan.points.get(index)) {
            write!(out, " {:>14.6e}", saved.luminosity)?;
        }
        writeln!(out)?;
    }
    writeln!(
        out,
        "# current: {} = {:.5}, L = {:.6e} cm^-2 s^-1",
        live.parameter.key(),
        live.marker.value,
        live.marker.luminosity
    )?;
    if let Some(saved) = saved {
        writeln!(
            out,
            "# saved:   {} = {:.5}, L = {:.6e} cm^-2 s^-1",
            saved.parameter.key(),
            saved.marker.value,
            saved.marker.luminosity
        )?;
    }
    Ok(())
}

/// Writes the beta profile between the monitors followed by the reconstructed waist.
pub(crate) fn write_ir_report<W: Write>(
    out: &mut W,
    profile: &[BetaSample],
    monitor_betas: (f64, f64),
    reconstruction: &WaistReconstruction,
) -> io::Result<()> {
    writeln!(out, "{:>10} {:>12}", "s [m]", "beta [m]")?;
    for sample in profile {
        writeln!(out, "{:>10.4} {:>12.4}", sample.s, sample.beta)?;
    }
    writeln!(
        out,
        "# BPM betas: {:.4} m, {:.4} m",
        monitor_betas.0, monitor_betas.1
    )?;
    writeln!(
        out,
        "# beta* = {:.4} ± {:.4} m",
        reconstruction.waist.beta_star(),
        reconstruction.beta_star_error
    )?;
    writeln!(
        out,
        "# s*    = {:.4} ± {:.4} m",
        reconstruction.waist.s_star(),
        reconstruction.s_star_error
    )?;
    Ok(())
}

/// Writes true and measured monitor readings as CSV rows.
pub(crate) fn write_bpm_readings<W: Write>(
    out: &mut W,
    readings: &[TurnReading],
) -> io::Result<()> {
    writeln!(out, "turn,x,y,x_bpm,y_bpm,dx,dy")?;
    for reading in readings {
        let difference = reading.difference();
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            reading.turn,
            reading.truth.x,
            reading.truth.y,
            reading.measured.x,
            reading.measured.y,
            difference.x,
            difference.y
        )?;
    }
    Ok(())
}

/// Writes the true slope next to the ordinary and total least-squares fits.
pub(crate) fn write_line_fits<W: Write>(
    out: &mut W,
    true_slope: f64,
    ordinary: &LineFit,
    total: &LineFit,
) -> io::Result<()> {
    writeln!(out, "{:<6} {:>10} {:>10}", "fit", "slope", "intercept")?;
    writeln!(out, "{:<6} {:>10.4} {:>10.4}", "true", true_slope, 0.0)?;
    writeln!(
        out,
        "{:<6} {:>10.4} {:>10.4}",
        "OLS", ordinary.slope, ordinary.intercept
    )?;
    writeln!(
        out,
        "{:<6} {:>10.4} {:>10.4}",
        "TLS", total.slope, total.intercept
    )?;
    Ok(())
}

/// Writes the Twiss parameters followed by `q,p` rows of the sampled ellipse.
pub(crate) fn write_twiss_ellipse<W: Write>(
    out: &mut W,
    twiss: &Twiss,
    points: &[PhysicalPoint],
) -> io::Result<()> {
    writeln!(
        out,
        "# alpha = {:.4}, beta = {:.4}, gamma = {:.4}",
        twiss.alpha(),
        twiss.beta(),
        twiss.gamma()
    )?;
    writeln!(out, "q,p")?;
    for point in points {
        writeln!(out, "{},{}", point.q, point.p)?;
    }
    Ok(())
}

/// Writes the invariant's coefficient, range and contour levels, then the
/// full grid as `p,q,k` rows when requested.
pub(crate) fn write_invariant_grid<W: Write>(
    out: &mut W,
    grid: &InvariantGrid,
    levels: &[f64],
    include_grid: bool,
) -> io::Result<()> {
    let (min, max) = grid.extremes();
    writeln!(out, "# a = {:.3}", grid.coefficient)?;
    writeln!(out, "# K in [{min:.6}, {max:.6}]")?;
    let levels: Vec<String> = levels.iter().map(|level| format!("{level:.6}")).collect();
    writeln!(out, "# levels: {}", levels.join(" "))?;
    if include_grid {
        writeln!(out, "p,q,k")?;
        for (row, p) in grid.p.iter().enumerate() {
            for (column, q) in grid.q.iter().enumerate() {
                if let Some(value) = grid.value(row, column) {
                    writeln!(out, "{p},{q},{value}")?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use optics_lab_system_bpm_errors::{BetatronSignal, BpmBench, BpmErrors};
    use optics_lab_system_ir_optics::{reconstruct_waist, MonitorErrors, Waist};
    use optics_lab_system_luminosity::{scan, CollisionParams, ScanParameter, SCAN_INTERVALS};
    use optics_lab_system_mcmillan::{AxisRange, McMillanParams};

    fn render<F>(write: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buffer = Vec::new();
        write(&mut buffer).expect("writing to memory never fails");
        String::from_utf8(buffer).expect("reports are UTF-8")
    }

    #[test]
    fn centroid_csv_has_one_row_per_turn() {
        let history = [
            CentroidSample::new(0, 0.0, 0.1),
            CentroidSample::new(1, 0.05, -0.02),
        ];

        let csv = render(|out| write_centroid_csv(out, &history));

        assert_eq!(csv, "turn,mean_q,mean_p\n0,0,0.1\n1,0.05,-0.02\n");
    }

    #[test]
    fn scan_table_lists_every_point() {
        let live = scan(&CollisionParams::default(), ScanParameter::CrossingAngle)
            .expect("valid params");

        let table = render(|out| write_scan_table(out, &live, None));

        // title, header, points, marker
        assert_eq!(table.lines().count(), SCAN_INTERVALS + 1 + 3);
        assert!(table.contains("# current: phi = 0.00200"));
        assert!(!table.contains("L saved"));
    }

    #[test]
    fn scan_table_adds_saved_column() {
        let params = CollisionParams::default();
        let live = scan(&params, ScanParameter::BunchLength).expect("valid params");
        let saved = scan(
            &ScanParameter::CrossingAngle.with_value(params, 0.0),
            ScanParameter::BunchLength,
        )
        .expect("valid params");

        let table = render(|out| write_scan_table(out, &live, Some(&saved)));

        assert!(table.contains("L saved"));
        assert!(table.contains("# saved:"));
        let first_row = table.lines().nth(2).expect("first data row");
        assert_eq!(first_row.split_whitespace().count(), 3);
    }

    #[test]
    fn ir_report_prints_waist_with_errors() {
        let waist = Waist::default();
        let betas = waist.monitor_betas();
        let profile = waist.profile(3).expect("enough samples");
        let reconstruction =
            reconstruct_waist(betas.0, betas.1, MonitorErrors::default()).expect("drift optics");

        let report = render(|out| write_ir_report(out, &profile, betas, &reconstruction));

        assert!(report.contains("# beta* = 0.9000 ± 0.0000 m"));
        assert!(report.contains("# s*    = 0.0000 ± 0.0000 m"));
        assert_eq!(report.lines().count(), 1 + 3 + 3);
    }

    #[test]
    fn bpm_readings_have_one_row_per_turn() {
        let bench = BpmBench::new(BetatronSignal::HORIZONTAL, BetatronSignal::VERTICAL, 4, 1);
        let readings = bench.read(&BpmErrors::default()).expect("valid errors");

        let csv = render(|out| write_bpm_readings(out, &readings));

        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("turn,x,y,x_bpm,y_bpm,dx,dy"));
        let first: Vec<&str> = lines.next().expect("turn zero").split(',').collect();
        assert_eq!(first.len(), 7);
        assert_eq!(first[1], first[3], "ideal monitor reports the beam");
        assert_eq!(csv.lines().count(), 1 + 4);
    }

    #[test]
    fn line_fits_are_tabulated() {
        let fit = LineFit {
            slope: 1.95,
            intercept: 0.1,
        };

        let table = render(|out| write_line_fits(out, 2.0, &fit, &fit));

        assert_eq!(table.lines().count(), 4);
        assert!(table.contains("OLS        1.9500     0.1000"));
    }

    #[test]
    fn twiss_report_prints_gamma() {
        let twiss = Twiss::new(0.0, 0.5).expect("positive beta");
        let points = [PhysicalPoint::new(0.01, -0.02)];

        let report = render(|out| write_twiss_ellipse(out, &twiss, &points));

        assert!(report.starts_with("# alpha = 0.0000, beta = 0.5000, gamma = 2.0000\n"));
        assert!(report.ends_with("q,p\n0.01,-0.02\n"));
    }

    #[test]
    fn invariant_grid_is_optional() {
        let grid = InvariantGrid::evaluate(
            &McMillanParams::default(),
            AxisRange::default(),
            AxisRange::default(),
            3,
        )
        .expect("valid grid");
        let levels = grid.contour_levels(2).expect("levels");

        let summary = render(|out| write_invariant_grid(out, &grid, &levels, false));
        let full = render(|out| write_invariant_grid(out, &grid, &levels, true));

        assert_eq!(summary.lines().count(), 3);
        assert!(summary.starts_with("# a = -1.000\n"));
        assert_eq!(full.lines().count(), 3 + 1 + 9);
    }
}
