#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Straight-line fits to data with noise on both coordinates.
//!
//! Ordinary least squares assumes an exact abscissa and minimizes vertical
//! residuals, which biases the slope towards zero once `x` is noisy as well.
//! Total least squares minimizes orthogonal distances instead: the fitted
//! direction is the principal axis of the centred data.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Left end of the sampled abscissa.
pub const X_MIN: f64 = 0.0;

/// Right end of the sampled abscissa.
pub const X_MAX: f64 = 10.0;

/// Errors raised by the fits and the data generator.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum FitError {
    /// A line needs at least two points.
    #[error("a line fit needs at least two points (received {count})")]
    TooFewPoints {
        /// Number of points supplied.
        count: usize,
    },
    /// Every abscissa needs an ordinate.
    #[error("received {x} abscissae but {y} ordinates")]
    LengthMismatch {
        /// Number of abscissae.
        x: usize,
        /// Number of ordinates.
        y: usize,
    },
    /// The points do not single out a direction.
    #[error("the points do not determine a line")]
    Degenerate,
    /// The best line is vertical and has no finite slope.
    #[error("the fitted line is vertical")]
    Vertical,
    /// Noise amplitudes are standard deviations and cannot be negative.
    #[error("noise amplitude must not be negative (received {value})")]
    NegativeNoise {
        /// Rejected noise amplitude.
        value: f64,
    },
}

/// Line `y = slope·x + intercept`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineFit {
    /// Slope of the line.
    pub slope: f64,
    /// Ordinate at `x = 0`.
    pub intercept: f64,
}

/// Centred second moments of a point set.
struct Moments {
    mean_x: f64,
    mean_y: f64,
    xx: f64,
    yy: f64,
    xy: f64,
}

impl Moments {
    fn of(x: &[f64], y: &[f64]) -> Result<Self, FitError> {
        if x.len() != y.len() {
            return Err(FitError::LengthMismatch {
                x: x.len(),
                y: y.len(),
            });
        }
        if x.len() < 2 {
            return Err(FitError::TooFewPoints { count: x.len() });
        }

        let count = x.len() as f64;
        let mean_x = x.iter().sum::<f64>() / count;
        let mean_y = y.iter().sum::<f64>() / count;
        let mut moments = Self {
            mean_x,
            mean_y,
            xx: 0.0,
            yy: 0.0,
            xy: 0.0,
        };
        for (&xi, &yi) in x.iter().zip(y) {
            let dx = xi - mean_x;
            let dy = yi - mean_y;
            moments.xx += dx * dx;
            moments.yy += dy * dy;
            moments.xy += dx * dy;
        }
        Ok(moments)
    }

    fn line_through_mean(&self, slope: f64) -> LineFit {
        LineFit {
            slope,
            intercept: self.mean_y - slope * self.mean_x,
        }
    }
}

/// Fits `y` against `x` by minimizing vertical residuals.
pub fn ordinary_least_squares(x: &[f64], y: &[f64]) -> Result<LineFit, FitError> {
    let moments = Moments::of(x, y)?;
    if moments.xx == 0.0 {
        return Err(FitError::Degenerate);
    }
    Ok(moments.line_through_mean(moments.xy / moments.xx))
}

/// Fits the line minimizing orthogonal distances to the points.
pub fn total_least_squares(x: &[f64], y: &[f64]) -> Result<LineFit, FitError> {
    let moments = Moments::of(x, y)?;
    let spread = moments.yy - moments.xx;

    if moments.xy == 0.0 {
        return match spread.partial_cmp(&0.0) {
            Some(std::cmp::Ordering::Less) => Ok(moments.line_through_mean(0.0)),
            Some(std::cmp::Ordering::Greater) => Err(FitError::Vertical),
            _ => Err(FitError::Degenerate),
        };
    }

    // Major axis of the 2×2 scatter matrix.
    let slope = (spread + spread.hypot(2.0 * moments.xy)) / (2.0 * moments.xy);
    Ok(moments.line_through_mean(slope))
}

/// Generator of points scattered around the line `y = slope·x`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoisyLine {
    /// Slope of the true line.
    pub slope: f64,
    /// Standard deviation of the abscissa noise.
    pub noise_x: f64,
    /// Standard deviation of the ordinate noise.
    pub noise_y: f64,
    /// Number of points.
    pub points: usize,
}

impl Default for NoisyLine {
    fn default() -> Self {
        Self {
            slope: 2.0,
            noise_x: 0.5,
            noise_y: 0.5,
            points: 200,
        }
    }
}

/// Points drawn by [`NoisyLine::sample`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observations {
    /// Evenly spaced abscissae before noise.
    pub x_true: Vec<f64>,
    /// Observed abscissae.
    pub x: Vec<f64>,
    /// Observed ordinates.
    pub y: Vec<f64>,
}

impl NoisyLine {
    /// Draws noisy observations over `[X_MIN, X_MAX]` from `seed`.
    ///
    /// All abscissa draws come before the ordinate draws.
    pub fn sample(&self, seed: u64) -> Result<Observations, FitError> {
        if self.points < 2 {
            return Err(FitError::TooFewPoints { count: self.points });
        }
        for value in [self.noise_x, self.noise_y] {
            if value.is_nan() || value < 0.0 {
                return Err(FitError::NegativeNoise { value });
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let spacing = (X_MAX - X_MIN) / (self.points - 1) as f64;
        let x_true: Vec<f64> = (0..self.points)
            .map(|index| X_MIN + index as f64 * spacing)
            .collect();
        let x = x_true
            .iter()
            .map(|&x| x + self.noise_x * rng.sample::<f64, _>(StandardNormal))
            .collect();
        let y = x_true
            .iter()
            .map(|&x| self.slope * x + self.noise_y * rng.sample::<f64, _>(StandardNormal))
            .collect();

        Ok(Observations { x_true, x, y })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-12;

    #[test]
    fn both_fits_recover_exact_lines() {
        let x = [0.0, 1.0, 2.5, 4.0, 7.0];
        let y: Vec<f64> = x.iter().map(|x| -1.5 * x + 3.0).collect();

        for fit in [
            ordinary_least_squares(&x, &y).expect("fit"),
            total_least_squares(&x, &y).expect("fit"),
        ] {
            assert!((fit.slope + 1.5).abs() < TOLERANCE);
            assert!((fit.intercept - 3.0).abs() < TOLERANCE);
        }
    }

    #[test]
    fn horizontal_and_vertical_lines() {
        let x = [0.0, 1.0, 2.0];
        assert_eq!(
            total_least_squares(&x, &[4.0, 4.0, 4.0]),
            Ok(LineFit {
                slope: 0.0,
                intercept: 4.0,
            })
        );
        assert_eq!(
            total_least_squares(&[1.0, 1.0, 1.0], &x),
            Err(FitError::Vertical)
        );
        assert_eq!(
            ordinary_least_squares(&[1.0, 1.0, 1.0], &x),
            Err(FitError::Degenerate)
        );
    }

    #[test]
    fn inputs_are_validated() {
        assert_eq!(
            ordinary_least_squares(&[1.0], &[1.0]),
            Err(FitError::TooFewPoints { count: 1 })
        );
        assert_eq!(
            total_least_squares(&[1.0, 2.0], &[1.0]),
            Err(FitError::LengthMismatch { x: 2, y: 1 })
        );
        let line = NoisyLine {
            noise_x: -0.5,
            ..NoisyLine::default()
        };
        assert_eq!(line.sample(0), Err(FitError::NegativeNoise { value: -0.5 }));
    }

    #[test]
    fn noiseless_samples_lie_on_the_line() {
        let line = NoisyLine {
            noise_x: 0.0,
            noise_y: 0.0,
            points: 5,
            ..NoisyLine::default()
        };
        let observations = line.sample(1).expect("valid line");

        assert_eq!(observations.x, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
        assert_eq!(observations.x, observations.x_true);
        assert_eq!(observations.y, vec![0.0, 5.0, 10.0, 15.0, 20.0]);
    }
}
