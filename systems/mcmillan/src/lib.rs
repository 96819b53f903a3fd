#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Invariant of the sextupole-like McMillan map.
//!
//! The map conserves
//!
//! ```text
//! K(p, q) = p² − a·p·q + q² + p²·q + p·q²,   a = −2ε/Γ
//! ```
//!
//! so its phase-space trajectories are the level sets of `K`. The crate
//! evaluates `K` on a rectangular grid and spaces contour levels evenly
//! between the grid's extremes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Half-width of the default phase-space window.
pub const DEFAULT_HALF_WIDTH: f64 = 1.5;

/// Grid points per axis when none is configured.
pub const DEFAULT_GRID_POINTS: usize = 80;

/// Contour levels drawn when none is configured.
pub const DEFAULT_CONTOURS: usize = 20;

/// Errors raised while configuring the map or its grid.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum McMillanError {
    /// The map parameter is undefined for a vanishing or non-finite `Γ`.
    #[error("gamma must be finite and non-zero (received {value})")]
    InvalidGamma {
        /// Rejected gamma.
        value: f64,
    },
    /// Epsilon must be a finite number.
    #[error("epsilon must be finite (received {value})")]
    InvalidEpsilon {
        /// Rejected epsilon.
        value: f64,
    },
    /// Each axis needs both of its end points.
    #[error("a grid axis needs at least two points (received {points})")]
    TooFewPoints {
        /// Requested points per axis.
        points: usize,
    },
    /// Axis ranges must be finite and increasing.
    #[error("axis range must be increasing (received {min}..{max})")]
    InvalidRange {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// At least one contour level is required.
    #[error("at least one contour level is required")]
    NoContours,
}

/// Parameters of the map.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct McMillanParams {
    /// Nonlinearity strength `Γ`.
    pub gamma: f64,
    /// Linear coupling `ε`.
    pub epsilon: f64,
}

impl Default for McMillanParams {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            epsilon: 0.5,
        }
    }
}

impl McMillanParams {
    /// Linear coefficient `a = −2ε/Γ` of the invariant.
    pub fn coefficient(&self) -> Result<f64, McMillanError> {
        if !self.gamma.is_finite() || self.gamma == 0.0 {
            return Err(McMillanError::InvalidGamma { value: self.gamma });
        }
        if !self.epsilon.is_finite() {
            return Err(McMillanError::InvalidEpsilon {
                value: self.epsilon,
            });
        }
        Ok(-2.0 * self.epsilon / self.gamma)
    }
}

/// Quadratic part `p² − a·p·q + q²` of the invariant.
#[must_use]
pub fn linear_invariant(p: f64, q: f64, a: f64) -> f64 {
    p * p - a * p * q + q * q
}

/// Full invariant including the cubic sextupole terms.
#[must_use]
pub fn sextupole_invariant(p: f64, q: f64, a: f64) -> f64 {
    linear_invariant(p, q, a) + p * p * q + p * q * q
}

/// Closed interval sampled with evenly spaced points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    /// Lower bound.
    pub min: f64,
    /// Upper bound.
    pub max: f64,
}

impl AxisRange {
    /// Symmetric range `[-half_width, half_width]`.
    #[must_use]
    pub const fn symmetric(half_width: f64) -> Self {
        Self {
            min: -half_width,
            max: half_width,
        }
    }

    fn linspace(&self, points: usize) -> Result<Vec<f64>, McMillanError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(McMillanError::InvalidRange {
                min: self.min,
                max: self.max,
            });
        }
        if points < 2 {
            return Err(McMillanError::TooFewPoints { points });
        }
        let step = (self.max - self.min) / (points - 1) as f64;
        Ok((0..points)
            .map(|index| self.min + step * index as f64)
            .collect())
    }
}

impl Default for AxisRange {
    fn default() -> Self {
        Self::symmetric(DEFAULT_HALF_WIDTH)
    }
}

/// Invariant sampled on a `p × q` grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvariantGrid {
    /// Linear coefficient the grid was evaluated with.
    pub coefficient: f64,
    /// Momentum samples, one per row.
    pub p: Vec<f64>,
    /// Position samples, one per column.
    pub q: Vec<f64>,
    values: Vec<f64>,
    min: f64,
    max: f64,
}

impl InvariantGrid {
    /// Evaluates the invariant of `params` over the given ranges.
    pub fn evaluate(
        params: &McMillanParams,
        p_range: AxisRange,
        q_range: AxisRange,
        points: usize,
    ) -> Result<Self, McMillanError> {
        let coefficient = params.coefficient()?;
        let p = p_range.linspace(points)?;
        let q = q_range.linspace(points)?;

        let mut values = Vec::with_capacity(p.len() * q.len());
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &pi in &p {
            for &qj in &q {
                let value = sextupole_invariant(pi, qj, coefficient);
                min = min.min(value);
                max = max.max(value);
                values.push(value);
            }
        }

        Ok(Self {
            coefficient,
            p,
            q,
            values,
            min,
            max,
        })
    }

    /// Invariant at row `row` (momentum index) and column `column` (position index).
    #[must_use]
    pub fn value(&self, row: usize, column: usize) -> Option<f64> {
        if column >= self.q.len() {
            return None;
        }
        self.values.get(row * self.q.len() + column).copied()
    }

    /// Smallest and largest invariant on the grid.
    #[must_use]
    pub const fn extremes(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    /// `count` contour levels starting at the grid minimum and spaced by
    /// `(max − min) / count`.
    pub fn contour_levels(&self, count: usize) -> Result<Vec<f64>, McMillanError> {
        if count == 0 {
            return Err(McMillanError::NoContours);
        }
        let size = (self.max - self.min) / count as f64;
        Ok((0..count).map(|index| self.min + size * index as f64).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coefficient_follows_epsilon_over_gamma() {
        let params = McMillanParams {
            gamma: 2.0,
            epsilon: 0.5,
        };
        assert_eq!(params.coefficient(), Ok(-0.5));
        assert_eq!(
            McMillanParams {
                gamma: 0.0,
                ..params
            }
            .coefficient(),
            Err(McMillanError::InvalidGamma { value: 0.0 })
        );
    }

    #[test]
    fn invariant_vanishes_at_origin_and_is_symmetric() {
        assert_eq!(sextupole_invariant(0.0, 0.0, -1.0), 0.0);
        for &(p, q) in &[(0.3, -0.7), (1.2, 0.4), (-0.9, -0.1)] {
            let forward = sextupole_invariant(p, q, 0.4);
            let swapped = sextupole_invariant(q, p, 0.4);
            assert!((forward - swapped).abs() < 1e-12);
        }
    }

    #[test]
    fn cubic_terms_vanish_on_the_axes() {
        assert_eq!(sextupole_invariant(0.8, 0.0, 1.0), linear_invariant(0.8, 0.0, 1.0));
        assert_eq!(sextupole_invariant(0.0, -0.6, 1.0), linear_invariant(0.0, -0.6, 1.0));
    }

    #[test]
    fn grid_is_indexed_by_momentum_then_position() {
        let grid = InvariantGrid::evaluate(
            &McMillanParams::default(),
            AxisRange::symmetric(1.0),
            AxisRange { min: 0.0, max: 2.0 },
            3,
        )
        .expect("valid grid");

        assert_eq!(grid.p, vec![-1.0, 0.0, 1.0]);
        assert_eq!(grid.q, vec![0.0, 1.0, 2.0]);
        assert_eq!(grid.value(2, 1), Some(sextupole_invariant(1.0, 1.0, -1.0)));
        assert_eq!(grid.value(0, 3), None);
        assert_eq!(grid.value(3, 0), None);
    }

    #[test]
    fn contour_levels_span_the_extremes() {
        let grid = InvariantGrid::evaluate(
            &McMillanParams::default(),
            AxisRange::default(),
            AxisRange::default(),
            DEFAULT_GRID_POINTS,
        )
        .expect("valid grid");
        let (min, max) = grid.extremes();
        let levels = grid.contour_levels(4).expect("levels");

        assert_eq!(levels.len(), 4);
        assert_eq!(levels[0], min);
        assert!((levels[3] + (max - min) / 4.0 - max).abs() < 1e-9);
        assert_eq!(grid.contour_levels(0), Err(McMillanError::NoContours));
    }

    #[test]
    fn invalid_grids_are_rejected() {
        let params = McMillanParams::default();
        assert_eq!(
            InvariantGrid::evaluate(&params, AxisRange::default(), AxisRange::default(), 1),
            Err(McMillanError::TooFewPoints { points: 1 })
        );
        assert_eq!(
            InvariantGrid::evaluate(
                &params,
                AxisRange { min: 1.0, max: -1.0 },
                AxisRange::default(),
                10
            ),
            Err(McMillanError::InvalidRange {
                min: 1.0,
                max: -1.0,
            })
        );
    }
}
