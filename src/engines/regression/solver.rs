//! Bounded Levenberg-Marquardt least squares.
//!
//! Steps are projected back onto the box after every trial update so the
//! iterate stays feasible.

use crate::error::{CalibrationError, Result};
use nalgebra::{DMatrix, DVector};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct SolverOptions {
    pub max_iterations: usize,
    /// Relative SSE improvement below which the solve is considered converged
    pub tolerance: f64,
    pub initial_lambda: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-12,
            initial_lambda: 1e-3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub parameters: DVector<f64>,
    pub sse: f64,
    pub iterations: usize,
}

/// Box constraints. Infinite entries leave a side unbounded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl Bounds {
    pub fn clamp(&self, params: &mut DVector<f64>) {
        for (i, p) in params.iter_mut().enumerate() {
            *p = p.max(self.lower[i]).min(self.upper[i]);
        }
    }

    pub fn contains(&self, params: &[f64]) -> bool {
        params
            .iter()
            .enumerate()
            .all(|(i, p)| *p >= self.lower[i] && *p <= self.upper[i])
    }
}

const MAX_LAMBDA: f64 = 1e12;
const MIN_LAMBDA: f64 = 1e-12;

/// Minimise `||residuals(p)||^2` subject to `bounds`.
///
/// `residuals` maps parameters to the residual vector (observed minus predicted) and
/// `jacobian` to d(predicted)/d(p), one row per observation.
pub fn least_squares<R, J>(
    residuals: R,
    jacobian: J,
    initial: &[f64],
    bounds: &Bounds,
    options: &SolverOptions,
) -> Result<Solution>
where
    R: Fn(&DVector<f64>) -> DVector<f64>,
    J: Fn(&DVector<f64>) -> DMatrix<f64>,
{
    let mut params = DVector::from_column_slice(initial);
    bounds.clamp(&mut params);

    let mut r = residuals(&params);
    let mut sse = r.norm_squared();
    if !sse.is_finite() {
        return Err(CalibrationError::ModelFit(
            "Residuals are not finite at the initial guess".to_string(),
        ));
    }

    let mut lambda = options.initial_lambda;

    for iteration in 0..options.max_iterations {
        let jac = jacobian(&params);
        // Residuals are observed - predicted, so the gradient of SSE/2 is -J^T r
        let gradient = jac.transpose() * &r;
        let normal = jac.transpose() * &jac;

        if gradient.amax() <= options.tolerance * (1.0 + sse) {
            return Ok(Solution {
                parameters: params,
                sse,
                iterations: iteration,
            });
        }

        let mut accepted = false;
        while lambda <= MAX_LAMBDA {
            let mut damped = normal.clone();
            for i in 0..damped.nrows() {
                damped[(i, i)] += lambda * normal[(i, i)].max(1e-12);
            }

            let step = match damped.cholesky() {
                Some(chol) => chol.solve(&gradient),
                None => {
                    lambda *= 10.0;
                    continue;
                }
            };

            let mut candidate = &params + &step;
            bounds.clamp(&mut candidate);
            let candidate_r = residuals(&candidate);
            let candidate_sse = candidate_r.norm_squared();

            if candidate_sse.is_finite() && candidate_sse < sse {
                let improvement = sse - candidate_sse;
                let moved = (&candidate - &params).amax();
                params = candidate;
                r = candidate_r;
                sse = candidate_sse;
                lambda = (lambda / 10.0).max(MIN_LAMBDA);
                accepted = true;

                if improvement <= options.tolerance * sse.max(f64::MIN_POSITIVE) || moved < 1e-12 {
                    return Ok(Solution {
                        parameters: params,
                        sse,
                        iterations: iteration + 1,
                    });
                }
                break;
            }
            lambda *= 10.0;
        }

        if !accepted {
            // No downhill step exists inside the box at any damping: stationary point
            return Ok(Solution {
                parameters: params,
                sse,
                iterations: iteration + 1,
            });
        }
    }

    Err(CalibrationError::ModelFit(format!(
        "Least squares did not converge within {} iterations",
        options.max_iterations
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fits_straight_line() {
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 + 3.0 * x).collect();

        let residuals = |p: &DVector<f64>| {
            DVector::from_iterator(xs.len(), xs.iter().zip(&ys).map(|(x, y)| y - (p[0] + p[1] * x)))
        };
        let jacobian = |_: &DVector<f64>| {
            DMatrix::from_fn(xs.len(), 2, |i, j| if j == 0 { 1.0 } else { xs[i] })
        };
        let bounds = Bounds {
            lower: vec![f64::NEG_INFINITY; 2],
            upper: vec![f64::INFINITY; 2],
        };

        let solution =
            least_squares(residuals, jacobian, &[0.0, 0.0], &bounds, &SolverOptions::default())
                .unwrap();
        assert!((solution.parameters[0] - 2.0).abs() < 1e-6);
        assert!((solution.parameters[1] - 3.0).abs() < 1e-6);
        assert!(solution.sse < 1e-10);
    }

    #[test]
    fn test_respects_bounds() {
        // Unconstrained optimum is p = -5, box is [0, 10]
        let residuals = |p: &DVector<f64>| DVector::from_element(1, -5.0 - p[0]);
        let jacobian = |_: &DVector<f64>| DMatrix::from_element(1, 1, 1.0);
        let bounds = Bounds {
            lower: vec![0.0],
            upper: vec![10.0],
        };

        let solution =
            least_squares(residuals, jacobian, &[3.0], &bounds, &SolverOptions::default()).unwrap();
        assert_eq!(solution.parameters[0], 0.0);
        assert!((solution.sse - 25.0).abs() < 1e-9);
    }
}
