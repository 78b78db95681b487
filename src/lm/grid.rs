//! Coarse grid search used to seed the local optimizer.
//!
//! The model-free cost surfaces have multiple basins (notably the te/Rex
//! trade-off in m4), so every fit starts from the best point of a coarse
//! grid over the bounded parameter box rather than from a single guess.

use ndarray::Array1;

use crate::error::{MfError, Result};
use crate::problem::Problem;

/// Evaluate the cost on a regular grid over `[lower, upper]` with the given
/// number of steps per axis, returning the best point and its cost.
///
/// Axes with a single step stay fixed at their lower bound.  Points where
/// the problem raises a domain error are skipped.
pub fn grid_search<P: Problem>(
    problem: &P,
    lower: &[f64],
    upper: &[f64],
    steps: &[usize],
) -> Result<(Array1<f64>, f64)> {
    let n = problem.parameter_count();
    if lower.len() != n || upper.len() != n || steps.len() != n {
        return Err(MfError::DimensionMismatch(format!(
            "Grid specification of length {}/{}/{} for {} parameters",
            lower.len(),
            upper.len(),
            steps.len(),
            n
        )));
    }
    if steps.iter().any(|&s| s == 0) {
        return Err(MfError::InvalidParameter(
            "Grid step count must be at least 1".to_string(),
        ));
    }

    let mut index = vec![0usize; n];
    let mut best: Option<(Array1<f64>, f64)> = None;

    loop {
        let point = Array1::from_iter((0..n).map(|i| {
            if steps[i] <= 1 {
                lower[i]
            } else {
                lower[i] + (upper[i] - lower[i]) * index[i] as f64 / (steps[i] - 1) as f64
            }
        }));

        match problem.eval_cost(&point) {
            Ok(cost) if cost.is_finite() => {
                if best.as_ref().map_or(true, |(_, c)| cost < *c) {
                    best = Some((point, cost));
                }
            }
            Ok(_) | Err(MfError::Domain(_)) => {}
            Err(e) => return Err(e),
        }

        // Odometer increment over the grid indices.
        let mut axis = 0;
        loop {
            index[axis] += 1;
            if index[axis] < steps[axis] {
                break;
            }
            index[axis] = 0;
            axis += 1;
            if axis == n {
                return best.ok_or_else(|| {
                    MfError::OracleFailure("No evaluable grid point found".to_string())
                });
            }
        }
    }
}
