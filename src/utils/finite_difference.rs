//! Finite difference approximation of the Jacobian.

use crate::error::{MfError, Result};
use crate::problem::Problem;
use ndarray::{Array1, Array2};

/// Default relative step size for finite differences.
const DEFAULT_EPSILON: f64 = 1e-8;

/// Compute the Jacobian matrix using forward finite differences.
///
/// `J[i, j] = d residual[i] / d param[j]`, with the step size scaled to each
/// parameter's magnitude so that seconds-scale correlation times and
/// order-one order parameters are both perturbed sensibly.
pub fn jacobian(
    problem: &dyn Problem,
    params: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>> {
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = problem.residual_count();

    let residuals = problem.eval(params)?;
    if residuals.len() != n_residuals {
        return Err(MfError::DimensionMismatch(format!(
            "Expected {} residuals, got {}",
            n_residuals,
            residuals.len()
        )));
    }

    let mut jac = Array2::zeros((n_residuals, n_params));
    for j in 0..n_params {
        let mut perturbed = params.clone();
        let param_j = params[j];
        let eps_j = if param_j.abs() > eps {
            param_j.abs() * eps
        } else {
            eps
        };
        perturbed[j] += eps_j;

        let residuals_perturbed = problem.eval(&perturbed)?;
        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / eps_j;
        }
    }

    Ok(jac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    struct QuadraticProblem;

    impl Problem for QuadraticProblem {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            let x = params[0];
            let y = params[1];
            Ok(array![x.powi(2) - 1.0, y.powi(2) - 2.0])
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            2
        }
    }

    #[test]
    fn test_jacobian() {
        let jac = jacobian(&QuadraticProblem, &array![2.0, 3.0], None).unwrap();
        assert_eq!(jac.shape(), &[2, 2]);
        assert_relative_eq!(jac[[0, 0]], 4.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[0, 1]], 0.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[1, 0]], 0.0, epsilon = 1e-5);
        assert_relative_eq!(jac[[1, 1]], 6.0, epsilon = 1e-5);
    }

    #[test]
    fn test_step_scales_with_parameter() {
        // A parameter of magnitude 1e-10 must still get a usable step.
        struct TinyParam;
        impl Problem for TinyParam {
            fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
                Ok(array![params[0] * 1e10])
            }
            fn parameter_count(&self) -> usize {
                1
            }
            fn residual_count(&self) -> usize {
                1
            }
        }
        let jac = jacobian(&TinyParam, &array![1e-10], None).unwrap();
        assert_relative_eq!(jac[[0, 0]], 1e10, max_relative = 1e-4);
    }
}
