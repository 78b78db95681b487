//! Problem definition trait for nonlinear least-squares fitting.
//!
//! This is the seam between the relaxation forward model and the optimizer:
//! anything that can produce a residual vector from a parameter vector can
//! be fit.  The weighted relaxation residual problem in `oracle` is the one
//! production implementation; tests substitute simple analytic problems.

use crate::error::{MfError, Result};
use ndarray::{Array1, Array2};

/// A nonlinear least-squares problem.
pub trait Problem {
    /// Evaluate the residual vector at the given parameters.
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>>;

    /// Number of parameters.
    fn parameter_count(&self) -> usize;

    /// Number of residuals.
    fn residual_count(&self) -> usize;

    /// Evaluate the Jacobian of the residuals with respect to the parameters.
    ///
    /// The default implementation uses forward finite differences.
    fn jacobian(&self, params: &Array1<f64>) -> Result<Array2<f64>>
    where
        Self: Sized,
    {
        crate::utils::finite_difference::jacobian(self, params, None)
    }

    /// Sum of squared residuals at the given parameters.
    fn eval_cost(&self, params: &Array1<f64>) -> Result<f64> {
        let residuals = self.eval(params)?;
        Ok(residuals.iter().map(|r| r.powi(2)).sum())
    }
}

/// Check a parameter vector's length against the problem's expectation.
pub(crate) fn check_params(problem: &dyn Problem, params: &Array1<f64>) -> Result<()> {
    if params.len() != problem.parameter_count() {
        return Err(MfError::DimensionMismatch(format!(
            "Expected {} parameters, got {}",
            problem.parameter_count(),
            params.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// f(x) = a * x + b against fixed data.
    struct LinearModel {
        x_data: Array1<f64>,
        y_data: Array1<f64>,
    }

    impl Problem for LinearModel {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            check_params(self, params)?;
            let a = params[0];
            let b = params[1];
            let residuals = self
                .x_data
                .iter()
                .zip(self.y_data.iter())
                .map(|(x, y)| a * x + b - y)
                .collect::<Vec<f64>>();
            Ok(Array1::from_vec(residuals))
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            self.x_data.len()
        }
    }

    #[test]
    fn test_eval_cost() {
        let model = LinearModel {
            x_data: array![1.0, 2.0, 3.0, 4.0, 5.0],
            y_data: array![2.0, 4.0, 6.0, 8.0, 10.0],
        };

        let cost = model.eval_cost(&array![2.0, 0.0]).unwrap();
        assert_relative_eq!(cost, 0.0, epsilon = 1e-10);

        let cost = model.eval_cost(&array![1.0, 0.0]).unwrap();
        let expected = (1..=5).map(|i| (i as f64).powi(2)).sum::<f64>();
        assert_relative_eq!(cost, expected, epsilon = 1e-10);
    }

    #[test]
    fn test_default_jacobian() {
        let model = LinearModel {
            x_data: array![1.0, 2.0, 3.0],
            y_data: array![2.0, 4.0, 6.0],
        };
        let jac = model.jacobian(&array![2.0, 0.0]).unwrap();
        assert_eq!(jac.shape(), &[3, 2]);
        for i in 0..3 {
            assert_relative_eq!(jac[[i, 0]], model.x_data[i], epsilon = 1e-5);
            assert_relative_eq!(jac[[i, 1]], 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_param_check() {
        let model = LinearModel {
            x_data: array![1.0],
            y_data: array![2.0],
        };
        let err = model.eval(&array![1.0]).unwrap_err();
        assert!(matches!(err, MfError::DimensionMismatch(_)));
    }
}
