//! Damped-normal-equations Levenberg-Marquardt with box constraints.

use ndarray::Array1;

use crate::error::{MfError, Result};
use crate::lm::config::LmConfig;
use crate::problem::Problem;
use crate::utils::linalg::solve_spd;

/// Outcome of a Levenberg-Marquardt minimization.
#[derive(Debug, Clone)]
pub struct LmResult {
    /// Best parameters found.
    pub params: Array1<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    /// Number of iterations performed.
    pub iterations: usize,
    /// Whether a convergence tolerance was satisfied before the iteration
    /// limit was reached.
    pub converged: bool,
}

/// Levenberg-Marquardt minimizer.
///
/// Each iteration solves `(J^T J + lambda diag(J^T J)) dp = -J^T r` by
/// Cholesky factorization and applies the step when it lowers the cost.
/// Parameter bounds are enforced by clamping trial points, matching the
/// box constraints of the model-free parameter spaces.
pub struct LevenbergMarquardt {
    config: LmConfig,
}

impl LevenbergMarquardt {
    pub fn new(config: LmConfig) -> Self {
        LevenbergMarquardt { config }
    }

    pub fn with_default_config() -> Self {
        LevenbergMarquardt::new(LmConfig::default())
    }

    /// Minimize an unconstrained problem.
    pub fn minimize<P: Problem>(&self, problem: &P, initial: &Array1<f64>) -> Result<LmResult> {
        self.run(problem, initial, None)
    }

    /// Minimize with box constraints.  `initial` is clamped into the box
    /// before the first evaluation.
    pub fn minimize_bounded<P: Problem>(
        &self,
        problem: &P,
        initial: &Array1<f64>,
        lower: &[f64],
        upper: &[f64],
    ) -> Result<LmResult> {
        if lower.len() != problem.parameter_count() || upper.len() != problem.parameter_count() {
            return Err(MfError::DimensionMismatch(format!(
                "Bounds of length {}/{} for {} parameters",
                lower.len(),
                upper.len(),
                problem.parameter_count()
            )));
        }
        self.run(problem, initial, Some((lower, upper)))
    }

    fn run<P: Problem>(
        &self,
        problem: &P,
        initial: &Array1<f64>,
        bounds: Option<(&[f64], &[f64])>,
    ) -> Result<LmResult> {
        if initial.len() != problem.parameter_count() {
            return Err(MfError::DimensionMismatch(format!(
                "Expected {} parameters, got {}",
                problem.parameter_count(),
                initial.len()
            )));
        }

        let mut params = initial.clone();
        clamp(&mut params, bounds);

        let mut residuals = problem.eval(&params)?;
        let mut cost = sum_of_squares(&residuals);
        let mut lambda = self.config.initial_lambda;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            iterations += 1;

            let jac = problem.jacobian(&params)?;
            let jtj = jac.t().dot(&jac);
            let jtr = jac.t().dot(&residuals);

            // Inner loop: raise lambda until a step is accepted or lambda
            // runs off the allowed range.
            let mut accepted = false;
            while lambda <= self.config.max_lambda {
                let mut damped = jtj.clone();
                for i in 0..damped.shape()[0] {
                    // Additive floor keeps the system solvable when a
                    // parameter has no residual gradient at this point.
                    damped[[i, i]] += lambda * jtj[[i, i]].max(1e-12);
                }

                let step = match solve_spd(&damped, &(-&jtr)) {
                    Ok(step) => step,
                    Err(MfError::SingularMatrix) => {
                        lambda *= self.config.lambda_up;
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let mut trial = &params + &step;
                clamp(&mut trial, bounds);

                let trial_residuals = match problem.eval(&trial) {
                    Ok(r) => r,
                    Err(MfError::Domain(_)) => {
                        lambda *= self.config.lambda_up;
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let trial_cost = sum_of_squares(&trial_residuals);

                if trial_cost.is_finite() && trial_cost < cost {
                    let cost_drop = cost - trial_cost;
                    let step_norm = (&trial - &params).iter().map(|v| v * v).sum::<f64>().sqrt();
                    let param_norm = params.iter().map(|v| v * v).sum::<f64>().sqrt();

                    params = trial;
                    residuals = trial_residuals;
                    cost = trial_cost;
                    lambda = (lambda * self.config.lambda_down).max(self.config.min_lambda);
                    accepted = true;

                    if cost_drop <= self.config.ftol * cost.max(1.0)
                        || step_norm <= self.config.xtol * (param_norm + self.config.xtol)
                    {
                        converged = true;
                    }
                    break;
                }

                lambda *= self.config.lambda_up;
            }

            if !accepted {
                // No downhill step exists at any damping: treat the current
                // point as a (possibly boundary) minimum.
                converged = true;
            }
            if converged {
                break;
            }
        }

        Ok(LmResult {
            params,
            cost,
            iterations,
            converged,
        })
    }
}

fn clamp(params: &mut Array1<f64>, bounds: Option<(&[f64], &[f64])>) {
    if let Some((lower, upper)) = bounds {
        for (i, p) in params.iter_mut().enumerate() {
            *p = p.clamp(lower[i], upper[i]);
        }
    }
}

fn sum_of_squares(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::check_params;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// y = a * exp(-b * x) sampled without noise.
    struct ExpDecay {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl ExpDecay {
        fn synthetic(a: f64, b: f64) -> Self {
            let x: Vec<f64> = (0..10).map(|i| i as f64 * 0.3).collect();
            let y: Vec<f64> = x.iter().map(|&xi| a * (-b * xi).exp()).collect();
            ExpDecay { x, y }
        }
    }

    impl Problem for ExpDecay {
        fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
            check_params(self, params)?;
            let a = params[0];
            let b = params[1];
            Ok(Array1::from_iter(
                self.x
                    .iter()
                    .zip(self.y.iter())
                    .map(|(&xi, &yi)| a * (-b * xi).exp() - yi),
            ))
        }

        fn parameter_count(&self) -> usize {
            2
        }

        fn residual_count(&self) -> usize {
            self.x.len()
        }
    }

    #[test]
    fn recovers_exponential_parameters() {
        let problem = ExpDecay::synthetic(2.5, 1.3);
        let lm = LevenbergMarquardt::with_default_config();
        let result = lm.minimize(&problem, &array![1.0, 0.5]).unwrap();

        assert!(result.converged);
        assert_relative_eq!(result.params[0], 2.5, epsilon = 1e-4);
        assert_relative_eq!(result.params[1], 1.3, epsilon = 1e-4);
        assert!(result.cost < 1e-10);
    }

    #[test]
    fn bounded_fit_respects_box() {
        let problem = ExpDecay::synthetic(2.5, 1.3);
        let lm = LevenbergMarquardt::with_default_config();
        let result = lm
            .minimize_bounded(&problem, &array![1.0, 0.5], &[0.0, 0.0], &[2.0, 1.0])
            .unwrap();

        assert!(result.params[0] <= 2.0 + 1e-12);
        assert!(result.params[1] <= 1.0 + 1e-12);
        // Both optima sit outside the box, so the fit lands on the boundary.
        assert_relative_eq!(result.params[0], 2.0, epsilon = 1e-6);
    }

    #[test]
    fn bounds_length_mismatch_is_rejected() {
        let problem = ExpDecay::synthetic(1.0, 1.0);
        let lm = LevenbergMarquardt::with_default_config();
        let err = lm
            .minimize_bounded(&problem, &array![1.0, 1.0], &[0.0], &[1.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, MfError::DimensionMismatch(_)));
    }

    #[test]
    fn stationary_start_converges_immediately() {
        let problem = ExpDecay::synthetic(2.5, 1.3);
        let lm = LevenbergMarquardt::with_default_config();
        let result = lm.minimize(&problem, &array![2.5, 1.3]).unwrap();
        assert!(result.converged);
        assert!(result.cost < 1e-18);
    }

}
