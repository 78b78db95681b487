//! Configuration for the Levenberg-Marquardt optimizer.

/// Tuning knobs for [`super::LevenbergMarquardt`].
///
/// The defaults are tight enough for the sub-nanosecond time scales and
/// order-parameter ranges encountered in relaxation fits; callers rarely
/// need to change anything other than `max_iterations`.
#[derive(Debug, Clone)]
pub struct LmConfig {
    /// Maximum number of accepted-or-rejected iterations.
    pub max_iterations: usize,
    /// Relative tolerance on the cost decrease between accepted steps.
    pub ftol: f64,
    /// Relative tolerance on the parameter step norm.
    pub xtol: f64,
    /// Initial damping parameter lambda.
    pub initial_lambda: f64,
    /// Factor applied to lambda after a rejected step.
    pub lambda_up: f64,
    /// Factor applied to lambda after an accepted step.
    pub lambda_down: f64,
    /// Lower clamp for lambda.
    pub min_lambda: f64,
    /// Upper clamp for lambda; exceeding it aborts the iteration loop.
    pub max_lambda: f64,
}

impl Default for LmConfig {
    fn default() -> Self {
        LmConfig {
            max_iterations: 100,
            ftol: 1e-10,
            xtol: 1e-10,
            initial_lambda: 1e-3,
            lambda_up: 10.0,
            lambda_down: 0.1,
            min_lambda: 1e-12,
            max_lambda: 1e12,
        }
    }
}

impl LmConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }

    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.xtol = xtol;
        self
    }

    pub fn with_initial_lambda(mut self, initial_lambda: f64) -> Self {
        self.initial_lambda = initial_lambda;
        self
    }
}
