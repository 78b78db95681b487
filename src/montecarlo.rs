//! Monte Carlo simulation support for parameter errors and selection limits.
//!
//! Simulated datasets are drawn with Gaussian noise of the measured errors,
//! centered either on the back-calculated values ("pred") or on the measured
//! values themselves ("expr").  Refitting the simulations yields empirical
//! parameter errors and the chi-squared and F-statistic cutoffs used by the
//! Palmer selection method.

use ndarray::Array1;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::error::{MfError, Result};
use crate::utils::stats;

/// How Monte Carlo simulation datasets are centered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimType {
    /// No simulations.
    None,
    /// Centered on the back-calculated (fitted) values.
    Pred,
    /// Centered on the measured values.
    Expr,
}

/// Draw one synthetic dataset: `center[i] + N(0, error[i])`.
pub fn perturb<R: Rng + ?Sized>(center: &[f64], errors: &[f64], rng: &mut R) -> Result<Vec<f64>> {
    if center.len() != errors.len() {
        return Err(MfError::DimensionMismatch(format!(
            "{} values against {} errors",
            center.len(),
            errors.len()
        )));
    }
    center
        .iter()
        .zip(errors.iter())
        .map(|(&c, &e)| {
            let dist = Normal::new(c, e)
                .map_err(|_| MfError::InvalidParameter(format!("Invalid noise width {:e}", e)))?;
            Ok(dist.sample(rng))
        })
        .collect()
}

/// Per-parameter standard deviations over a set of simulation fits.
///
/// `sim_params` is one parameter vector per simulation; all vectors must
/// share the length of the original fit.
pub fn parameter_errors(sim_params: &[Array1<f64>], n_params: usize) -> Result<Vec<f64>> {
    if sim_params.is_empty() {
        return Ok(vec![0.0; n_params]);
    }
    for p in sim_params {
        if p.len() != n_params {
            return Err(MfError::DimensionMismatch(format!(
                "Simulation fit has {} parameters, expected {}",
                p.len(),
                n_params
            )));
        }
    }

    let errs = (0..n_params)
        .map(|j| {
            let column: Vec<f64> = sim_params.iter().map(|p| p[j]).collect();
            stats::std_dev(&column)
        })
        .collect();
    Ok(errs)
}

/// Upper confidence cutoff of a simulated statistic distribution.
///
/// The largest `trim` fraction of the simulations is discarded before the
/// percentile is taken, which keeps diverged simulation fits from inflating
/// the limit.  Returns `None` when no simulations survive.
pub fn simulated_limit(samples: &[f64], confidence: f64, trim: f64) -> Option<f64> {
    let finite: Vec<f64> = samples.iter().copied().filter(|v| v.is_finite()).collect();
    stats::trimmed_upper_percentile(&finite, confidence, trim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn perturbation_scatters_with_given_width() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let center = vec![2.0, 10.0];
        let errors = vec![0.05, 0.2];

        let mut first = Vec::new();
        for _ in 0..2000 {
            let sim = perturb(&center, &errors, &mut rng).unwrap();
            first.push(sim[0]);
        }
        assert_relative_eq!(stats::mean(&first), 2.0, epsilon = 0.01);
        assert_relative_eq!(stats::std_dev(&first), 0.05, epsilon = 0.005);
    }

    #[test]
    fn zero_error_reproduces_center() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let sim = perturb(&[1.5, -0.2], &[0.0, 0.0], &mut rng).unwrap();
        assert_eq!(sim, vec![1.5, -0.2]);
    }

    #[test]
    fn perturb_length_mismatch() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let err = perturb(&[1.0, 2.0], &[0.1], &mut rng).unwrap_err();
        assert!(matches!(err, MfError::DimensionMismatch(_)));
    }

    #[test]
    fn parameter_errors_are_columnwise() {
        let sims = vec![array![1.0, 10.0], array![3.0, 10.0]];
        let errs = parameter_errors(&sims, 2).unwrap();
        assert_relative_eq!(errs[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(errs[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn no_simulations_gives_zero_errors() {
        let errs = parameter_errors(&[], 3).unwrap();
        assert_eq!(errs, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn simulated_limit_ignores_diverged_fits() {
        let mut samples: Vec<f64> = (0..100).map(|i| i as f64).collect();
        samples.push(f64::INFINITY);
        let limit = simulated_limit(&samples, 0.90, 0.0).unwrap();
        assert!(limit >= 88.0 && limit <= 92.0);
    }

    #[test]
    fn simulated_limit_empty() {
        assert!(simulated_limit(&[], 0.90, 0.1).is_none());
    }
}
