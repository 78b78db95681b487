//! Weighted sum-of-squared-residuals goodness-of-fit statistic.

use crate::error::{MfError, Result};

/// Chi-squared between observed and back-calculated values:
/// `sum(((obs_i - calc_i) / err_i)^2)`.
///
/// All three slices must have equal length; a mismatch is an error rather
/// than a silent out-of-bounds read.
pub fn chi_squared(observed: &[f64], errors: &[f64], back_calculated: &[f64]) -> Result<f64> {
    if observed.len() != errors.len() || observed.len() != back_calculated.len() {
        return Err(MfError::DimensionMismatch(format!(
            "chi-squared over {} observed, {} errors, {} back-calculated values",
            observed.len(),
            errors.len(),
            back_calculated.len()
        )));
    }

    let mut chi2 = 0.0;
    for i in 0..observed.len() {
        let residual = (observed[i] - back_calculated[i]) / errors[i];
        chi2 += residual * residual;
    }
    Ok(chi2)
}
