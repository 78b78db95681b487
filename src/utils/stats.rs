//! Sample statistics for Monte Carlo simulation results.

/// Mean of a sample.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Population standard deviation of a sample, used for Monte Carlo
/// parameter errors.
pub fn std_dev(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return f64::NAN;
    }
    let m = mean(samples);
    let var = samples.iter().map(|&x| (x - m).powi(2)).sum::<f64>() / samples.len() as f64;
    var.sqrt()
}

/// Upper percentile of a sample after trimming off the given fraction of the
/// largest values.
///
/// `percentile` is e.g. 0.90 for the 90th percentile; `trim` is the fraction
/// of worst (largest) values discarded before the percentile is taken.
pub fn trimmed_upper_percentile(samples: &[f64], percentile: f64, trim: f64) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let mut sorted: Vec<f64> = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let keep = ((sorted.len() as f64) * (1.0 - trim)).round() as usize;
    let keep = keep.clamp(1, sorted.len());
    sorted.truncate(keep);

    let idx = ((sorted.len() as f64) * percentile).floor() as usize;
    Some(sorted[idx.min(sorted.len() - 1)])
}
