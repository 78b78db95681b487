//! Model-free spectral density functions.
//!
//! Isotropic-diffusion Lorentzian decomposition of the spectral density.
//! The original model-free equation (models 1-4) is:
//!
//! ```text
//!          2    /      S2             (1 - S2)(te + tm)te    \
//! J(w)  =  - tm | ------------  +  ------------------------- |
//!          5    \ 1 + (w.tm)^2     (te + tm)^2 + (w.te.tm)^2 /
//! ```
//!
//! and the extended equation (model 5) is:
//!
//! ```text
//!          2    /   S2f . S2s       S2f(1 - S2s)(ts + tm)ts  \
//! J(w)  =  - tm | ------------  +  ------------------------- |
//!          5    \ 1 + (w.tm)^2     (ts + tm)^2 + (w.ts.tm)^2 /
//! ```
//!
//! Models 3 and 4 share the Lorentzian form of models 1 and 2; their Rex
//! term is not part of J(w) and is added directly to R2 by the forward model.

use crate::catalog::ModelSpec;
use crate::error::{MfError, Result};

const TWO_FIFTHS: f64 = 2.0 / 5.0;

/// One-Lorentzian spectral density (model 1 and model 3).
fn jw_s2(s2: f64, tm: f64, omega: f64) -> f64 {
    TWO_FIFTHS * tm * (s2 / (1.0 + (omega * tm).powi(2)))
}

/// Two-Lorentzian spectral density with a single internal correlation time
/// (models 2 and 4).
fn jw_s2_te(s2: f64, te: f64, tm: f64, omega: f64) -> f64 {
    let overall = s2 / (1.0 + (omega * tm).powi(2));
    let internal = if te > 0.0 {
        let te_tm_te = (te + tm) * te;
        let denom = (te + tm).powi(2) + (omega * te * tm).powi(2);
        (1.0 - s2) * te_tm_te / denom
    } else {
        // te = 0 collapses the internal-motion term.
        0.0
    };
    TWO_FIFTHS * tm * (overall + internal)
}

/// Extended two-timescale spectral density (model 5), with S2 = S2f * S2s.
fn jw_s2f_s2s_ts(s2f: f64, s2s: f64, ts: f64, tm: f64, omega: f64) -> f64 {
    let s2 = s2f * s2s;
    let slow = if ts > 0.0 {
        let ts_tm_ts = (ts + tm) * ts;
        let denom = (ts + tm).powi(2) + (omega * ts * tm).powi(2);
        (s2f - s2) * ts_tm_ts / denom
    } else {
        0.0
    };
    TWO_FIFTHS * tm * (s2 / (1.0 + (omega * tm).powi(2)) + slow)
}

/// Evaluate the spectral density J(omega) for one model at one frequency.
///
/// `params` must follow the model's fixed parameter order (see
/// [`ModelSpec::param_names`]).  `tm` is the global rotational correlation
/// time in seconds; `omega` is an angular frequency in rad/s.
///
/// # Errors
///
/// Returns [`MfError::Domain`] for non-physical `tm <= 0` and
/// [`MfError::DimensionMismatch`] for a parameter vector of the wrong length.
pub fn spectral_density(model: ModelSpec, params: &[f64], tm: f64, omega: f64) -> Result<f64> {
    if tm <= 0.0 {
        return Err(MfError::Domain(format!(
            "tm must be positive, got {:e}",
            tm
        )));
    }
    if params.len() != model.param_count() {
        return Err(MfError::DimensionMismatch(format!(
            "{} expects {} parameters, got {}",
            model,
            model.param_count(),
            params.len()
        )));
    }

    let j = match model {
        ModelSpec::M1 => jw_s2(params[0], tm, omega),
        ModelSpec::M2 => jw_s2_te(params[0], params[1], tm, omega),
        ModelSpec::M3 => jw_s2(params[0], tm, omega),
        ModelSpec::M4 => jw_s2_te(params[0], params[1], tm, omega),
        ModelSpec::M5 => jw_s2f_s2s_ts(params[0], params[1], params[2], tm, omega),
    };
    Ok(j)
}
