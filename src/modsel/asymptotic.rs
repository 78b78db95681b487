//! Asymptotic information criteria: AIC, AICc, BIC.

use std::f64::consts::PI;

use crate::data::SpinRecord;
use crate::error::Result;
use crate::fit::SpinFits;
use crate::modsel::{argmin_outcome, SelectionContext, SelectionOutcome, SelectionStrategy};

/// Which penalty the asymptotic criterion applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Aic,
    Aicc,
    Bic,
}

impl Criterion {
    /// The penalty term for `k` parameters and `n` data points.
    ///
    /// AICc diverges as the parameter count approaches the data count;
    /// `n - k - 1 <= 0` maps to infinity so such models drop out of the
    /// argmin instead of dividing by zero.
    pub fn penalty(&self, k: usize, n: usize) -> f64 {
        let k = k as f64;
        let n = n as f64;
        match self {
            Criterion::Aic => 2.0 * k,
            Criterion::Aicc => {
                if n - k - 1.0 <= 0.0 {
                    f64::INFINITY
                } else {
                    2.0 * k + 2.0 * k * (k + 1.0) / (n - k - 1.0)
                }
            }
            Criterion::Bic => k * n.ln(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Criterion::Aic => "AIC",
            Criterion::Aicc => "AICc",
            Criterion::Bic => "BIC",
        }
    }
}

/// The normalized criterion value for one model fit.
///
/// `(n ln(2 pi) + sum(ln sigma_i) + chi2 + penalty) / 2n`, a scaled
/// log-likelihood form; only the chi2 and penalty terms differ between
/// models, but the full value is reported for comparability across spins.
pub fn criterion_value(criterion: Criterion, chi2: f64, k: usize, n: usize, errors: &[f64]) -> f64 {
    let n_f = n as f64;
    let ln_sigma: f64 = errors.iter().map(|&e| e.ln()).sum();
    (n_f * (2.0 * PI).ln() + ln_sigma + chi2 + criterion.penalty(k, n)) / (2.0 * n_f)
}

/// AIC/AICc/BIC model selection: argmin of the criterion over the fitted
/// models.
#[derive(Debug, Clone, Copy)]
pub struct Asymptotic {
    criterion: Criterion,
}

impl Asymptotic {
    pub fn new(criterion: Criterion) -> Self {
        Asymptotic { criterion }
    }
}

impl SelectionStrategy for Asymptotic {
    fn name(&self) -> &'static str {
        self.criterion.label()
    }

    fn select(
        &self,
        ctx: &SelectionContext,
        spin: &SpinRecord,
        fits: &SpinFits,
    ) -> Result<SelectionOutcome> {
        let n = ctx.n_data();
        let errors = spin.errors();

        let scores: Vec<_> = fits
            .outcomes
            .iter()
            .filter_map(|(&model, outcome)| outcome.fitted().map(|fit| (model, fit)))
            .map(|(model, fit)| {
                (
                    model,
                    criterion_value(self.criterion, fit.chi2, model.param_count(), n, &errors),
                )
            })
            .collect();

        Ok(argmin_outcome(&scores))
    }
}
