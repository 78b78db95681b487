//! Bootstrap estimate of model discrepancy.
//!
//! Each model is refit to datasets resampled around the measured values
//! ("expr" simulations); the criterion is the average chi-squared of the
//! simulation back-calculations against the real data, normalized by 2n.
//! Models whose fits carry no simulations are non-candidates.

use crate::data::SpinRecord;
use crate::error::Result;
use crate::fit::SpinFits;
use crate::modsel::{argmin_outcome, SelectionContext, SelectionOutcome, SelectionStrategy};
use crate::utils::stats;

#[derive(Debug, Clone, Copy, Default)]
pub struct Bootstrap;

impl Bootstrap {
    pub fn new() -> Self {
        Bootstrap
    }
}

impl SelectionStrategy for Bootstrap {
    fn name(&self) -> &'static str {
        "bootstrap"
    }

    fn select(
        &self,
        ctx: &SelectionContext,
        _spin: &SpinRecord,
        fits: &SpinFits,
    ) -> Result<SelectionOutcome> {
        let two_n = 2.0 * ctx.n_data() as f64;

        let scores: Vec<_> = fits
            .outcomes
            .iter()
            .filter_map(|(&model, outcome)| outcome.fitted().map(|fit| (model, fit)))
            .map(|(model, fit)| {
                let crit = if fit.sim_chi2_vs_measured.is_empty() {
                    f64::INFINITY
                } else {
                    stats::mean(&fit.sim_chi2_vs_measured) / two_n
                };
                (model, crit)
            })
            .collect();

        Ok(argmin_outcome(&scores))
    }
}
