//! Overall discrepancy against known ground truth.
//!
//! Benchmark-only strategies: when the noiseless relaxation values that
//! generated a synthetic dataset are known, the discrepancy of each
//! model's back-calculation against them can be computed directly,
//! bypassing every statistical heuristic.  Used as the reference point
//! when validating the other strategies.

use std::collections::BTreeMap;

use crate::chi2::chi_squared;
use crate::data::SpinRecord;
use crate::error::Result;
use crate::fit::SpinFits;
use crate::modsel::{argmin_outcome, SelectionContext, SelectionOutcome, SelectionStrategy};

/// Which values are compared against the ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscrepancyMode {
    /// The back-calculation of the point-estimate fit.
    Expected,
    /// The average over the Monte Carlo simulation fits, estimating the
    /// discrepancy realized under the measurement noise.
    Realized,
}

/// Selection by discrepancy against known true relaxation values, keyed
/// by residue number.
pub struct OverallDiscrepancy {
    truth: BTreeMap<String, Vec<f64>>,
    mode: DiscrepancyMode,
}

impl OverallDiscrepancy {
    pub fn new(truth: BTreeMap<String, Vec<f64>>, mode: DiscrepancyMode) -> Self {
        OverallDiscrepancy { truth, mode }
    }
}

impl SelectionStrategy for OverallDiscrepancy {
    fn name(&self) -> &'static str {
        match self.mode {
            DiscrepancyMode::Expected => "expected overall discrepancy",
            DiscrepancyMode::Realized => "realized overall discrepancy",
        }
    }

    fn select(
        &self,
        ctx: &SelectionContext,
        spin: &SpinRecord,
        fits: &SpinFits,
    ) -> Result<SelectionOutcome> {
        let truth = match self.truth.get(&fits.res_num) {
            Some(truth) => truth,
            None => return Ok(argmin_outcome(&[])),
        };
        let errors = spin.errors();
        let two_n = 2.0 * ctx.n_data() as f64;

        let mut scores = Vec::new();
        for (&model, outcome) in &fits.outcomes {
            let fit = match outcome.fitted() {
                Some(fit) => fit,
                None => continue,
            };

            let crit = match self.mode {
                DiscrepancyMode::Expected => {
                    let back = ctx.forward.back_calculate(model, &fit.params.to_vec())?;
                    chi_squared(truth, &errors, &back)? / two_n
                }
                DiscrepancyMode::Realized => {
                    if fit.sim_params.is_empty() {
                        f64::INFINITY
                    } else {
                        let mut sum = 0.0;
                        for params in &fit.sim_params {
                            let back = ctx.forward.back_calculate(model, &params.to_vec())?;
                            sum += chi_squared(truth, &errors, &back)?;
                        }
                        sum / fit.sim_params.len() as f64 / two_n
                    }
                }
            };
            scores.push((model, crit));
        }

        Ok(argmin_outcome(&scores))
    }
}
