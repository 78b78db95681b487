//! The Farrow selection heuristic.
//!
//! A fixed cascade per spin: accept m1 when its chi-squared passes the
//! simulated cutoff; otherwise accept m2 or m3 when they pass both their
//! own chi-squared test and an F-test against m1; fall back to m1 unless
//! its chi-squared is large; finally accept m4 or m5 only on an
//! essentially exact fit.  Simultaneous passes of m2/m3 or m4/m5 are
//! reported as ties.

use crate::catalog::{FtestPair, ModelSpec};
use crate::data::SpinRecord;
use crate::error::Result;
use crate::fit::SpinFits;
use crate::modsel::{
    chi2_test, large_chi2, zero_chi2, NoFitReason, SelectionConfig, SelectionContext,
    SelectionOutcome, SelectionStrategy,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Farrow;

impl Farrow {
    pub fn new() -> Self {
        Farrow
    }

    /// Farrow's F-test rule: the richer model is significant when the
    /// statistic clears the fixed gate or the simulated cutoff.
    fn ftest(fits: &SpinFits, pair: FtestPair, config: &SelectionConfig) -> bool {
        match fits.pair(pair) {
            Some(result) => {
                result.fstat > config.fstat_gate
                    || result.fstat_lim.map_or(false, |lim| result.fstat > lim)
            }
            None => false,
        }
    }
}

impl SelectionStrategy for Farrow {
    fn name(&self) -> &'static str {
        "Farrow"
    }

    fn select(
        &self,
        ctx: &SelectionContext,
        _spin: &SpinRecord,
        fits: &SpinFits,
    ) -> Result<SelectionOutcome> {
        let config = &ctx.config;

        let m1_ok = chi2_test(fits.fit(ModelSpec::M1));
        let m2_ok = chi2_test(fits.fit(ModelSpec::M2))
            && Self::ftest(fits, FtestPair::M1M2, config);
        let m3_ok = chi2_test(fits.fit(ModelSpec::M3))
            && Self::ftest(fits, FtestPair::M1M3, config);

        if m1_ok {
            return Ok(SelectionOutcome::Single(ModelSpec::M1));
        }
        if m2_ok && m3_ok {
            return Ok(SelectionOutcome::Tie(vec![ModelSpec::M2, ModelSpec::M3]));
        }
        if m2_ok {
            return Ok(SelectionOutcome::Single(ModelSpec::M2));
        }
        if m3_ok {
            return Ok(SelectionOutcome::Single(ModelSpec::M3));
        }

        // Fallback: m1 again, unless its fit is outright poor.
        if fits.fit(ModelSpec::M1).is_some() && !large_chi2(fits.fit(ModelSpec::M1), config) {
            return Ok(SelectionOutcome::Single(ModelSpec::M1));
        }

        let m4_zero = zero_chi2(fits.fit(ModelSpec::M4), config);
        let m5_zero = zero_chi2(fits.fit(ModelSpec::M5), config);
        if m4_zero && m5_zero {
            return Ok(SelectionOutcome::Tie(vec![ModelSpec::M4, ModelSpec::M5]));
        }
        if m4_zero {
            return Ok(SelectionOutcome::Single(ModelSpec::M4));
        }
        if m5_zero {
            return Ok(SelectionOutcome::Single(ModelSpec::M5));
        }

        Ok(SelectionOutcome::NoFit(NoFitReason::NoModelPassed))
    }
}
