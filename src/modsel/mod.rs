//! Model selection strategies.
//!
//! Every strategy consumes the per-model fits of one spin and emits a
//! [`SelectionOutcome`].  Ties between models are first-class outcomes,
//! never broken arbitrarily, and "no adequate model" is distinct from
//! "every fit failed".

pub mod asymptotic;
pub mod bootstrap;
pub mod cross_validation;
pub mod farrow;
pub mod overall;
pub mod palmer;

use crate::catalog::ModelSpec;
use crate::data::{AnalysisConfig, SpinRecord};
use crate::error::Result;
use crate::fit::SpinFits;
use crate::forward::ForwardModel;
use crate::oracle::FitResult;

pub use asymptotic::{Asymptotic, Criterion};
pub use bootstrap::Bootstrap;
pub use cross_validation::CrossValidation;
pub use farrow::Farrow;
pub use overall::{DiscrepancyMode, OverallDiscrepancy};
pub use palmer::Palmer;

/// Why a spin ended with no selected model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoFitReason {
    /// Fits exist but no model passed the strategy's tests.
    NoModelPassed,
    /// Every fit unit for the spin failed.
    AllFitsFailed,
}

/// The outcome of model selection for one spin.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Single(ModelSpec),
    /// Several models passed simultaneously; reported as-is.
    Tie(Vec<ModelSpec>),
    NoFit(NoFitReason),
}

impl SelectionOutcome {
    /// Report label: "1".."5" for a single model, "2+3" style for ties,
    /// "0" for no fit.
    pub fn label(&self) -> String {
        match self {
            SelectionOutcome::Single(model) => model.label().to_string(),
            SelectionOutcome::Tie(models) => models
                .iter()
                .map(|m| m.label())
                .collect::<Vec<_>>()
                .join("+"),
            SelectionOutcome::NoFit(_) => "0".to_string(),
        }
    }

    pub fn single(&self) -> Option<ModelSpec> {
        match self {
            SelectionOutcome::Single(model) => Some(*model),
            _ => None,
        }
    }
}

/// The selected model for one spin, with the winning fit when a single
/// model won.  Ties and no-fit outcomes carry no parameters.
#[derive(Debug, Clone)]
pub struct SelectedModelRecord {
    pub res_num: String,
    pub res_name: String,
    pub outcome: SelectionOutcome,
    pub fit: Option<FitResult>,
}

/// Thresholds of the Farrow and Palmer heuristics.
///
/// These are calibration inputs, not algorithm constants; the defaults
/// reproduce the conventional values.
#[derive(Debug, Clone)]
pub struct SelectionConfig {
    /// Chi-squared at or above which a model 1 fit stops counting as an
    /// acceptable fallback.
    pub large_chi2: f64,
    /// Chi-squared at or below which a fit counts as perfect.
    pub zero_chi2: f64,
    /// Fixed F-statistic gate of the two-regime test rule.
    pub fstat_gate: f64,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        SelectionConfig {
            large_chi2: 20.0,
            zero_chi2: 0.0,
            fstat_gate: 1.5,
        }
    }
}

impl SelectionConfig {
    pub fn from_analysis(config: &AnalysisConfig) -> Self {
        SelectionConfig {
            large_chi2: config.large_chi2,
            zero_chi2: config.zero_chi2,
            fstat_gate: 1.5,
        }
    }
}

/// Shared context handed to every strategy.
pub struct SelectionContext<'a> {
    pub forward: &'a ForwardModel,
    pub config: SelectionConfig,
}

impl<'a> SelectionContext<'a> {
    pub fn new(forward: &'a ForwardModel) -> Self {
        SelectionContext {
            forward,
            config: SelectionConfig::default(),
        }
    }

    pub fn with_config(forward: &'a ForwardModel, config: SelectionConfig) -> Self {
        SelectionContext { forward, config }
    }

    /// Number of relaxation datasets (the `n` of criteria and F-tests).
    pub fn n_data(&self) -> usize {
        self.forward.num_data_sets()
    }
}

/// A model selection strategy.
pub trait SelectionStrategy: Sync {
    fn name(&self) -> &'static str;

    /// Select a model for one spin from its fits.
    fn select(
        &self,
        ctx: &SelectionContext,
        spin: &SpinRecord,
        fits: &SpinFits,
    ) -> Result<SelectionOutcome>;
}

/// Run a strategy over every spin, producing the per-spin records.
///
/// Spins with no successful fit at all short-circuit to the explicit
/// all-fits-failed outcome without consulting the strategy.
pub fn select_all(
    strategy: &dyn SelectionStrategy,
    ctx: &SelectionContext,
    spins: &[SpinRecord],
    fits: &[SpinFits],
) -> Result<Vec<SelectedModelRecord>> {
    let mut records = Vec::with_capacity(fits.len());
    for (spin, spin_fits) in spins.iter().zip(fits.iter()) {
        let outcome = if !spin_fits.any_fitted() {
            SelectionOutcome::NoFit(NoFitReason::AllFitsFailed)
        } else {
            strategy.select(ctx, spin, spin_fits)?
        };

        let fit = outcome
            .single()
            .and_then(|model| spin_fits.fit(model))
            .cloned();
        records.push(SelectedModelRecord {
            res_num: spin_fits.res_num.clone(),
            res_name: spin_fits.res_name.clone(),
            outcome,
            fit,
        });
    }
    Ok(records)
}

/// Argmin over per-model criterion values.  Non-finite values are
/// non-candidates; an empty or all-non-finite score set yields the
/// no-model-passed outcome.
pub(crate) fn argmin_outcome(scores: &[(ModelSpec, f64)]) -> SelectionOutcome {
    let mut best: Option<(ModelSpec, f64)> = None;
    for &(model, crit) in scores {
        if !crit.is_finite() {
            continue;
        }
        if best.map_or(true, |(_, c)| crit < c) {
            best = Some((model, crit));
        }
    }
    match best {
        Some((model, _)) => SelectionOutcome::Single(model),
        None => SelectionOutcome::NoFit(NoFitReason::NoModelPassed),
    }
}

/// Chi-squared test: the fit is adequate when its chi-squared sits within
/// the simulated cutoff.  Fails when no cutoff is available.
pub(crate) fn chi2_test(fit: Option<&FitResult>) -> bool {
    fit.map_or(false, |f| f.chi2_lim.map_or(false, |lim| f.chi2 <= lim))
}

/// Large chi-squared flag: the fit is too poor to serve as a fallback.
pub(crate) fn large_chi2(fit: Option<&FitResult>, config: &SelectionConfig) -> bool {
    fit.map_or(true, |f| f.chi2 >= config.large_chi2)
}

/// Zero chi-squared flag: the fit is essentially exact.
pub(crate) fn zero_chi2(fit: Option<&FitResult>, config: &SelectionConfig) -> bool {
    fit.map_or(false, |f| f.chi2 <= config.zero_chi2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels() {
        assert_eq!(SelectionOutcome::Single(ModelSpec::M2).label(), "2");
        assert_eq!(
            SelectionOutcome::Tie(vec![ModelSpec::M2, ModelSpec::M3]).label(),
            "2+3"
        );
        assert_eq!(
            SelectionOutcome::Tie(vec![ModelSpec::M4, ModelSpec::M5]).label(),
            "4+5"
        );
        assert_eq!(
            SelectionOutcome::NoFit(NoFitReason::NoModelPassed).label(),
            "0"
        );
    }

    #[test]
    fn argmin_skips_non_finite() {
        let outcome = argmin_outcome(&[
            (ModelSpec::M1, f64::INFINITY),
            (ModelSpec::M2, 3.0),
            (ModelSpec::M3, 2.0),
            (ModelSpec::M4, f64::NAN),
        ]);
        assert_eq!(outcome, SelectionOutcome::Single(ModelSpec::M3));
    }

    #[test]
    fn argmin_all_infinite_is_no_fit() {
        let outcome = argmin_outcome(&[
            (ModelSpec::M1, f64::INFINITY),
            (ModelSpec::M2, f64::INFINITY),
        ]);
        assert_eq!(
            outcome,
            SelectionOutcome::NoFit(NoFitReason::NoModelPassed)
        );
    }
}
