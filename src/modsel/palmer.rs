//! The Palmer selection heuristic (Mandel et al., 1995).
//!
//! Shares the Farrow cascade shape but applies an ANOVA-style two-regime
//! F-test rule and forks on the number of datasets: with more than three
//! datasets models 4 and 5 are over-determined and get their own
//! chi-squared and F-tests (the extended procedure); with exactly three
//! they are only accepted on an essentially exact fit (the normal
//! procedure).

use crate::catalog::{FtestPair, ModelSpec};
use crate::data::SpinRecord;
use crate::error::Result;
use crate::fit::SpinFits;
use crate::modsel::{
    chi2_test, large_chi2, zero_chi2, NoFitReason, SelectionConfig, SelectionContext,
    SelectionOutcome, SelectionStrategy,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Palmer;

impl Palmer {
    pub fn new() -> Self {
        Palmer
    }

    /// The two-regime F-test rule: when the simulated cutoff sits below
    /// the fixed gate, the gate decides; otherwise the cutoff does.
    /// Fails when the pair was not evaluated or carries no cutoff.
    fn ftest(fits: &SpinFits, pair: FtestPair, config: &SelectionConfig) -> bool {
        match fits.pair(pair) {
            Some(result) => match result.fstat_lim {
                Some(lim) if lim < config.fstat_gate => result.fstat > config.fstat_gate,
                Some(lim) => result.fstat > lim,
                None => false,
            },
            None => false,
        }
    }

    fn select_normal(
        &self,
        fits: &SpinFits,
        config: &SelectionConfig,
    ) -> SelectionOutcome {
        let m1_ok = chi2_test(fits.fit(ModelSpec::M1));
        let m2_ok = chi2_test(fits.fit(ModelSpec::M2))
            && Self::ftest(fits, FtestPair::M1M2, config);
        let m3_ok = chi2_test(fits.fit(ModelSpec::M3))
            && Self::ftest(fits, FtestPair::M1M3, config);

        if m1_ok {
            return SelectionOutcome::Single(ModelSpec::M1);
        }
        if m2_ok && m3_ok {
            return SelectionOutcome::Tie(vec![ModelSpec::M2, ModelSpec::M3]);
        }
        if m2_ok {
            return SelectionOutcome::Single(ModelSpec::M2);
        }
        if m3_ok {
            return SelectionOutcome::Single(ModelSpec::M3);
        }
        if fits.fit(ModelSpec::M1).is_some() && !large_chi2(fits.fit(ModelSpec::M1), config) {
            return SelectionOutcome::Single(ModelSpec::M1);
        }

        let m4_zero = zero_chi2(fits.fit(ModelSpec::M4), config);
        let m5_zero = zero_chi2(fits.fit(ModelSpec::M5), config);
        if m4_zero && m5_zero {
            return SelectionOutcome::Tie(vec![ModelSpec::M4, ModelSpec::M5]);
        }
        if m4_zero {
            return SelectionOutcome::Single(ModelSpec::M4);
        }
        if m5_zero {
            return SelectionOutcome::Single(ModelSpec::M5);
        }

        SelectionOutcome::NoFit(NoFitReason::NoModelPassed)
    }

    fn select_extended(
        &self,
        fits: &SpinFits,
        config: &SelectionConfig,
    ) -> SelectionOutcome {
        let m1_ok = chi2_test(fits.fit(ModelSpec::M1));
        let m2_ok = chi2_test(fits.fit(ModelSpec::M2))
            && Self::ftest(fits, FtestPair::M1M2, config);
        let m3_ok = chi2_test(fits.fit(ModelSpec::M3))
            && Self::ftest(fits, FtestPair::M1M3, config);

        if m1_ok {
            return SelectionOutcome::Single(ModelSpec::M1);
        }
        if m2_ok && m3_ok {
            return SelectionOutcome::Tie(vec![ModelSpec::M2, ModelSpec::M3]);
        }
        if m2_ok {
            return SelectionOutcome::Single(ModelSpec::M2);
        }
        if m3_ok {
            return SelectionOutcome::Single(ModelSpec::M3);
        }
        if fits.fit(ModelSpec::M1).is_some() && !large_chi2(fits.fit(ModelSpec::M1), config) {
            return SelectionOutcome::Single(ModelSpec::M1);
        }

        let m4_ok = chi2_test(fits.fit(ModelSpec::M4))
            && (Self::ftest(fits, FtestPair::M2M4, config)
                || Self::ftest(fits, FtestPair::M3M4, config));
        let m5_ok = chi2_test(fits.fit(ModelSpec::M5))
            && Self::ftest(fits, FtestPair::M2M5, config);

        if m4_ok && m5_ok {
            return SelectionOutcome::Tie(vec![ModelSpec::M4, ModelSpec::M5]);
        }
        if m4_ok {
            return SelectionOutcome::Single(ModelSpec::M4);
        }
        if m5_ok {
            return SelectionOutcome::Single(ModelSpec::M5);
        }

        SelectionOutcome::NoFit(NoFitReason::NoModelPassed)
    }
}

impl SelectionStrategy for Palmer {
    fn name(&self) -> &'static str {
        "Palmer"
    }

    fn select(
        &self,
        ctx: &SelectionContext,
        _spin: &SpinRecord,
        fits: &SpinFits,
    ) -> Result<SelectionOutcome> {
        let outcome = if ctx.n_data() > 3 {
            self.select_extended(fits, &ctx.config)
        } else {
            self.select_normal(fits, &ctx.config)
        };
        Ok(outcome)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::data::{AnalysisConfig, DatasetDescriptor, FieldInfo, RelaxKind};
    use crate::fit::{PairOutcome, UnitOutcome};
    use crate::forward::ForwardModel;
    use crate::oracle::{FitResult, PairResult};
    use ndarray::Array1;
    use std::collections::BTreeMap;

    /// Forward model with exactly three datasets (one field).
    pub(crate) fn ctx_forward() -> ForwardModel {
        forward_with_datasets(3)
    }

    /// Forward model with four datasets (two fields, R1 only at the
    /// second).
    pub(crate) fn ctx_forward_four() -> ForwardModel {
        forward_with_datasets(4)
    }

    fn forward_with_datasets(n: usize) -> ForwardModel {
        let fields = vec![
            FieldInfo {
                label: "600".to_string(),
                proton_frq_hz: 600.13e6,
            },
            FieldInfo {
                label: "500".to_string(),
                proton_frq_hz: 500.13e6,
            },
        ];
        let mut descriptors = vec![
            DatasetDescriptor {
                kind: RelaxKind::R1,
                field: 0,
            },
            DatasetDescriptor {
                kind: RelaxKind::R2,
                field: 0,
            },
            DatasetDescriptor {
                kind: RelaxKind::Noe,
                field: 0,
            },
        ];
        if n > 3 {
            descriptors.push(DatasetDescriptor {
                kind: RelaxKind::R1,
                field: 1,
            });
        }
        ForwardModel::new(&fields, &descriptors, &AnalysisConfig::default()).unwrap()
    }

    pub(crate) fn fit(model: ModelSpec, chi2: f64, chi2_lim: Option<f64>) -> FitResult {
        FitResult {
            model,
            params: Array1::from_elem(model.param_count(), 0.5),
            errors: vec![0.0; model.param_count()],
            chi2,
            n_data: 3,
            chi2_lim,
            sim_chi2: Vec::new(),
            sim_chi2_vs_measured: Vec::new(),
            sim_params: Vec::new(),
            converged: true,
        }
    }

    pub(crate) fn pair_result(
        pair: FtestPair,
        fstat: f64,
        fstat_lim: Option<f64>,
    ) -> PairOutcome {
        PairOutcome::Done(PairResult {
            pair,
            fstat,
            fstat_lim,
            null: fit(pair.null(), 10.0, None),
            alt: fit(pair.alt(), 1.0, None),
        })
    }

    pub(crate) fn spin() -> SpinRecord {
        SpinRecord {
            res_num: "42".to_string(),
            res_name: "VAL".to_string(),
            data: Vec::new(),
        }
    }

    pub(crate) fn spin_fits(
        fits: Vec<(ModelSpec, FitResult)>,
        pairs: Vec<PairOutcome>,
    ) -> SpinFits {
        let mut outcomes = BTreeMap::new();
        for (model, fit) in fits {
            outcomes.insert(model, UnitOutcome::Fitted(fit));
        }
        SpinFits {
            res_num: "42".to_string(),
            res_name: "VAL".to_string(),
            outcomes,
            pairs,
        }
    }

    #[test]
    fn two_regime_rule() {
        let forward = ctx_forward();
        let ctx = SelectionContext::new(&forward);
        // Low simulated cutoff: the fixed gate decides.  fstat 1.4 fails.
        let fits = spin_fits(
            vec![
                (ModelSpec::M1, fit(ModelSpec::M1, 30.0, Some(5.0))),
                (ModelSpec::M2, fit(ModelSpec::M2, 1.0, Some(5.0))),
            ],
            vec![pair_result(FtestPair::M1M2, 1.4, Some(1.0))],
        );
        let outcome = Palmer::new().select(&ctx, &spin(), &fits).unwrap();
        assert_ne!(outcome, SelectionOutcome::Single(ModelSpec::M2));

        // High simulated cutoff: the cutoff decides.  fstat 2.0 with
        // cutoff 3.0 fails even though it clears the fixed gate.
        let fits = spin_fits(
            vec![
                (ModelSpec::M1, fit(ModelSpec::M1, 30.0, Some(5.0))),
                (ModelSpec::M2, fit(ModelSpec::M2, 1.0, Some(5.0))),
            ],
            vec![pair_result(FtestPair::M1M2, 2.0, Some(3.0))],
        );
        let outcome = Palmer::new().select(&ctx, &spin(), &fits).unwrap();
        assert_ne!(outcome, SelectionOutcome::Single(ModelSpec::M2));

        // High cutoff, cleared.
        let fits = spin_fits(
            vec![
                (ModelSpec::M1, fit(ModelSpec::M1, 30.0, Some(5.0))),
                (ModelSpec::M2, fit(ModelSpec::M2, 1.0, Some(5.0))),
            ],
            vec![pair_result(FtestPair::M1M2, 3.5, Some(3.0))],
        );
        let outcome = Palmer::new().select(&ctx, &spin(), &fits).unwrap();
        assert_eq!(outcome, SelectionOutcome::Single(ModelSpec::M2));
    }

    #[test]
    fn three_datasets_never_consult_extended_pairs() {
        let forward = ctx_forward();
        let ctx = SelectionContext::new(&forward);
        // m4 passes its chi2 test and an enormous m2m4 F-statistic is on
        // offer, but with three datasets only a zero chi-squared can
        // accept m4, so the cascade ends at no fit.
        let fits = spin_fits(
            vec![
                (ModelSpec::M1, fit(ModelSpec::M1, 30.0, Some(5.0))),
                (ModelSpec::M4, fit(ModelSpec::M4, 1.0, Some(5.0))),
            ],
            vec![pair_result(FtestPair::M2M4, 1e6, Some(1.0))],
        );
        let outcome = Palmer::new().select(&ctx, &spin(), &fits).unwrap();
        assert_eq!(
            outcome,
            SelectionOutcome::NoFit(NoFitReason::NoModelPassed)
        );
    }

    #[test]
    fn four_datasets_use_extended_tests_for_m4() {
        let forward = ctx_forward_four();
        let ctx = SelectionContext::new(&forward);
        let fits = spin_fits(
            vec![
                (ModelSpec::M1, fit(ModelSpec::M1, 30.0, Some(5.0))),
                (ModelSpec::M4, fit(ModelSpec::M4, 1.0, Some(5.0))),
            ],
            vec![pair_result(FtestPair::M2M4, 4.0, Some(1.0))],
        );
        let outcome = Palmer::new().select(&ctx, &spin(), &fits).unwrap();
        assert_eq!(outcome, SelectionOutcome::Single(ModelSpec::M4));
    }

    #[test]
    fn extended_tie_of_m4_and_m5() {
        let forward = ctx_forward_four();
        let ctx = SelectionContext::new(&forward);
        let fits = spin_fits(
            vec![
                (ModelSpec::M1, fit(ModelSpec::M1, 30.0, Some(5.0))),
                (ModelSpec::M4, fit(ModelSpec::M4, 1.0, Some(5.0))),
                (ModelSpec::M5, fit(ModelSpec::M5, 1.0, Some(5.0))),
            ],
            vec![
                pair_result(FtestPair::M3M4, 4.0, Some(1.0)),
                pair_result(FtestPair::M2M5, 4.0, Some(1.0)),
            ],
        );
        let outcome = Palmer::new().select(&ctx, &spin(), &fits).unwrap();
        assert_eq!(
            outcome,
            SelectionOutcome::Tie(vec![ModelSpec::M4, ModelSpec::M5])
        );
    }

    #[test]
    fn selection_is_deterministic() {
        let forward = ctx_forward();
        let ctx = SelectionContext::new(&forward);
        let fits = spin_fits(
            vec![
                (ModelSpec::M1, fit(ModelSpec::M1, 30.0, Some(5.0))),
                (ModelSpec::M3, fit(ModelSpec::M3, 1.0, Some(5.0))),
            ],
            vec![pair_result(FtestPair::M1M3, 3.0, Some(1.0))],
        );
        let first = Palmer::new().select(&ctx, &spin(), &fits).unwrap();
        let second = Palmer::new().select(&ctx, &spin(), &fits).unwrap();
        assert_eq!(first, second);
    }
}
