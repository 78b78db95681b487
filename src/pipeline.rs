//! The three-stage analysis pipeline.
//!
//! Stage 1 fits every model (and, for the heuristic methods, the F-test
//! pairs) to every spin.  Stage 2 runs model selection and refits each
//! winner with Monte Carlo simulations for parameter errors; stage 2b
//! optionally re-optimizes the global correlation time against the summed
//! chi-squared of the selected models.  Stage 3 writes the results table,
//! Grace plots, and JSON export.

use std::path::PathBuf;

use crate::catalog::{FtestPair, ModelSpec, ALL_MODELS};
use crate::data::Dataset;
use crate::error::{MfError, Result};
use crate::fit::{FitOrchestrator, SpinFits};
use crate::forward::ForwardModel;
use crate::modsel::{
    select_all, Asymptotic, Bootstrap, Criterion, CrossValidation, Farrow, OverallDiscrepancy,
    Palmer, SelectedModelRecord, SelectionConfig, SelectionContext, SelectionOutcome,
    SelectionStrategy,
};
use crate::montecarlo::SimType;
use crate::oracle::{FitOracle, FitSettings};
use crate::report;

/// Which model selection method drives stage 2.
#[derive(Debug, Clone)]
pub enum Method {
    Aic,
    Aicc,
    Bic,
    Bootstrap,
    CrossValidation,
    Farrow,
    Palmer,
    /// Benchmark selection against known true relaxation values, keyed by
    /// residue number.
    ExpectedDiscrepancy(std::collections::BTreeMap<String, Vec<f64>>),
    /// Like `ExpectedDiscrepancy`, but averaging each model's discrepancy
    /// over its Monte Carlo simulation fits.
    RealizedDiscrepancy(std::collections::BTreeMap<String, Vec<f64>>),
}

impl Method {
    /// The simulation type stage 1 must run with for this method.
    fn sim_type(&self) -> SimType {
        match self {
            Method::Aic | Method::Aicc | Method::Bic | Method::CrossValidation => SimType::None,
            Method::Bootstrap => SimType::Expr,
            Method::Farrow
            | Method::Palmer
            | Method::ExpectedDiscrepancy(_)
            | Method::RealizedDiscrepancy(_) => SimType::Pred,
        }
    }

    /// The F-test pairs stage 1 must evaluate for this method.
    fn pairs(&self, num_data_sets: usize) -> Vec<FtestPair> {
        match self {
            Method::Farrow => vec![FtestPair::M1M2, FtestPair::M1M3],
            Method::Palmer => FtestPair::palmer_pairs(num_data_sets),
            _ => Vec::new(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Method::Aic => "AIC",
            Method::Aicc => "AICc",
            Method::Bic => "BIC",
            Method::Bootstrap => "bootstrap",
            Method::CrossValidation => "CV",
            Method::Farrow => "Farrow",
            Method::Palmer => "Palmer",
            Method::ExpectedDiscrepancy(_) => "expected overall discrepancy",
            Method::RealizedDiscrepancy(_) => "realized overall discrepancy",
        }
    }
}

/// Pipeline-level configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub method: Method,
    /// Re-optimize the global correlation time in stage 2b.
    pub optimize_tm: bool,
    /// Where stage 3 writes its report; `None` skips stage 3.
    pub output_dir: Option<PathBuf>,
    /// Fixed simulation seed for reproducible runs.
    pub seed: Option<u64>,
}

impl PipelineConfig {
    pub fn new(method: Method) -> Self {
        PipelineConfig {
            method,
            optimize_tm: false,
            output_dir: None,
            seed: None,
        }
    }
}

/// The completed analysis.
#[derive(Debug)]
pub struct PipelineResult {
    pub records: Vec<SelectedModelRecord>,
    /// The global correlation time the final fits used (stage 2b may move
    /// it off the configured value).
    pub tm: f64,
    /// The stage 1 fits, for inspection.
    pub stage1: Vec<SpinFits>,
}

pub struct Pipeline<'a> {
    oracle: &'a dyn FitOracle,
}

impl<'a> Pipeline<'a> {
    pub fn new(oracle: &'a dyn FitOracle) -> Self {
        Pipeline { oracle }
    }

    pub fn run(&self, dataset: &Dataset, config: &PipelineConfig) -> Result<PipelineResult> {
        let mut settings = FitSettings::from_config(&dataset.config, config.method.sim_type());
        if let Some(seed) = config.seed {
            settings = settings.with_seed(seed);
        }
        let orchestrator = FitOrchestrator::new(self.oracle, settings);

        // Stage 1: per-model fits, plus F-test pairs for the heuristics.
        let pairs = config.method.pairs(dataset.num_data_sets());
        let stage1 = if pairs.is_empty() {
            orchestrator.fit_all(dataset, &ALL_MODELS)?
        } else {
            orchestrator.fit_all_with_pairs(dataset, &ALL_MODELS, &pairs)?
        };

        // Stage 2: model selection.
        let forward = ForwardModel::from_dataset(dataset)?;
        let ctx = SelectionContext::with_config(
            &forward,
            SelectionConfig::from_analysis(&dataset.config),
        );
        let records = self.select(&ctx, &orchestrator, dataset, &stage1, config)?;

        // Stage 2b: global correlation time refinement.
        let tm = if config.optimize_tm {
            self.optimize_tm(dataset, &records)?
        } else {
            dataset.config.tm
        };
        let final_forward = forward.with_tm(tm)?;

        // Monte Carlo refit of each winner for parameter errors.
        let records = self.refit_winners(dataset, &final_forward, records, config)?;

        // Stage 3: extraction.
        if let Some(dir) = &config.output_dir {
            report::write_report(dir, &records, config.method.label())?;
        }

        Ok(PipelineResult {
            records,
            tm,
            stage1,
        })
    }

    fn select(
        &self,
        ctx: &SelectionContext,
        orchestrator: &FitOrchestrator,
        dataset: &Dataset,
        stage1: &[SpinFits],
        config: &PipelineConfig,
    ) -> Result<Vec<SelectedModelRecord>> {
        let strategy: Box<dyn SelectionStrategy + '_> = match &config.method {
            Method::Aic => Box::new(Asymptotic::new(Criterion::Aic)),
            Method::Aicc => Box::new(Asymptotic::new(Criterion::Aicc)),
            Method::Bic => Box::new(Asymptotic::new(Criterion::Bic)),
            Method::Bootstrap => Box::new(Bootstrap::new()),
            Method::CrossValidation => Box::new(CrossValidation::new(orchestrator)),
            Method::Farrow => Box::new(Farrow::new()),
            Method::Palmer => Box::new(Palmer::new()),
            Method::ExpectedDiscrepancy(truth) => Box::new(OverallDiscrepancy::new(
                truth.clone(),
                crate::modsel::DiscrepancyMode::Expected,
            )),
            Method::RealizedDiscrepancy(truth) => Box::new(OverallDiscrepancy::new(
                truth.clone(),
                crate::modsel::DiscrepancyMode::Realized,
            )),
        };
        select_all(strategy.as_ref(), ctx, &dataset.spins, stage1)
    }

    /// Refit every single-model winner at the final correlation time with
    /// predictive Monte Carlo simulations, replacing the stage 1 fit.
    fn refit_winners(
        &self,
        dataset: &Dataset,
        forward: &ForwardModel,
        mut records: Vec<SelectedModelRecord>,
        config: &PipelineConfig,
    ) -> Result<Vec<SelectedModelRecord>> {
        let mut settings = FitSettings::from_config(&dataset.config, SimType::Pred);
        if let Some(seed) = config.seed {
            settings = settings.with_seed(seed);
        }

        for (record, spin) in records.iter_mut().zip(&dataset.spins) {
            let model = match record.outcome {
                SelectionOutcome::Single(model) => model,
                _ => continue,
            };
            match self
                .oracle
                .fit(forward, model, &spin.values(), &spin.errors(), &settings)
            {
                Ok(fit) => record.fit = Some(fit),
                // The stage 1 fit stands when the refit diverges.
                Err(MfError::OracleFailure(_)) | Err(MfError::SingularMatrix) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    /// Stage 2b: minimize the summed chi-squared of the selected models
    /// over the global correlation time, coarse grid first, then
    /// golden-section refinement.
    fn optimize_tm(&self, dataset: &Dataset, records: &[SelectedModelRecord]) -> Result<f64> {
        let winners: Vec<(usize, ModelSpec)> = records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.outcome.single().map(|m| (i, m)))
            .collect();
        if winners.is_empty() {
            return Ok(dataset.config.tm);
        }

        let tm0 = dataset.config.tm;
        let (mut lo, mut hi) = (0.5 * tm0, 1.5 * tm0);

        let mut best_tm = tm0;
        let mut best_cost = f64::INFINITY;
        for step in 0..21 {
            let tm = lo + (hi - lo) * step as f64 / 20.0;
            let cost = self.total_chi2(dataset, &winners, tm)?;
            if cost < best_cost {
                best_cost = cost;
                best_tm = tm;
            }
        }

        // Golden-section refinement around the best grid point.
        let half_step = (hi - lo) / 20.0;
        lo = (best_tm - half_step).max(0.5 * tm0);
        hi = (best_tm + half_step).min(1.5 * tm0);
        let phi = (5.0_f64.sqrt() - 1.0) / 2.0;
        let mut a = hi - phi * (hi - lo);
        let mut b = lo + phi * (hi - lo);
        let mut fa = self.total_chi2(dataset, &winners, a)?;
        let mut fb = self.total_chi2(dataset, &winners, b)?;
        while (hi - lo) > 1e-3 * tm0 {
            if fa < fb {
                hi = b;
                b = a;
                fb = fa;
                a = hi - phi * (hi - lo);
                fa = self.total_chi2(dataset, &winners, a)?;
            } else {
                lo = a;
                a = b;
                fa = fb;
                b = lo + phi * (hi - lo);
                fb = self.total_chi2(dataset, &winners, b)?;
            }
        }
        let tm = 0.5 * (lo + hi);
        let cost = self.total_chi2(dataset, &winners, tm)?;
        Ok(if cost <= best_cost { tm } else { best_tm })
    }

    fn total_chi2(
        &self,
        dataset: &Dataset,
        winners: &[(usize, ModelSpec)],
        tm: f64,
    ) -> Result<f64> {
        let forward = ForwardModel::from_dataset(dataset)?.with_tm(tm)?;
        let settings = FitSettings::without_sims();
        let mut total = 0.0;
        for &(spin_idx, model) in winners {
            let spin = &dataset.spins[spin_idx];
            match self
                .oracle
                .fit(&forward, model, &spin.values(), &spin.errors(), &settings)
            {
                Ok(fit) => total += fit.chi2,
                Err(MfError::OracleFailure(_)) | Err(MfError::SingularMatrix) => {
                    total += f64::INFINITY;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }
}
