//! Batch fit orchestration over spins and models.
//!
//! Fit units (one model on one spin) are independent, so the batch runs as
//! a rayon fork-join over spins.  A failed unit is recorded and never
//! aborts the batch: the selection strategies treat missing fits as
//! non-candidates.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::catalog::{FtestPair, ModelSpec};
use crate::chi2::chi_squared;
use crate::data::Dataset;
use crate::error::Result;
use crate::forward::ForwardModel;
use crate::oracle::{FitOracle, FitResult, FitSettings, PairResult};

/// Outcome of one fit unit.
#[derive(Debug, Clone)]
pub enum UnitOutcome {
    Fitted(FitResult),
    Failed { model: ModelSpec, reason: String },
}

impl UnitOutcome {
    pub fn fitted(&self) -> Option<&FitResult> {
        match self {
            UnitOutcome::Fitted(fit) => Some(fit),
            UnitOutcome::Failed { .. } => None,
        }
    }
}

/// Outcome of one F-test pair on one spin.
#[derive(Debug, Clone)]
pub enum PairOutcome {
    Done(PairResult),
    Failed { pair: FtestPair, reason: String },
}

impl PairOutcome {
    pub fn done(&self) -> Option<&PairResult> {
        match self {
            PairOutcome::Done(result) => Some(result),
            PairOutcome::Failed { .. } => None,
        }
    }
}

/// All fits collected for one spin.
#[derive(Debug, Clone)]
pub struct SpinFits {
    pub res_num: String,
    pub res_name: String,
    pub outcomes: BTreeMap<ModelSpec, UnitOutcome>,
    /// F-test results, populated only when pairs were requested.
    pub pairs: Vec<PairOutcome>,
}

impl SpinFits {
    /// The successful fit for a model, if any.
    pub fn fit(&self, model: ModelSpec) -> Option<&FitResult> {
        self.outcomes.get(&model).and_then(UnitOutcome::fitted)
    }

    /// The completed F-test for a pair, if any.
    pub fn pair(&self, pair: FtestPair) -> Option<&PairResult> {
        self.pairs
            .iter()
            .filter_map(PairOutcome::done)
            .find(|r| r.pair == pair)
    }

    pub fn any_fitted(&self) -> bool {
        self.outcomes.values().any(|o| o.fitted().is_some())
    }
}

/// Runs fit batches against an oracle.
pub struct FitOrchestrator<'a> {
    oracle: &'a dyn FitOracle,
    settings: FitSettings,
}

impl<'a> FitOrchestrator<'a> {
    pub fn new(oracle: &'a dyn FitOracle, settings: FitSettings) -> Self {
        FitOrchestrator { oracle, settings }
    }

    pub fn settings(&self) -> &FitSettings {
        &self.settings
    }

    /// Fit the given models to every spin of the dataset.
    pub fn fit_all(&self, dataset: &Dataset, models: &[ModelSpec]) -> Result<Vec<SpinFits>> {
        let forward = ForwardModel::from_dataset(dataset)?;
        dataset
            .spins
            .par_iter()
            .map(|spin| {
                let values = spin.values();
                let errors = spin.errors();
                let mut outcomes = BTreeMap::new();
                for &model in models {
                    let outcome =
                        match self
                            .oracle
                            .fit(&forward, model, &values, &errors, &self.settings)
                        {
                            Ok(fit) => UnitOutcome::Fitted(fit),
                            Err(e) => UnitOutcome::Failed {
                                model,
                                reason: e.to_string(),
                            },
                        };
                    outcomes.insert(model, outcome);
                }
                Ok(SpinFits {
                    res_num: spin.res_num.clone(),
                    res_name: spin.res_name.clone(),
                    outcomes,
                    pairs: Vec::new(),
                })
            })
            .collect()
    }

    /// Fit models and F-test pairs to every spin, as the Palmer method
    /// consumes them.
    pub fn fit_all_with_pairs(
        &self,
        dataset: &Dataset,
        models: &[ModelSpec],
        pairs: &[FtestPair],
    ) -> Result<Vec<SpinFits>> {
        let forward = ForwardModel::from_dataset(dataset)?;
        let mut results = self.fit_all(dataset, models)?;

        let pair_results: Vec<Vec<PairOutcome>> = dataset
            .spins
            .par_iter()
            .map(|spin| {
                let values = spin.values();
                let errors = spin.errors();
                pairs
                    .iter()
                    .map(|&pair| {
                        match self.oracle.fit_pair(
                            &forward,
                            pair,
                            &values,
                            &errors,
                            &self.settings,
                        ) {
                            Ok(result) => PairOutcome::Done(result),
                            Err(e) => PairOutcome::Failed {
                                pair,
                                reason: e.to_string(),
                            },
                        }
                    })
                    .collect()
            })
            .collect();

        for (fits, pair_outcomes) in results.iter_mut().zip(pair_results) {
            fits.pairs = pair_outcomes;
        }
        Ok(results)
    }

    /// One-item-out cross-validation chi-squared terms for a single spin.
    ///
    /// For each data point, the model is refit on the remaining points and
    /// the squared weighted deviation of the withheld point is returned.
    /// The held-out refits are independent and run as a rayon fork-join.
    /// The subset forward model keeps the full dataset's Rex field
    /// reference, so exchange terms scale identically to the full fit.
    pub fn cross_validation_terms(
        &self,
        forward: &ForwardModel,
        model: ModelSpec,
        values: &[f64],
        errors: &[f64],
    ) -> Result<Vec<f64>> {
        let n = values.len();
        let no_sims = FitSettings {
            sim_type: crate::montecarlo::SimType::None,
            sim_count: 0,
            ..self.settings.clone()
        };

        (0..n)
            .into_par_iter()
            .map(|held_out| {
                let sub_forward = forward.excluding(held_out)?;
                let mut sub_values = values.to_vec();
                let mut sub_errors = errors.to_vec();
                sub_values.remove(held_out);
                sub_errors.remove(held_out);

                let fit =
                    self.oracle
                        .fit(&sub_forward, model, &sub_values, &sub_errors, &no_sims)?;
                let full_back = forward.back_calculate(model, &fit.params.to_vec())?;
                chi_squared(
                    &values[held_out..=held_out],
                    &errors[held_out..=held_out],
                    &full_back[held_out..=held_out],
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{
        AnalysisConfig, DatasetDescriptor, FieldInfo, RelaxDataPoint, RelaxKind, SpinRecord,
    };
    use crate::oracle::LmOracle;

    fn synthetic_dataset(models: &[(ModelSpec, Vec<f64>)]) -> Dataset {
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
        let mut descriptors = Vec::new();
        for field in 0..2 {
            for kind in [RelaxKind::R1, RelaxKind::R2, RelaxKind::Noe] {
                descriptors.push(DatasetDescriptor { kind, field });
            }
        }
        let config = AnalysisConfig::default();
        let forward = ForwardModel::new(&fields, &descriptors, &config).unwrap();

        let spins = models
            .iter()
            .enumerate()
            .map(|(i, (model, params))| {
                let values = forward.back_calculate(*model, params).unwrap();
                SpinRecord {
                    res_num: format!("{}", i + 1),
                    res_name: "GLY".to_string(),
                    data: values
                        .iter()
                        .map(|&v| RelaxDataPoint {
                            value: v,
                            error: (v.abs() * 0.02).max(0.01),
                        })
                        .collect(),
                }
            })
            .collect();

        Dataset::new(fields, descriptors, spins, config).unwrap()
    }

    #[test]
    fn fits_every_model_on_every_spin() {
        let dataset = synthetic_dataset(&[
            (ModelSpec::M1, vec![0.9]),
            (ModelSpec::M2, vec![0.8, 80e-12]),
        ]);
        let oracle = LmOracle::new();
        let orchestrator = FitOrchestrator::new(&oracle, FitSettings::without_sims());
        let models = [ModelSpec::M1, ModelSpec::M2, ModelSpec::M3];

        let results = orchestrator.fit_all(&dataset, &models).unwrap();
        assert_eq!(results.len(), 2);
        for fits in &results {
            assert_eq!(fits.outcomes.len(), 3);
            assert!(fits.any_fitted());
        }
        // The generating model fits its own spin essentially perfectly.
        assert!(results[0].fit(ModelSpec::M1).unwrap().chi2 < 1e-6);
        assert!(results[1].fit(ModelSpec::M2).unwrap().chi2 < 1e-6);
    }

    #[test]
    fn pair_fits_are_attached_per_spin() {
        let dataset = synthetic_dataset(&[(ModelSpec::M3, vec![0.8, 3.0])]);
        let oracle = LmOracle::new();
        let orchestrator = FitOrchestrator::new(&oracle, FitSettings::without_sims());

        let results = orchestrator
            .fit_all_with_pairs(
                &dataset,
                &[ModelSpec::M1, ModelSpec::M2, ModelSpec::M3],
                &[FtestPair::M1M2, FtestPair::M1M3],
            )
            .unwrap();

        assert_eq!(results[0].pairs.len(), 2);
        let m1m3 = results[0].pair(FtestPair::M1M3).unwrap();
        assert!(m1m3.fstat > 1.5);
    }

    #[test]
    fn cross_validation_terms_are_small_for_true_model() {
        let dataset = synthetic_dataset(&[(ModelSpec::M1, vec![0.85])]);
        let oracle = LmOracle::new();
        let orchestrator = FitOrchestrator::new(&oracle, FitSettings::without_sims());
        let forward = ForwardModel::from_dataset(&dataset).unwrap();

        let spin = &dataset.spins[0];
        let terms = orchestrator
            .cross_validation_terms(&forward, ModelSpec::M1, &spin.values(), &spin.errors())
            .unwrap();

        assert_eq!(terms.len(), dataset.num_data_sets());
        for term in terms {
            assert!(term < 1e-4);
        }
    }
}
