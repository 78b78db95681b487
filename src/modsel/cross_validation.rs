//! One-item-out cross-validation model selection.
//!
//! For each model, every relaxation dataset is withheld in turn, the model
//! is refit on the rest, and the withheld point's weighted squared
//! deviation is accumulated.  The criterion is the average withheld
//! chi-squared, with no asymptotic correction.

use crate::data::SpinRecord;
use crate::error::Result;
use crate::fit::{FitOrchestrator, SpinFits};
use crate::modsel::{argmin_outcome, SelectionContext, SelectionOutcome, SelectionStrategy};

pub struct CrossValidation<'a> {
    orchestrator: &'a FitOrchestrator<'a>,
}

impl<'a> CrossValidation<'a> {
    pub fn new(orchestrator: &'a FitOrchestrator<'a>) -> Self {
        CrossValidation { orchestrator }
    }
}

impl SelectionStrategy for CrossValidation<'_> {
    fn name(&self) -> &'static str {
        "CV"
    }

    fn select(
        &self,
        ctx: &SelectionContext,
        spin: &SpinRecord,
        fits: &SpinFits,
    ) -> Result<SelectionOutcome> {
        let values = spin.values();
        let errors = spin.errors();
        let n = ctx.n_data() as f64;

        let mut scores = Vec::new();
        for (&model, outcome) in &fits.outcomes {
            if outcome.fitted().is_none() {
                continue;
            }
            // A diverged subset refit disqualifies the model for this spin
            // rather than aborting the selection.
            let crit = match self
                .orchestrator
                .cross_validation_terms(ctx.forward, model, &values, &errors)
            {
                Ok(terms) => terms.iter().sum::<f64>() / n,
                Err(_) => f64::INFINITY,
            };
            scores.push((model, crit));
        }

        Ok(argmin_outcome(&scores))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelSpec;
    use crate::data::{
        AnalysisConfig, Dataset, DatasetDescriptor, FieldInfo, RelaxDataPoint, RelaxKind,
        SpinRecord,
    };
    use crate::forward::ForwardModel;
    use crate::oracle::{FitSettings, LmOracle};

    #[test]
    fn exchange_model_wins_on_exchange_data() {
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
        let values = forward
            .back_calculate(ModelSpec::M3, &[0.85, 3.0])
            .unwrap();
        let spin = SpinRecord {
            res_num: "1".to_string(),
            res_name: "LEU".to_string(),
            data: values
                .iter()
                .map(|&v| RelaxDataPoint {
                    value: v,
                    error: (v.abs() * 0.02).max(0.01),
                })
                .collect(),
        };
        let dataset = Dataset::new(fields, descriptors, vec![spin], config).unwrap();

        let oracle = LmOracle::new();
        let orchestrator = FitOrchestrator::new(&oracle, FitSettings::without_sims());
        let fits = orchestrator
            .fit_all(&dataset, &[ModelSpec::M1, ModelSpec::M3])
            .unwrap();

        let ctx = SelectionContext::new(&forward);
        let strategy = CrossValidation::new(&orchestrator);
        let outcome = strategy
            .select(&ctx, &dataset.spins[0], &fits[0])
            .unwrap();

        // m1 has no exchange term, so its refits misplace every withheld
        // R2 by several inverse seconds while m3 interpolates.
        assert_eq!(outcome, SelectionOutcome::Single(ModelSpec::M3));
    }
}
