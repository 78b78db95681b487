//! The fit oracle: model fitting behind a trait seam.
//!
//! Selection strategies never optimize anything themselves; they hand a
//! model and a spin's data to a [`FitOracle`] and consume the returned
//! statistics.  [`LmOracle`] is the production oracle (grid seeding,
//! bounded Levenberg-Marquardt, Monte Carlo refits); tests substitute
//! scripted oracles to pin down strategy arithmetic exactly.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::catalog::{FtestPair, ModelSpec};
use crate::data::AnalysisConfig;
use crate::error::{MfError, Result};
use crate::forward::ForwardModel;
use crate::lm::{grid_search, LevenbergMarquardt, LmConfig, LmResult};
use crate::montecarlo::{self, SimType};
use crate::problem::{check_params, Problem};

/// Per-fit settings: simulation behavior and optimizer tuning.
#[derive(Debug, Clone)]
pub struct FitSettings {
    pub sim_type: SimType,
    pub sim_count: usize,
    /// Confidence level of the simulated chi-squared and F cutoffs.
    pub confidence: f64,
    /// Fraction of the largest simulated statistics discarded before the
    /// cutoff percentile is taken.
    pub trim: f64,
    pub lm: LmConfig,
    /// Seed for the simulation noise stream; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl FitSettings {
    /// Settings with simulations, confidence and trim taken from the
    /// analysis configuration.
    pub fn from_config(config: &AnalysisConfig, sim_type: SimType) -> Self {
        FitSettings {
            sim_type,
            sim_count: config.sim_count,
            confidence: config.confidence,
            trim: config.trim,
            lm: LmConfig::default(),
            seed: None,
        }
    }

    /// Settings for a plain fit with no simulations.
    pub fn without_sims() -> Self {
        FitSettings {
            sim_type: SimType::None,
            sim_count: 0,
            confidence: 0.90,
            trim: 0.1,
            lm: LmConfig::default(),
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// One completed model fit on one spin.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub model: ModelSpec,
    /// Fitted parameters in the model's canonical order.
    pub params: Array1<f64>,
    /// Monte Carlo parameter errors; zeros when no simulations ran.
    pub errors: Vec<f64>,
    /// Chi-squared of the fit against the measured data.
    pub chi2: f64,
    /// Number of data points fitted.
    pub n_data: usize,
    /// Simulated chi-squared cutoff, when simulations ran.
    pub chi2_lim: Option<f64>,
    /// Chi-squared of each simulation fit against its own simulated data.
    pub sim_chi2: Vec<f64>,
    /// Chi-squared of each simulation fit's back-calculation against the
    /// measured data.  Drives the bootstrap criterion.
    pub sim_chi2_vs_measured: Vec<f64>,
    /// Parameter vectors of the simulation fits, in simulation order.
    pub sim_params: Vec<Array1<f64>>,
    pub converged: bool,
}

impl FitResult {
    /// Degrees of freedom of the fit.
    pub fn dof(&self) -> i64 {
        self.n_data as i64 - self.model.param_count() as i64
    }
}

/// A completed F-test between two nested model fits.
#[derive(Debug, Clone)]
pub struct PairResult {
    pub pair: FtestPair,
    pub fstat: f64,
    /// Simulated F cutoff, when simulations ran.
    pub fstat_lim: Option<f64>,
    pub null: FitResult,
    pub alt: FitResult,
}

/// F statistic for a nested model comparison.
///
/// Degenerate denominators (a perfect or over-parameterized alternative
/// fit) map to infinity when the simpler model fits worse and zero
/// otherwise, so that threshold comparisons still order sensibly.
pub fn f_statistic(chi2_null: f64, chi2_alt: f64, k_null: usize, k_alt: usize, n: usize) -> f64 {
    let dk = (k_alt - k_null) as f64;
    let dof_alt = n as f64 - k_alt as f64;
    if dof_alt <= 0.0 || chi2_alt <= 0.0 {
        return if chi2_null > chi2_alt { f64::INFINITY } else { 0.0 };
    }
    ((chi2_null - chi2_alt) / dk) / (chi2_alt / dof_alt)
}

/// Fits models to relaxation data.
pub trait FitOracle: Sync {
    /// Fit one model to one spin's data.
    fn fit(
        &self,
        forward: &ForwardModel,
        model: ModelSpec,
        values: &[f64],
        errors: &[f64],
        settings: &FitSettings,
    ) -> Result<FitResult>;

    /// Fit both models of an F-test pair and compare them.
    ///
    /// The default implementation fits the two models independently and
    /// reports no simulated F cutoff; oracles that refit paired
    /// simulations override it.
    fn fit_pair(
        &self,
        forward: &ForwardModel,
        pair: FtestPair,
        values: &[f64],
        errors: &[f64],
        settings: &FitSettings,
    ) -> Result<PairResult> {
        let null = self.fit(forward, pair.null(), values, errors, settings)?;
        let alt = self.fit(forward, pair.alt(), values, errors, settings)?;
        let fstat = f_statistic(
            null.chi2,
            alt.chi2,
            null.model.param_count(),
            alt.model.param_count(),
            values.len(),
        );
        Ok(PairResult {
            pair,
            fstat,
            fstat_lim: None,
            null,
            alt,
        })
    }
}

/// Weighted relaxation residuals for one (spin, model) unit.
pub(crate) struct RelaxProblem<'a> {
    forward: &'a ForwardModel,
    model: ModelSpec,
    observed: &'a [f64],
    errors: &'a [f64],
}

impl<'a> RelaxProblem<'a> {
    pub(crate) fn new(
        forward: &'a ForwardModel,
        model: ModelSpec,
        observed: &'a [f64],
        errors: &'a [f64],
    ) -> Result<Self> {
        if observed.len() != forward.num_data_sets() || errors.len() != forward.num_data_sets() {
            return Err(MfError::DimensionMismatch(format!(
                "{} observations and {} errors against {} datasets",
                observed.len(),
                errors.len(),
                forward.num_data_sets()
            )));
        }
        Ok(RelaxProblem {
            forward,
            model,
            observed,
            errors,
        })
    }
}

impl Problem for RelaxProblem<'_> {
    fn eval(&self, params: &Array1<f64>) -> Result<Array1<f64>> {
        check_params(self, params)?;
        let back = self.forward.back_calculate(self.model, &params.to_vec())?;
        Ok(Array1::from_iter(
            back.iter()
                .zip(self.observed.iter())
                .zip(self.errors.iter())
                .map(|((&bc, &obs), &err)| (bc - obs) / err),
        ))
    }

    fn parameter_count(&self) -> usize {
        self.model.param_count()
    }

    fn residual_count(&self) -> usize {
        self.forward.num_data_sets()
    }
}

/// The production oracle: grid-seeded bounded Levenberg-Marquardt with
/// Monte Carlo refits for parameter errors and simulated cutoffs.
#[derive(Debug, Clone, Default)]
pub struct LmOracle;

impl LmOracle {
    pub fn new() -> Self {
        LmOracle
    }

    fn rng(settings: &FitSettings) -> StdRng {
        match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn minimize(
        &self,
        forward: &ForwardModel,
        model: ModelSpec,
        values: &[f64],
        errors: &[f64],
        start: Option<&Array1<f64>>,
        lm_config: &LmConfig,
    ) -> Result<LmResult> {
        let problem = RelaxProblem::new(forward, model, values, errors)?;
        let lower = model.lower_bounds();
        let upper = model.upper_bounds();

        let seed = match start {
            Some(p) => p.clone(),
            None => {
                let (point, _) = grid_search(&problem, &lower, &upper, &model.grid_steps())?;
                point
            }
        };

        let lm = LevenbergMarquardt::new(lm_config.clone());
        lm.minimize_bounded(&problem, &seed, &lower, &upper)
    }

    fn sim_center(
        &self,
        forward: &ForwardModel,
        fit: &LmResult,
        model: ModelSpec,
        values: &[f64],
        sim_type: SimType,
    ) -> Result<Option<Vec<f64>>> {
        match sim_type {
            SimType::None => Ok(None),
            SimType::Pred => Ok(Some(
                forward.back_calculate(model, &fit.params.to_vec())?,
            )),
            SimType::Expr => Ok(Some(values.to_vec())),
        }
    }
}

impl FitOracle for LmOracle {
    fn fit(
        &self,
        forward: &ForwardModel,
        model: ModelSpec,
        values: &[f64],
        errors: &[f64],
        settings: &FitSettings,
    ) -> Result<FitResult> {
        let best = self.minimize(forward, model, values, errors, None, &settings.lm)?;
        if !best.cost.is_finite() {
            return Err(MfError::OracleFailure(format!(
                "Fit of {} produced non-finite chi-squared",
                model
            )));
        }

        let mut sim_params = Vec::new();
        let mut sim_chi2 = Vec::new();
        let mut sim_chi2_vs_measured = Vec::new();
        let mut chi2_lim = None;

        if let Some(center) = self.sim_center(forward, &best, model, values, settings.sim_type)? {
            let mut rng = Self::rng(settings);
            for _ in 0..settings.sim_count {
                let sim_values = montecarlo::perturb(&center, errors, &mut rng)?;
                let sim_fit = match self.minimize(
                    forward,
                    model,
                    &sim_values,
                    errors,
                    Some(&best.params),
                    &settings.lm,
                ) {
                    Ok(fit) => fit,
                    // A diverged simulation refit is dropped, not fatal.
                    Err(MfError::SingularMatrix) | Err(MfError::OracleFailure(_)) => continue,
                    Err(e) => return Err(e),
                };

                let sim_back = forward.back_calculate(model, &sim_fit.params.to_vec())?;
                let vs_measured = crate::chi2::chi_squared(values, errors, &sim_back)?;

                sim_params.push(sim_fit.params);
                sim_chi2.push(sim_fit.cost);
                sim_chi2_vs_measured.push(vs_measured);
            }
            chi2_lim = montecarlo::simulated_limit(&sim_chi2, settings.confidence, settings.trim);
        }

        let errors_out = montecarlo::parameter_errors(&sim_params, model.param_count())?;

        Ok(FitResult {
            model,
            params: best.params,
            errors: errors_out,
            chi2: best.cost,
            n_data: values.len(),
            chi2_lim,
            sim_chi2,
            sim_chi2_vs_measured,
            sim_params,
            converged: best.converged,
        })
    }

    fn fit_pair(
        &self,
        forward: &ForwardModel,
        pair: FtestPair,
        values: &[f64],
        errors: &[f64],
        settings: &FitSettings,
    ) -> Result<PairResult> {
        let null = self.fit(forward, pair.null(), values, errors, settings)?;
        let alt = self.fit(forward, pair.alt(), values, errors, settings)?;
        let n = values.len();
        let fstat = f_statistic(
            null.chi2,
            alt.chi2,
            pair.null().param_count(),
            pair.alt().param_count(),
            n,
        );

        // Simulated F cutoff: both models refit the same synthetic datasets
        // drawn around the null fit, so the F distribution is paired.
        let mut fstat_lim = None;
        if settings.sim_type != SimType::None && settings.sim_count > 0 {
            let center = match settings.sim_type {
                SimType::Expr => values.to_vec(),
                _ => forward.back_calculate(pair.null(), &null.params.to_vec())?,
            };

            let mut rng = Self::rng(settings);
            let mut sim_fstats = Vec::with_capacity(settings.sim_count);
            for _ in 0..settings.sim_count {
                let sim_values = montecarlo::perturb(&center, errors, &mut rng)?;
                let sim_null = self.minimize(
                    forward,
                    pair.null(),
                    &sim_values,
                    errors,
                    Some(&null.params),
                    &settings.lm,
                );
                let sim_alt = self.minimize(
                    forward,
                    pair.alt(),
                    &sim_values,
                    errors,
                    Some(&alt.params),
                    &settings.lm,
                );
                if let (Ok(sim_null), Ok(sim_alt)) = (sim_null, sim_alt) {
                    sim_fstats.push(f_statistic(
                        sim_null.cost,
                        sim_alt.cost,
                        pair.null().param_count(),
                        pair.alt().param_count(),
                        n,
                    ));
                }
            }
            fstat_lim =
                montecarlo::simulated_limit(&sim_fstats, settings.confidence, settings.trim);
        }

        Ok(PairResult {
            pair,
            fstat,
            fstat_lim,
            null,
            alt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AnalysisConfig, DatasetDescriptor, FieldInfo, RelaxKind};
    use approx::assert_relative_eq;

    fn two_field_forward() -> ForwardModel {
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
        ForwardModel::new(&fields, &descriptors, &AnalysisConfig::default()).unwrap()
    }

    #[test]
    fn recovers_m2_parameters_from_clean_data() {
        let forward = two_field_forward();
        let truth = [0.8, 80e-12];
        let values = forward.back_calculate(ModelSpec::M2, &truth).unwrap();
        let errors = vec![0.05; values.len()];

        let oracle = LmOracle::new();
        let fit = oracle
            .fit(
                &forward,
                ModelSpec::M2,
                &values,
                &errors,
                &FitSettings::without_sims(),
            )
            .unwrap();

        assert!(fit.chi2 < 1e-6);
        assert_relative_eq!(fit.params[0], 0.8, epsilon = 1e-3);
        assert_relative_eq!(fit.params[1], 80e-12, max_relative = 0.05);
        assert_eq!(fit.errors, vec![0.0, 0.0]);
        assert!(fit.chi2_lim.is_none());
    }

    #[test]
    fn nested_model_never_beats_richer_model() {
        let forward = two_field_forward();
        let truth = [0.8, 80e-12];
        let mut values = forward.back_calculate(ModelSpec::M2, &truth).unwrap();
        // Perturb slightly so no model reaches zero chi-squared.
        for (i, v) in values.iter_mut().enumerate() {
            *v += if i % 2 == 0 { 0.02 } else { -0.02 };
        }
        let errors = vec![0.05; values.len()];

        let oracle = LmOracle::new();
        let settings = FitSettings::without_sims();
        let m1 = oracle
            .fit(&forward, ModelSpec::M1, &values, &errors, &settings)
            .unwrap();
        let m2 = oracle
            .fit(&forward, ModelSpec::M2, &values, &errors, &settings)
            .unwrap();
        let m4 = oracle
            .fit(&forward, ModelSpec::M4, &values, &errors, &settings)
            .unwrap();

        assert!(m2.chi2 <= m1.chi2 + 1e-9);
        assert!(m4.chi2 <= m2.chi2 + 1e-9);
    }

    #[test]
    fn simulations_produce_errors_and_limit() {
        let forward = two_field_forward();
        let values = forward.back_calculate(ModelSpec::M1, &[0.85]).unwrap();
        let errors: Vec<f64> = values.iter().map(|v| (v.abs() * 0.02).max(0.01)).collect();

        let settings = FitSettings {
            sim_type: SimType::Pred,
            sim_count: 50,
            confidence: 0.90,
            trim: 0.1,
            lm: LmConfig::default(),
            seed: Some(42),
        };
        let oracle = LmOracle::new();
        let fit = oracle
            .fit(&forward, ModelSpec::M1, &values, &errors, &settings)
            .unwrap();

        assert_eq!(fit.sim_chi2.len(), 50);
        assert_eq!(fit.sim_chi2_vs_measured.len(), 50);
        assert!(fit.errors[0] > 0.0);
        let lim = fit.chi2_lim.unwrap();
        assert!(lim > 0.0);
        // The noiseless fit sits far below the simulated cutoff.
        assert!(fit.chi2 < lim);
    }

    #[test]
    fn f_statistic_matches_definition() {
        let f = f_statistic(20.0, 8.0, 1, 2, 6);
        assert_relative_eq!(f, (12.0 / 1.0) / (8.0 / 4.0), epsilon = 1e-12);
    }

    #[test]
    fn f_statistic_degenerate_denominator() {
        assert_eq!(f_statistic(5.0, 0.0, 1, 2, 6), f64::INFINITY);
        assert_eq!(f_statistic(0.0, 0.0, 1, 2, 6), 0.0);
        assert_eq!(f_statistic(5.0, 1.0, 1, 3, 3), f64::INFINITY);
    }

    #[test]
    fn fit_pair_reports_positive_fstat_for_true_alt() {
        let forward = two_field_forward();
        // Data generated by m3: the exchange term is real.
        let values = forward
            .back_calculate(ModelSpec::M3, &[0.8, 3.0])
            .unwrap();
        let errors = vec![0.05; values.len()];

        let oracle = LmOracle::new();
        let result = oracle
            .fit_pair(
                &forward,
                FtestPair::M1M3,
                &values,
                &errors,
                &FitSettings::without_sims(),
            )
            .unwrap();

        assert!(result.alt.chi2 < result.null.chi2);
        assert!(result.fstat > 1.5);
        assert!(result.fstat_lim.is_none());
    }
}
