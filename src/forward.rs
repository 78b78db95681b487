//! Back-calculation of relaxation rates from model-free parameters.
//!
//! Maps a model's parameter vector to R1, R2, and NOE values for every
//! loaded (observable, field) dataset, using the standard dipolar + CSA
//! relaxation equations:
//!
//! ```text
//! R1  = d [J(wH - wX) + 3J(wX) + 6J(wH + wX)] + c J(wX)
//! R2  = d/2 [4J(0) + J(wH - wX) + 3J(wX) + 6J(wH) + 6J(wH + wX)]
//!       + c/6 [4J(0) + 3J(wX)] + Rex_field
//! NOE = 1 + (gH/gX) (d / R1) [6J(wH + wX) - J(wH - wX)]
//! ```
//!
//! with the dipolar constant `d = 1/4 (mu0/4pi)^2 (gH gX hbar)^2 / r^6` and
//! the per-field CSA constant `c = wX^2 csa^2 / 3`.

use crate::catalog::ModelSpec;
use crate::data::{AnalysisConfig, Dataset, DatasetDescriptor, FieldInfo, RelaxKind};
use crate::data::{GAMMA_H, H_BAR, MU_0};
use crate::error::{MfError, Result};
use crate::spectral::spectral_density;

/// Sentinel returned instead of an unphysical back-calculated value
/// (R1 exactly zero feeding an NOE).  Large enough that the chi-squared
/// comparison rejects the offending model without aborting the spin.
pub const BACK_CALC_FAIL: f64 = 1e99;

/// Index order of the five characteristic frequencies per field:
/// 0, wX, wH - wX, wH, wH + wX.
const FRQ_ZERO: usize = 0;
const FRQ_X: usize = 1;
const FRQ_H_MINUS_X: usize = 2;
const FRQ_H: usize = 3;
const FRQ_H_PLUS_X: usize = 4;

/// Precomputed physical constants and frequency tables for one dataset
/// layout.  Construction is per-analysis; evaluation is per-fit-iteration,
/// so everything frequency-dependent is tabulated here once.
#[derive(Debug, Clone)]
pub struct ForwardModel {
    descriptors: Vec<DatasetDescriptor>,
    tm: f64,
    gamma_ratio: f64,
    dip_const: f64,
    /// Per field: CSA constant wX^2 csa^2 / 3.
    csa_const: Vec<f64>,
    /// Per field: the five characteristic angular frequencies.
    omega: Vec<[f64; 5]>,
    /// Per field: (wX_field / wX_ref)^2 used to scale the fitted Rex.
    rex_scale: Vec<f64>,
}

impl ForwardModel {
    /// Build the forward model for a dataset layout.
    ///
    /// The Rex reference frequency is the heteronucleus frequency of the
    /// first listed field; subsets created for cross-validation keep the
    /// parent's reference so the Rex parameter keeps its meaning.
    pub fn new(
        fields: &[FieldInfo],
        descriptors: &[DatasetDescriptor],
        config: &AnalysisConfig,
    ) -> Result<Self> {
        if config.tm <= 0.0 {
            return Err(MfError::Domain(format!(
                "tm must be positive, got {:e}",
                config.tm
            )));
        }
        if fields.is_empty() {
            return Err(MfError::InputData("no magnetic fields".to_string()));
        }

        let gamma_x = config.gamma_x;
        let dip_const = 0.25
            * (MU_0 / (4.0 * std::f64::consts::PI)).powi(2)
            * (GAMMA_H * gamma_x * H_BAR).powi(2)
            / config.bond_length.powi(6);

        let mut csa_const = Vec::with_capacity(fields.len());
        let mut omega = Vec::with_capacity(fields.len());
        let mut wx_list = Vec::with_capacity(fields.len());
        for field in fields {
            let wh = 2.0 * std::f64::consts::PI * field.proton_frq_hz;
            let wx = wh * gamma_x / GAMMA_H;
            wx_list.push(wx);
            csa_const.push(wx.powi(2) * config.csa.powi(2) / 3.0);
            omega.push([0.0, wx, wh - wx, wh, wh + wx]);
        }

        let wx_ref = wx_list[0];
        let rex_scale = wx_list.iter().map(|wx| (wx / wx_ref).powi(2)).collect();

        Ok(Self {
            descriptors: descriptors.to_vec(),
            tm: config.tm,
            gamma_ratio: GAMMA_H / gamma_x,
            dip_const,
            csa_const,
            omega,
            rex_scale,
        })
    }

    /// Convenience constructor from an assembled dataset.
    pub fn from_dataset(dataset: &Dataset) -> Result<Self> {
        Self::new(&dataset.fields, &dataset.descriptors, &dataset.config)
    }

    /// Copy of the forward model with an overridden global correlation time.
    /// Used by the diffusion-tensor optimization of the final stage.
    pub fn with_tm(&self, tm: f64) -> Result<Self> {
        if tm <= 0.0 {
            return Err(MfError::Domain(format!("tm must be positive, got {:e}", tm)));
        }
        let mut model = self.clone();
        model.tm = tm;
        Ok(model)
    }

    /// Forward model restricted to all datasets except `exclude`, for
    /// one-item-out cross-validation.
    pub fn excluding(&self, exclude: usize) -> Result<Self> {
        if exclude >= self.descriptors.len() {
            return Err(MfError::DimensionMismatch(format!(
                "cannot exclude dataset {} of {}",
                exclude,
                self.descriptors.len()
            )));
        }
        let mut model = self.clone();
        model.descriptors.remove(exclude);
        Ok(model)
    }

    pub fn num_data_sets(&self) -> usize {
        self.descriptors.len()
    }

    pub fn descriptors(&self) -> &[DatasetDescriptor] {
        &self.descriptors
    }

    pub fn tm(&self) -> f64 {
        self.tm
    }

    fn jw(&self, model: ModelSpec, params: &[f64], field: usize, idx: usize) -> Result<f64> {
        spectral_density(model, params, self.tm, self.omega[field][idx])
    }

    /// R1 from the spectral density values at one field.
    fn r1(&self, model: ModelSpec, params: &[f64], field: usize) -> Result<f64> {
        let j_x = self.jw(model, params, field, FRQ_X)?;
        let j_hmx = self.jw(model, params, field, FRQ_H_MINUS_X)?;
        let j_hpx = self.jw(model, params, field, FRQ_H_PLUS_X)?;
        Ok(self.dip_const * (j_hmx + 3.0 * j_x + 6.0 * j_hpx) + self.csa_const[field] * j_x)
    }

    /// R2 from the spectral density values at one field, including the
    /// field-scaled Rex contribution for models that carry one.
    fn r2(&self, model: ModelSpec, params: &[f64], field: usize) -> Result<f64> {
        let j_0 = self.jw(model, params, field, FRQ_ZERO)?;
        let j_x = self.jw(model, params, field, FRQ_X)?;
        let j_hmx = self.jw(model, params, field, FRQ_H_MINUS_X)?;
        let j_h = self.jw(model, params, field, FRQ_H)?;
        let j_hpx = self.jw(model, params, field, FRQ_H_PLUS_X)?;

        let dip = self.dip_const / 2.0 * (4.0 * j_0 + j_hmx + 3.0 * j_x + 6.0 * j_h + 6.0 * j_hpx);
        let csa = self.csa_const[field] / 6.0 * (4.0 * j_0 + 3.0 * j_x);

        let rex = match model.rex_index() {
            Some(i) => params[i] * self.rex_scale[field],
            None => 0.0,
        };

        Ok(dip + csa + rex)
    }

    /// NOE at one field.  The R1 in the denominator is always the
    /// back-calculated value, so NOE datasets need no measured R1 companion.
    fn noe(&self, model: ModelSpec, params: &[f64], field: usize) -> Result<f64> {
        let r1 = self.r1(model, params, field)?;
        if r1 == 0.0 {
            // Unphysical fit; reject through the chi-squared comparison.
            return Ok(BACK_CALC_FAIL);
        }
        let j_hmx = self.jw(model, params, field, FRQ_H_MINUS_X)?;
        let j_hpx = self.jw(model, params, field, FRQ_H_PLUS_X)?;
        let sigma_noe = self.dip_const * (6.0 * j_hpx - j_hmx);
        Ok(1.0 + self.gamma_ratio * sigma_noe / r1)
    }

    /// Back-calculate one rate per descriptor, in descriptor order.
    pub fn back_calculate(&self, model: ModelSpec, params: &[f64]) -> Result<Vec<f64>> {
        if params.len() != model.param_count() {
            return Err(MfError::DimensionMismatch(format!(
                "{} expects {} parameters, got {}",
                model,
                model.param_count(),
                params.len()
            )));
        }
        let mut rates = Vec::with_capacity(self.descriptors.len());
        for d in &self.descriptors {
            let rate = match d.kind {
                RelaxKind::R1 => self.r1(model, params, d.field)?,
                RelaxKind::R2 => self.r2(model, params, d.field)?,
                RelaxKind::Noe => self.noe(model, params, d.field)?,
            };
            rates.push(rate);
        }
        Ok(rates)
    }
}
