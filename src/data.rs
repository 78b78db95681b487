//! Core data model: relaxation observables, spins, and the analysis context.
//!
//! The `Dataset` struct is the explicit analysis context constructed once at
//! pipeline start and passed to every component.  The spin list and dataset
//! descriptors are read-only after construction; result accumulation happens
//! in collections owned by the orchestrator, never here.

use serde::{Deserialize, Serialize};

use crate::error::{MfError, Result};

/// Gyromagnetic ratio of the proton in rad.s^-1.T^-1.
pub const GAMMA_H: f64 = 2.67522212e8;

/// Gyromagnetic ratio of nitrogen-15 in rad.s^-1.T^-1 (negative).
pub const GAMMA_N15: f64 = -2.7126e7;

/// Reduced Planck constant in J.s.
pub const H_BAR: f64 = 1.05457266e-34;

/// Permeability of free space in T^2.m^3.J^-1.
pub const MU_0: f64 = 4.0e-7 * std::f64::consts::PI;

/// The three measured relaxation observables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelaxKind {
    /// Longitudinal relaxation rate.
    R1,
    /// Transverse relaxation rate.
    R2,
    /// Steady-state heteronuclear NOE enhancement.
    Noe,
}

impl RelaxKind {
    pub fn label(&self) -> &'static str {
        match self {
            RelaxKind::R1 => "R1",
            RelaxKind::R2 => "R2",
            RelaxKind::Noe => "NOE",
        }
    }
}

impl std::fmt::Display for RelaxKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A static magnetic field strength, identified by its proton Larmor frequency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// User-visible label, e.g. "600".
    pub label: String,

    /// Proton Larmor frequency in Hz.
    pub proton_frq_hz: f64,
}

/// Descriptor of one loaded relaxation dataset: which observable at which field.
///
/// The order of descriptors in `Dataset::descriptors` fixes the order of the
/// per-spin data vectors and of every back-calculated rate vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DatasetDescriptor {
    pub kind: RelaxKind,

    /// Index into `Dataset::fields`.
    pub field: usize,
}

/// One measured relaxation value with its experimental error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxDataPoint {
    pub value: f64,
    pub error: f64,
}

/// Relaxation data for a single spin (residue), aligned with the dataset's
/// descriptor list.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinRecord {
    /// Residue number, kept as a string as it appears in the input files.
    pub res_num: String,

    /// Three-letter residue name.
    pub res_name: String,

    /// One data point per descriptor, in descriptor order.
    pub data: Vec<RelaxDataPoint>,
}

impl SpinRecord {
    /// Observed values in descriptor order.
    pub fn values(&self) -> Vec<f64> {
        self.data.iter().map(|d| d.value).collect()
    }

    /// Experimental errors in descriptor order.
    pub fn errors(&self) -> Vec<f64> {
        self.data.iter().map(|d| d.error).collect()
    }
}

/// User-supplied analysis configuration.
///
/// The empirical thresholds of the Farrow/Palmer heuristics are configuration
/// inputs, not constants baked into the strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Global rotational diffusion correlation time in seconds.
    pub tm: f64,

    /// Heteronucleus-proton bond length in meters.
    pub bond_length: f64,

    /// Chemical shift anisotropy of the heteronucleus (dimensionless, e.g.
    /// -170 ppm as -170e-6).
    pub csa: f64,

    /// Gyromagnetic ratio of the heteronucleus in rad.s^-1.T^-1.
    pub gamma_x: f64,

    /// Number of Monte Carlo simulations per fit.  Zero disables
    /// simulations entirely.
    pub sim_count: usize,

    /// Confidence percentile for the chi-squared and F-statistic limits,
    /// e.g. 0.90.
    pub confidence: f64,

    /// Fraction of the worst simulations discarded before percentile limits
    /// are computed.
    pub trim: f64,

    /// Chi-squared value above which a model 1 fit is considered hopeless
    /// (the Farrow/Palmer "large chi-squared" test).
    pub large_chi2: f64,

    /// Tolerance for the "zero chi-squared" (near-perfect fit) test.
    pub zero_chi2: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            tm: 10e-9,
            bond_length: 1.02e-10,
            csa: -170e-6,
            gamma_x: GAMMA_N15,
            sim_count: 200,
            confidence: 0.90,
            trim: 0.0,
            large_chi2: 20.0,
            zero_chi2: 0.0,
        }
    }
}

impl AnalysisConfig {
    /// Validate the physically meaningful ranges.  Fails fast before any
    /// fitting begins.
    pub fn validate(&self) -> Result<()> {
        if self.tm <= 0.0 {
            return Err(MfError::InvalidConfig(format!(
                "tm must be positive, got {:e}",
                self.tm
            )));
        }
        if self.bond_length <= 0.0 {
            return Err(MfError::InvalidConfig(
                "bond length must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.confidence) {
            return Err(MfError::InvalidConfig(format!(
                "confidence percentile must be in [0, 1), got {}",
                self.confidence
            )));
        }
        if !(0.0..1.0).contains(&self.trim) {
            return Err(MfError::InvalidConfig(format!(
                "simulation trim fraction must be in [0, 1), got {}",
                self.trim
            )));
        }
        Ok(())
    }
}

/// The analysis context: fields, dataset descriptors, spins, and configuration.
///
/// Invariant: the data matrix is rectangular.  Every spin holds exactly one
/// data point per descriptor, enforced at construction.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub fields: Vec<FieldInfo>,
    pub descriptors: Vec<DatasetDescriptor>,
    pub spins: Vec<SpinRecord>,
    pub config: AnalysisConfig,
}

impl Dataset {
    /// Assemble a dataset, verifying rectangularity and error positivity.
    pub fn new(
        fields: Vec<FieldInfo>,
        descriptors: Vec<DatasetDescriptor>,
        spins: Vec<SpinRecord>,
        config: AnalysisConfig,
    ) -> Result<Self> {
        config.validate()?;

        if fields.is_empty() {
            return Err(MfError::InputData("no magnetic fields loaded".to_string()));
        }
        if descriptors.is_empty() {
            return Err(MfError::InputData(
                "no relaxation datasets loaded".to_string(),
            ));
        }
        for d in &descriptors {
            if d.field >= fields.len() {
                return Err(MfError::InputData(format!(
                    "descriptor references field index {} but only {} fields are loaded",
                    d.field,
                    fields.len()
                )));
            }
        }
        for spin in &spins {
            if spin.data.len() != descriptors.len() {
                return Err(MfError::InputData(format!(
                    "residue {} has {} data points but {} datasets are loaded",
                    spin.res_num,
                    spin.data.len(),
                    descriptors.len()
                )));
            }
            for (point, d) in spin.data.iter().zip(&descriptors) {
                if !(point.error > 0.0) {
                    return Err(MfError::InputData(format!(
                        "residue {}: non-positive error {} for {} at field {}",
                        spin.res_num, point.error, d.kind, fields[d.field].label
                    )));
                }
            }
        }

        Ok(Self {
            fields,
            descriptors,
            spins,
            config,
        })
    }

    /// Number of loaded relaxation datasets (the `n` of the information
    /// criteria and of the degrees-of-freedom gating).
    pub fn num_data_sets(&self) -> usize {
        self.descriptors.len()
    }

    pub fn num_spins(&self) -> usize {
        self.spins.len()
    }
}
