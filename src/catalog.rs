//! The model-free model catalog.
//!
//! The five nested model-free parameter sets m1..m5 are a closed family, so
//! they are represented as an enum and matched exhaustively at the points
//! where model-specific behavior diverges (parameter ordering, the presence
//! of Rex).  Adding a model variant is a compile-time event, not a string
//! comparison scattered through the codebase.

use serde::{Deserialize, Serialize};

/// One of the five model-free parameter sets.
///
/// Parameter order is fixed per model and is the order the forward model,
/// the fit oracle, and every reported parameter vector use:
///
/// * m1: `[S2]`
/// * m2: `[S2, te]`
/// * m3: `[S2, Rex]`
/// * m4: `[S2, te, Rex]`
/// * m5: `[S2f, S2s, ts]`
///
/// Correlation times are in seconds internally (inputs in ps are scaled by
/// 1e-12); Rex is the exchange contribution at the first loaded field in
/// s^-1, scaled quadratically to other fields by the forward model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelSpec {
    M1,
    M2,
    M3,
    M4,
    M5,
}

/// All five models, in nesting order.
pub const ALL_MODELS: [ModelSpec; 5] = [
    ModelSpec::M1,
    ModelSpec::M2,
    ModelSpec::M3,
    ModelSpec::M4,
    ModelSpec::M5,
];

impl ModelSpec {
    /// The model label as it appears in reports ("1".."5").
    pub fn label(&self) -> &'static str {
        match self {
            ModelSpec::M1 => "1",
            ModelSpec::M2 => "2",
            ModelSpec::M3 => "3",
            ModelSpec::M4 => "4",
            ModelSpec::M5 => "5",
        }
    }

    /// Names of the active parameters, in fitting order.
    pub fn param_names(&self) -> &'static [&'static str] {
        match self {
            ModelSpec::M1 => &["s2"],
            ModelSpec::M2 => &["s2", "te"],
            ModelSpec::M3 => &["s2", "rex"],
            ModelSpec::M4 => &["s2", "te", "rex"],
            ModelSpec::M5 => &["s2f", "s2s", "ts"],
        }
    }

    /// Number of fitted parameters (the `k` of the information criteria).
    pub fn param_count(&self) -> usize {
        self.param_names().len()
    }

    /// Whether the model carries a chemical exchange term.
    pub fn has_rex(&self) -> bool {
        matches!(self, ModelSpec::M3 | ModelSpec::M4)
    }

    /// Index of the Rex parameter within the parameter vector, if any.
    pub fn rex_index(&self) -> Option<usize> {
        match self {
            ModelSpec::M3 => Some(1),
            ModelSpec::M4 => Some(2),
            ModelSpec::M1 | ModelSpec::M2 | ModelSpec::M5 => None,
        }
    }

    /// Default starting values for grid-search seeding, in internal units.
    pub fn default_start(&self) -> Vec<f64> {
        match self {
            ModelSpec::M1 => vec![0.5],
            ModelSpec::M2 => vec![0.5, 100e-12],
            ModelSpec::M3 => vec![0.5, 0.0],
            ModelSpec::M4 => vec![0.5, 100e-12, 0.0],
            ModelSpec::M5 => vec![0.5, 0.5, 1000e-12],
        }
    }

    /// Lower bounds per parameter.
    pub fn lower_bounds(&self) -> Vec<f64> {
        vec![0.0; self.param_count()]
    }

    /// Upper bounds per parameter.
    pub fn upper_bounds(&self) -> Vec<f64> {
        match self {
            ModelSpec::M1 => vec![1.0],
            ModelSpec::M2 => vec![1.0, 10e-9],
            ModelSpec::M3 => vec![1.0, 100.0],
            ModelSpec::M4 => vec![1.0, 10e-9, 100.0],
            ModelSpec::M5 => vec![1.0, 1.0, 10e-9],
        }
    }

    /// Number of grid-search steps per parameter.
    pub fn grid_steps(&self) -> Vec<usize> {
        match self {
            ModelSpec::M1 => vec![21],
            ModelSpec::M2 => vec![11, 10],
            ModelSpec::M3 => vec![11, 10],
            ModelSpec::M4 => vec![11, 10, 10],
            ModelSpec::M5 => vec![11, 11, 10],
        }
    }
}

impl std::fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.label())
    }
}

/// The F-test pairs between nested models used by the Palmer selection method.
///
/// The pairs against models 4 and 5 are only statistically meaningful when
/// those models are over-determined, which requires more than three loaded
/// datasets; `requires_extra_data` encodes that rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FtestPair {
    M1M2,
    M1M3,
    M1M4,
    M1M5,
    M2M4,
    M2M5,
    M3M4,
}

/// All catalogued F-test pairs.
pub const ALL_FTEST_PAIRS: [FtestPair; 7] = [
    FtestPair::M1M2,
    FtestPair::M1M3,
    FtestPair::M1M4,
    FtestPair::M1M5,
    FtestPair::M2M4,
    FtestPair::M2M5,
    FtestPair::M3M4,
];

impl FtestPair {
    /// The simpler (null) model of the pair.
    pub fn null(&self) -> ModelSpec {
        match self {
            FtestPair::M1M2 | FtestPair::M1M3 | FtestPair::M1M4 | FtestPair::M1M5 => ModelSpec::M1,
            FtestPair::M2M4 | FtestPair::M2M5 => ModelSpec::M2,
            FtestPair::M3M4 => ModelSpec::M3,
        }
    }

    /// The richer (alternative) model of the pair.
    pub fn alt(&self) -> ModelSpec {
        match self {
            FtestPair::M1M2 => ModelSpec::M2,
            FtestPair::M1M3 => ModelSpec::M3,
            FtestPair::M1M4 | FtestPair::M2M4 | FtestPair::M3M4 => ModelSpec::M4,
            FtestPair::M1M5 | FtestPair::M2M5 => ModelSpec::M5,
        }
    }

    /// Whether the pair may only be evaluated with more than three datasets
    /// (degrees of freedom of the richer model must be positive).
    pub fn requires_extra_data(&self) -> bool {
        matches!(self, FtestPair::M2M4 | FtestPair::M2M5 | FtestPair::M3M4)
    }

    /// The pairs the Palmer method evaluates for a given dataset count.
    pub fn palmer_pairs(num_data_sets: usize) -> Vec<FtestPair> {
        let mut pairs = vec![FtestPair::M1M2, FtestPair::M1M3];
        if num_data_sets > 3 {
            pairs.push(FtestPair::M2M4);
            pairs.push(FtestPair::M2M5);
            pairs.push(FtestPair::M3M4);
        }
        pairs
    }

    pub fn label(&self) -> &'static str {
        match self {
            FtestPair::M1M2 => "f-m1m2",
            FtestPair::M1M3 => "f-m1m3",
            FtestPair::M1M4 => "f-m1m4",
            FtestPair::M1M5 => "f-m1m5",
            FtestPair::M2M4 => "f-m2m4",
            FtestPair::M2M5 => "f-m2m5",
            FtestPair::M3M4 => "f-m3m4",
        }
    }
}

impl std::fmt::Display for FtestPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_counts() {
        let counts: Vec<usize> = ALL_MODELS.iter().map(|m| m.param_count()).collect();
        assert_eq!(counts, vec![1, 2, 2, 3, 3]);
    }

    #[test]
    fn test_param_order_matches_defaults() {
        for model in ALL_MODELS {
            assert_eq!(model.default_start().len(), model.param_count());
            assert_eq!(model.lower_bounds().len(), model.param_count());
            assert_eq!(model.upper_bounds().len(), model.param_count());
            assert_eq!(model.grid_steps().len(), model.param_count());
        }
    }

    #[test]
    fn test_rex_index() {
        assert_eq!(ModelSpec::M3.rex_index(), Some(1));
        assert_eq!(ModelSpec::M4.rex_index(), Some(2));
        assert_eq!(ModelSpec::M1.rex_index(), None);
        assert_eq!(ModelSpec::M5.rex_index(), None);
        for model in ALL_MODELS {
            assert_eq!(model.has_rex(), model.rex_index().is_some());
        }
    }

    #[test]
    fn test_palmer_pairs_gating() {
        let pairs = FtestPair::palmer_pairs(3);
        assert_eq!(pairs, vec![FtestPair::M1M2, FtestPair::M1M3]);
        assert!(pairs.iter().all(|p| !p.requires_extra_data()));

        let pairs = FtestPair::palmer_pairs(4);
        assert_eq!(pairs.len(), 5);
        assert!(pairs.contains(&FtestPair::M2M4));
        assert!(pairs.contains(&FtestPair::M2M5));
        assert!(pairs.contains(&FtestPair::M3M4));
    }

    #[test]
    fn test_pair_nesting() {
        for pair in ALL_FTEST_PAIRS {
            assert!(pair.alt().param_count() > pair.null().param_count());
        }
    }
}
