//! Numerical utilities shared by the fitting machinery.

pub mod finite_difference;
pub mod linalg;
pub mod stats;
