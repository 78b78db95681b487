//! In-process nonlinear least-squares optimization.
//!
//! A Levenberg-Marquardt implementation with bound clamping plus a coarse
//! grid search used for seeding, so model fitting runs in-process instead
//! of shelling out to an external optimizer.

pub mod algorithm;
pub mod config;
pub mod grid;

pub use algorithm::{LevenbergMarquardt, LmResult};
pub use config::LmConfig;
pub use grid::grid_search;
