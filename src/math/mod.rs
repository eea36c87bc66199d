//! Numerical helpers for the baseline trainer.

pub mod ols;

pub use ols::*;
