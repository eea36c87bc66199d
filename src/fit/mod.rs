//! Offline model fitting.
//!
//! Responsibilities:
//!
//! - build training features through the shared feature builder
//! - grow random forests (`forest`) or fit linear baselines (`math::ols`)
//! - package each fit as a model artifact

pub mod forest;
pub mod train;

pub use forest::*;
pub use train::*;
