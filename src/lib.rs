//! `pod-forecast` library crate.
//!
//! The binary (`pods`) is a thin wrapper around this library so that:
//!
//! - the pipeline is testable without spawning processes
//! - the batch CLI and the HTTP service share one implementation
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod features;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod postprocess;
pub mod report;
pub mod server;
pub mod timeline;
