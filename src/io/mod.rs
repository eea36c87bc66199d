//! Input/output helpers.
//!
//! - CSV/JSON ingest + normalization (`ingest`)
//! - cleaned table and forecast CSV exports (`export`)
//! - model artifact JSON read/write (`model_file`)

pub mod export;
pub mod ingest;
pub mod model_file;

pub use export::*;
pub use ingest::*;
pub use model_file::*;
