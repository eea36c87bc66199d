//! Historical data: sheet fetch and pod imputation.

pub mod impute;
pub mod sheet;

pub use impute::*;
pub use sheet::*;
