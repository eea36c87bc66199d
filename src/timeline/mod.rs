//! Timeline assembly: budget-window completion and the history/budget merge.

pub mod complete;
pub mod merge;

pub use complete::*;
pub use merge::*;
