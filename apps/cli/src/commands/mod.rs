//! Command implementations for the Tune CLI.

pub mod batch_plan;
pub mod convert;
pub mod resume;
pub mod train;
