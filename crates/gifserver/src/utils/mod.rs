//! Utility modules for the gifserver application
//!
//! This module contains reusable stream wrappers and helpers that are used
//! across the pipeline.

pub mod io;
pub mod url;

// Re-export commonly used types for convenience
pub use io::{BudgetReader, ResilientWriter};
