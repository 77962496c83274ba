//! Utilities.

pub mod fs;
pub mod timeout;
