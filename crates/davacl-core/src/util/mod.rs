//! Utility modules.
//!
//! # Modules
//!
//! - [`uri`]: Resource path normalization and ancestry

pub mod uri;
