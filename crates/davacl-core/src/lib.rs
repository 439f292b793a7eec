//! davacl core: shared types, capability traits, errors, and configuration.
//!
//! This crate provides the foundational types used across all davacl crates.
//! It has no internal davacl dependencies (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error types and Result alias
//! - [`model`]: Privileges, ACEs, and principal tokens
//! - [`resource`]: Capability traits of the resource-tree collaborator
//! - [`config`]: Engine configuration
//! - [`util`]: Path normalization

#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod model;
pub mod resource;
pub mod util;

// Re-export key types at crate root for convenience
pub use config::AclConfig;
pub use error::{Classification, Error, Result};
pub use model::{privileges, Ace, AcePrincipal, FlatPrivilege, Privilege, PrivilegeSet};
pub use resource::{AclCapable, Node, PrincipalCapable, PrincipalCollection, Tree};

// Convenience re-exports from util
pub use util::uri::{normalize_href, normalize_path};
