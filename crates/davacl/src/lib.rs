//! # davacl
//!
//! WebDAV access control (RFC 3744) for a resource tree.
//!
//! This crate provides:
//! - Privilege trees and their flattening ([`catalog`])
//! - Transitive group membership with a shared cache ([`directory`])
//! - Effective-privilege evaluation with an administrator overlay ([`evaluator`])
//! - Privilege checks for every request path ([`gate`])
//! - Validated ACL replacement ([`mutator`])
//! - Access-control property values ([`properties`])
//! - Dispatcher extension points ([`hooks`])
//! - An in-memory tree for tests and embedding ([`memory`])
//!
//! [`AccessControl`] wires them together for one tree and configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![forbid(unsafe_code)]

pub mod catalog;
pub mod directory;
pub mod evaluator;
pub mod gate;
pub mod hooks;
pub mod memory;
pub mod mutator;
pub mod properties;

use std::sync::Arc;

use davacl_core::{AclConfig, Tree};

pub use catalog::{PrivilegeCatalog, MAX_PRIVILEGE_DEPTH};
pub use directory::PrincipalDirectory;
pub use evaluator::AccessEvaluator;
pub use gate::{AuthorizationGate, Caller, Recursion};
pub use hooks::{AclInterceptor, Depth, HookEvent, HookOutcome, Interceptor, InterceptorChain};
pub use memory::{MemoryNode, MemoryTree};
pub use mutator::AclMutator;
pub use properties::{PropertySupplier, PropertyValue};

pub use davacl_core::{Error, Result};

/// The access-control engine for one tree.
///
/// Cloning is cheap; clones share the membership cache.
#[derive(Clone)]
pub struct AccessControl {
    gate: Arc<AuthorizationGate>,
    mutator: Arc<AclMutator>,
}

impl AccessControl {
    /// Builds the engine with the default privilege tree.
    pub fn new(tree: Arc<dyn Tree>, config: AclConfig) -> Self {
        Self::with_catalog(tree, config, PrivilegeCatalog::new())
    }

    /// Builds the engine with a custom privilege catalog.
    pub fn with_catalog(tree: Arc<dyn Tree>, config: AclConfig, catalog: PrivilegeCatalog) -> Self {
        let config = Arc::new(config);
        let directory = Arc::new(PrincipalDirectory::new(tree.clone()));
        let evaluator = Arc::new(AccessEvaluator::new(catalog, directory, config.clone()));
        let gate = Arc::new(AuthorizationGate::new(
            tree.clone(),
            evaluator.clone(),
            config.clone(),
        ));
        let mutator = Arc::new(AclMutator::new(tree, evaluator, config));
        log::debug!("Access control ready: {gate:?}");
        Self { gate, mutator }
    }

    /// The authorization gate.
    pub fn gate(&self) -> &Arc<AuthorizationGate> {
        &self.gate
    }

    /// The ACL mutator.
    pub fn mutator(&self) -> &Arc<AclMutator> {
        &self.mutator
    }

    /// A property supplier sharing this engine's state.
    pub fn properties(&self) -> PropertySupplier {
        PropertySupplier::new(self.gate.clone())
    }

    /// An interceptor sharing this engine's state.
    pub fn interceptor(&self) -> AclInterceptor {
        AclInterceptor::new(self.gate.clone(), self.mutator.clone())
    }

    /// A chain holding only this engine's interceptor.
    pub fn chain(&self) -> InterceptorChain {
        InterceptorChain::new().add(self.interceptor())
    }
}
