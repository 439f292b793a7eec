//! Supported-privilege trees and their flattened lookup tables.
//!
//! A resource may supply its own privilege tree; otherwise the RFC 3744
//! default applies:
//!
//! ```text
//! all (abstract)
//! ├── read
//! │   ├── read-acl (abstract)
//! │   └── read-current-user-privilege-set (abstract)
//! └── write
//!     ├── write-acl (abstract)
//!     ├── write-properties (abstract)
//!     ├── write-content (abstract)
//!     ├── bind (abstract)
//!     ├── unbind (abstract)
//!     └── unlock (abstract)
//! ```

use std::collections::BTreeMap;

use davacl_core::privileges::*;
use davacl_core::{Error, FlatPrivilege, Node, Privilege, Result};

/// Maximum privilege-tree depth traversed by [`PrivilegeCatalog::flatten`].
pub const MAX_PRIVILEGE_DEPTH: usize = 16;

/// Flattened privilege table, keyed by privilege name.
pub type FlatPrivileges = BTreeMap<String, FlatPrivilege>;

/// Source of supported-privilege trees.
#[derive(Debug, Clone)]
pub struct PrivilegeCatalog {
    default_tree: Privilege,
}

impl Default for PrivilegeCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivilegeCatalog {
    /// Creates a catalog using the RFC 3744 default tree.
    pub fn new() -> Self {
        Self {
            default_tree: default_privilege_tree(),
        }
    }

    /// Creates a catalog with a different fallback tree.
    pub fn with_default_tree(default_tree: Privilege) -> Self {
        Self { default_tree }
    }

    /// The tree that applies to `node`.
    pub fn supported_privileges(&self, node: &dyn Node) -> Privilege {
        node.as_acl()
            .and_then(|acl| acl.supported_privilege_set())
            .unwrap_or_else(|| self.default_tree.clone())
    }

    /// The flattened table for `node`.
    pub fn flat_privileges(&self, node: &dyn Node) -> Result<FlatPrivileges> {
        flatten(&self.supported_privileges(node))
    }
}

/// The RFC 3744 default privilege tree.
pub fn default_privilege_tree() -> Privilege {
    Privilege::abstract_privilege(ALL)
        .aggregate(
            Privilege::new(READ)
                .aggregate(Privilege::abstract_privilege(READ_ACL))
                .aggregate(Privilege::abstract_privilege(READ_CURRENT_USER_PRIVILEGE_SET)),
        )
        .aggregate(
            Privilege::new(WRITE)
                .aggregate(Privilege::abstract_privilege(WRITE_ACL))
                .aggregate(Privilege::abstract_privilege(WRITE_PROPERTIES))
                .aggregate(Privilege::abstract_privilege(WRITE_CONTENT))
                .aggregate(Privilege::abstract_privilege(BIND))
                .aggregate(Privilege::abstract_privilege(UNBIND))
                .aggregate(Privilege::abstract_privilege(UNLOCK)),
        )
}

/// Flatten a privilege tree into a name-keyed table.
///
/// Depth-first with an explicit stack. Fails on a duplicate name or on a
/// tree deeper than [`MAX_PRIVILEGE_DEPTH`].
pub fn flatten(tree: &Privilege) -> Result<FlatPrivileges> {
    let mut table = FlatPrivileges::new();
    let mut stack: Vec<(&Privilege, Option<&str>, usize)> = vec![(tree, None, 1)];

    while let Some((privilege, parent_concrete, depth)) = stack.pop() {
        if depth > MAX_PRIVILEGE_DEPTH {
            return Err(Error::PrivilegeTreeTooDeep {
                name: privilege.name.clone(),
                max: MAX_PRIVILEGE_DEPTH,
            });
        }

        let concrete = if privilege.is_abstract {
            parent_concrete
        } else {
            Some(privilege.name.as_str())
        };

        let entry = FlatPrivilege {
            aggregates: privilege.aggregates.iter().map(|p| p.name.clone()).collect(),
            is_abstract: privilege.is_abstract,
            concrete: concrete.map(str::to_string),
        };
        if table.insert(privilege.name.clone(), entry).is_some() {
            return Err(Error::DuplicatePrivilege(privilege.name.clone()));
        }

        // Reverse so children are visited in declaration order.
        for child in privilege.aggregates.iter().rev() {
            stack.push((child, concrete, depth + 1));
        }
    }

    Ok(table)
}
