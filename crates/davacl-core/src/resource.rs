//! Capability traits implemented by the resource tree.
//!
//! The engine never owns resources. It asks the [`Tree`] for a [`Node`] and
//! then queries the node for each capability it needs at runtime: a node
//! may carry an ACL, act as a principal, act as a principal collection, any
//! combination of these, or none.

use async_trait::async_trait;
use std::sync::Arc;

use crate::model::{Ace, Privilege};
use crate::Result;

/// A resource in the tree.
pub trait Node: Send + Sync {
    /// Canonical path of the resource.
    fn path(&self) -> &str;

    /// ACL capability, if the resource supports ACLs.
    fn as_acl(&self) -> Option<&dyn AclCapable> {
        None
    }

    /// Principal capability, if the resource is a principal.
    fn as_principal(&self) -> Option<&dyn PrincipalCapable> {
        None
    }

    /// Principal-collection capability, if the resource holds principals.
    fn as_principal_collection(&self) -> Option<&dyn PrincipalCollection> {
        None
    }
}

/// A resource that carries an ACL.
#[async_trait]
pub trait AclCapable: Send + Sync {
    /// Declared owner principal path.
    fn owner(&self) -> Option<String>;

    /// Declared group principal path.
    fn group(&self) -> Option<String> {
        None
    }

    /// The stored ACL.
    async fn acl(&self) -> Result<Vec<Ace>>;

    /// Replaces the stored ACL in one step.
    async fn set_acl(&self, acl: Vec<Ace>) -> Result<()>;

    /// Resource-specific supported-privilege tree, overriding the default.
    fn supported_privilege_set(&self) -> Option<Privilege> {
        None
    }
}

/// A resource that acts as a principal (user or group).
#[async_trait]
pub trait PrincipalCapable: Send + Sync {
    /// Canonical principal URL.
    fn principal_url(&self) -> String;

    /// Other URIs identifying the same principal (e.g. `mailto:`).
    fn alternate_uri_set(&self) -> Vec<String> {
        Vec::new()
    }

    /// Human-readable name.
    fn display_name(&self) -> Option<String> {
        None
    }

    /// Direct members, when the principal is a group.
    async fn group_member_set(&self) -> Result<Vec<String>>;

    /// Groups this principal is a direct member of.
    async fn group_membership(&self) -> Result<Vec<String>>;

    /// Replaces the direct member list.
    async fn set_group_member_set(&self, members: Vec<String>) -> Result<()>;
}

/// A collection of principals that can be searched.
#[async_trait]
pub trait PrincipalCollection: Send + Sync {
    /// Names of properties clients may search on.
    fn principal_search_property_set(&self) -> Vec<String> {
        vec!["displayname".to_string()]
    }

    /// Paths of principals whose properties match every `(name, value)`
    /// pair as a case-insensitive substring.
    async fn search_principals(&self, properties: &[(String, String)]) -> Result<Vec<String>>;
}

/// The resource-tree collaborator.
#[async_trait]
pub trait Tree: Send + Sync {
    /// Looks up a node; fails with `NotFound` when absent.
    async fn node(&self, path: &str) -> Result<Arc<dyn Node>>;

    /// Whether a node exists at `path`.
    async fn node_exists(&self, path: &str) -> Result<bool> {
        match self.node(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Immediate children of a collection, empty for non-collections.
    async fn children(&self, path: &str) -> Result<Vec<Arc<dyn Node>>>;
}
