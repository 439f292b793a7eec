//! Privilege and access-control-entry data model.
//!
//! Privileges form a tree rooted at one universal privilege; an ACL is an
//! ordered list of [`Ace`] grants owned by a resource.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::util::uri::normalize_href;

/// Well-known privilege names of the default supported-privilege tree.
pub mod privileges {
    /// The universal privilege; aggregates every other privilege.
    pub const ALL: &str = "all";
    /// Read content and properties.
    pub const READ: &str = "read";
    /// Read the ACL of a resource.
    pub const READ_ACL: &str = "read-acl";
    /// Read one's own effective privileges.
    pub const READ_CURRENT_USER_PRIVILEGE_SET: &str = "read-current-user-privilege-set";
    /// Any modification.
    pub const WRITE: &str = "write";
    /// Modify the ACL of a resource.
    pub const WRITE_ACL: &str = "write-acl";
    /// Modify dead and live properties.
    pub const WRITE_PROPERTIES: &str = "write-properties";
    /// Modify content.
    pub const WRITE_CONTENT: &str = "write-content";
    /// Add a member to a collection.
    pub const BIND: &str = "bind";
    /// Remove a member from a collection.
    pub const UNBIND: &str = "unbind";
    /// Release a lock.
    pub const UNLOCK: &str = "unlock";
}

/// Effective privilege set: deduplicated, with deterministic iteration order.
pub type PrivilegeSet = BTreeSet<String>;

/// A node of a supported-privilege tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    /// Privilege identifier, unique across the tree.
    pub name: String,
    /// Abstract privileges exist only to be aggregated and cannot be granted.
    #[serde(rename = "abstract", default)]
    pub is_abstract: bool,
    /// Immediate children, in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregates: Vec<Privilege>,
}

impl Privilege {
    /// Creates a concrete privilege with no children.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_abstract: false,
            aggregates: Vec::new(),
        }
    }

    /// Creates an abstract privilege with no children.
    pub fn abstract_privilege(name: impl Into<String>) -> Self {
        Self {
            is_abstract: true,
            ..Self::new(name)
        }
    }

    /// Adds an immediate child.
    pub fn aggregate(mut self, child: Privilege) -> Self {
        self.aggregates.push(child);
        self
    }
}

/// Read-side index entry for one privilege of a flattened tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlatPrivilege {
    /// Names of the immediate children only.
    pub aggregates: Vec<String>,
    /// Whether the privilege is abstract.
    pub is_abstract: bool,
    /// Nearest non-abstract privilege on the path from the root to this
    /// one, itself included; `None` when every privilege on that path is
    /// abstract.
    pub concrete: Option<String>,
}

/// Principal field of an ACE.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AcePrincipal {
    /// Whoever the resource declares as its owner.
    Owner,
    /// Every caller.
    All,
    /// Every authenticated caller.
    Authenticated,
    /// Only unauthenticated callers.
    Unauthenticated,
    /// A principal resource, by canonical path.
    Href(String),
}

impl AcePrincipal {
    /// Creates an href principal in canonical form.
    pub fn href(path: &str) -> Self {
        AcePrincipal::Href(normalize_href(path, "/"))
    }

    /// Returns the principal path for href principals.
    pub fn as_href(&self) -> Option<&str> {
        match self {
            AcePrincipal::Href(path) => Some(path),
            _ => None,
        }
    }

    /// Re-normalizes an href principal against the server base URI.
    pub fn normalized(&self, base_uri: &str) -> Self {
        match self {
            AcePrincipal::Href(href) => AcePrincipal::Href(normalize_href(href, base_uri)),
            token => token.clone(),
        }
    }
}

impl fmt::Display for AcePrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcePrincipal::Owner => write!(f, "owner"),
            AcePrincipal::All => write!(f, "all"),
            AcePrincipal::Authenticated => write!(f, "authenticated"),
            AcePrincipal::Unauthenticated => write!(f, "unauthenticated"),
            AcePrincipal::Href(path) => write!(f, "{path}"),
        }
    }
}

impl FromStr for AcePrincipal {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "owner" => AcePrincipal::Owner,
            "all" => AcePrincipal::All,
            "authenticated" => AcePrincipal::Authenticated,
            "unauthenticated" => AcePrincipal::Unauthenticated,
            href => AcePrincipal::Href(href.to_string()),
        })
    }
}

impl From<&str> for AcePrincipal {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(principal) => principal,
            Err(infallible) => match infallible {},
        }
    }
}

impl Serialize for AcePrincipal {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AcePrincipal {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(AcePrincipal::from(raw.as_str()))
    }
}

/// A single access control entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ace {
    /// Who the grant applies to.
    pub principal: AcePrincipal,
    /// Granted privilege name.
    pub privilege: String,
    /// Protected entries survive every client-submitted ACL replacement.
    #[serde(default)]
    pub protected: bool,
}

impl Ace {
    /// Creates an unprotected grant.
    pub fn grant(principal: impl Into<AcePrincipal>, privilege: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            privilege: privilege.into(),
            protected: false,
        }
    }

    /// Marks the entry protected.
    pub fn protect(mut self) -> Self {
        self.protected = true;
        self
    }
}
