//! Values of the access-control properties.
//!
//! Serialization belongs to the caller; this module only decides each
//! value. Properties that need a privilege to read are gated one by one: a
//! failed check yields [`PropertyValue::Forbidden`] for that property alone.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use davacl_core::privileges::{READ_ACL, READ_CURRENT_USER_PRIVILEGE_SET};
use davacl_core::{Ace, Error, Node, Privilege, PrivilegeSet, Result};

use crate::gate::{AuthorizationGate, Caller, Recursion};

/// Property names this engine supplies.
pub mod names {
    /// Principal of the current caller.
    pub const CURRENT_USER_PRINCIPAL: &str = "current-user-principal";
    /// Effective privileges of the caller.
    pub const CURRENT_USER_PRIVILEGE_SET: &str = "current-user-privilege-set";
    /// Privilege tree of the resource.
    pub const SUPPORTED_PRIVILEGE_SET: &str = "supported-privilege-set";
    /// The effective ACL.
    pub const ACL: &str = "acl";
    /// Restrictions on ACLs the server accepts.
    pub const ACL_RESTRICTIONS: &str = "acl-restrictions";
    /// Owner principal.
    pub const OWNER: &str = "owner";
    /// Roots of the principal collections.
    pub const PRINCIPAL_COLLECTION_SET: &str = "principal-collection-set";
    /// Other URIs of a principal.
    pub const ALTERNATE_URI_SET: &str = "alternate-URI-set";
    /// Canonical URL of a principal.
    pub const PRINCIPAL_URL: &str = "principal-URL";
    /// Direct members of a group principal.
    pub const GROUP_MEMBER_SET: &str = "group-member-set";
    /// Groups a principal directly belongs to.
    pub const GROUP_MEMBERSHIP: &str = "group-membership";
    /// Display name of a principal.
    pub const DISPLAYNAME: &str = "displayname";
}

/// A property value decided by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum PropertyValue {
    /// A single resource reference.
    Href(String),
    /// A list of resource references.
    Hrefs(Vec<String>),
    /// Plain text.
    Text(String),
    /// The caller is not authenticated.
    Unauthenticated,
    /// A set of privilege names.
    Privileges(PrivilegeSet),
    /// A supported-privilege tree.
    SupportedPrivileges(Privilege),
    /// ACL entries.
    Acl(Vec<Ace>),
    /// Supported ACL shapes.
    AclRestrictions {
        /// Only grant ACEs are accepted.
        grant_only: bool,
        /// Inverted principals are not accepted.
        no_invert: bool,
    },
    /// The caller may not read this property.
    Forbidden,
}

/// Decides access-control property values for one resource at a time.
#[derive(Clone)]
pub struct PropertySupplier {
    gate: Arc<AuthorizationGate>,
}

impl PropertySupplier {
    /// Creates a supplier.
    pub fn new(gate: Arc<AuthorizationGate>) -> Self {
        Self { gate }
    }

    /// Values of every requested property that applies to `uri`.
    /// Inapplicable names are left out.
    pub async fn properties(
        &self,
        caller: &Caller,
        uri: &str,
        requested: &[&str],
    ) -> Result<BTreeMap<String, PropertyValue>> {
        let node = self.gate.tree().node(uri).await?;
        let mut values = BTreeMap::new();
        for name in requested {
            if let Some(value) = self.value(caller, node.as_ref(), name).await? {
                values.insert(name.to_string(), value);
            }
        }
        Ok(values)
    }

    /// Value of one property, or `None` when it does not apply.
    pub async fn property(
        &self,
        caller: &Caller,
        uri: &str,
        name: &str,
    ) -> Result<Option<PropertyValue>> {
        let node = self.gate.tree().node(uri).await?;
        self.value(caller, node.as_ref(), name).await
    }

    async fn value(
        &self,
        caller: &Caller,
        node: &dyn Node,
        name: &str,
    ) -> Result<Option<PropertyValue>> {
        let evaluator = self.gate.evaluator();
        let value = match name {
            names::CURRENT_USER_PRINCIPAL => Some(match caller.principal() {
                Some(principal) => PropertyValue::Href(principal.to_string()),
                None => PropertyValue::Unauthenticated,
            }),
            names::PRINCIPAL_COLLECTION_SET => Some(PropertyValue::Hrefs(
                self.gate.config().principal_collection_set.clone(),
            )),
            names::CURRENT_USER_PRIVILEGE_SET => {
                if node.as_acl().is_none() {
                    return Ok(None);
                }
                if !self.readable(caller, node, READ_CURRENT_USER_PRIVILEGE_SET).await? {
                    return Ok(Some(PropertyValue::Forbidden));
                }
                self.gate
                    .privilege_set(caller, node)
                    .await?
                    .map(PropertyValue::Privileges)
            }
            names::ACL => {
                if node.as_acl().is_none() {
                    return Ok(None);
                }
                if !self.readable(caller, node, READ_ACL).await? {
                    return Ok(Some(PropertyValue::Forbidden));
                }
                evaluator.acl(node).await?.map(PropertyValue::Acl)
            }
            names::SUPPORTED_PRIVILEGE_SET => node.as_acl().map(|_| {
                PropertyValue::SupportedPrivileges(evaluator.catalog().supported_privileges(node))
            }),
            names::ACL_RESTRICTIONS => node.as_acl().map(|_| PropertyValue::AclRestrictions {
                grant_only: true,
                no_invert: true,
            }),
            names::OWNER => node.as_acl().and_then(|acl| acl.owner()).map(PropertyValue::Href),
            _ => self.principal_value(node, name).await?,
        };
        Ok(value)
    }

    async fn principal_value(&self, node: &dyn Node, name: &str) -> Result<Option<PropertyValue>> {
        let Some(principal) = node.as_principal() else {
            return Ok(None);
        };
        let value = match name {
            names::ALTERNATE_URI_SET => Some(PropertyValue::Hrefs(principal.alternate_uri_set())),
            names::PRINCIPAL_URL => Some(PropertyValue::Href(principal.principal_url())),
            names::GROUP_MEMBER_SET => {
                Some(PropertyValue::Hrefs(principal.group_member_set().await?))
            }
            names::GROUP_MEMBERSHIP => {
                Some(PropertyValue::Hrefs(principal.group_membership().await?))
            }
            names::DISPLAYNAME => principal.display_name().map(PropertyValue::Text),
            _ => None,
        };
        Ok(value)
    }

    async fn readable(&self, caller: &Caller, node: &dyn Node, privilege: &str) -> Result<bool> {
        match self
            .gate
            .check_privileges(caller, node.path(), &[privilege], Recursion::Target)
            .await
        {
            Ok(()) => Ok(true),
            Err(Error::NeedPrivileges { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
