//! Privilege checks gating state-changing operations.
//!
//! [`AuthorizationGate::check_privileges`] is the single entry point every
//! request path uses. The `before_*` methods map dispatcher operations to
//! the privileges they require.

use std::collections::VecDeque;
use std::sync::Arc;

use davacl_core::privileges::*;
use davacl_core::util::uri::{parent_path, self_and_ancestors};
use davacl_core::{normalize_path, AclConfig, Error, Node, PrivilegeSet, Result, Tree};

use crate::evaluator::AccessEvaluator;

/// Identity of the caller for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Caller {
    /// No credentials were presented.
    Anonymous,
    /// An authenticated principal, by canonical path.
    Principal(String),
}

impl Caller {
    /// The principal path, if authenticated.
    pub fn principal(&self) -> Option<&str> {
        match self {
            Caller::Anonymous => None,
            Caller::Principal(path) => Some(path),
        }
    }
}

/// Which resources a privilege check covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recursion {
    /// The target only.
    Target,
    /// The target and every descendant.
    Descendants,
    /// The target and every ancestor up to the root.
    Ancestors,
}

/// Privilege and scope a dispatcher method requires on its target.
///
/// Returns `None` for methods this gate does not govern directly
/// (creation and deletion go through [`AuthorizationGate::before_bind`] and
/// [`AuthorizationGate::before_unbind`]).
pub fn method_privilege(method: &str) -> Option<(&'static str, Recursion)> {
    match method.to_ascii_uppercase().as_str() {
        "GET" | "HEAD" | "OPTIONS" | "PROPFIND" | "REPORT" => Some((READ, Recursion::Target)),
        "PUT" | "LOCK" | "UNLOCK" => Some((WRITE_CONTENT, Recursion::Target)),
        "PROPPATCH" => Some((WRITE_PROPERTIES, Recursion::Target)),
        "ACL" => Some((WRITE_ACL, Recursion::Target)),
        "COPY" | "MOVE" => Some((READ, Recursion::Descendants)),
        _ => None,
    }
}

/// Evaluates and enforces privileges for callers.
pub struct AuthorizationGate {
    tree: Arc<dyn Tree>,
    evaluator: Arc<AccessEvaluator>,
    config: Arc<AclConfig>,
}

impl AuthorizationGate {
    /// Creates a gate.
    pub fn new(
        tree: Arc<dyn Tree>,
        evaluator: Arc<AccessEvaluator>,
        config: Arc<AclConfig>,
    ) -> Self {
        Self {
            tree,
            evaluator,
            config,
        }
    }

    /// The evaluator backing this gate.
    pub fn evaluator(&self) -> &Arc<AccessEvaluator> {
        &self.evaluator
    }

    /// The resource tree.
    pub fn tree(&self) -> &Arc<dyn Tree> {
        &self.tree
    }

    /// The engine configuration.
    pub fn config(&self) -> &AclConfig {
        &self.config
    }

    /// Maps the authenticated username to a caller.
    pub fn current_user_principal(&self, username: Option<&str>) -> Caller {
        match username {
            Some(name) if !name.trim().is_empty() => {
                Caller::Principal(self.config.principal_for_username(name))
            }
            _ => Caller::Anonymous,
        }
    }

    /// Effective privileges of `caller` on `node`. `None` when the node
    /// does not support ACLs; empty for anonymous callers.
    pub async fn privilege_set(
        &self,
        caller: &Caller,
        node: &dyn Node,
    ) -> Result<Option<PrivilegeSet>> {
        match caller {
            Caller::Principal(principal) => {
                self.evaluator
                    .current_user_privilege_set(node, principal)
                    .await
            }
            Caller::Anonymous => Ok(node.as_acl().map(|_| PrivilegeSet::new())),
        }
    }

    /// Effective privileges of `caller` on the resource at `uri`.
    pub async fn current_user_privilege_set(
        &self,
        caller: &Caller,
        uri: &str,
    ) -> Result<Option<PrivilegeSet>> {
        let node = self.tree.node(uri).await?;
        self.privilege_set(caller, node.as_ref()).await
    }

    /// Succeeds iff `caller` holds every `required` privilege on every
    /// resource in scope. Fails with `NeedPrivileges` naming the first
    /// failing resource and exactly the privileges missing there.
    pub async fn check_privileges(
        &self,
        caller: &Caller,
        uri: &str,
        required: &[&str],
        recursion: Recursion,
    ) -> Result<()> {
        let uri = normalize_path(uri);
        for node in self.scope(&uri, recursion).await? {
            self.check_node(caller, node.as_ref(), required).await?;
        }
        Ok(())
    }

    async fn check_node(&self, caller: &Caller, node: &dyn Node, required: &[&str]) -> Result<()> {
        let missing: Vec<String> = match self.privilege_set(caller, node).await? {
            None if self.config.allow_access_to_nodes_without_acl => return Ok(()),
            None => required.iter().map(|p| p.to_string()).collect(),
            Some(effective) => required
                .iter()
                .filter(|p| !effective.contains(**p))
                .map(|p| p.to_string())
                .collect(),
        };

        if missing.is_empty() {
            return Ok(());
        }

        let mut deduped: Vec<String> = Vec::with_capacity(missing.len());
        for privilege in missing {
            if !deduped.contains(&privilege) {
                deduped.push(privilege);
            }
        }
        log::warn!(
            "Denied {caller:?} on /{}: missing {}",
            node.path(),
            deduped.join(", ")
        );
        Err(Error::need_privileges(node.path(), deduped))
    }

    /// Resources covered by a check on `uri`.
    async fn scope(&self, uri: &str, recursion: Recursion) -> Result<Vec<Arc<dyn Node>>> {
        match recursion {
            Recursion::Target => Ok(vec![self.tree.node(uri).await?]),
            Recursion::Ancestors => {
                let mut nodes = Vec::new();
                for path in self_and_ancestors(uri) {
                    nodes.push(self.tree.node(&path).await?);
                }
                Ok(nodes)
            }
            Recursion::Descendants => {
                let root = self.tree.node(uri).await?;
                let mut nodes = Vec::new();
                let mut queue: VecDeque<Arc<dyn Node>> = VecDeque::from([root]);
                while let Some(node) = queue.pop_front() {
                    queue.extend(self.tree.children(node.path()).await?);
                    nodes.push(node);
                }
                Ok(nodes)
            }
        }
    }

    /// Gate for a dispatcher method on an existing or missing target.
    ///
    /// A missing target passes: the dispatcher reports it, and a denial
    /// here would reveal whether the resource exists.
    pub async fn before_method(&self, caller: &Caller, method: &str, uri: &str) -> Result<()> {
        let Some((privilege, recursion)) = method_privilege(method) else {
            return Ok(());
        };
        if !self.tree.node_exists(uri).await? {
            log::debug!("{method} on missing /{}; not gating", normalize_path(uri));
            return Ok(());
        }
        self.check_privileges(caller, uri, &[privilege], recursion)
            .await
    }

    /// Creating `uri` requires `bind` on its parent collection.
    pub async fn before_bind(&self, caller: &Caller, uri: &str) -> Result<()> {
        let uri = normalize_path(uri);
        let Some(parent) = parent_path(&uri) else {
            return Err(Error::Forbidden("the root collection cannot be created".into()));
        };
        self.check_privileges(caller, parent, &[BIND], Recursion::Target)
            .await
    }

    /// Deleting `uri` requires `unbind` on its parent and every ancestor
    /// collection.
    pub async fn before_unbind(&self, caller: &Caller, uri: &str) -> Result<()> {
        let uri = normalize_path(uri);
        let Some(parent) = parent_path(&uri) else {
            return Err(Error::Forbidden("the root collection cannot be deleted".into()));
        };
        self.check_privileges(caller, parent, &[UNBIND], Recursion::Ancestors)
            .await
    }

    /// Children of `parent`, without those the caller may not read when
    /// `hide_nodes_by_acl` is on.
    pub async fn visible_children(
        &self,
        caller: &Caller,
        parent: &str,
    ) -> Result<Vec<Arc<dyn Node>>> {
        let children = self.tree.children(parent).await?;
        if !self.config.hide_nodes_by_acl {
            return Ok(children);
        }

        let mut visible = Vec::with_capacity(children.len());
        for child in children {
            match self.check_node(caller, child.as_ref(), &[READ]).await {
                Ok(()) => visible.push(child),
                Err(Error::NeedPrivileges { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(visible)
    }

    /// Replaces the direct members of the principal at `uri` and clears
    /// every cached membership closure.
    pub async fn update_group_member_set(&self, uri: &str, members: &[String]) -> Result<()> {
        let node = self.tree.node(uri).await?;
        let Some(principal) = node.as_principal() else {
            return Err(Error::Forbidden(format!(
                "/{} is not a principal; group-member-set cannot be set",
                node.path()
            )));
        };
        let members = members.iter().map(|m| normalize_path(m)).collect();
        principal.set_group_member_set(members).await?;
        self.evaluator.directory().invalidate().await;
        Ok(())
    }

    /// Collections a principal-property-search on `uri` visits.
    pub fn principal_search_scope(
        &self,
        uri: &str,
        apply_to_principal_collection_set: bool,
    ) -> Vec<String> {
        if apply_to_principal_collection_set {
            self.config.principal_collection_set.clone()
        } else {
            vec![normalize_path(uri)]
        }
    }

    /// Searchable property names of the principal collection at `uri`.
    pub async fn principal_search_property_set(&self, uri: &str) -> Result<Vec<String>> {
        let node = self.tree.node(uri).await?;
        node.as_principal_collection()
            .map(|collection| collection.principal_search_property_set())
            .ok_or_else(|| {
                Error::BadRequest(format!("/{} is not a principal collection", node.path()))
            })
    }

    /// Principals under the search scope whose properties match.
    pub async fn principal_property_search(
        &self,
        uri: &str,
        properties: &[(String, String)],
        apply_to_principal_collection_set: bool,
    ) -> Result<Vec<String>> {
        let mut found = Vec::new();
        for root in self.principal_search_scope(uri, apply_to_principal_collection_set) {
            let node = self.tree.node(&root).await?;
            let Some(collection) = node.as_principal_collection() else {
                continue;
            };
            for path in collection.search_principals(properties).await? {
                if !found.contains(&path) {
                    found.push(path);
                }
            }
        }
        Ok(found)
    }
}

impl std::fmt::Debug for AuthorizationGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
