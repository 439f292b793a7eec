//! Effective-privilege evaluation.
//!
//! Given a resource and an authenticated caller, [`AccessEvaluator`]
//! resolves the caller's principal set, matches every ACE against it, and
//! expands the matched privileges through the resource's privilege tree.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use davacl_core::privileges::ALL;
use davacl_core::{normalize_path, Ace, AcePrincipal, AclConfig, Node, PrivilegeSet, Result};

use crate::catalog::{FlatPrivileges, PrivilegeCatalog};
use crate::directory::PrincipalDirectory;

/// Computes ACLs with the administrator overlay and effective privileges.
pub struct AccessEvaluator {
    catalog: PrivilegeCatalog,
    directory: Arc<PrincipalDirectory>,
    config: Arc<AclConfig>,
}

impl AccessEvaluator {
    /// Creates an evaluator.
    pub fn new(
        catalog: PrivilegeCatalog,
        directory: Arc<PrincipalDirectory>,
        config: Arc<AclConfig>,
    ) -> Self {
        Self {
            catalog,
            directory,
            config,
        }
    }

    /// The privilege catalog in use.
    pub fn catalog(&self) -> &PrivilegeCatalog {
        &self.catalog
    }

    /// The membership directory in use.
    pub fn directory(&self) -> &Arc<PrincipalDirectory> {
        &self.directory
    }

    /// The ACL as stored on the resource, without the administrator
    /// overlay. `None` when the resource does not support ACLs.
    pub async fn stored_acl(&self, node: &dyn Node) -> Result<Option<Vec<Ace>>> {
        match node.as_acl() {
            Some(acl) => Ok(Some(acl.acl().await?)),
            None => Ok(None),
        }
    }

    /// The effective ACL: the stored entries followed by one protected
    /// universal grant per configured administrator. The administrator
    /// entries are rebuilt on every call and never stored.
    pub async fn acl(&self, node: &dyn Node) -> Result<Option<Vec<Ace>>> {
        let Some(mut acl) = self.stored_acl(node).await? else {
            return Ok(None);
        };
        acl.extend(
            self.config
                .admin_principals
                .iter()
                .map(|admin| Ace::grant(AcePrincipal::Href(admin.clone()), ALL).protect()),
        );
        Ok(Some(acl))
    }

    /// Every privilege `caller` holds on `node`, fully expanded.
    /// `None` when the resource does not support ACLs.
    pub async fn current_user_privilege_set(
        &self,
        node: &dyn Node,
        caller: &str,
    ) -> Result<Option<PrivilegeSet>> {
        let Some(acl) = self.acl(node).await? else {
            return Ok(None);
        };

        let principals: HashSet<String> = self
            .directory
            .principal_set(caller)
            .await?
            .into_iter()
            .collect();
        let owner = node
            .as_acl()
            .and_then(|acl| acl.owner())
            .map(|owner| normalize_path(&owner));

        let granted = acl
            .iter()
            .filter(|ace| ace_matches(ace, &principals, owner.as_deref()))
            .map(|ace| ace.privilege.clone());

        let flat = self.catalog.flat_privileges(node)?;
        let effective = expand(granted, &flat);
        log::debug!(
            "{caller} holds {} privilege(s) on /{}",
            effective.len(),
            node.path()
        );
        Ok(Some(effective))
    }
}

/// Whether `ace` applies to a caller with the given principal set.
fn ace_matches(ace: &Ace, principals: &HashSet<String>, owner: Option<&str>) -> bool {
    match &ace.principal {
        AcePrincipal::Owner => owner.is_some_and(|owner| principals.contains(owner)),
        AcePrincipal::All | AcePrincipal::Authenticated => true,
        AcePrincipal::Unauthenticated => false,
        AcePrincipal::Href(href) => principals.contains(&normalize_path(href)),
    }
}

/// Closure of `granted` under aggregation.
///
/// Privileges unknown to the table are kept but expand to nothing.
pub fn expand(granted: impl IntoIterator<Item = String>, flat: &FlatPrivileges) -> PrivilegeSet {
    let mut effective = PrivilegeSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();

    for privilege in granted {
        if effective.insert(privilege.clone()) {
            queue.push_back(privilege);
        }
    }

    while let Some(privilege) = queue.pop_front() {
        let Some(entry) = flat.get(&privilege) else {
            continue;
        };
        for child in &entry.aggregates {
            if effective.insert(child.clone()) {
                queue.push_back(child.clone());
            }
        }
    }

    effective
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{default_privilege_tree, flatten};
    use crate::memory::{MemoryNode, MemoryTree};
    use davacl_core::privileges::*;
    use davacl_core::{Privilege, Tree};

    fn evaluator(tree: Arc<MemoryTree>, config: AclConfig) -> AccessEvaluator {
        AccessEvaluator::new(
            PrivilegeCatalog::new(),
            Arc::new(PrincipalDirectory::new(tree)),
            Arc::new(config),
        )
    }

    async fn tree() -> Arc<MemoryTree> {
        let tree = Arc::new(MemoryTree::new());
        tree.add_principal("principals/alice").await;
        tree.add_principal("principals/bob").await;
        tree.add_principal("principals/editors").await;
        tree.set_members("principals/editors", &["principals/bob"]).await;
        tree
    }

    #[test]
    fn test_expand_closure() {
        let flat = flatten(&default_privilege_tree()).unwrap();
        let set = expand(vec![READ.to_string()], &flat);
        assert_eq!(
            set.into_iter().collect::<Vec<_>>(),
            vec![READ, READ_ACL, READ_CURRENT_USER_PRIVILEGE_SET]
        );
    }

    #[test]
    fn test_expand_all_reaches_every_privilege() {
        let flat = flatten(&default_privilege_tree()).unwrap();
        let set = expand(vec![ALL.to_string()], &flat);
        assert_eq!(set.len(), flat.len());
    }

    #[test]
    fn test_expand_unknown_privilege_kept() {
        let flat = flatten(&default_privilege_tree()).unwrap();
        let set = expand(vec!["custom".to_string()], &flat);
        assert!(set.contains("custom"));
        assert_eq!(set.len(), 1);
    }

    #[tokio::test]
    async fn test_all_token_grants_to_any_caller() {
        let tree = tree().await;
        tree.add_resource("doc.txt", None, vec![Ace::grant("all", WRITE)])
            .await;
        let evaluator = evaluator(tree.clone(), AclConfig::default());

        let node = tree.node("doc.txt").await.unwrap();
        let set = evaluator
            .current_user_privilege_set(node.as_ref(), "principals/bob")
            .await
            .unwrap()
            .unwrap();
        assert!(set.contains(WRITE));
        assert!(set.contains(UNLOCK));
        assert!(!set.contains(READ));
    }

    #[tokio::test]
    async fn test_unauthenticated_never_matches() {
        let tree = tree().await;
        tree.add_resource(
            "doc.txt",
            None,
            vec![Ace::grant("unauthenticated", READ)],
        )
        .await;
        let evaluator = evaluator(tree.clone(), AclConfig::default());

        let node = tree.node("doc.txt").await.unwrap();
        let set = evaluator
            .current_user_privilege_set(node.as_ref(), "principals/alice")
            .await
            .unwrap()
            .unwrap();
        assert!(set.is_empty());
    }

    #[tokio::test]
    async fn test_owner_token_follows_owner() {
        let tree = tree().await;
        tree.add_resource(
            "owned.txt",
            Some("principals/editors"),
            vec![Ace::grant("owner", WRITE_CONTENT)],
        )
        .await;
        let evaluator = evaluator(tree.clone(), AclConfig::default());
        let node = tree.node("owned.txt").await.unwrap();

        // bob reaches the owner through group membership
        let bob = evaluator
            .current_user_privilege_set(node.as_ref(), "principals/bob")
            .await
            .unwrap()
            .unwrap();
        assert!(bob.contains(WRITE_CONTENT));

        let alice = evaluator
            .current_user_privilege_set(node.as_ref(), "principals/alice")
            .await
            .unwrap()
            .unwrap();
        assert!(alice.is_empty());
    }

    #[tokio::test]
    async fn test_group_grant_applies_to_members() {
        let tree = tree().await;
        tree.add_resource(
            "shared",
            None,
            vec![Ace::grant("principals/editors", READ)],
        )
        .await;
        let evaluator = evaluator(tree.clone(), AclConfig::default());
        let node = tree.node("shared").await.unwrap();

        let bob = evaluator
            .current_user_privilege_set(node.as_ref(), "principals/bob")
            .await
            .unwrap()
            .unwrap();
        assert!(bob.contains(READ_ACL));
    }

    #[tokio::test]
    async fn test_admin_overlay_not_stored() {
        let tree = tree().await;
        tree.add_resource("doc.txt", None, vec![]).await;
        let config = AclConfig {
            admin_principals: vec!["principals/admin".into()],
            ..Default::default()
        };
        let evaluator = evaluator(tree.clone(), config);
        let node = tree.node("doc.txt").await.unwrap();

        let acl = evaluator.acl(node.as_ref()).await.unwrap().unwrap();
        assert_eq!(acl, vec![Ace::grant("principals/admin", ALL).protect()]);
        assert!(tree.stored_acl("doc.txt").await.unwrap().is_empty());

        // Recomputed, not accumulated.
        let again = evaluator.acl(node.as_ref()).await.unwrap().unwrap();
        assert_eq!(again.len(), 1);
    }

    #[tokio::test]
    async fn test_no_acl_support_yields_none() {
        let tree = tree().await;
        tree.insert(MemoryNode::plain("static")).await;
        let evaluator = evaluator(tree.clone(), AclConfig::default());
        let node = tree.node("static").await.unwrap();

        assert!(evaluator.acl(node.as_ref()).await.unwrap().is_none());
        assert!(evaluator
            .current_user_privilege_set(node.as_ref(), "principals/alice")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_resource_specific_tree() {
        let tree = tree().await;
        let custom = Privilege::abstract_privilege(ALL).aggregate(
            Privilege::new("schedule")
                .aggregate(Privilege::new("schedule-send"))
                .aggregate(Privilege::new("schedule-deliver")),
        );
        tree.insert(
            MemoryNode::with_acl("outbox", None, vec![Ace::grant("authenticated", "schedule")])
                .supported_privileges(custom),
        )
        .await;
        let evaluator = evaluator(tree.clone(), AclConfig::default());
        let node = tree.node("outbox").await.unwrap();

        let set = evaluator
            .current_user_privilege_set(node.as_ref(), "principals/alice")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("schedule-deliver"));
    }
}
