//! Validated replacement of a resource's stored ACL.

use std::sync::Arc;

use davacl_core::{normalize_path, Ace, AcePrincipal, AclConfig, Error, Result, Tree};

use crate::evaluator::AccessEvaluator;

/// Applies client-submitted ACLs.
///
/// Every check runs before anything is written; a rejected request leaves
/// the stored ACL untouched.
pub struct AclMutator {
    tree: Arc<dyn Tree>,
    evaluator: Arc<AccessEvaluator>,
    config: Arc<AclConfig>,
}

impl AclMutator {
    /// Creates a mutator.
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

    /// Replaces the stored ACL of `uri` with `requested`.
    pub async fn apply_acl(&self, uri: &str, requested: Vec<Ace>) -> Result<()> {
        let requested: Vec<Ace> = requested
            .into_iter()
            .map(|ace| Ace {
                principal: ace.principal.normalized(&self.config.base_uri),
                ..ace
            })
            .collect();

        let node = self.tree.node(uri).await?;
        let Some(target) = node.as_acl() else {
            return Err(Error::MethodNotAllowed(node.path().to_string()));
        };

        let prior: Vec<Ace> = self
            .evaluator
            .stored_acl(node.as_ref())
            .await?
            .unwrap_or_default()
            .into_iter()
            .filter(|ace| ace.protected)
            .map(|ace| Ace {
                principal: ace.principal.normalized("/"),
                ..ace
            })
            .collect();

        for protected in &prior {
            if !requested.contains(protected) {
                return Err(Error::AceConflict {
                    principal: protected.principal.to_string(),
                    privilege: protected.privilege.clone(),
                });
            }
        }

        let flat = self.evaluator.catalog().flat_privileges(node.as_ref())?;
        for ace in &requested {
            // Carried-over protected entries are already in force.
            if ace.protected && prior.contains(ace) {
                continue;
            }

            match flat.get(&ace.privilege) {
                None => return Err(Error::NotSupportedPrivilege(ace.privilege.clone())),
                Some(entry) if entry.is_abstract => {
                    return Err(Error::NoAbstractPrivilege(ace.privilege.clone()));
                }
                Some(_) => {}
            }

            if let AcePrincipal::Href(path) = &ace.principal {
                self.ensure_principal(path).await?;
            }
        }

        let count = requested.len();
        target.set_acl(requested).await?;
        log::info!("Replaced ACL of /{} with {count} entries", node.path());
        Ok(())
    }

    async fn ensure_principal(&self, path: &str) -> Result<()> {
        let node = match self.tree.node(path).await {
            Ok(node) => node,
            Err(e) if e.is_not_found() => {
                return Err(Error::NotRecognizedPrincipal(normalize_path(path)));
            }
            Err(e) => return Err(e),
        };
        if node.as_principal().is_none() {
            return Err(Error::NotRecognizedPrincipal(node.path().to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PrivilegeCatalog;
    use crate::directory::PrincipalDirectory;
    use crate::memory::{MemoryNode, MemoryTree};
    use davacl_core::privileges::*;

    fn mutator(tree: Arc<MemoryTree>, config: AclConfig) -> AclMutator {
        let config = Arc::new(config);
        let evaluator = Arc::new(AccessEvaluator::new(
            PrivilegeCatalog::new(),
            Arc::new(PrincipalDirectory::new(tree.clone())),
            config.clone(),
        ));
        AclMutator::new(tree, evaluator, config)
    }

    async fn tree_with_protected() -> Arc<MemoryTree> {
        let tree = Arc::new(MemoryTree::new());
        tree.add_principal("principals/alice").await;
        tree.add_principal("principals/bob").await;
        tree.add_resource(
            "doc.txt",
            Some("principals/alice"),
            vec![
                Ace::grant("principals/alice", WRITE_ACL).protect(),
                Ace::grant("principals/bob", READ),
            ],
        )
        .await;
        tree
    }

    #[tokio::test]
    async fn test_dropping_protected_entry_conflicts() {
        let tree = tree_with_protected().await;
        let mutator = mutator(tree.clone(), AclConfig::default());
        let before = tree.stored_acl("doc.txt").await.unwrap();

        let err = mutator
            .apply_acl("doc.txt", vec![Ace::grant("principals/bob", WRITE)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AceConflict { ref privilege, .. } if privilege == WRITE_ACL));
        assert_eq!(tree.stored_acl("doc.txt").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_unprotecting_entry_conflicts() {
        let tree = tree_with_protected().await;
        let mutator = mutator(tree, AclConfig::default());
        let err = mutator
            .apply_acl("doc.txt", vec![Ace::grant("principals/alice", WRITE_ACL)])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AceConflict { .. }));
    }

    #[tokio::test]
    async fn test_preserving_protected_entry_succeeds() {
        let tree = tree_with_protected().await;
        let mutator = mutator(tree.clone(), AclConfig::default());
        let requested = vec![
            Ace::grant("/principals/alice/", WRITE_ACL).protect(),
            Ace::grant("principals/bob", WRITE),
        ];
        mutator.apply_acl("doc.txt", requested).await.unwrap();

        let stored = tree.stored_acl("doc.txt").await.unwrap();
        assert_eq!(
            stored,
            vec![
                Ace::grant("principals/alice", WRITE_ACL).protect(),
                Ace::grant("principals/bob", WRITE),
            ]
        );
    }

    #[tokio::test]
    async fn test_abstract_privilege_rejected() {
        let tree = tree_with_protected().await;
        let mutator = mutator(tree.clone(), AclConfig::default());
        let err = mutator
            .apply_acl(
                "doc.txt",
                vec![
                    Ace::grant("principals/alice", WRITE_ACL).protect(),
                    Ace::grant("principals/bob", ALL),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoAbstractPrivilege(ref p) if p == ALL));
    }

    #[tokio::test]
    async fn test_unknown_privilege_rejected() {
        let tree = tree_with_protected().await;
        let mutator = mutator(tree, AclConfig::default());
        let err = mutator
            .apply_acl(
                "doc.txt",
                vec![
                    Ace::grant("principals/alice", WRITE_ACL).protect(),
                    Ace::grant("principals/bob", "unlock-typo"),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotSupportedPrivilege(ref p) if p == "unlock-typo"));
    }

    #[tokio::test]
    async fn test_unrecognized_principals_rejected() {
        let tree = tree_with_protected().await;
        tree.insert(MemoryNode::plain("files")).await;
        let mutator = mutator(tree.clone(), AclConfig::default());

        for principal in ["principals/ghost", "files"] {
            let err = mutator
                .apply_acl(
                    "doc.txt",
                    vec![
                        Ace::grant("principals/alice", WRITE_ACL).protect(),
                        Ace::grant(principal, READ),
                    ],
                )
                .await
                .unwrap_err();
            assert!(
                matches!(err, Error::NotRecognizedPrincipal(ref p) if p == principal),
                "{principal}: {err}"
            );
        }
        assert_eq!(tree.stored_acl("doc.txt").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_reserved_tokens_need_no_lookup() {
        let tree = tree_with_protected().await;
        let mutator = mutator(tree, AclConfig::default());
        mutator
            .apply_acl(
                "doc.txt",
                vec![
                    Ace::grant("principals/alice", WRITE_ACL).protect(),
                    Ace::grant("authenticated", READ),
                    Ace::grant("owner", WRITE),
                ],
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_acl_support_is_method_not_allowed() {
        let tree = tree_with_protected().await;
        tree.insert(MemoryNode::plain("static")).await;
        let mutator = mutator(tree, AclConfig::default());
        let err = mutator.apply_acl("static", vec![]).await.unwrap_err();
        assert!(matches!(err, Error::MethodNotAllowed(_)));
    }

    #[tokio::test]
    async fn test_admin_overlay_never_stored() {
        let tree = tree_with_protected().await;
        let config = AclConfig {
            admin_principals: vec!["principals/root".into()],
            ..Default::default()
        };
        let mutator = mutator(tree.clone(), config);
        mutator
            .apply_acl(
                "doc.txt",
                vec![Ace::grant("principals/alice", WRITE_ACL).protect()],
            )
            .await
            .unwrap();
        assert_eq!(tree.stored_acl("doc.txt").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_principal_hrefs_normalized_against_base_uri() {
        let tree = tree_with_protected().await;
        let config = AclConfig {
            base_uri: "/dav/".into(),
            ..Default::default()
        };
        let mutator = mutator(tree.clone(), config);
        mutator
            .apply_acl(
                "doc.txt",
                vec![
                    Ace::grant("https://example.com/dav/principals/alice", WRITE_ACL).protect(),
                    Ace::grant("/dav/principals/bob/", READ),
                ],
            )
            .await
            .unwrap();
        let stored = tree.stored_acl("doc.txt").await.unwrap();
        assert_eq!(stored[1].principal, AcePrincipal::Href("principals/bob".into()));
    }
}
