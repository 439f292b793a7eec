//! In-memory resource tree.
//!
//! [`MemoryTree`] implements every capability trait over process-local
//! state. Group edges live in one table shared by all principals, so a
//! principal's `group-membership` is always derived from the
//! `group-member-set` of the groups that list it.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::RwLock;

use davacl_core::util::uri::parent_path;
use davacl_core::{
    normalize_path, Ace, AclCapable, Error, Node, Privilege, PrincipalCapable,
    PrincipalCollection, Result, Tree,
};

type NodeMap = Arc<RwLock<BTreeMap<String, Arc<MemoryNode>>>>;
type GroupMap = Arc<RwLock<BTreeMap<String, Vec<String>>>>;

/// A resource held by a [`MemoryTree`].
pub struct MemoryNode {
    path: String,
    acl: Option<AclState>,
    principal: Option<PrincipalState>,
    principal_collection: bool,
    nodes: Weak<RwLock<BTreeMap<String, Arc<MemoryNode>>>>,
    groups: GroupMap,
}

struct AclState {
    owner: Option<String>,
    entries: RwLock<Vec<Ace>>,
    supported: Option<Privilege>,
}

struct PrincipalState {
    display_name: Option<String>,
    alternate_uris: Vec<String>,
}

impl MemoryNode {
    /// A resource with no capabilities.
    pub fn plain(path: &str) -> Self {
        Self {
            path: normalize_path(path),
            acl: None,
            principal: None,
            principal_collection: false,
            nodes: Weak::new(),
            groups: GroupMap::default(),
        }
    }

    /// A resource carrying `acl`, owned by `owner`.
    pub fn with_acl(path: &str, owner: Option<&str>, acl: Vec<Ace>) -> Self {
        Self {
            acl: Some(AclState {
                owner: owner.map(normalize_path),
                entries: RwLock::new(acl),
                supported: None,
            }),
            ..Self::plain(path)
        }
    }

    /// Overrides the supported-privilege tree. Only meaningful on
    /// ACL-capable nodes.
    pub fn supported_privileges(mut self, tree: Privilege) -> Self {
        if let Some(state) = self.acl.as_mut() {
            state.supported = Some(tree);
        }
        self
    }

    /// Makes the node a principal.
    pub fn principal(mut self, display_name: Option<&str>) -> Self {
        self.principal = Some(PrincipalState {
            display_name: display_name.map(str::to_string),
            alternate_uris: Vec::new(),
        });
        self
    }

    /// Adds an alternate URI to a principal node.
    pub fn alternate_uri(mut self, uri: &str) -> Self {
        if let Some(state) = self.principal.as_mut() {
            state.alternate_uris.push(uri.to_string());
        }
        self
    }

    /// Makes the node a searchable principal collection.
    pub fn principal_collection(mut self) -> Self {
        self.principal_collection = true;
        self
    }

    fn acl_state(&self) -> Result<&AclState> {
        self.acl
            .as_ref()
            .ok_or_else(|| Error::MethodNotAllowed(self.path.clone()))
    }
}

impl Node for MemoryNode {
    fn path(&self) -> &str {
        &self.path
    }

    fn as_acl(&self) -> Option<&dyn AclCapable> {
        self.acl.as_ref().map(|_| self as &dyn AclCapable)
    }

    fn as_principal(&self) -> Option<&dyn PrincipalCapable> {
        self.principal.as_ref().map(|_| self as &dyn PrincipalCapable)
    }

    fn as_principal_collection(&self) -> Option<&dyn PrincipalCollection> {
        self.principal_collection
            .then_some(self as &dyn PrincipalCollection)
    }
}

#[async_trait]
impl AclCapable for MemoryNode {
    fn owner(&self) -> Option<String> {
        self.acl.as_ref().and_then(|state| state.owner.clone())
    }

    async fn acl(&self) -> Result<Vec<Ace>> {
        Ok(self.acl_state()?.entries.read().await.clone())
    }

    async fn set_acl(&self, acl: Vec<Ace>) -> Result<()> {
        *self.acl_state()?.entries.write().await = acl;
        Ok(())
    }

    fn supported_privilege_set(&self) -> Option<Privilege> {
        self.acl.as_ref().and_then(|state| state.supported.clone())
    }
}

#[async_trait]
impl PrincipalCapable for MemoryNode {
    fn principal_url(&self) -> String {
        format!("/{}/", self.path)
    }

    fn alternate_uri_set(&self) -> Vec<String> {
        self.principal
            .as_ref()
            .map(|state| state.alternate_uris.clone())
            .unwrap_or_default()
    }

    fn display_name(&self) -> Option<String> {
        self.principal
            .as_ref()
            .and_then(|state| state.display_name.clone())
    }

    async fn group_member_set(&self) -> Result<Vec<String>> {
        Ok(self
            .groups
            .read()
            .await
            .get(&self.path)
            .cloned()
            .unwrap_or_default())
    }

    async fn group_membership(&self) -> Result<Vec<String>> {
        Ok(self
            .groups
            .read()
            .await
            .iter()
            .filter(|(_, members)| members.contains(&self.path))
            .map(|(group, _)| group.clone())
            .collect())
    }

    async fn set_group_member_set(&self, members: Vec<String>) -> Result<()> {
        let members = members.iter().map(|m| normalize_path(m)).collect();
        self.groups.write().await.insert(self.path.clone(), members);
        Ok(())
    }
}

#[async_trait]
impl PrincipalCollection for MemoryNode {
    async fn search_principals(&self, properties: &[(String, String)]) -> Result<Vec<String>> {
        let prefix = format!("{}/", self.path);
        let nodes = self
            .nodes
            .upgrade()
            .ok_or_else(|| Error::backend("principal collection detached from its tree"))?;
        let nodes = nodes.read().await;
        let matches = nodes
            .values()
            .filter(|node| node.path.starts_with(&prefix) || self.path.is_empty())
            .filter_map(|node| node.principal.as_ref().map(|state| (node, state)))
            .filter(|(_, state)| {
                properties.iter().all(|(name, value)| match name.as_str() {
                    "displayname" => state
                        .display_name
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&value.to_lowercase())),
                    _ => false,
                })
            })
            .map(|(node, _)| node.path.clone())
            .collect();
        Ok(matches)
    }
}

/// Process-local resource tree.
pub struct MemoryTree {
    nodes: NodeMap,
    groups: GroupMap,
}

impl MemoryTree {
    /// Creates a tree holding only a plain root collection.
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(String::new(), Arc::new(MemoryNode::plain("")));
        Self {
            nodes: Arc::new(RwLock::new(nodes)),
            groups: GroupMap::default(),
        }
    }

    /// Inserts or replaces a node.
    pub async fn insert(&self, mut node: MemoryNode) -> Arc<MemoryNode> {
        node.nodes = Arc::downgrade(&self.nodes);
        node.groups = self.groups.clone();
        let node = Arc::new(node);
        self.nodes
            .write()
            .await
            .insert(node.path.clone(), node.clone());
        node
    }

    /// Removes a node.
    pub async fn remove(&self, path: &str) -> Option<Arc<MemoryNode>> {
        self.nodes.write().await.remove(&normalize_path(path))
    }

    /// Inserts a principal that owns itself and carries an empty ACL.
    pub async fn add_principal(&self, path: &str) -> Arc<MemoryNode> {
        let name = path.rsplit('/').next().unwrap_or(path);
        self.insert(MemoryNode::with_acl(path, Some(path), Vec::new()).principal(Some(name)))
            .await
    }

    /// Inserts an ACL-capable resource.
    pub async fn add_resource(
        &self,
        path: &str,
        owner: Option<&str>,
        acl: Vec<Ace>,
    ) -> Arc<MemoryNode> {
        self.insert(MemoryNode::with_acl(path, owner, acl)).await
    }

    /// Sets the direct members of `group` without requiring the group node
    /// to exist.
    pub async fn set_members(&self, group: &str, members: &[&str]) {
        let members = members.iter().map(|m| normalize_path(m)).collect();
        self.groups
            .write()
            .await
            .insert(normalize_path(group), members);
    }

    /// The ACL stored on `path`, without any overlay.
    pub async fn stored_acl(&self, path: &str) -> Result<Vec<Ace>> {
        let node = self.node(path).await?;
        match node.as_acl() {
            Some(acl) => acl.acl().await,
            None => Err(Error::MethodNotAllowed(node.path().to_string())),
        }
    }
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tree for MemoryTree {
    async fn node(&self, path: &str) -> Result<Arc<dyn Node>> {
        let path = normalize_path(path);
        self.nodes
            .read()
            .await
            .get(&path)
            .cloned()
            .map(|node| node as Arc<dyn Node>)
            .ok_or_else(|| Error::not_found("node", path))
    }

    async fn children(&self, path: &str) -> Result<Vec<Arc<dyn Node>>> {
        let path = normalize_path(path);
        let nodes = self.nodes.read().await;
        if !nodes.contains_key(&path) {
            return Err(Error::not_found("node", path));
        }
        Ok(nodes
            .values()
            .filter(|node| !node.path.is_empty() && parent_path(&node.path) == Some(path.as_str()))
            .map(|node| node.clone() as Arc<dyn Node>)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use davacl_core::privileges::READ;

    #[tokio::test]
    async fn test_root_exists() {
        let tree = MemoryTree::new();
        assert!(tree.node_exists("/").await.unwrap());
        assert!(!tree.node_exists("/missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_capabilities() {
        let tree = MemoryTree::new();
        tree.insert(MemoryNode::plain("files")).await;
        tree.add_principal("principals/alice").await;

        let plain = tree.node("files").await.unwrap();
        assert!(plain.as_acl().is_none());
        assert!(plain.as_principal().is_none());

        let alice = tree.node("/principals/alice").await.unwrap();
        assert!(alice.as_principal().is_some());
        assert_eq!(
            alice.as_acl().unwrap().owner().as_deref(),
            Some("principals/alice")
        );
    }

    #[tokio::test]
    async fn test_membership_derived_from_member_sets() {
        let tree = MemoryTree::new();
        tree.add_principal("principals/alice").await;
        let staff = tree.add_principal("principals/staff").await;
        staff
            .set_group_member_set(vec!["/principals/alice/".into()])
            .await
            .unwrap();

        let alice = tree.node("principals/alice").await.unwrap();
        let groups = alice.as_principal().unwrap().group_membership().await.unwrap();
        assert_eq!(groups, vec!["principals/staff"]);
    }

    #[tokio::test]
    async fn test_children() {
        let tree = MemoryTree::new();
        tree.insert(MemoryNode::plain("files")).await;
        tree.add_resource("files/a.txt", None, vec![]).await;
        tree.add_resource("files/sub/b.txt", None, vec![]).await;

        let children = tree.children("files").await.unwrap();
        let paths: Vec<&str> = children.iter().map(|n| n.path()).collect();
        assert_eq!(paths, vec!["files/a.txt"]);

        let root: Vec<String> = tree
            .children("")
            .await
            .unwrap()
            .iter()
            .map(|n| n.path().to_string())
            .collect();
        assert_eq!(root, vec!["files"]);
    }

    #[tokio::test]
    async fn test_set_and_read_acl() {
        let tree = MemoryTree::new();
        tree.add_resource("doc.txt", None, vec![]).await;
        let node = tree.node("doc.txt").await.unwrap();
        node.as_acl()
            .unwrap()
            .set_acl(vec![Ace::grant("all", READ)])
            .await
            .unwrap();
        assert_eq!(tree.stored_acl("doc.txt").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_search_principals() {
        let tree = MemoryTree::new();
        tree.insert(MemoryNode::plain("principals").principal_collection())
            .await;
        tree.add_principal("principals/alice").await;
        tree.add_principal("principals/bob").await;

        let collection = tree.node("principals").await.unwrap();
        let found = collection
            .as_principal_collection()
            .unwrap()
            .search_principals(&[("displayname".into(), "ALI".into())])
            .await
            .unwrap();
        assert_eq!(found, vec!["principals/alice"]);
    }
}
