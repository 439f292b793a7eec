//! Group-membership resolution with a shared closure cache.
//!
//! [`PrincipalDirectory::membership_closure`] walks group memberships
//! breadth-first and caches the result per principal. The cache starts
//! empty, fills lazily, and is cleared wholesale by
//! [`PrincipalDirectory::invalidate`] whenever a group-member-set changes.
//!
//! Each cache entry is inserted fully built under a write lock, so readers
//! never see a partial closure. The cache carries a generation that every
//! invalidation bumps; a closure resolved under an older generation is
//! returned to its caller but never inserted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::RwLock;

use davacl_core::{normalize_path, Result, Tree};

/// Resolves transitive group membership.
pub struct PrincipalDirectory {
    tree: Arc<dyn Tree>,
    cache: RwLock<ClosureCache>,
}

#[derive(Default)]
struct ClosureCache {
    generation: u64,
    closures: HashMap<String, Arc<[String]>>,
}

impl PrincipalDirectory {
    /// Creates a directory with an empty cache.
    pub fn new(tree: Arc<dyn Tree>) -> Self {
        Self {
            tree,
            cache: RwLock::new(ClosureCache::default()),
        }
    }

    /// Every group `principal` belongs to, directly or transitively, in
    /// breadth-first discovery order.
    ///
    /// The principal itself is never part of the result. Any failed lookup
    /// fails the whole resolution and nothing is cached.
    pub async fn membership_closure(&self, principal: &str) -> Result<Arc<[String]>> {
        let principal = normalize_path(principal);

        let generation = {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.closures.get(&principal) {
                log::debug!("Membership cache hit for {principal}");
                return Ok(cached.clone());
            }
            cache.generation
        };

        log::debug!("Membership cache miss for {principal}");
        let closure: Arc<[String]> = self.resolve(&principal).await?.into();

        let mut cache = self.cache.write().await;
        if cache.generation == generation {
            cache.closures.insert(principal, closure.clone());
        } else {
            log::debug!("Memberships changed while resolving {principal}; not caching");
        }
        Ok(closure)
    }

    /// `principal` followed by its membership closure.
    pub async fn principal_set(&self, principal: &str) -> Result<Vec<String>> {
        let closure = self.membership_closure(principal).await?;
        let mut set = Vec::with_capacity(closure.len() + 1);
        set.push(normalize_path(principal));
        set.extend(closure.iter().cloned());
        Ok(set)
    }

    /// Clears every cached closure.
    pub async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        if !cache.closures.is_empty() {
            log::info!("Invalidating {} cached membership closures", cache.closures.len());
        }
        cache.closures.clear();
        cache.generation += 1;
    }

    /// Number of cached closures.
    pub async fn cached_len(&self) -> usize {
        self.cache.read().await.closures.len()
    }

    async fn resolve(&self, start: &str) -> Result<Vec<String>> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        let mut result: Vec<String> = Vec::new();

        visited.insert(start.to_string());
        queue.push_back(start.to_string());

        while let Some(current) = queue.pop_front() {
            let node = self.tree.node(&current).await?;
            let Some(principal) = node.as_principal() else {
                continue;
            };

            for group in principal.group_membership().await? {
                let group = normalize_path(&group);
                if visited.insert(group.clone()) {
                    result.push(group.clone());
                    queue.push_back(group);
                }
            }
        }

        Ok(result)
    }
}

impl std::fmt::Debug for PrincipalDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalDirectory").finish_non_exhaustive()
    }
}
