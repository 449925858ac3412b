//! Result rehydration
//!
//! Turns ranked owner references back into domain records. Ids are grouped
//! per owner type, each type is loaded with a single bulk call through its
//! registered [`RecordLoader`], and the records are put back in rank order.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::entity::{OwnerRef, SearchHit};
use crate::error::{Error, Result};

/// A record that knows the id it is indexed under
pub trait Identified {
    fn id(&self) -> i64;
}

/// Bulk loader for the records of one owner type
///
/// Implementations may return records in any order. Ids without a record are
/// reported as [`Error::RecordNotFound`] by the rehydrator; a loader may also
/// fail on its own, and that error is propagated unchanged.
#[async_trait]
pub trait RecordLoader<T>: Send + Sync {
    async fn load(&self, ids: &[i64]) -> Result<Vec<T>>;
}

/// Owner type tag to loader mapping, populated at startup
pub struct LoaderRegistry<T> {
    loaders: HashMap<String, Arc<dyn RecordLoader<T>>>,
}

impl<T> LoaderRegistry<T> {
    pub fn new() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Register the loader for an owner type, replacing any previous one
    pub fn register(mut self, owner_type: impl Into<String>, loader: impl RecordLoader<T> + 'static) -> Self {
        self.loaders.insert(owner_type.into(), Arc::new(loader));
        self
    }

    /// Register an already shared loader
    pub fn register_shared(mut self, owner_type: impl Into<String>, loader: Arc<dyn RecordLoader<T>>) -> Self {
        self.loaders.insert(owner_type.into(), loader);
        self
    }

    /// Loader for a type tag; unknown tags are a configuration error
    pub fn get(&self, owner_type: &str) -> Result<&Arc<dyn RecordLoader<T>>> {
        self.loaders
            .get(owner_type)
            .ok_or_else(|| Error::UnregisteredType(owner_type.to_string()))
    }

    pub fn contains(&self, owner_type: &str) -> bool {
        self.loaders.contains_key(owner_type)
    }

    /// Registered type tags, sorted
    pub fn owner_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.loaders.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl<T> Default for LoaderRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for LoaderRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            loaders: self.loaders.clone(),
        }
    }
}

impl<T> fmt::Debug for LoaderRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("owner_types", &self.owner_types())
            .finish()
    }
}

/// Ids per owner type, types in first-seen order, ids in rank order
fn group_by_type(hits: &[SearchHit]) -> Vec<(&str, Vec<i64>)> {
    let mut groups: Vec<(&str, Vec<i64>)> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    for hit in hits {
        let owner_type = hit.owner.owner_type.as_str();
        let position = *positions.entry(owner_type).or_insert_with(|| {
            groups.push((owner_type, Vec::new()));
            groups.len() - 1
        });
        let ids = &mut groups[position].1;
        if !ids.contains(&hit.owner.owner_id) {
            ids.push(hit.owner.owner_id);
        }
    }
    groups
}

/// Load every hit's record and return them in hit order
///
/// Fails with [`Error::UnregisteredType`] before any loading if a type has no
/// loader, and with [`Error::RecordNotFound`] if a loader can't produce every
/// requested id.
pub async fn rehydrate<T>(registry: &LoaderRegistry<T>, hits: &[SearchHit]) -> Result<Vec<T>>
where
    T: Identified + Clone + Send,
{
    let groups = group_by_type(hits);
    let loaders = groups
        .iter()
        .map(|(owner_type, _)| registry.get(owner_type))
        .collect::<Result<Vec<_>>>()?;

    // Rows repeated by caller joins share one record; the last use takes it.
    let mut positions: HashMap<&OwnerRef, Vec<usize>> = HashMap::new();
    for (position, hit) in hits.iter().enumerate() {
        positions.entry(&hit.owner).or_default().push(position);
    }

    let mut ordered: Vec<Option<T>> = Vec::with_capacity(hits.len());
    ordered.resize_with(hits.len(), || None);
    for ((owner_type, ids), loader) in groups.iter().zip(loaders) {
        let loaded = loader.load(ids).await?;
        debug!(owner_type = %owner_type, requested = ids.len(), loaded = loaded.len(), "Loaded records");

        let mut by_id: HashMap<i64, T> = loaded.into_iter().map(|record| (record.id(), record)).collect();
        let mut missing = Vec::new();
        for id in ids {
            let Some(record) = by_id.remove(id) else {
                missing.push(*id);
                continue;
            };
            let owner = OwnerRef::new(*owner_type, *id);
            if let Some((last, rest)) = positions.get(&owner).and_then(|p| p.split_last()) {
                for &position in rest {
                    ordered[position] = Some(record.clone());
                }
                ordered[*last] = Some(record);
            }
        }
        if !missing.is_empty() {
            return Err(Error::RecordNotFound {
                owner_type: owner_type.to_string(),
                ids: missing,
            });
        }
    }

    // Every position belongs to exactly one requested id, and all were found
    Ok(ordered.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    struct Doc {
        kind: &'static str,
        id: i64,
    }

    impl Identified for Doc {
        fn id(&self) -> i64 {
            self.id
        }
    }

    /// Returns known ids in reverse order and records every call
    struct FakeLoader {
        kind: &'static str,
        known: Vec<i64>,
        calls: Arc<Mutex<Vec<Vec<i64>>>>,
    }

    #[async_trait]
    impl RecordLoader<Doc> for FakeLoader {
        async fn load(&self, ids: &[i64]) -> Result<Vec<Doc>> {
            self.calls.lock().unwrap().push(ids.to_vec());
            Ok(ids
                .iter()
                .rev()
                .filter(|id| self.known.contains(id))
                .map(|&id| Doc { kind: self.kind, id })
                .collect())
        }
    }

    fn hit(owner_type: &str, owner_id: i64) -> SearchHit {
        SearchHit {
            owner: OwnerRef::new(owner_type, owner_id),
            relevancy: 1.0,
        }
    }

    fn registry(calls: &Arc<Mutex<Vec<Vec<i64>>>>, articles: Vec<i64>) -> LoaderRegistry<Doc> {
        LoaderRegistry::new()
            .register(
                "Article",
                FakeLoader { kind: "Article", known: articles, calls: Arc::clone(calls) },
            )
            .register(
                "Comment",
                FakeLoader { kind: "Comment", known: vec![3, 4], calls: Arc::clone(calls) },
            )
    }

    #[test]
    fn test_group_by_type_preserves_first_seen_order() {
        let hits = [hit("Comment", 3), hit("Article", 2), hit("Comment", 4), hit("Article", 1)];
        let groups = group_by_type(&hits);
        assert_eq!(groups, vec![("Comment", vec![3, 4]), ("Article", vec![2, 1])]);
    }

    #[tokio::test]
    async fn test_rehydrate_restores_rank_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&calls, vec![1, 2]);
        let hits = [hit("Article", 2), hit("Comment", 3), hit("Article", 1), hit("Comment", 4)];

        let records = rehydrate(&registry, &hits).await.expect("rehydrate failed");
        let identity: Vec<_> = records.iter().map(|d| (d.kind, d.id)).collect();
        assert_eq!(identity, [("Article", 2), ("Comment", 3), ("Article", 1), ("Comment", 4)]);

        // One bulk call per type
        assert_eq!(*calls.lock().unwrap(), vec![vec![2, 1], vec![3, 4]]);
    }

    #[tokio::test]
    async fn test_missing_record_fails_the_call() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&calls, vec![1]);
        let hits = [hit("Article", 1), hit("Article", 2), hit("Comment", 3)];

        let err = rehydrate(&registry, &hits).await.unwrap_err();
        match err {
            Error::RecordNotFound { owner_type, ids } => {
                assert_eq!(owner_type, "Article");
                assert_eq!(ids, vec![2]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_unregistered_type_fails_before_loading() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&calls, vec![1]);
        let hits = [hit("Article", 1), hit("Widget", 9)];

        let err = rehydrate(&registry, &hits).await.unwrap_err();
        assert!(matches!(err, Error::UnregisteredType(ref t) if t == "Widget"));
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_hits_reuse_the_record() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&calls, vec![1]);
        let hits = [hit("Article", 1), hit("Comment", 3), hit("Article", 1)];

        let records = rehydrate(&registry, &hits).await.expect("rehydrate failed");
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], records[2]);
        assert_eq!(*calls.lock().unwrap(), vec![vec![1], vec![3]]);
    }

    #[tokio::test]
    async fn test_repeated_hits_keep_their_positions() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&calls, vec![1, 2]);
        let hits = [hit("Article", 1), hit("Comment", 4), hit("Article", 1), hit("Article", 2), hit("Comment", 4)];

        let records = rehydrate(&registry, &hits).await.expect("rehydrate failed");
        let identity: Vec<_> = records.iter().map(|d| (d.kind, d.id)).collect();
        assert_eq!(
            identity,
            [("Article", 1), ("Comment", 4), ("Article", 1), ("Article", 2), ("Comment", 4)]
        );
        assert_eq!(*calls.lock().unwrap(), vec![vec![1, 2], vec![4]]);
    }

    #[tokio::test]
    async fn test_repeated_hit_of_missing_record_fails() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&calls, vec![1]);
        let hits = [hit("Article", 2), hit("Article", 1), hit("Article", 2)];

        let err = rehydrate(&registry, &hits).await.unwrap_err();
        assert!(matches!(err, Error::RecordNotFound { ref ids, .. } if ids == &vec![2]));
    }

    #[tokio::test]
    async fn test_empty_hits_load_nothing() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&calls, vec![]);
        let records = rehydrate(&registry, &[]).await.expect("rehydrate failed");
        assert!(records.is_empty());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_registry_lookup() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let registry = registry(&calls, vec![]);
        assert_eq!(registry.owner_types(), ["Article", "Comment"]);
        assert!(registry.contains("Comment"));
        assert!(registry.get("comment").is_err());
        assert!(format!("{:?}", registry).contains("Article"));
    }
}
