//! Store/Search service logic
//!
//! Transport-agnostic: the server loop hands each call a [`PropertySource`]
//! and a [`PropertySink`]. Storage work runs on the blocking pool.

use std::sync::Arc;
use crate::property::{values_equal, Property, Query, DEFAULT_NAMESPACE};
use crate::rpc::{PropertySink, PropertySource};
use crate::storage::{no_rows_as_empty, PropertyStorage};
use crate::{Error, Result};

/// Outcome of storing one inbound property
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome {
    /// Same identity and values already stored; nothing written
    Unchanged(Property),
    /// Values differ from the stored revision; a new revision was written
    Revised(Property),
    /// No prior revision; stored as-is
    Created(Property),
}

impl StoreOutcome {
    pub fn into_property(self) -> Property {
        match self {
            StoreOutcome::Unchanged(p) | StoreOutcome::Revised(p) | StoreOutcome::Created(p) => p,
        }
    }
}

/// The RPC-facing store service.
///
/// Owns the storage handle it was constructed with; there is no global
/// instance.
#[derive(Clone)]
pub struct ConfigStoreService {
    storage: Arc<dyn PropertyStorage>,
}

impl ConfigStoreService {
    pub fn new(storage: Arc<dyn PropertyStorage>) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Arc<dyn PropertyStorage> {
        &self.storage
    }

    /// Handle a Store stream.
    ///
    /// Items are processed strictly one at a time and each response is sent
    /// before the next request is read. The first error aborts the stream.
    ///
    /// Search-then-persist is not atomic across streams: two concurrent
    /// writers of one identity may both persist the same next revision.
    pub async fn store<S, K>(&self, inbound: &mut S, outbound: &mut K) -> Result<()>
    where
        S: PropertySource + ?Sized,
        K: PropertySink + ?Sized,
    {
        while let Some(property) = inbound.recv().await? {
            tracing::debug!(key = %property.key, namespace = %property.namespace, "Received property");

            let outcome = self.store_one_blocking(property).await?;
            outbound.send(outcome.into_property()).await?;
        }
        Ok(())
    }

    /// Handle a Search call, streaming every match.
    pub async fn search<K>(&self, query: Query, outbound: &mut K) -> Result<()>
    where
        K: PropertySink + ?Sized,
    {
        let storage = self.storage.clone();
        let properties = tokio::task::spawn_blocking(move || no_rows_as_empty(storage.search(&query)))
            .await
            .map_err(|e| Error::Transport(format!("search task failed: {}", e)))??;

        tracing::debug!(count = properties.len(), "Streaming search results");
        for property in properties {
            if let Err(e) = outbound.send(property).await {
                tracing::warn!("Error sending: {}", e);
                return Err(e);
            }
        }
        Ok(())
    }

    async fn store_one_blocking(&self, property: Property) -> Result<StoreOutcome> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.store_one(property))
            .await
            .map_err(|e| Error::Transport(format!("store task failed: {}", e)))?
    }

    /// Validate, dedup and persist a single property.
    pub fn store_one(&self, mut inbound: Property) -> Result<StoreOutcome> {
        if let Err(e) = inbound.validate() {
            tracing::warn!("Error on validation: {}", e);
            return Err(e);
        }

        if inbound.namespace.is_empty() {
            inbound.namespace = DEFAULT_NAMESPACE.to_string();
        }

        // The default environment is not a predicate, so the lookup can return
        // other environments of the same key. Pick the exact identity before
        // taking the latest one.
        let lookup = Query::identity(inbound.key.clone(), inbound.namespace.clone(), inbound.environment)
            .ignoring_value();
        let found = no_rows_as_empty(self.storage.search(&lookup))?;

        if let Some(mut existing) = found.into_iter().find(|p| p.same_identity(&inbound)) {
            if values_equal(&existing.values, &inbound.values) {
                tracing::debug!(key = %existing.key, revision = existing.revision, "Property did not change");
                return Ok(StoreOutcome::Unchanged(existing));
            }

            tracing::info!(
                key = %existing.key,
                namespace = %existing.namespace,
                revision = existing.revision + 1,
                "Updating existing property"
            );
            existing.values = inbound.values;
            existing.revision += 1;
            return self.storage.store(existing).map(StoreOutcome::Revised);
        }

        tracing::info!(key = %inbound.key, namespace = %inbound.namespace, "Storing new property");
        self.storage.store(inbound).map(StoreOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Environment;
    use crate::storage::SqliteStore;
    use crate::value::Value;

    fn service() -> ConfigStoreService {
        ConfigStoreService::new(Arc::new(SqliteStore::open_in_memory().unwrap()))
    }

    fn prop(key: &str, namespace: &str, values: &[&str]) -> Property {
        Property::new(Vec::<String>::new(), namespace, Environment::Default, key, values.iter().copied())
    }

    fn data(p: &Property) -> Vec<&str> {
        p.values.iter().map(|v| v.data.as_str()).collect()
    }

    #[test]
    fn test_revision_bump_scenario() {
        let svc = service();

        let first = svc.store_one(prop("foo", "client-test", &["foo-2"])).unwrap();
        assert!(matches!(first, StoreOutcome::Created(ref p) if p.revision == 0));

        let second = svc.store_one(prop("foo", "client-test", &["value1", "value20"])).unwrap();
        let second = match second {
            StoreOutcome::Revised(p) => p,
            other => panic!("expected revision, got {:?}", other),
        };
        assert_eq!(second.revision, 1);
        assert_eq!(data(&second), vec!["value1", "value20"]);
    }

    #[test]
    fn test_identical_store_is_idempotent() {
        let svc = service();
        svc.store_one(prop("foo", "ns", &["a", "b"])).unwrap();

        let again = svc.store_one(prop("foo", "ns", &["a", "b"])).unwrap();
        assert!(matches!(again, StoreOutcome::Unchanged(ref p) if p.revision == 0));
    }

    #[test]
    fn test_unchanged_store_writes_no_rows() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let svc = ConfigStoreService::new(store.clone());

        svc.store_one(prop("foo", "ns", &["a", "b"])).unwrap();
        svc.store_one(prop("foo", "ns", &["a", "b"])).unwrap();
        assert_eq!(store.count_rows().unwrap(), 2);

        svc.store_one(prop("foo", "ns", &["a"])).unwrap();
        assert_eq!(store.count_rows().unwrap(), 3);
    }

    #[test]
    fn test_monotonic_revisions() {
        let svc = service();
        for (i, v) in ["a", "b", "c", "d"].iter().enumerate() {
            let p = svc.store_one(prop("k", "ns", &[v])).unwrap().into_property();
            assert_eq!(p.revision, i as i64);
        }
    }

    #[test]
    fn test_missing_key_persists_nothing() {
        let svc = service();
        let err = svc.store_one(prop("", "ns", &["x"])).unwrap_err();
        assert!(matches!(err, Error::MissingKey));

        let all = no_rows_as_empty(svc.storage().search(&Query::default())).unwrap();
        assert!(all.is_empty());
    }

    #[test]
    fn test_empty_namespace_defaults() {
        let svc = service();
        svc.store_one(prop("foo", "", &["x"])).unwrap();

        let found = svc
            .storage()
            .search(&Query::identity("foo", DEFAULT_NAMESPACE, Environment::Default))
            .unwrap();
        assert_eq!(found[0].namespace, "default");
    }

    #[test]
    fn test_revision_carries_prior_fields() {
        let svc = service();
        let mut original = prop("foo", "ns", &["a"]);
        original.section = vec!["db".to_string()];
        original.version = "v1".to_string();
        svc.store_one(original).unwrap();

        let mut update = prop("foo", "ns", &["b"]);
        update.section = vec!["other".to_string()];
        update.version = "v2".to_string();
        let revised = svc.store_one(update).unwrap().into_property();

        assert_eq!(revised.section, vec!["db"]);
        assert_eq!(revised.version, "v1");
        assert_eq!(revised.revision, 1);
    }

    #[test]
    fn test_environments_are_separate_identities() {
        let svc = service();
        svc.store_one(prop("foo", "ns", &["a"])).unwrap();

        let mut prod = prop("foo", "ns", &["b"]);
        prod.environment = Environment::Production;
        let stored = svc.store_one(prod).unwrap();
        assert!(matches!(stored, StoreOutcome::Created(_)));
    }

    #[test]
    fn test_default_environment_after_newer_environment_revisions() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let svc = ConfigStoreService::new(store.clone());

        let mut prod = prop("k", "ns", &["a"]);
        prod.environment = Environment::Production;
        svc.store_one(prod.clone()).unwrap();
        prod.values = vec![Value::from_string("b")];
        let prod_rev = svc.store_one(prod).unwrap().into_property();
        assert_eq!(prod_rev.revision, 1);

        let first = svc.store_one(prop("k", "ns", &["x"])).unwrap();
        assert!(matches!(first, StoreOutcome::Created(ref p) if p.revision == 0));

        let again = svc.store_one(prop("k", "ns", &["x"])).unwrap();
        assert!(matches!(again, StoreOutcome::Unchanged(ref p) if p.revision == 0 && p.environment == Environment::Default));

        let changed = svc.store_one(prop("k", "ns", &["y"])).unwrap();
        assert!(matches!(changed, StoreOutcome::Revised(ref p) if p.revision == 1 && p.environment == Environment::Default));

        assert_eq!(store.count_rows().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_store_stream_answers_in_order() {
        let svc = service();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        for p in [prop("a", "ns", &["1"]), prop("b", "ns", &["2"]), prop("a", "ns", &["3"])] {
            tx.send(p).await.unwrap();
        }
        drop(tx);

        let mut out: Vec<Property> = Vec::new();
        svc.store(&mut rx, &mut out).await.unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].key, "a");
        assert_eq!(out[1].key, "b");
        assert_eq!(out[2].revision, 1);
        assert_eq!(out[2].values, vec![Value::from_string("3")]);
    }

    #[tokio::test]
    async fn test_validation_failure_aborts_stream() {
        let svc = service();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        for p in [prop("a", "ns", &["1"]), prop("", "ns", &["2"]), prop("c", "ns", &["3"])] {
            tx.send(p).await.unwrap();
        }
        drop(tx);

        let mut out: Vec<Property> = Vec::new();
        let err = svc.store(&mut rx, &mut out).await.unwrap_err();
        assert!(matches!(err, Error::MissingKey));
        assert_eq!(out.len(), 1);

        let remaining = no_rows_as_empty(svc.storage().search(&Query::identity("c", "ns", Environment::Default))).unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn test_search_empty_namespace_streams_nothing() {
        let svc = service();
        let mut out: Vec<Property> = Vec::new();
        svc.search(Query::namespace("bar-section"), &mut out).await.unwrap();
        assert!(out.is_empty());
    }
}
