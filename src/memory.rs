//! In-memory gateway
//!
//! Reference backend used by tests and local development. Collections are
//! vectors of JSON documents behind a [`DashMap`]; each operation mutates
//! a single collection atomically, matching the contract's per-document
//! atomicity assumption.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gateway::{Collection, Document, Filter, Gateway, Update, WriteCounts};

/// In-memory document store.
#[derive(Default)]
pub struct MemoryGateway {
    collections: DashMap<Collection, Vec<Document>>,
    /// Injected read failures, consumed one per find call. Test hook for
    /// the bounded-retry path.
    read_faults: Mutex<Vec<String>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error for the next read; each queued fault fails exactly
    /// one find/find_one call.
    pub fn inject_read_fault(&self, message: &str) {
        self.read_faults.lock().push(message.to_string());
    }

    fn take_read_fault(&self) -> Option<String> {
        self.read_faults.lock().pop()
    }

    fn ensure_id(doc: &mut Document) -> String {
        if let Some(id) = doc.get("id").and_then(Value::as_str) {
            return id.to_string();
        }
        let id = Uuid::new_v4().to_string();
        if let Value::Object(map) = doc {
            map.insert("id".into(), Value::String(id.clone()));
        }
        id
    }
}

#[async_trait]
impl Gateway for MemoryGateway {
    async fn find(&self, collection: Collection, filter: Filter) -> Result<Vec<Document>> {
        if let Some(msg) = self.take_read_fault() {
            return Err(Error::Gateway(msg));
        }
        Ok(self
            .collections
            .get(&collection)
            .map(|docs| docs.iter().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_one(&self, collection: Collection, filter: Filter) -> Result<Option<Document>> {
        if let Some(msg) = self.take_read_fault() {
            return Err(Error::Gateway(msg));
        }
        Ok(self
            .collections
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| filter.matches(d)).cloned()))
    }

    async fn insert_one(&self, collection: Collection, mut doc: Document) -> Result<String> {
        let id = Self::ensure_id(&mut doc);
        self.collections.entry(collection).or_default().push(doc);
        Ok(id)
    }

    async fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> Result<Vec<String>> {
        let mut entry = self.collections.entry(collection).or_default();
        let mut ids = Vec::with_capacity(docs.len());
        for mut doc in docs {
            ids.push(Self::ensure_id(&mut doc));
            entry.push(doc);
        }
        Ok(ids)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        update: Update,
    ) -> Result<WriteCounts> {
        let mut counts = WriteCounts::default();
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            if let Some(doc) = docs.iter_mut().find(|d| filter.matches(d)) {
                counts.matched = 1;
                update.apply(doc);
                counts.modified = 1;
            }
        }
        Ok(counts)
    }

    async fn update_many(
        &self,
        collection: Collection,
        filter: Filter,
        update: Update,
    ) -> Result<WriteCounts> {
        let mut counts = WriteCounts::default();
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            for doc in docs.iter_mut().filter(|d| filter.matches(d)) {
                counts.matched += 1;
                update.apply(doc);
                counts.modified += 1;
            }
        }
        Ok(counts)
    }

    async fn delete_one(&self, collection: Collection, filter: Filter) -> Result<u64> {
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            if let Some(pos) = docs.iter().position(|d| filter.matches(d)) {
                docs.remove(pos);
                return Ok(1);
            }
        }
        Ok(0)
    }

    async fn delete_many(&self, collection: Collection, filter: Filter) -> Result<u64> {
        if let Some(mut docs) = self.collections.get_mut(&collection) {
            let before = docs.len();
            docs.retain(|d| !filter.matches(d));
            return Ok((before - docs.len()) as u64);
        }
        Ok(0)
    }
}
