//! Persistence Gateway contract
//!
//! Collection-agnostic CRUD RPC surface: find/insert/update/delete over
//! (collection, filter/document/update) payloads. The backend is opaque:
//! documents travel as JSON values and each operation is a single
//! document/row mutation assumed atomic at the gateway. Filters are
//! equality matches over top-level document fields, the subset the
//! store's bridge functions accept.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{Error, Result};

/// Storage collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Tickets,
    KnowledgeArticles,
    Notifications,
    AuditLogs,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Tickets => "tickets",
            Self::KnowledgeArticles => "knowledge_articles",
            Self::Notifications => "notifications",
            Self::AuditLogs => "audit_logs",
        }
    }
}

/// Stored document.
pub type Document = Value;

/// Equality filter over top-level document fields. Empty matches all.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    fields: Map<String, Value>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `field == value`.
    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether the document satisfies every clause.
    pub fn matches(&self, doc: &Document) -> bool {
        self.fields
            .iter()
            .all(|(field, value)| doc.get(field) == Some(value))
    }
}

/// Partial-document update: listed fields replace their counterparts,
/// unlisted fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct Update {
    fields: Map<String, Value>,
}

impl Update {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(field.to_string(), value.into());
        self
    }

    /// Merge into an existing document in place.
    pub fn apply(&self, doc: &mut Document) {
        if let Value::Object(map) = doc {
            for (field, value) in &self.fields {
                map.insert(field.clone(), value.clone());
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Match/modify counts returned by update operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub matched: u64,
    pub modified: u64,
}

/// The CRUD RPC contract. A failed call maps to [`Error::Gateway`]
/// carrying the backend's error string verbatim; callers treat it as a
/// hard failure for that attempt.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn find(&self, collection: Collection, filter: Filter) -> Result<Vec<Document>>;
    async fn find_one(&self, collection: Collection, filter: Filter) -> Result<Option<Document>>;
    async fn insert_one(&self, collection: Collection, doc: Document) -> Result<String>;
    async fn insert_many(&self, collection: Collection, docs: Vec<Document>) -> Result<Vec<String>>;
    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        update: Update,
    ) -> Result<WriteCounts>;
    async fn update_many(
        &self,
        collection: Collection,
        filter: Filter,
        update: Update,
    ) -> Result<WriteCounts>;
    async fn delete_one(&self, collection: Collection, filter: Filter) -> Result<u64>;
    async fn delete_many(&self, collection: Collection, filter: Filter) -> Result<u64>;
}

/// Read with a single bounded retry. Writes are never retried: once
/// issued they are neither rolled back nor reattempted automatically.
pub(crate) async fn find_with_retry(
    gateway: &dyn Gateway,
    collection: Collection,
    filter: Filter,
    retry: bool,
) -> Result<Vec<Document>> {
    match gateway.find(collection, filter.clone()).await {
        Ok(docs) => Ok(docs),
        Err(Error::Gateway(msg)) if retry => {
            warn!(collection = collection.as_str(), error = %msg, "read failed, retrying once");
            gateway.find(collection, filter).await
        }
        Err(e) => Err(e),
    }
}
