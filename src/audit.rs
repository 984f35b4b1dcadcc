//! Audit Trail
//!
//! Append-only record of mutations and session events. Entries are
//! write-once: there is deliberately no update or delete path here.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{from_value, to_value};
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gateway::{Collection, Filter, Gateway};
use crate::identity::Principal;
use crate::model::{AuditAction, AuditEntry};
use crate::policy;

/// Writer/reader over the audit collection.
#[derive(Clone)]
pub struct AuditTrail {
    gateway: Arc<dyn Gateway>,
}

impl AuditTrail {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Append one entry. Audit failures are logged and swallowed: a
    /// mutation that already succeeded must not be reported as failed
    /// because its trail entry could not be written.
    pub async fn record(
        &self,
        actor: &Principal,
        action: AuditAction,
        resource: &str,
        resource_id: &str,
        details: impl Into<String>,
    ) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            action,
            resource: resource.to_string(),
            resource_id: resource_id.to_string(),
            details: details.into(),
            actor_id: actor.id(),
            actor_email: actor.email.clone(),
            timestamp: Utc::now(),
        };
        let doc = match to_value(&entry) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "audit entry serialization failed");
                return;
            }
        };
        if let Err(e) = self.gateway.insert_one(Collection::AuditLogs, doc).await {
            warn!(error = %e, resource, resource_id, "audit entry write failed");
        }
    }

    /// Full trail, admin-gated.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<AuditEntry>> {
        if !policy::can_access_admin_panel(principal) {
            return Err(Error::Forbidden("audit trail requires admin access".into()));
        }
        let docs = self.gateway.find(Collection::AuditLogs, Filter::new()).await?;
        let mut entries = Vec::with_capacity(docs.len());
        for doc in docs {
            entries.push(
                from_value::<AuditEntry>(doc)
                    .map_err(|e| Error::Gateway(format!("malformed audit document: {e}")))?,
            );
        }
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}
