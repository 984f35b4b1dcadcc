//! Notifications
//!
//! Per-user notifications raised by ticket assignment and status changes.
//! Owners list and mark their own; nobody else's.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{from_value, to_value};
use tracing::warn;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::gateway::{Collection, Filter, Gateway, Update};
use crate::identity::Principal;
use crate::model::{Notification, UserId};

#[derive(Clone)]
pub struct NotificationService {
    gateway: Arc<dyn Gateway>,
}

impl NotificationService {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self { gateway }
    }

    /// Raise a notification for a user. Failures are logged and swallowed,
    /// same policy as audit writes: the triggering mutation already
    /// succeeded.
    pub async fn push(
        &self,
        user_id: UserId,
        title: &str,
        message: impl Into<String>,
        link: Option<String>,
    ) {
        let notification = Notification {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            message: message.into(),
            link,
            is_read: false,
            created_at: Utc::now(),
        };
        let doc = match to_value(&notification) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "notification serialization failed");
                return;
            }
        };
        if let Err(e) = self.gateway.insert_one(Collection::Notifications, doc).await {
            warn!(error = %e, user = %user_id, "notification write failed");
        }
    }

    /// The principal's own notifications, newest first.
    pub async fn list_for(&self, principal: &Principal) -> Result<Vec<Notification>> {
        let Some(user_id) = principal.id() else {
            return Ok(Vec::new());
        };
        let docs = self
            .gateway
            .find(
                Collection::Notifications,
                Filter::new().eq("userId", user_id.to_string()),
            )
            .await?;
        let mut out = Vec::with_capacity(docs.len());
        for doc in docs {
            out.push(
                from_value::<Notification>(doc)
                    .map_err(|e| Error::Gateway(format!("malformed notification: {e}")))?,
            );
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    /// Mark one of the principal's own notifications read.
    pub async fn mark_read(&self, principal: &Principal, id: Uuid) -> Result<()> {
        let doc = self
            .gateway
            .find_one(Collection::Notifications, Filter::new().eq("id", id.to_string()))
            .await?
            .ok_or_else(|| Error::NotFound(format!("notification {id}")))?;
        let notification: Notification = from_value(doc)
            .map_err(|e| Error::Gateway(format!("malformed notification: {e}")))?;

        if principal.id() != Some(notification.user_id) {
            return Err(Error::Forbidden("not your notification".into()));
        }
        self.gateway
            .update_one(
                Collection::Notifications,
                Filter::new().eq("id", id.to_string()),
                Update::new().set("isRead", true),
            )
            .await?;
        Ok(())
    }
}
