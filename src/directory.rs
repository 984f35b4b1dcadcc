//! User Directory Management
//!
//! Account create/update/delete, bulk operations, and protected-account
//! enforcement. A directory record does not provision a login credential;
//! the session provider owns those, and a profile may pre-date the user's
//! first sign-in. The protected-account rule is enforced at the call
//! boundary AND inside the delete path itself; disabling a button in the
//! UI is not a security boundary.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{from_value, to_value, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::{find_with_retry, Collection, Filter, Gateway, Update};
use crate::identity::Principal;
use crate::model::{AuditAction, Role, User, UserId};
use crate::policy;

/// Fields for an admin-created account.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: String,
    /// Only meaningful when `role` is technician; dropped otherwise.
    pub skills: Vec<String>,
}

/// Partial account update. `email` is immutable after creation and has no
/// field here on purpose.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub department: Option<String>,
    pub skills: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Per-user bulk action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    Activate,
    Deactivate,
    Delete,
}

/// Aggregate outcome of a bulk operation. Not atomic: one user's failure
/// does not roll back the others, and the caller always gets the counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkSummary {
    pub succeeded: u32,
    pub skipped: u32,
    pub failed: u32,
}

#[derive(Clone)]
pub struct DirectoryService {
    gateway: Arc<dyn Gateway>,
    config: Arc<Config>,
    audit: AuditTrail,
}

impl DirectoryService {
    pub fn new(gateway: Arc<dyn Gateway>, config: Arc<Config>, audit: AuditTrail) -> Self {
        Self { gateway, config, audit }
    }

    /// All directory accounts, admin-gated, sorted by name.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<User>> {
        if !policy::can_manage_users(principal) {
            return Err(Error::Forbidden("user management requires admin access".into()));
        }
        let docs = find_with_retry(
            self.gateway.as_ref(),
            Collection::Users,
            Filter::new(),
            self.config.retry_reads,
        )
        .await?;
        let mut users = Vec::with_capacity(docs.len());
        for doc in docs {
            users.push(decode_user(doc)?);
        }
        users.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    /// One account; admins or the account itself.
    pub async fn get(&self, principal: &Principal, user_id: UserId) -> Result<User> {
        if !policy::can_manage_users(principal) && principal.id() != Some(user_id) {
            return Err(Error::Forbidden("user management requires admin access".into()));
        }
        self.fetch(user_id).await
    }

    /// Admin-created account. Does not provision a login credential.
    pub async fn create(&self, principal: &Principal, fields: NewUser) -> Result<User> {
        if !policy::can_manage_users(principal) {
            return Err(Error::Forbidden("user management requires admin access".into()));
        }
        let name = required(&fields.name, "name")?;
        let email = required(&fields.email, "email")?.to_ascii_lowercase();
        if !email.contains('@') {
            return Err(Error::Validation("email is malformed".into()));
        }
        if self.find_by_email(&email).await?.is_some() {
            return Err(Error::Validation(format!("email {email} is already registered")));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            name,
            role: fields.role,
            department: fields.department,
            skills: if fields.role == Role::Technician { fields.skills } else { Vec::new() },
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.gateway
            .insert_one(Collection::Users, to_value(&user).map_err(internal)?)
            .await?;
        info!(user = %user.id, email = %user.email, role = user.role.as_str(), "account created");
        self.audit
            .record(
                principal,
                AuditAction::Create,
                "user",
                &user.id.to_string(),
                format!("created account {}", user.email),
            )
            .await;
        Ok(user)
    }

    /// Self sign-up path: a requester profile for a fresh session email.
    /// No-op returning the existing record if the email is already known.
    pub async fn register_self(&self, email: &str, name: &str) -> Result<User> {
        let email = required(email, "email")?.to_ascii_lowercase();
        let name = required(name, "name")?;
        if let Some(existing) = self.find_by_email(&email).await? {
            return Ok(existing);
        }
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            name,
            role: Role::Requester,
            department: "Unassigned".into(),
            skills: Vec::new(),
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.gateway
            .insert_one(Collection::Users, to_value(&user).map_err(internal)?)
            .await?;
        info!(user = %user.id, email = %user.email, "self sign-up profile created");
        Ok(user)
    }

    /// Update an account. One operation serves both the admin-edit and
    /// self-edit paths, gated by the same protected-account rule.
    pub async fn update(
        &self,
        principal: &Principal,
        user_id: UserId,
        fields: UserUpdate,
    ) -> Result<User> {
        let is_self = principal.id() == Some(user_id);
        if !policy::can_manage_users(principal) && !is_self {
            return Err(Error::Forbidden("user management requires admin access".into()));
        }
        let mut target = self.fetch(user_id).await?;
        let is_self = is_self || principal.email.eq_ignore_ascii_case(&target.email);

        // Protected accounts: role and active-status are immutable to
        // everyone but the account itself.
        if self.config.is_protected(&target.email) && !is_self {
            let demotes = fields.role.is_some_and(|r| r != target.role);
            let deactivates = fields.is_active.is_some_and(|a| a != target.is_active);
            if demotes || deactivates {
                warn!(target = %target.email, actor = %principal.email, "refused protected account change");
                return Err(Error::Forbidden("cannot modify protected admin users".into()));
            }
        }
        // Non-admin self-edit covers profile fields only.
        if !policy::can_manage_users(principal) {
            if fields.role.is_some_and(|r| r != target.role)
                || fields.is_active.is_some_and(|a| a != target.is_active)
            {
                return Err(Error::Forbidden("cannot change own role or status".into()));
            }
        }

        let mut update = Update::new();
        if let Some(name) = fields.name {
            target.name = required(&name, "name")?;
            update = update.set("name", target.name.clone());
        }
        if let Some(role) = fields.role {
            target.role = role;
            update = update.set("role", to_value(role).map_err(internal)?);
            if role != Role::Technician {
                target.skills.clear();
                update = update.set("skills", Value::Array(Vec::new()));
            }
        }
        if let Some(department) = fields.department {
            target.department = department.clone();
            update = update.set("department", department);
        }
        if let Some(skills) = fields.skills {
            if target.role == Role::Technician {
                target.skills = skills;
                update = update.set("skills", to_value(&target.skills).map_err(internal)?);
            }
        }
        if let Some(is_active) = fields.is_active {
            target.is_active = is_active;
            update = update.set("isActive", is_active);
        }
        if update.is_empty() {
            return Ok(target);
        }
        target.updated_at = Utc::now();
        update = update.set("updatedAt", to_value(target.updated_at).map_err(internal)?);

        let counts = self
            .gateway
            .update_one(Collection::Users, Filter::new().eq("id", user_id.to_string()), update)
            .await?;
        if counts.matched == 0 {
            return Err(Error::NotFound(format!("user {user_id}")));
        }
        self.audit
            .record(
                principal,
                AuditAction::Update,
                "user",
                &user_id.to_string(),
                format!("updated account {}", target.email),
            )
            .await;
        Ok(target)
    }

    /// Delete an account. Protected accounts are rejected unless the
    /// caller is that identity; super-user status does not override this.
    pub async fn delete(&self, principal: &Principal, user_id: UserId) -> Result<()> {
        if !policy::can_manage_users(principal) {
            return Err(Error::Forbidden("user management requires admin access".into()));
        }
        let target = self.fetch(user_id).await?;
        self.guard_protected_delete(principal, &target)?;
        self.delete_record(principal, &target).await
    }

    /// Apply one action per user; protected deletes and deactivations are
    /// skipped silently rather than failing the batch.
    pub async fn bulk(
        &self,
        principal: &Principal,
        action: BulkAction,
        user_ids: &[UserId],
    ) -> Result<BulkSummary> {
        if !policy::can_manage_users(principal) {
            return Err(Error::Forbidden("user management requires admin access".into()));
        }
        let mut summary = BulkSummary::default();
        for &user_id in user_ids {
            let target = match self.fetch(user_id).await {
                Ok(t) => t,
                Err(e) => {
                    warn!(user = %user_id, error = %e, "bulk action target missing");
                    summary.failed += 1;
                    continue;
                }
            };
            let protected = self.config.is_protected(&target.email)
                && !principal.email.eq_ignore_ascii_case(&target.email);
            let result = match action {
                BulkAction::Delete if protected => {
                    summary.skipped += 1;
                    continue;
                }
                BulkAction::Deactivate if protected => {
                    summary.skipped += 1;
                    continue;
                }
                BulkAction::Delete => self.delete_record(principal, &target).await,
                BulkAction::Activate => self
                    .update(principal, user_id, UserUpdate { is_active: Some(true), ..Default::default() })
                    .await
                    .map(|_| ()),
                BulkAction::Deactivate => self
                    .update(principal, user_id, UserUpdate { is_active: Some(false), ..Default::default() })
                    .await
                    .map(|_| ()),
            };
            match result {
                Ok(()) => summary.succeeded += 1,
                Err(e) => {
                    warn!(user = %user_id, error = %e, "bulk action item failed");
                    summary.failed += 1;
                }
            }
        }
        info!(
            succeeded = summary.succeeded,
            skipped = summary.skipped,
            failed = summary.failed,
            "bulk action complete"
        );
        Ok(summary)
    }

    /// Lookup by session email; the canonical document-to-domain mapping
    /// lives in [`decode_user`].
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let doc = self
            .gateway
            .find_one(
                Collection::Users,
                Filter::new().eq("email", email.to_ascii_lowercase()),
            )
            .await?;
        doc.map(decode_user).transpose()
    }

    async fn fetch(&self, user_id: UserId) -> Result<User> {
        let doc = self
            .gateway
            .find_one(Collection::Users, Filter::new().eq("id", user_id.to_string()))
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {user_id}")))?;
        decode_user(doc)
    }

    fn guard_protected_delete(&self, principal: &Principal, target: &User) -> Result<()> {
        if self.config.is_protected(&target.email)
            && !principal.email.eq_ignore_ascii_case(&target.email)
        {
            warn!(target = %target.email, actor = %principal.email, "refused protected account delete");
            return Err(Error::Forbidden("cannot delete protected admin users".into()));
        }
        Ok(())
    }

    async fn delete_record(&self, principal: &Principal, target: &User) -> Result<()> {
        // Re-checked inside the delete path, not just at the call
        // boundary.
        self.guard_protected_delete(principal, target)?;
        let deleted = self
            .gateway
            .delete_one(Collection::Users, Filter::new().eq("id", target.id.to_string()))
            .await?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("user {}", target.id)));
        }
        info!(user = %target.id, email = %target.email, "account deleted");
        self.audit
            .record(
                principal,
                AuditAction::Delete,
                "user",
                &target.id.to_string(),
                format!("deleted account {}", target.email),
            )
            .await;
        Ok(())
    }
}

/// The one mapping from storage representation to the domain [`User`].
pub(crate) fn decode_user(doc: Value) -> Result<User> {
    from_value(doc).map_err(|e| Error::Gateway(format!("malformed user document: {e}")))
}

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn internal(e: serde_json::Error) -> Error {
    Error::Gateway(format!("document serialization failed: {e}"))
}
