//! Identity Resolution
//!
//! Maps the session's authenticated email to a directory [`User`] and
//! derives authorization flags. Pure read + derivation; no side effects.
//! A principal with no directory record yet is a transitional "pending
//! profile", distinct from a resolved user with insufficient role.

use std::sync::Arc;

use crate::config::Config;
use crate::directory::decode_user;
use crate::error::Result;
use crate::gateway::{Collection, Filter, Gateway};
use crate::model::{Role, User, UserId};

/// The authenticated actor performing an action.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Session email, lowercased.
    pub email: String,
    /// Directory record; `None` while the profile is pending.
    pub user: Option<User>,
    /// Break-glass bypass: the email is on the protected allow-list.
    /// Grants full access independent of role lookup, so it works even
    /// before a directory record exists for that email.
    pub is_super_user: bool,
}

impl Principal {
    pub fn role(&self) -> Option<Role> {
        self.user.as_ref().map(|u| u.role)
    }

    pub fn id(&self) -> Option<UserId> {
        self.user.as_ref().map(|u| u.id)
    }

    pub fn is_admin(&self) -> bool {
        self.is_super_user || self.role() == Some(Role::Admin)
    }

    /// Role-set membership with the super-user short-circuit first.
    pub fn has_role(&self, roles: &[Role]) -> bool {
        if self.is_super_user {
            return true;
        }
        match self.role() {
            Some(role) => roles.contains(&role),
            None => false,
        }
    }

    pub fn display_name(&self) -> String {
        self.user
            .as_ref()
            .map(|u| u.name.clone())
            .unwrap_or_else(|| self.email.clone())
    }
}

/// Resolves session emails against the user directory.
#[derive(Clone)]
pub struct IdentityResolver {
    gateway: Arc<dyn Gateway>,
    config: Arc<Config>,
}

impl IdentityResolver {
    pub fn new(gateway: Arc<dyn Gateway>, config: Arc<Config>) -> Self {
        Self { gateway, config }
    }

    /// Resolve an authenticated email to a [`Principal`].
    pub async fn resolve(&self, email: &str) -> Result<Principal> {
        let email = email.to_ascii_lowercase();
        let doc = self
            .gateway
            .find_one(Collection::Users, Filter::new().eq("email", email.clone()))
            .await?;

        let user = doc.map(decode_user).transpose()?;

        Ok(Principal {
            is_super_user: self.config.is_protected(&email),
            email,
            user,
        })
    }
}
