//! Session Provider contract
//!
//! The hosted auth service owns credentials, session tokens, and password
//! reset mail. The core only needs the calls below plus a session-changed
//! subscription delivering the current principal email (or `None` when
//! signed out). [`LocalSessions`] is the in-memory provider used by tests
//! and local development.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::error::{Error, Result};

/// An issued session.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub email: String,
    pub token: String,
}

/// External auth service seam.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;
    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<AuthSession>;
    async fn sign_out(&self) -> Result<()>;
    async fn reset_password(&self, email: &str) -> Result<()>;
    /// Session-changed events: the current principal email, or `None`.
    fn subscribe(&self) -> watch::Receiver<Option<String>>;
}

struct Account {
    password: String,
    #[allow(dead_code)]
    name: String,
}

/// In-memory provider. Passwords are stored verbatim; this backend never
/// leaves test/dev use.
pub struct LocalSessions {
    accounts: DashMap<String, Account>,
    current: watch::Sender<Option<String>>,
}

impl LocalSessions {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { accounts: DashMap::new(), current }
    }

    /// Seed a credential without going through sign-up.
    pub fn seed_account(&self, email: &str, password: &str, name: &str) {
        self.accounts.insert(
            email.to_ascii_lowercase(),
            Account { password: password.to_string(), name: name.to_string() },
        );
    }
}

impl Default for LocalSessions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionProvider for LocalSessions {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let email = email.to_ascii_lowercase();
        let ok = self
            .accounts
            .get(&email)
            .map(|a| a.password == password)
            .unwrap_or(false);
        if !ok {
            return Err(Error::AuthSession("invalid credentials".into()));
        }
        let _ = self.current.send(Some(email.clone()));
        Ok(AuthSession { email, token: Uuid::new_v4().to_string() })
    }

    async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<AuthSession> {
        let email = email.to_ascii_lowercase();
        if self.accounts.contains_key(&email) {
            return Err(Error::AuthSession("email already registered".into()));
        }
        self.accounts.insert(
            email.clone(),
            Account { password: password.to_string(), name: name.to_string() },
        );
        let _ = self.current.send(Some(email.clone()));
        Ok(AuthSession { email, token: Uuid::new_v4().to_string() })
    }

    async fn sign_out(&self) -> Result<()> {
        let _ = self.current.send(None);
        Ok(())
    }

    async fn reset_password(&self, email: &str) -> Result<()> {
        if !self.accounts.contains_key(&email.to_ascii_lowercase()) {
            return Err(Error::AuthSession("unknown account".into()));
        }
        Ok(())
    }

    fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.current.subscribe()
    }
}
