//! Application-state container
//!
//! [`HelpDesk`] owns the configuration and wires every service over one
//! gateway. There is no ambient singleton: the UI shell constructs one
//! and passes it by reference to views, and each test builds an isolated
//! instance. Views re-fetch lists through the services after a mutation
//! succeeds instead of patching local copies, so visible state never
//! diverges from the gateway.

use std::sync::Arc;

use tracing::info;

use crate::audit::AuditTrail;
use crate::config::Config;
use crate::directory::DirectoryService;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::identity::{IdentityResolver, Principal};
use crate::knowledge::KnowledgeService;
use crate::memory::MemoryGateway;
use crate::model::AuditAction;
use crate::notify::NotificationService;
use crate::session::{LocalSessions, SessionProvider};
use crate::tickets::TicketService;

/// The wired application core.
pub struct HelpDesk {
    pub sessions: Arc<dyn SessionProvider>,
    pub identity: IdentityResolver,
    pub tickets: TicketService,
    pub directory: DirectoryService,
    pub knowledge: KnowledgeService,
    pub notifications: NotificationService,
    pub audit: AuditTrail,
}

impl HelpDesk {
    pub fn new(
        config: Config,
        gateway: Arc<dyn Gateway>,
        sessions: Arc<dyn SessionProvider>,
    ) -> Self {
        let config = Arc::new(config);
        let audit = AuditTrail::new(gateway.clone());
        let notifications = NotificationService::new(gateway.clone());
        Self {
            identity: IdentityResolver::new(gateway.clone(), config.clone()),
            tickets: TicketService::new(
                gateway.clone(),
                config.clone(),
                audit.clone(),
                notifications.clone(),
            ),
            directory: DirectoryService::new(gateway.clone(), config.clone(), audit.clone()),
            knowledge: KnowledgeService::new(gateway, audit.clone()),
            notifications,
            audit,
            sessions,
        }
    }

    /// Fully in-memory instance for tests and local development.
    pub fn in_memory(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(MemoryGateway::new()),
            Arc::new(LocalSessions::new()),
        )
    }

    /// Authenticate and resolve the principal; records a LOGIN entry.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Principal> {
        let session = self.sessions.sign_in(email, password).await?;
        let principal = self.identity.resolve(&session.email).await?;
        info!(email = %principal.email, "signed in");
        self.audit
            .record(&principal, AuditAction::Login, "session", &principal.email, "signed in")
            .await;
        Ok(principal)
    }

    /// Register a credential and, if needed, a requester profile for it.
    pub async fn sign_up(&self, email: &str, password: &str, name: &str) -> Result<Principal> {
        let session = self.sessions.sign_up(email, password, name).await?;
        self.directory.register_self(&session.email, name).await?;
        let principal = self.identity.resolve(&session.email).await?;
        self.audit
            .record(&principal, AuditAction::Login, "session", &principal.email, "signed up")
            .await;
        Ok(principal)
    }

    /// End the session; records a LOGOUT entry.
    pub async fn sign_out(&self, principal: &Principal) -> Result<()> {
        self.audit
            .record(principal, AuditAction::Logout, "session", &principal.email, "signed out")
            .await;
        self.sessions.sign_out().await
    }
}
