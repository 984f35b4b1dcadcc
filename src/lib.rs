//! ICT Help Desk Core
//!
//! Role-scoped ticketing and user directory core for a government ICT
//! service desk. The UI shell, HTTP routing, and the hosted auth service
//! sit outside this crate; persistence is reached through a generic CRUD
//! gateway contract.
//!
//! ## Components
//!
//! - **Identity Resolution** ([`identity`]): session email to directory
//!   user, with derived authorization flags and the break-glass bypass.
//! - **Authorization Policy** ([`policy`]): the capability predicate
//!   table, the single source of truth for role checks.
//! - **Ticket Repository** ([`tickets`]): role-scoped visibility and the
//!   create/status/assignment/comment paths.
//! - **User Directory** ([`directory`]): account management, bulk
//!   operations, protected-account enforcement.
//! - **Knowledge Base** ([`knowledge`]), **Notifications** ([`notify`]),
//!   **Audit Trail** ([`audit`]), **CSV export** ([`export`]).
//! - **Gateway** ([`gateway`], [`memory`]): the collection-agnostic CRUD
//!   seam and its in-memory reference backend.
//!
//! Control flow: UI action → policy check → repository operation scoped
//! by the resolved principal → gateway → state refresh → re-render.

pub mod app;
pub mod audit;
pub mod config;
pub mod directory;
pub mod error;
pub mod export;
pub mod gateway;
pub mod identity;
pub mod knowledge;
pub mod memory;
pub mod model;
pub mod notify;
pub mod policy;
pub mod session;
pub mod tickets;

pub use app::HelpDesk;
pub use audit::AuditTrail;
pub use config::Config;
pub use directory::{BulkAction, BulkSummary, DirectoryService, NewUser, UserUpdate};
pub use error::{Error, Result};
pub use gateway::{Collection, Document, Filter, Gateway, Update, WriteCounts};
pub use identity::{IdentityResolver, Principal};
pub use knowledge::{ArticleUpdate, KnowledgeService, NewArticle};
pub use memory::MemoryGateway;
pub use model::{
    AuditAction, AuditEntry, Comment, KnowledgeArticle, Notification, Role, Ticket,
    TicketCategory, TicketId, TicketPriority, TicketStatus, User, UserId,
};
pub use notify::NotificationService;
pub use session::{AuthSession, LocalSessions, SessionProvider};
pub use tickets::{NewTicket, TicketService};
