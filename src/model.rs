//! Domain Data Model
//!
//! Documents serialize camelCase to match the persisted representation in
//! the document store; enum values serialize in their wire spelling
//! (e.g. `in_progress`, `CREATE`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User ID
pub type UserId = Uuid;
/// Ticket ID
pub type TicketId = Uuid;

/// Directory role
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Requester,
    Approver,
    Technician,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requester => "requester",
            Self::Approver => "approver",
            Self::Technician => "technician",
            Self::Admin => "admin",
        }
    }

    /// Staff roles may see unpublished articles and add internal comments.
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Approver | Self::Technician | Self::Admin)
    }
}

/// Directory user record
///
/// The directory record and the session credential are separate entities:
/// a profile may pre-date the user's first sign-in. `email` is immutable
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub department: String,
    /// Only meaningful for the technician role.
    #[serde(default)]
    pub skills: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Ticket category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketCategory {
    Hardware,
    Software,
    Network,
    Email,
    Phone,
    Other,
}

/// Ticket priority
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Ticket status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Pending,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    /// Statuses past which assignment no longer forces `in_progress`.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

/// Support ticket
///
/// Requester fields are denormalized at creation time and never re-derived,
/// even if the user later renames. `resolved_at` is set exactly once, on
/// the first transition into `resolved`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: TicketId,
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub requester_id: UserId,
    pub requester_name: String,
    pub requester_department: String,
    #[serde(default)]
    pub requester_office: Option<String>,
    #[serde(default)]
    pub assigned_technician_id: Option<UserId>,
    #[serde(default)]
    pub assigned_technician_name: Option<String>,
    /// Append-only; comments are never edited or deleted once created.
    #[serde(default)]
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Ticket comment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub ticket_id: TicketId,
    pub author_id: UserId,
    pub author_name: String,
    pub content: String,
    /// Hidden from requesters when true.
    #[serde(default)]
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

/// Knowledge base article
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeArticle {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author_id: UserId,
    pub author_name: String,
    /// Unpublished articles are visible only to technician/admin roles.
    pub is_published: bool,
    /// Monotonically non-decreasing.
    #[serde(default)]
    pub view_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-user notification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub link: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Audit action
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    Login,
    Logout,
}

/// Append-only audit entry; write-once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub action: AuditAction,
    pub resource: String,
    pub resource_id: String,
    pub details: String,
    pub actor_id: Option<UserId>,
    pub actor_email: String,
    pub timestamp: DateTime<Utc>,
}
