//! Ticket Repository & View Filter
//!
//! Role-scoped visibility over the ticket collection plus the mutation
//! paths (create, status change, assignment, comments). Visibility is
//! applied after retrieval; the backend is not assumed to enforce any
//! row-level scoping. Failed authorization or validation leaves ticket
//! state untouched; every mutation is a single document write.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{from_value, to_value, Value};
use tracing::info;
use uuid::Uuid;

use crate::audit::AuditTrail;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::gateway::{find_with_retry, Collection, Filter, Gateway, Update};
use crate::identity::Principal;
use crate::model::{
    AuditAction, Comment, Role, Ticket, TicketCategory, TicketId, TicketPriority, TicketStatus,
    User, UserId,
};
use crate::notify::NotificationService;
use crate::policy;

/// Fields required to open a ticket.
#[derive(Debug, Clone)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub category: TicketCategory,
    pub priority: TicketPriority,
    pub department: String,
    pub office: Option<String>,
}

#[derive(Clone)]
pub struct TicketService {
    gateway: Arc<dyn Gateway>,
    config: Arc<Config>,
    audit: AuditTrail,
    notify: NotificationService,
}

impl TicketService {
    pub fn new(
        gateway: Arc<dyn Gateway>,
        config: Arc<Config>,
        audit: AuditTrail,
        notify: NotificationService,
    ) -> Self {
        Self { gateway, config, audit, notify }
    }

    /// Tickets visible to the principal, newest first.
    ///
    /// Requesters see their own; technicians see unassigned tickets and
    /// their own assignments; approvers and admins see everything.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<Ticket>> {
        let docs = find_with_retry(
            self.gateway.as_ref(),
            Collection::Tickets,
            Filter::new(),
            self.config.retry_reads,
        )
        .await?;

        let mut tickets = Vec::with_capacity(docs.len());
        for doc in docs {
            let ticket = decode(doc)?;
            if visible_to(principal, &ticket) {
                tickets.push(redact(principal, ticket));
            }
        }
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    /// Single ticket, honoring the same visibility rule as [`list`].
    ///
    /// [`list`]: TicketService::list
    pub async fn get(&self, principal: &Principal, id: TicketId) -> Result<Ticket> {
        let ticket = self.fetch(id).await?;
        if !visible_to(principal, &ticket) {
            return Err(Error::Forbidden("ticket is not visible to this principal".into()));
        }
        Ok(redact(principal, ticket))
    }

    /// Open a ticket on behalf of the principal.
    ///
    /// Requester identity is denormalized onto the ticket at creation and
    /// never re-derived, even if the user later renames.
    pub async fn create(&self, principal: &Principal, fields: NewTicket) -> Result<Ticket> {
        if !policy::can_create_tickets(principal) {
            return Err(Error::Forbidden("cannot create tickets".into()));
        }
        let title = required(&fields.title, "title")?;
        let description = required(&fields.description, "description")?;
        let department = required(&fields.department, "department")?;
        let requester = principal
            .user
            .as_ref()
            .ok_or_else(|| Error::Validation("requester has no directory profile".into()))?;

        let now = Utc::now();
        let ticket = Ticket {
            id: Uuid::new_v4(),
            title,
            description,
            category: fields.category,
            priority: fields.priority,
            status: TicketStatus::Open,
            requester_id: requester.id,
            requester_name: requester.name.clone(),
            requester_department: department,
            requester_office: fields.office,
            assigned_technician_id: None,
            assigned_technician_name: None,
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
            resolved_at: None,
        };

        self.gateway
            .insert_one(Collection::Tickets, encode(&ticket)?)
            .await?;
        info!(ticket = %ticket.id, requester = %requester.email, "ticket created");
        self.audit
            .record(
                principal,
                AuditAction::Create,
                "ticket",
                &ticket.id.to_string(),
                format!("created \"{}\"", ticket.title),
            )
            .await;
        Ok(ticket)
    }

    /// Move a ticket to a new status.
    ///
    /// `resolved_at` is stamped on the first transition into `resolved`
    /// and never touched again; later transitions (including reopening)
    /// keep the first-resolution timestamp.
    pub async fn change_status(
        &self,
        principal: &Principal,
        id: TicketId,
        new_status: TicketStatus,
    ) -> Result<Ticket> {
        if !policy::can_edit_tickets(principal) && !policy::can_assign_tickets(principal) {
            return Err(Error::Forbidden("cannot change ticket status".into()));
        }
        let mut ticket = self.fetch(id).await?;

        ticket.status = new_status;
        ticket.updated_at = Utc::now();
        let mut update = Update::new()
            .set("status", to_value(new_status).unwrap_or(Value::Null))
            .set("updatedAt", json_ts(ticket.updated_at));
        if new_status == TicketStatus::Resolved && ticket.resolved_at.is_none() {
            ticket.resolved_at = Some(ticket.updated_at);
            update = update.set("resolvedAt", json_ts(ticket.updated_at));
        }

        self.apply_update(id, update).await?;
        self.audit
            .record(
                principal,
                AuditAction::Update,
                "ticket",
                &id.to_string(),
                format!("status changed to {}", status_label(new_status)),
            )
            .await;
        self.notify
            .push(
                ticket.requester_id,
                "Ticket status updated",
                format!("\"{}\" is now {}", ticket.title, status_label(new_status)),
                None,
            )
            .await;
        Ok(ticket)
    }

    /// Assign a technician. Forces `in_progress` unless the ticket is
    /// already resolved or closed, in which case status is left alone.
    pub async fn assign(
        &self,
        principal: &Principal,
        id: TicketId,
        technician_id: UserId,
    ) -> Result<Ticket> {
        if !policy::can_assign_tickets(principal) {
            return Err(Error::Forbidden("cannot assign tickets".into()));
        }
        let mut ticket = self.fetch(id).await?;
        let technician = self.fetch_user(technician_id).await?;

        ticket.assigned_technician_id = Some(technician.id);
        ticket.assigned_technician_name = Some(technician.name.clone());
        ticket.updated_at = Utc::now();
        let mut update = Update::new()
            .set("assignedTechnicianId", technician.id.to_string())
            .set("assignedTechnicianName", technician.name.clone())
            .set("updatedAt", json_ts(ticket.updated_at));
        if !ticket.status.is_settled() {
            ticket.status = TicketStatus::InProgress;
            update = update.set("status", "in_progress");
        }

        self.apply_update(id, update).await?;
        self.audit
            .record(
                principal,
                AuditAction::Update,
                "ticket",
                &id.to_string(),
                format!("assigned to {}", technician.name),
            )
            .await;
        self.notify
            .push(
                technician.id,
                "Ticket assigned to you",
                format!("\"{}\" ({})", ticket.title, priority_label(ticket.priority)),
                None,
            )
            .await;
        Ok(ticket)
    }

    /// Clear the assignment fields. Status is deliberately not reverted.
    pub async fn unassign(&self, principal: &Principal, id: TicketId) -> Result<Ticket> {
        if !policy::can_assign_tickets(principal) {
            return Err(Error::Forbidden("cannot assign tickets".into()));
        }
        let mut ticket = self.fetch(id).await?;
        ticket.assigned_technician_id = None;
        ticket.assigned_technician_name = None;
        ticket.updated_at = Utc::now();

        let update = Update::new()
            .set("assignedTechnicianId", Value::Null)
            .set("assignedTechnicianName", Value::Null)
            .set("updatedAt", json_ts(ticket.updated_at));
        self.apply_update(id, update).await?;
        self.audit
            .record(
                principal,
                AuditAction::Update,
                "ticket",
                &id.to_string(),
                "technician unassigned",
            )
            .await;
        Ok(ticket)
    }

    /// Append a comment. Comments are append-only; existing ones are
    /// never touched. Internal comments are staff-only.
    pub async fn add_comment(
        &self,
        principal: &Principal,
        id: TicketId,
        content: &str,
        is_internal: bool,
    ) -> Result<Ticket> {
        let content = required(content, "content")?;
        let author = principal
            .user
            .as_ref()
            .ok_or_else(|| Error::Validation("author has no directory profile".into()))?;
        let mut ticket = self.fetch(id).await?;

        let is_staff = principal.is_super_user || author.role.is_staff();
        if !is_staff && ticket.requester_id != author.id {
            return Err(Error::Forbidden("only the requester or staff may comment".into()));
        }
        if is_internal && !is_staff {
            return Err(Error::Forbidden("internal comments are staff-only".into()));
        }

        ticket.comments.push(Comment {
            id: Uuid::new_v4(),
            ticket_id: id,
            author_id: author.id,
            author_name: author.name.clone(),
            content,
            is_internal,
            created_at: Utc::now(),
        });
        ticket.updated_at = Utc::now();

        let update = Update::new()
            .set("comments", to_value(&ticket.comments).map_err(internal)?)
            .set("updatedAt", json_ts(ticket.updated_at));
        self.apply_update(id, update).await?;
        self.audit
            .record(
                principal,
                AuditAction::Update,
                "ticket",
                &id.to_string(),
                "comment added",
            )
            .await;
        Ok(redact(principal, ticket))
    }

    /// Remove a ticket entirely. Admin-only.
    pub async fn delete(&self, principal: &Principal, id: TicketId) -> Result<()> {
        if !policy::can_delete_tickets(principal) {
            return Err(Error::Forbidden("cannot delete tickets".into()));
        }
        let deleted = self
            .gateway
            .delete_one(Collection::Tickets, Filter::new().eq("id", id.to_string()))
            .await?;
        if deleted == 0 {
            return Err(Error::NotFound(format!("ticket {id}")));
        }
        info!(ticket = %id, actor = %principal.email, "ticket deleted");
        self.audit
            .record(principal, AuditAction::Delete, "ticket", &id.to_string(), "ticket deleted")
            .await;
        Ok(())
    }

    async fn fetch(&self, id: TicketId) -> Result<Ticket> {
        let doc = self
            .gateway
            .find_one(Collection::Tickets, Filter::new().eq("id", id.to_string()))
            .await?
            .ok_or_else(|| Error::NotFound(format!("ticket {id}")))?;
        decode(doc)
    }

    async fn fetch_user(&self, id: UserId) -> Result<User> {
        let doc = self
            .gateway
            .find_one(Collection::Users, Filter::new().eq("id", id.to_string()))
            .await?
            .ok_or_else(|| Error::NotFound(format!("user {id}")))?;
        crate::directory::decode_user(doc)
    }

    async fn apply_update(&self, id: TicketId, update: Update) -> Result<()> {
        let counts = self
            .gateway
            .update_one(Collection::Tickets, Filter::new().eq("id", id.to_string()), update)
            .await?;
        if counts.matched == 0 {
            return Err(Error::NotFound(format!("ticket {id}")));
        }
        Ok(())
    }
}

/// Post-retrieval role scoping.
fn visible_to(principal: &Principal, ticket: &Ticket) -> bool {
    if principal.is_super_user {
        return true;
    }
    match principal.role() {
        Some(Role::Admin) | Some(Role::Approver) => true,
        Some(Role::Technician) => {
            ticket.assigned_technician_id.is_none()
                || ticket.assigned_technician_id == principal.id()
        }
        Some(Role::Requester) => Some(ticket.requester_id) == principal.id(),
        None => false,
    }
}

/// Strip internal comments for non-staff viewers.
fn redact(principal: &Principal, mut ticket: Ticket) -> Ticket {
    let is_staff =
        principal.is_super_user || principal.role().map(|r| r.is_staff()).unwrap_or(false);
    if !is_staff {
        ticket.comments.retain(|c| !c.is_internal);
    }
    ticket
}

fn required(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn decode(doc: Value) -> Result<Ticket> {
    from_value(doc).map_err(|e| Error::Gateway(format!("malformed ticket document: {e}")))
}

fn encode(ticket: &Ticket) -> Result<Value> {
    to_value(ticket).map_err(internal)
}

fn internal(e: serde_json::Error) -> Error {
    Error::Gateway(format!("document serialization failed: {e}"))
}

fn json_ts(ts: chrono::DateTime<Utc>) -> Value {
    to_value(ts).unwrap_or(Value::Null)
}

fn status_label(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::Open => "open",
        TicketStatus::Pending => "pending",
        TicketStatus::InProgress => "in_progress",
        TicketStatus::Resolved => "resolved",
        TicketStatus::Closed => "closed",
    }
}

fn priority_label(priority: TicketPriority) -> &'static str {
    match priority {
        TicketPriority::Low => "low",
        TicketPriority::Medium => "medium",
        TicketPriority::High => "high",
        TicketPriority::Critical => "critical",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryGateway;

    struct Harness {
        gateway: Arc<MemoryGateway>,
        tickets: TicketService,
        config: Arc<Config>,
    }

    impl Harness {
        fn new() -> Self {
            let gateway = Arc::new(MemoryGateway::new());
            let config = Arc::new(Config::default());
            let gw: Arc<dyn Gateway> = gateway.clone();
            let tickets = TicketService::new(
                gw.clone(),
                config.clone(),
                AuditTrail::new(gw.clone()),
                NotificationService::new(gw),
            );
            Self { gateway, tickets, config }
        }

        async fn seed_user(&self, email: &str, role: Role) -> Principal {
            let user = User {
                id: Uuid::new_v4(),
                email: email.to_string(),
                name: format!("Name of {email}"),
                role,
                department: "ICT".into(),
                skills: vec![],
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            };
            self.gateway
                .insert_one(Collection::Users, to_value(&user).unwrap())
                .await
                .unwrap();
            Principal {
                email: email.to_string(),
                is_super_user: self.config.is_protected(email),
                user: Some(user),
            }
        }
    }

    fn printer_ticket() -> NewTicket {
        NewTicket {
            title: "Printer down".into(),
            description: "Third floor printer jams on every job".into(),
            category: TicketCategory::Hardware,
            priority: TicketPriority::High,
            department: "Finance".into(),
            office: Some("3F-12".into()),
        }
    }

    #[tokio::test]
    async fn test_create_stamps_requester_and_defaults() {
        let h = Harness::new();
        let requester = h.seed_user("a@dept.gov", Role::Requester).await;

        let ticket = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.resolved_at, None);
        assert_eq!(ticket.requester_id, requester.id().unwrap());
        assert_eq!(ticket.requester_name, requester.user.as_ref().unwrap().name);
        assert!(ticket.comments.is_empty());
        assert!(ticket.assigned_technician_id.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_missing_required_fields() {
        let h = Harness::new();
        let requester = h.seed_user("a@dept.gov", Role::Requester).await;

        let mut fields = printer_ticket();
        fields.title = "   ".into();
        let err = h.tickets.create(&requester, fields).await.unwrap_err();
        assert!(matches!(err, Error::Validation(msg) if msg.contains("title")));
        // Nothing was written.
        assert!(h.tickets.list(&requester).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_requesters_see_only_their_own_tickets() {
        let h = Harness::new();
        let alice = h.seed_user("alice@dept.gov", Role::Requester).await;
        let bob = h.seed_user("bob@dept.gov", Role::Requester).await;

        h.tickets.create(&alice, printer_ticket()).await.unwrap();
        h.tickets.create(&bob, printer_ticket()).await.unwrap();

        let visible = h.tickets.list(&alice).await.unwrap();
        assert_eq!(visible.len(), 1);
        assert!(visible.iter().all(|t| t.requester_id == alice.id().unwrap()));
    }

    #[tokio::test]
    async fn test_technicians_see_unassigned_and_own_assignments() {
        let h = Harness::new();
        let requester = h.seed_user("r@dept.gov", Role::Requester).await;
        let approver = h.seed_user("ap@dept.gov", Role::Approver).await;
        let tech_a = h.seed_user("ta@dept.gov", Role::Technician).await;
        let tech_b = h.seed_user("tb@dept.gov", Role::Technician).await;

        let unassigned = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        let mine = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        let theirs = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        h.tickets.assign(&approver, mine.id, tech_a.id().unwrap()).await.unwrap();
        h.tickets.assign(&approver, theirs.id, tech_b.id().unwrap()).await.unwrap();

        let visible = h.tickets.list(&tech_a).await.unwrap();
        let ids: Vec<_> = visible.iter().map(|t| t.id).collect();
        assert!(ids.contains(&unassigned.id));
        assert!(ids.contains(&mine.id));
        assert!(!ids.contains(&theirs.id));

        // Approvers and admins see everything.
        assert_eq!(h.tickets.list(&approver).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_assign_forces_in_progress_unless_settled() {
        let h = Harness::new();
        let requester = h.seed_user("r@dept.gov", Role::Requester).await;
        let tech = h.seed_user("t@dept.gov", Role::Technician).await;
        let tech_id = tech.id().unwrap();

        let open = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        let assigned = h.tickets.assign(&tech, open.id, tech_id).await.unwrap();
        assert_eq!(assigned.status, TicketStatus::InProgress);
        assert_eq!(assigned.assigned_technician_id, Some(tech_id));

        let pending = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        h.tickets
            .change_status(&tech, pending.id, TicketStatus::Pending)
            .await
            .unwrap();
        let assigned = h.tickets.assign(&tech, pending.id, tech_id).await.unwrap();
        assert_eq!(assigned.status, TicketStatus::InProgress);

        let resolved = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        h.tickets
            .change_status(&tech, resolved.id, TicketStatus::Resolved)
            .await
            .unwrap();
        let assigned = h.tickets.assign(&tech, resolved.id, tech_id).await.unwrap();
        assert_eq!(assigned.status, TicketStatus::Resolved);
    }

    #[tokio::test]
    async fn test_unassign_clears_fields_but_keeps_status() {
        let h = Harness::new();
        let requester = h.seed_user("r@dept.gov", Role::Requester).await;
        let tech = h.seed_user("t@dept.gov", Role::Technician).await;

        let ticket = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        h.tickets.assign(&tech, ticket.id, tech.id().unwrap()).await.unwrap();
        let cleared = h.tickets.unassign(&tech, ticket.id).await.unwrap();

        assert!(cleared.assigned_technician_id.is_none());
        assert!(cleared.assigned_technician_name.is_none());
        assert_eq!(cleared.status, TicketStatus::InProgress);
    }

    #[tokio::test]
    async fn test_resolved_at_latches_on_first_resolution() {
        let h = Harness::new();
        let requester = h.seed_user("r@dept.gov", Role::Requester).await;
        let tech = h.seed_user("t@dept.gov", Role::Technician).await;

        let ticket = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        let resolved = h
            .tickets
            .change_status(&tech, ticket.id, TicketStatus::Resolved)
            .await
            .unwrap();
        let first = resolved.resolved_at.expect("resolved_at set on first resolution");

        let closed = h
            .tickets
            .change_status(&tech, ticket.id, TicketStatus::Closed)
            .await
            .unwrap();
        assert_eq!(closed.resolved_at, Some(first));

        // Reopening keeps the first-resolution timestamp as well.
        let reopened = h
            .tickets
            .change_status(&tech, ticket.id, TicketStatus::Open)
            .await
            .unwrap();
        assert_eq!(reopened.resolved_at, Some(first));

        let re_resolved = h
            .tickets
            .change_status(&tech, ticket.id, TicketStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(re_resolved.resolved_at, Some(first));
    }

    #[tokio::test]
    async fn test_requester_cannot_change_status_or_assign() {
        let h = Harness::new();
        let requester = h.seed_user("r@dept.gov", Role::Requester).await;
        let ticket = h.tickets.create(&requester, printer_ticket()).await.unwrap();

        let err = h
            .tickets
            .change_status(&requester, ticket.id, TicketStatus::Closed)
            .await
            .unwrap_err();
        assert!(err.is_forbidden());

        let err = h
            .tickets
            .assign(&requester, ticket.id, requester.id().unwrap())
            .await
            .unwrap_err();
        assert!(err.is_forbidden());

        // State unchanged after the refusals.
        let unchanged = h.tickets.get(&requester, ticket.id).await.unwrap();
        assert_eq!(unchanged.status, TicketStatus::Open);
    }

    #[tokio::test]
    async fn test_comments_append_and_internal_redaction() {
        let h = Harness::new();
        let requester = h.seed_user("r@dept.gov", Role::Requester).await;
        let tech = h.seed_user("t@dept.gov", Role::Technician).await;

        let ticket = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        h.tickets
            .add_comment(&requester, ticket.id, "Still broken", false)
            .await
            .unwrap();
        h.tickets
            .add_comment(&tech, ticket.id, "Needs a new fuser unit", true)
            .await
            .unwrap();

        let staff_view = h.tickets.get(&tech, ticket.id).await.unwrap();
        assert_eq!(staff_view.comments.len(), 2);

        let requester_view = h.tickets.get(&requester, ticket.id).await.unwrap();
        assert_eq!(requester_view.comments.len(), 1);
        assert_eq!(requester_view.comments[0].content, "Still broken");

        let err = h
            .tickets
            .add_comment(&requester, ticket.id, "sneaky", true)
            .await
            .unwrap_err();
        assert!(err.is_forbidden());

        let err = h
            .tickets
            .add_comment(&tech, ticket.id, "   ", false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_delete_is_admin_only() {
        let h = Harness::new();
        let requester = h.seed_user("r@dept.gov", Role::Requester).await;
        let tech = h.seed_user("t@dept.gov", Role::Technician).await;
        let admin = h.seed_user("boss@dept.gov", Role::Admin).await;

        let ticket = h.tickets.create(&requester, printer_ticket()).await.unwrap();
        assert!(h.tickets.delete(&tech, ticket.id).await.unwrap_err().is_forbidden());
        h.tickets.delete(&admin, ticket.id).await.unwrap();
        assert!(matches!(
            h.tickets.get(&admin, ticket.id).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
}
