//! Authorization Policy
//!
//! The single source of truth for capability checks: one stateless
//! predicate per capability, each a pure function of the resolved
//! [`Principal`]. Views and services call these instead of re-deriving
//! role logic locally.

use crate::identity::Principal;
use crate::model::Role;

/// Create, update, and delete directory accounts.
pub fn can_manage_users(p: &Principal) -> bool {
    p.is_admin()
}

/// Assign or unassign technicians on tickets.
pub fn can_assign_tickets(p: &Principal) -> bool {
    p.is_admin() || p.has_role(&[Role::Approver, Role::Technician])
}

/// See the full ticket queue rather than a role-scoped slice.
pub fn can_view_all_tickets(p: &Principal) -> bool {
    p.is_admin() || p.has_role(&[Role::Approver, Role::Technician])
}

/// Edit ticket fields and work tickets.
pub fn can_edit_tickets(p: &Principal) -> bool {
    p.is_admin() || p.has_role(&[Role::Technician])
}

/// Remove tickets entirely.
pub fn can_delete_tickets(p: &Principal) -> bool {
    p.is_admin()
}

/// Any authenticated principal may open a ticket.
pub fn can_create_tickets(_p: &Principal) -> bool {
    true
}

/// Enter the admin panel (user management, analytics, audit trail).
pub fn can_access_admin_panel(p: &Principal) -> bool {
    p.is_admin()
}

/// Author and publish knowledge articles, and see drafts.
pub fn can_author_articles(p: &Principal) -> bool {
    p.is_admin() || p.has_role(&[Role::Technician])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(role: Option<Role>, is_super_user: bool) -> Principal {
        use chrono::Utc;
        use uuid::Uuid;
        Principal {
            email: "p@dept.gov".into(),
            user: role.map(|role| crate::model::User {
                id: Uuid::new_v4(),
                email: "p@dept.gov".into(),
                name: "P".into(),
                role,
                department: "ICT".into(),
                skills: vec![],
                is_active: true,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            }),
            is_super_user,
        }
    }

    #[test]
    fn test_requester_capabilities() {
        let p = principal(Some(Role::Requester), false);
        assert!(can_create_tickets(&p));
        assert!(!can_view_all_tickets(&p));
        assert!(!can_assign_tickets(&p));
        assert!(!can_edit_tickets(&p));
        assert!(!can_delete_tickets(&p));
        assert!(!can_manage_users(&p));
        assert!(!can_access_admin_panel(&p));
    }

    #[test]
    fn test_approver_can_assign_but_not_edit() {
        let p = principal(Some(Role::Approver), false);
        assert!(can_assign_tickets(&p));
        assert!(can_view_all_tickets(&p));
        assert!(!can_edit_tickets(&p));
        assert!(!can_manage_users(&p));
    }

    #[test]
    fn test_technician_capabilities() {
        let p = principal(Some(Role::Technician), false);
        assert!(can_edit_tickets(&p));
        assert!(can_assign_tickets(&p));
        assert!(can_author_articles(&p));
        assert!(!can_delete_tickets(&p));
        assert!(!can_access_admin_panel(&p));
    }

    #[test]
    fn test_admin_has_everything() {
        let p = principal(Some(Role::Admin), false);
        assert!(can_manage_users(&p));
        assert!(can_delete_tickets(&p));
        assert!(can_edit_tickets(&p));
        assert!(can_access_admin_panel(&p));
    }

    #[test]
    fn test_super_user_bypasses_with_pending_profile() {
        let p = principal(None, true);
        assert!(can_manage_users(&p));
        assert!(can_assign_tickets(&p));
        assert!(can_edit_tickets(&p));
        assert!(can_delete_tickets(&p));
        assert!(can_access_admin_panel(&p));
    }
}
