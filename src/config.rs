//! Startup configuration
//!
//! The protected-account allow-list is injected here rather than buried
//! in authorization logic, so it is testable and auditable.

/// Default protected addresses; overridable at startup.
pub const DEFAULT_PROTECTED_EMAILS: [&str; 2] = ["ellisalat@gmail.com", "ictadmin@helpdesk.gov"];

/// Known departments, exported for UI pickers. Department remains free
/// text on the record itself.
pub const DEPARTMENTS: [&str; 7] = [
    "Administration",
    "Finance",
    "Human Resources",
    "ICT",
    "Legal",
    "Operations",
    "Procurement",
];

/// Core configuration, owned by the application-state container.
#[derive(Debug, Clone)]
pub struct Config {
    /// Principal identifiers with the break-glass bypass. These accounts
    /// can never be deactivated, demoted, or deleted except by themselves.
    pub protected_emails: Vec<String>,
    /// Retry read queries once on gateway failure. Writes never retry.
    pub retry_reads: bool,
}

impl Config {
    /// Whether the email identifies a protected account.
    pub fn is_protected(&self, email: &str) -> bool {
        self.protected_emails
            .iter()
            .any(|p| p.eq_ignore_ascii_case(email))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protected_emails: DEFAULT_PROTECTED_EMAILS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            retry_reads: true,
        }
    }
}
