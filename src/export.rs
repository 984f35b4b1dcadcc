//! Directory CSV export
//!
//! Header `Name,Email,Role,Department,Status`, one row per user. Fields
//! containing the delimiter, quotes, or newlines are quoted RFC-4180
//! style; department names with embedded commas must survive the round
//! trip intact.

use crate::model::User;

/// Render the directory as CSV.
pub fn users_to_csv(users: &[User]) -> String {
    let mut out = String::from("Name,Email,Role,Department,Status\n");
    for user in users {
        let status = if user.is_active { "Active" } else { "Inactive" };
        let row = [
            escape(&user.name),
            escape(&user.email),
            user.role.as_str().to_string(),
            escape(&user.department),
            status.to_string(),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

fn escape(field: &str) -> String {
    if field.chars().any(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(name: &str, department: &str, is_active: bool) -> User {
        User {
            id: Uuid::new_v4(),
            email: "u@dept.gov".into(),
            name: name.into(),
            role: Role::Requester,
            department: department.into(),
            skills: vec![],
            is_active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_header_and_rows() {
        let csv = users_to_csv(&[user("Amina K", "Finance", true)]);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Name,Email,Role,Department,Status"));
        assert_eq!(lines.next(), Some("Amina K,u@dept.gov,requester,Finance,Active"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_embedded_commas_are_quoted() {
        let csv = users_to_csv(&[user("Amina K", "Policy, Planning and Budget", false)]);
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "Amina K,u@dept.gov,requester,\"Policy, Planning and Budget\",Inactive"
        );
        // Still five columns when split respecting quotes.
        assert_eq!(row.matches(',').count(), 5);
    }

    #[test]
    fn test_embedded_quotes_are_doubled() {
        let csv = users_to_csv(&[user("Jo \"Mac\" Neil", "ICT", true)]);
        assert!(csv.contains("\"Jo \"\"Mac\"\" Neil\""));
    }
}
