//! Data models for the SkillForge backend.
//!
//! Wire format is snake_case JSON, matching the frontend contract.

mod application;
mod auth;
mod candidate;
mod hr;
mod job;

pub use application::*;
pub use auth::*;
pub use candidate::*;
pub use hr::*;
pub use job::*;

use serde::{Deserialize, Serialize};

/// Account kind. Selects the user table and the set of routes a token may call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Hr,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Hr => "hr",
        }
    }

    /// Role named in login and password-reset bodies.
    ///
    /// Anything other than `candidate` is treated as HR.
    pub fn from_login(s: &str) -> Self {
        if s == "candidate" {
            Role::Candidate
        } else {
            Role::Hr
        }
    }
}

/// Plain `{"message": ...}` acknowledgement body.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Current UTC time as RFC 3339, the timestamp format stored everywhere.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Whether a path segment is a well-formed record ID.
pub fn is_valid_id(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}

/// Treat `Some("")` and whitespace-only strings as absent.
pub(crate) fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|v| !v.trim().is_empty())
        .cloned()
}

/// Treat `Some(vec![])` as absent.
pub(crate) fn non_empty<T: Clone>(value: &Option<Vec<T>>) -> Option<Vec<T>> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_login() {
        assert_eq!(Role::from_login("candidate"), Role::Candidate);
        assert_eq!(Role::from_login("hr"), Role::Hr);
        assert_eq!(Role::from_login("recruiter"), Role::Hr);
    }

    #[test]
    fn test_is_valid_id() {
        assert!(is_valid_id(&uuid::Uuid::new_v4().to_string()));
        assert!(!is_valid_id("not-an-id"));
    }

    #[test]
    fn test_blank_values_are_absent() {
        assert_eq!(non_blank(&Some("  ".to_string())), None);
        assert_eq!(non_blank(&Some("Ada".to_string())), Some("Ada".to_string()));
        assert_eq!(non_empty::<String>(&Some(vec![])), None);
    }
}
