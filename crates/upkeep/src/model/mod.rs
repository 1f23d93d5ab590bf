//! Core record types for upkeep.
//!
//! People and places live here; issues, attachments and the audit log have
//! their own submodules.

mod attachment;
mod issue;
mod log;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use attachment::{Attachment, AttachmentKind, AttachmentPhase, NewAttachment};
pub use issue::{Category, Cause, Issue, IssueStatus, Location, NewIssue, Priority};
pub use log::{Action, EntityKind, LogEntry};

/// Failure to parse one of the string-backed enums.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} '{value}' (expected one of: {expected})")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
    /// Accepted spellings, comma separated.
    pub expected: &'static str,
}

impl ParseEnumError {
    pub(crate) fn new(kind: &'static str, value: &str, expected: &'static str) -> Self {
        Self {
            kind,
            value: value.to_string(),
            expected,
        }
    }
}

/// Normalise user input for enum parsing: `In-Progress` and `in_progress` are equivalent.
pub(crate) fn normalize_token(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace('-', "_")
}

/// Role of a user, deciding which portal operations are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Full control, including user management and overrides.
    Admin,
    /// Reviews issues for the projects they manage.
    Manager,
    /// Reports and resolves issues on site.
    Worker,
}

impl Role {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Worker => "worker",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "admin" => Ok(Self::Admin),
            "manager" => Ok(Self::Manager),
            "worker" => Ok(Self::Worker),
            _ => Err(ParseEnumError::new("role", s, "admin, manager, worker")),
        }
    }
}

/// A person who can sign in to one of the portals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Unique contact address.
    pub email: String,
    /// Optional phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Portal role.
    pub role: Role,
    /// Deactivated users stay on record but cannot act.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Optional phone number.
    pub phone: Option<String>,
    /// Portal role.
    pub role: Role,
}

/// A managed property: a building or site with units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Unique project name.
    pub name: String,
    /// Street address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// The manager responsible for reviewing this project's issues.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<i64>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProject {
    /// Unique project name.
    pub name: String,
    /// Street address.
    pub address: Option<String>,
    /// Responsible manager.
    pub manager_id: Option<i64>,
}

/// Links a user to a project they work on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Project.
    pub project_id: i64,
    /// Member.
    pub user_id: i64,
    /// When the user joined the project.
    pub added_at: DateTime<Utc>,
}

/// A rentable unit inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Owning project.
    pub project_id: i64,
    /// Label, unique within the project (e.g. `B-204`).
    pub label: String,
    /// Floor number, when meaningful.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub floor: Option<i32>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Input for creating a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUnit {
    /// Owning project.
    pub project_id: i64,
    /// Label.
    pub label: String,
    /// Floor number.
    pub floor: Option<i32>,
}

/// A resident (client) assigned to a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occupant {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Unit the occupant lives in.
    pub unit_id: i64,
    /// Full name.
    pub name: String,
    /// Phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Contact address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Move-in time.
    pub moved_in_at: DateTime<Utc>,
    /// Move-out time; unset while the occupant is current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moved_out_at: Option<DateTime<Utc>>,
}

impl Occupant {
    /// Whether the occupant still lives in the unit.
    #[must_use]
    pub fn is_current(&self) -> bool {
        self.moved_out_at.is_none()
    }
}

/// Input for registering an occupant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOccupant {
    /// Unit the occupant moves into.
    pub unit_id: i64,
    /// Full name.
    pub name: String,
    /// Phone number.
    pub phone: Option<String>,
    /// Contact address.
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_round_trips_through_str() {
        for role in [Role::Admin, Role::Manager, Role::Worker] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_role_parse_is_lenient_about_case() {
        assert_eq!(" Manager ".parse::<Role>().unwrap(), Role::Manager);
    }

    #[test]
    fn test_role_parse_error_lists_choices() {
        let err = "janitor".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert!(err.to_string().contains("admin, manager, worker"));
    }

    #[test]
    fn test_occupant_is_current() {
        let mut occupant = Occupant {
            id: 1,
            unit_id: 1,
            name: "Dana".to_string(),
            phone: None,
            email: None,
            moved_in_at: Utc::now(),
            moved_out_at: None,
        };
        assert!(occupant.is_current());
        occupant.moved_out_at = Some(Utc::now());
        assert!(!occupant.is_current());
    }

    #[test]
    fn test_user_serialization_skips_missing_phone() {
        let user = User {
            id: 1,
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            phone: None,
            role: Role::Worker,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("phone"));
        assert!(json.contains("\"role\":\"worker\""));
    }
}
