//! System (audit) log records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{normalize_token, ParseEnumError};

/// What kind of record a log entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A user account.
    User,
    /// A project.
    Project,
    /// A unit.
    Unit,
    /// An occupant.
    Occupant,
    /// An issue.
    Issue,
    /// An attachment.
    Attachment,
    /// The store as a whole.
    Store,
}

impl EntityKind {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Project => "project",
            Self::Unit => "unit",
            Self::Occupant => "occupant",
            Self::Issue => "issue",
            Self::Attachment => "attachment",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "user" => Ok(Self::User),
            "project" => Ok(Self::Project),
            "unit" => Ok(Self::Unit),
            "occupant" => Ok(Self::Occupant),
            "issue" => Ok(Self::Issue),
            "attachment" => Ok(Self::Attachment),
            "store" => Ok(Self::Store),
            _ => Err(ParseEnumError::new(
                "entity",
                s,
                "user, project, unit, occupant, issue, attachment, store",
            )),
        }
    }
}

/// A recorded mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// A user account was created.
    UserCreated,
    /// A user was deactivated.
    UserDeactivated,
    /// A user was reactivated.
    UserReactivated,
    /// A project was created.
    ProjectCreated,
    /// A user joined a project.
    MemberAdded,
    /// A unit was added.
    UnitCreated,
    /// An occupant moved in.
    OccupantAdded,
    /// An occupant moved out.
    OccupantMovedOut,
    /// An issue was reported.
    IssueReported,
    /// Evidence was attached to an issue.
    AttachmentAdded,
    /// An issue was approved and assigned a vendor.
    IssueApproved,
    /// An issue was rejected.
    IssueRejected,
    /// An issue was marked resolved.
    IssueResolved,
    /// A resolution was verified.
    IssueVerified,
    /// An admin forced status or priority.
    IssueOverridden,
    /// A snapshot was loaded into the store.
    SnapshotImported,
}

impl Action {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserCreated => "user_created",
            Self::UserDeactivated => "user_deactivated",
            Self::UserReactivated => "user_reactivated",
            Self::ProjectCreated => "project_created",
            Self::MemberAdded => "member_added",
            Self::UnitCreated => "unit_created",
            Self::OccupantAdded => "occupant_added",
            Self::OccupantMovedOut => "occupant_moved_out",
            Self::IssueReported => "issue_reported",
            Self::AttachmentAdded => "attachment_added",
            Self::IssueApproved => "issue_approved",
            Self::IssueRejected => "issue_rejected",
            Self::IssueResolved => "issue_resolved",
            Self::IssueVerified => "issue_verified",
            Self::IssueOverridden => "issue_overridden",
            Self::SnapshotImported => "snapshot_imported",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let action = match normalize_token(s).as_str() {
            "user_created" => Self::UserCreated,
            "user_deactivated" => Self::UserDeactivated,
            "user_reactivated" => Self::UserReactivated,
            "project_created" => Self::ProjectCreated,
            "member_added" => Self::MemberAdded,
            "unit_created" => Self::UnitCreated,
            "occupant_added" => Self::OccupantAdded,
            "occupant_moved_out" => Self::OccupantMovedOut,
            "issue_reported" => Self::IssueReported,
            "attachment_added" => Self::AttachmentAdded,
            "issue_approved" => Self::IssueApproved,
            "issue_rejected" => Self::IssueRejected,
            "issue_resolved" => Self::IssueResolved,
            "issue_verified" => Self::IssueVerified,
            "issue_overridden" => Self::IssueOverridden,
            "snapshot_imported" => Self::SnapshotImported,
            _ => return Err(ParseEnumError::new("action", s, "see `upkeep log --help`")),
        };
        Ok(action)
    }
}

/// One line of the system log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Who did it; unset for bootstrap and imports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<i64>,
    /// What happened.
    pub action: Action,
    /// Kind of record affected.
    pub entity: EntityKind,
    /// Identifier of the record affected.
    pub entity_id: i64,
    /// Human-readable detail.
    pub detail: String,
    /// When it happened.
    pub created_at: DateTime<Utc>,
}
