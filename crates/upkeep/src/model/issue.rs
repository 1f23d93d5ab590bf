//! Maintenance issues and their classification enums.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{normalize_token, ParseEnumError};

/// Workflow status of an issue.
///
/// Verification is tracked separately on [`Issue::verified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    /// Reported, awaiting review.
    Open,
    /// Approved and handed to a vendor.
    InProgress,
    /// Work reported done.
    Resolved,
    /// Declined at review.
    Rejected,
}

impl IssueStatus {
    /// All statuses in workflow order.
    pub const ALL: [Self; 4] = [
        Self::Open,
        Self::InProgress,
        Self::Resolved,
        Self::Rejected,
    ];

    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseEnumError::new(
                "status",
                s,
                "open, in_progress, resolved, rejected",
            )),
        }
    }
}

/// Urgency of an issue.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Can wait.
    Low,
    /// Normal handling.
    #[default]
    Medium,
    /// Needs attention first.
    High,
}

impl Priority {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ParseEnumError::new("priority", s, "low, medium, high")),
        }
    }
}

/// What caused the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cause {
    /// Normal ageing of fixtures.
    WearAndTear,
    /// Accidental or external damage.
    Damage,
    /// Construction or manufacturing defect.
    Defect,
    /// Caused by the occupant.
    OccupantMisuse,
    /// Anything else.
    Other,
}

impl Cause {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WearAndTear => "wear_and_tear",
            Self::Damage => "damage",
            Self::Defect => "defect",
            Self::OccupantMisuse => "occupant_misuse",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Cause {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "wear_and_tear" => Ok(Self::WearAndTear),
            "damage" => Ok(Self::Damage),
            "defect" => Ok(Self::Defect),
            "occupant_misuse" => Ok(Self::OccupantMisuse),
            "other" => Ok(Self::Other),
            _ => Err(ParseEnumError::new(
                "cause",
                s,
                "wear_and_tear, damage, defect, occupant_misuse, other",
            )),
        }
    }
}

/// Trade responsible for the fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Pipes, drains, fixtures.
    Plumbing,
    /// Wiring, lighting, outlets.
    Electrical,
    /// Heating, ventilation and air conditioning.
    Hvac,
    /// Walls, roofs, floors.
    Structural,
    /// Installed appliances.
    Appliance,
    /// Cleaning and waste.
    Cleaning,
    /// Locks, doors, access control.
    Security,
    /// Anything else.
    Other,
}

impl Category {
    /// Stable string form used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plumbing => "plumbing",
            Self::Electrical => "electrical",
            Self::Hvac => "hvac",
            Self::Structural => "structural",
            Self::Appliance => "appliance",
            Self::Cleaning => "cleaning",
            Self::Security => "security",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "plumbing" => Ok(Self::Plumbing),
            "electrical" => Ok(Self::Electrical),
            "hvac" => Ok(Self::Hvac),
            "structural" => Ok(Self::Structural),
            "appliance" => Ok(Self::Appliance),
            "cleaning" => Ok(Self::Cleaning),
            "security" => Ok(Self::Security),
            "other" => Ok(Self::Other),
            _ => Err(ParseEnumError::new(
                "category",
                s,
                "plumbing, electrical, hvac, structural, appliance, cleaning, security, other",
            )),
        }
    }
}

/// Where the problem is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum Location {
    /// Inside a unit.
    Unit(i64),
    /// A shared space such as a lobby or car park.
    CommonArea(String),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit(id) => write!(f, "unit #{id}"),
            Self::CommonArea(name) => write!(f, "{name}"),
        }
    }
}

/// A reported maintenance problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Storage-assigned identifier.
    pub id: i64,
    /// Project the issue belongs to.
    pub project_id: i64,
    /// User who reported it.
    pub reporter_id: i64,
    /// Where it is.
    pub location: Location,
    /// Why it happened.
    pub cause: Cause,
    /// Which trade handles it.
    pub category: Category,
    /// Free-text description.
    pub description: String,
    /// Workflow status.
    pub status: IssueStatus,
    /// Set once resolution is confirmed with photographic proof.
    pub verified: bool,
    /// Urgency.
    pub priority: Priority,

    /// Vendor assigned at approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    /// Reviewer who approved it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<i64>,
    /// Approval time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
    /// Reviewer's note at approval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_note: Option<String>,

    /// Why the issue was declined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    /// Reviewer who declined it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<i64>,
    /// Rejection time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_at: Option<DateTime<Utc>>,

    /// User who marked the work done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<i64>,
    /// Resolution time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,

    /// Reviewer who confirmed the fix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<i64>,
    /// Verification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,

    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Bumped on every write; used for optimistic concurrency checks.
    pub version: i64,
}

impl Issue {
    /// Archived issues are finished: rejected, or resolved and verified.
    #[must_use]
    pub fn is_archived(&self) -> bool {
        match self.status {
            IssueStatus::Rejected => true,
            IssueStatus::Resolved => self.verified,
            IssueStatus::Open | IssueStatus::InProgress => false,
        }
    }

    /// Human-readable state, used in transition errors.
    #[must_use]
    pub fn state_label(&self) -> String {
        match (self.status, self.verified) {
            (IssueStatus::Resolved, true) => "resolved and verified".to_string(),
            (IssueStatus::InProgress, _) => "in progress".to_string(),
            (status, _) => status.to_string(),
        }
    }
}

/// Input for reporting an issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    /// Project.
    pub project_id: i64,
    /// Where it is.
    pub location: Location,
    /// Why it happened.
    pub cause: Cause,
    /// Which trade handles it.
    pub category: Category,
    /// Free-text description.
    pub description: String,
    /// Urgency; the configured default applies when unset.
    pub priority: Option<Priority>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_issue(status: IssueStatus, verified: bool) -> Issue {
        let now = Utc::now();
        Issue {
            id: 1,
            project_id: 1,
            reporter_id: 1,
            location: Location::CommonArea("Lobby".to_string()),
            cause: Cause::WearAndTear,
            category: Category::Plumbing,
            description: "Leaking tap".to_string(),
            status,
            verified,
            priority: Priority::Medium,
            vendor: None,
            approved_by: None,
            approved_at: None,
            approval_note: None,
            rejection_reason: None,
            rejected_by: None,
            rejected_at: None,
            resolved_by: None,
            resolved_at: None,
            verified_by: None,
            verified_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        }
    }

    #[test]
    fn test_status_parse_accepts_dashes() {
        assert_eq!(
            "In-Progress".parse::<IssueStatus>().unwrap(),
            IssueStatus::InProgress
        );
        assert!("closed".parse::<IssueStatus>().is_err());
    }

    #[test]
    fn test_status_strings_are_stable() {
        for status in IssueStatus::ALL {
            assert_eq!(status.as_str().parse::<IssueStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_priority_default_and_order() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert!(Priority::High > Priority::Low);
    }

    #[test]
    fn test_cause_and_category_parse() {
        assert_eq!(
            "occupant-misuse".parse::<Cause>().unwrap(),
            Cause::OccupantMisuse
        );
        assert_eq!("HVAC".parse::<Category>().unwrap(), Category::Hvac);
        assert!("magic".parse::<Category>().is_err());
    }

    #[test]
    fn test_archived_states() {
        assert!(!sample_issue(IssueStatus::Open, false).is_archived());
        assert!(!sample_issue(IssueStatus::InProgress, false).is_archived());
        assert!(!sample_issue(IssueStatus::Resolved, false).is_archived());
        assert!(sample_issue(IssueStatus::Resolved, true).is_archived());
        assert!(sample_issue(IssueStatus::Rejected, false).is_archived());
    }

    #[test]
    fn test_state_label() {
        assert_eq!(
            sample_issue(IssueStatus::Resolved, true).state_label(),
            "resolved and verified"
        );
        assert_eq!(
            sample_issue(IssueStatus::InProgress, false).state_label(),
            "in progress"
        );
        assert_eq!(sample_issue(IssueStatus::Open, false).state_label(), "open");
    }

    #[test]
    fn test_location_serialization() {
        let json = serde_json::to_string(&Location::Unit(4)).unwrap();
        assert_eq!(json, r#"{"type":"unit","value":4}"#);
        assert_eq!(Location::CommonArea("Roof".into()).to_string(), "Roof");
    }
}
