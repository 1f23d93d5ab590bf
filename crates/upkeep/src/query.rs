//! Derived issue views.
//!
//! Views are recomputed from stored issues on every read; nothing here is
//! cached or persisted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::model::{normalize_token, Issue, IssueStatus, ParseEnumError, Priority};

/// Which part of an issue's lifecycle to show.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueView {
    /// Issues still in the workflow.
    #[default]
    Active,
    /// Rejected, or resolved and verified.
    Archived,
    /// Everything.
    All,
}

impl IssueView {
    /// Stable string form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::All => "all",
        }
    }

    /// Whether an issue belongs in this view.
    #[must_use]
    pub fn includes(&self, issue: &Issue) -> bool {
        match self {
            Self::Active => !issue.is_archived(),
            Self::Archived => issue.is_archived(),
            Self::All => true,
        }
    }
}

impl fmt::Display for IssueView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IssueView {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "all" => Ok(Self::All),
            _ => Err(ParseEnumError::new("view", s, "active, archived, all")),
        }
    }
}

/// Filter over issues. The default shows active issues without a limit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueQuery {
    /// Lifecycle view.
    pub view: IssueView,
    /// Only this project.
    pub project_id: Option<i64>,
    /// Only this status.
    pub status: Option<IssueStatus>,
    /// Only this priority.
    pub priority: Option<Priority>,
    /// Only issues reported by this user.
    pub reporter_id: Option<i64>,
    /// At most this many issues.
    pub limit: Option<usize>,
}

impl IssueQuery {
    /// Whether an issue passes every filter (the limit aside).
    #[must_use]
    pub fn matches(&self, issue: &Issue) -> bool {
        self.view.includes(issue)
            && self.project_id.map_or(true, |id| issue.project_id == id)
            && self.status.map_or(true, |s| issue.status == s)
            && self.priority.map_or(true, |p| issue.priority == p)
            && self.reporter_id.map_or(true, |id| issue.reporter_id == id)
    }

    /// Filter `issues`, keeping their order, and apply the limit.
    pub fn select<'a>(&self, issues: impl IntoIterator<Item = &'a Issue>) -> Vec<&'a Issue> {
        issues
            .into_iter()
            .filter(|issue| self.matches(issue))
            .take(self.limit.unwrap_or(usize::MAX))
            .collect()
    }
}
