//! Issue status transitions.
//!
//! [`apply`] is a pure function: it checks a transition's preconditions
//! against an [`Issue`] value and returns the updated value. Permissions and
//! persistence are handled by the caller.
//!
//! ```text
//! OPEN --approve--> IN_PROGRESS --resolve--> RESOLVED --verify--> RESOLVED + verified
//! OPEN --reject--> REJECTED
//! any --override--> any
//! ```

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::model::{Action, Issue, IssueStatus, Priority};
use crate::validate::optional_text;

/// A requested change to an issue's workflow state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Accept an open issue and hand it to a vendor.
    Approve {
        /// Vendor doing the work; must not be blank.
        vendor: String,
        /// Optional reviewer note.
        note: Option<String>,
    },
    /// Decline an open issue.
    Reject {
        /// Why; must not be blank.
        reason: String,
    },
    /// Mark in-progress work as done.
    Resolve,
    /// Confirm a resolution; needs an after-repair photo.
    Verify,
    /// Admin correction of status and/or priority, skipping preconditions.
    Override {
        /// New status.
        status: Option<IssueStatus>,
        /// New priority.
        priority: Option<Priority>,
        /// Justification; must not be blank.
        note: String,
    },
}

impl Transition {
    /// Verb used in messages and permission errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::Resolve => "resolve",
            Self::Verify => "verify",
            Self::Override { .. } => "override",
        }
    }

    /// Log action recorded for this transition.
    #[must_use]
    pub fn action(&self) -> Action {
        match self {
            Self::Approve { .. } => Action::IssueApproved,
            Self::Reject { .. } => Action::IssueRejected,
            Self::Resolve => Action::IssueResolved,
            Self::Verify => Action::IssueVerified,
            Self::Override { .. } => Action::IssueOverridden,
        }
    }
}

/// Facts about the world a transition may depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionContext {
    /// Acting user.
    pub actor_id: i64,
    /// Timestamp to stamp on the issue.
    pub now: DateTime<Utc>,
    /// Number of after-repair photos attached to the issue.
    pub after_photos: i64,
}

/// The outcome of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// The updated issue, with `version` bumped.
    pub issue: Issue,
    /// Log line describing the change.
    pub detail: String,
}

/// Apply `transition` to `issue`.
///
/// # Errors
///
/// Returns [`Error::Validation`] when a required field is blank or the
/// verification photo is missing, and [`Error::InvalidTransition`] when the
/// issue is in the wrong state.
pub fn apply(issue: &Issue, transition: &Transition, ctx: &TransitionContext) -> Result<Applied> {
    let mut next = issue.clone();
    let name = transition.name();

    let detail = match transition {
        Transition::Approve { vendor, note } => {
            expect_status(issue, IssueStatus::Open, name)?;
            let vendor = required(vendor, "vendor", "is required to approve an issue")?;
            next.status = IssueStatus::InProgress;
            next.vendor = Some(vendor.to_string());
            next.approved_by = Some(ctx.actor_id);
            next.approved_at = Some(ctx.now);
            next.approval_note = optional_text(note.as_deref());
            format!("approved, vendor {vendor}")
        }
        Transition::Reject { reason } => {
            expect_status(issue, IssueStatus::Open, name)?;
            let reason = required(reason, "reason", "is required to reject an issue")?;
            next.status = IssueStatus::Rejected;
            next.rejection_reason = Some(reason.to_string());
            next.rejected_by = Some(ctx.actor_id);
            next.rejected_at = Some(ctx.now);
            format!("rejected: {reason}")
        }
        Transition::Resolve => {
            expect_status(issue, IssueStatus::InProgress, name)?;
            next.status = IssueStatus::Resolved;
            next.resolved_by = Some(ctx.actor_id);
            next.resolved_at = Some(ctx.now);
            "resolved".to_string()
        }
        Transition::Verify => {
            if issue.status != IssueStatus::Resolved || issue.verified {
                return Err(Error::invalid_transition(name, issue.state_label()));
            }
            if ctx.after_photos < 1 {
                return Err(Error::validation(
                    "attachment",
                    "an after-repair photo is required to verify an issue",
                ));
            }
            next.verified = true;
            next.verified_by = Some(ctx.actor_id);
            next.verified_at = Some(ctx.now);
            "verified".to_string()
        }
        Transition::Override {
            status,
            priority,
            note,
        } => {
            if status.is_none() && priority.is_none() {
                return Err(Error::validation(
                    "override",
                    "at least one of status or priority must be given",
                ));
            }
            let note = required(note, "note", "is required to override an issue")?;
            let mut changes = Vec::new();
            if let Some(status) = *status {
                changes.push(format!("status {} -> {status}", issue.status));
                next.status = status;
                if status != IssueStatus::Resolved {
                    next.verified = false;
                    next.verified_by = None;
                    next.verified_at = None;
                }
            }
            if let Some(priority) = *priority {
                changes.push(format!("priority {} -> {priority}", issue.priority));
                next.priority = priority;
            }
            format!("override ({}): {note}", changes.join(", "))
        }
    };

    next.updated_at = ctx.now;
    next.version = issue.version + 1;
    Ok(Applied {
        issue: next,
        detail,
    })
}

fn expect_status(issue: &Issue, expected: IssueStatus, action: &'static str) -> Result<()> {
    if issue.status == expected {
        Ok(())
    } else {
        Err(Error::invalid_transition(action, issue.state_label()))
    }
}

fn required<'a>(value: &'a str, field: &'static str, message: &str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::validation(field, message))
    } else {
        Ok(value)
    }
}
