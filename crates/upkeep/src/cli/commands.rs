//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{ArgGroup, Args, Subcommand, ValueEnum};

use crate::model::{
    Action, AttachmentKind, AttachmentPhase, Category, Cause, EntityKind, IssueStatus, Priority,
    Role,
};
use crate::query::IssueView;

/// Bootstrap arguments.
#[derive(Debug, Args)]
pub struct InitCommand {
    /// Name of the first admin
    #[arg(long)]
    pub name: String,

    /// Email of the first admin
    #[arg(long)]
    pub email: String,

    /// Phone number of the first admin
    #[arg(long)]
    pub phone: Option<String>,
}

/// User management commands.
#[derive(Debug, Subcommand)]
pub enum UserCommand {
    /// Create a user
    Create {
        /// Display name
        #[arg(long)]
        name: String,

        /// Unique email address
        #[arg(long)]
        email: String,

        /// Phone number
        #[arg(long)]
        phone: Option<String>,

        /// Portal role
        #[arg(long, value_enum)]
        role: RoleArg,
    },

    /// List users
    List {
        /// Hide deactivated users
        #[arg(long)]
        active: bool,
    },

    /// Show one user
    Show {
        /// User id
        id: i64,
    },

    /// Deactivate a user; the record is kept
    Deactivate {
        /// User id
        id: i64,
    },

    /// Reactivate a deactivated user
    Reactivate {
        /// User id
        id: i64,
    },
}

/// Project commands.
#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    /// Create a project
    Create {
        /// Unique project name
        #[arg(long)]
        name: String,

        /// Street address
        #[arg(long)]
        address: Option<String>,

        /// Id of the managing user
        #[arg(long, value_name = "USER_ID")]
        manager: Option<i64>,
    },

    /// List visible projects
    List,

    /// Show a project with its members and units
    Show {
        /// Project id
        id: i64,
    },

    /// Add a user to a project
    AddMember {
        /// Project id
        project: i64,

        /// User id
        user: i64,
    },
}

/// Unit commands.
#[derive(Debug, Subcommand)]
pub enum UnitCommand {
    /// Add a unit to a project
    Add {
        /// Project id
        #[arg(long)]
        project: i64,

        /// Unit label, unique within the project
        #[arg(long)]
        label: String,

        /// Floor number
        #[arg(long, allow_negative_numbers = true)]
        floor: Option<i32>,
    },

    /// List units
    List {
        /// Only units of this project
        #[arg(long)]
        project: Option<i64>,
    },
}

/// Occupant commands.
#[derive(Debug, Subcommand)]
pub enum OccupantCommand {
    /// Register an occupant moving into a unit
    Add {
        /// Unit id
        #[arg(long)]
        unit: i64,

        /// Full name
        #[arg(long)]
        name: String,

        /// Phone number
        #[arg(long)]
        phone: Option<String>,

        /// Email address
        #[arg(long)]
        email: Option<String>,
    },

    /// List occupants
    List {
        /// Only occupants of this unit
        #[arg(long)]
        unit: Option<i64>,

        /// Include occupants who moved out
        #[arg(long)]
        all: bool,
    },

    /// Record that an occupant moved out
    MoveOut {
        /// Occupant id
        id: i64,
    },
}

/// Issue reporting arguments.
#[derive(Debug, Args)]
#[command(group(ArgGroup::new("location").required(true).args(["unit", "area"])))]
pub struct ReportArgs {
    /// Project id
    #[arg(long)]
    pub project: i64,

    /// Unit the issue is in
    #[arg(long)]
    pub unit: Option<i64>,

    /// Common area the issue is in (e.g. "Lobby")
    #[arg(long)]
    pub area: Option<String>,

    /// Cause: wear_and_tear, damage, defect, occupant_misuse, other
    #[arg(long)]
    pub cause: Cause,

    /// Category: plumbing, electrical, hvac, structural, appliance, cleaning, security, other
    #[arg(long)]
    pub category: Category,

    /// What is wrong
    #[arg(long)]
    pub description: String,

    /// Priority: low, medium, high (defaults to workflow.default_priority)
    #[arg(long)]
    pub priority: Option<Priority>,
}

/// Optimistic concurrency guard shared by the transition commands.
#[derive(Debug, Clone, Copy, Args)]
pub struct VersionGuard {
    /// Fail unless the issue is still at this version
    #[arg(long, value_name = "VERSION")]
    pub expected_version: Option<i64>,
}

/// Issue commands.
#[derive(Debug, Subcommand)]
pub enum IssueCommand {
    /// Report a new issue
    Report(ReportArgs),

    /// Attach a photo or voice note
    Attach {
        /// Issue id
        issue: i64,

        /// Path or URI of the media; a readable file is hashed by content
        reference: String,

        /// Media type: photo, voice
        #[arg(long, default_value = "photo")]
        kind: AttachmentKind,

        /// before or after the repair
        #[arg(long)]
        phase: AttachmentPhase,
    },

    /// Approve an open issue and assign a vendor
    Approve {
        /// Issue id
        issue: i64,

        /// Vendor doing the work
        #[arg(long)]
        vendor: String,

        /// Approval note
        #[arg(long)]
        note: Option<String>,

        #[command(flatten)]
        guard: VersionGuard,
    },

    /// Reject an open issue
    Reject {
        /// Issue id
        issue: i64,

        /// Why the issue is rejected
        #[arg(long)]
        reason: String,

        #[command(flatten)]
        guard: VersionGuard,
    },

    /// Mark an in-progress issue resolved
    Resolve {
        /// Issue id
        issue: i64,

        #[command(flatten)]
        guard: VersionGuard,
    },

    /// Confirm a resolved issue's repair (needs an after photo)
    Verify {
        /// Issue id
        issue: i64,

        #[command(flatten)]
        guard: VersionGuard,
    },

    /// Force an issue's status or priority (admin only, audited)
    Override {
        /// Issue id
        issue: i64,

        /// New status: open, in_progress, resolved, rejected
        #[arg(long)]
        status: Option<IssueStatus>,

        /// New priority
        #[arg(long)]
        priority: Option<Priority>,

        /// Justification recorded in the log
        #[arg(long)]
        note: String,

        #[command(flatten)]
        guard: VersionGuard,
    },

    /// List issues
    List(IssueListArgs),

    /// Show an issue with its attachments and history
    Show {
        /// Issue id
        issue: i64,
    },
}

/// Issue listing filters.
#[derive(Debug, Args)]
pub struct IssueListArgs {
    /// Which issues to show: active, archived, all
    #[arg(long, default_value = "active")]
    pub view: IssueView,

    /// Only this project
    #[arg(long)]
    pub project: Option<i64>,

    /// Only this status
    #[arg(long)]
    pub status: Option<IssueStatus>,

    /// Only this priority
    #[arg(long)]
    pub priority: Option<Priority>,

    /// Only issues reported by this user
    #[arg(long, value_name = "USER_ID")]
    pub reporter: Option<i64>,

    /// Maximum number of results (defaults to display.list_limit)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// System log arguments.
#[derive(Debug, Args)]
pub struct LogCommand {
    /// Only entries about this kind of record
    #[arg(long)]
    pub entity: Option<EntityKind>,

    /// Only entries about this record id
    #[arg(long, requires = "entity")]
    pub id: Option<i64>,

    /// Only entries by this user
    #[arg(long, value_name = "USER_ID")]
    pub actor: Option<i64>,

    /// Only entries with this action (e.g. issue_approved)
    #[arg(long)]
    pub action: Option<Action>,

    /// Maximum number of results (defaults to display.list_limit)
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Snapshot file argument.
#[derive(Debug, Args)]
pub struct SnapshotCommand {
    /// Snapshot file
    pub file: PathBuf,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show,

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

/// Role argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RoleArg {
    /// Full control
    Admin,
    /// Reviews issues in managed projects
    Manager,
    /// Reports and resolves issues
    Worker,
}

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Admin => Self::Admin,
            RoleArg::Manager => Self::Manager,
            RoleArg::Worker => Self::Worker,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_arg_conversion() {
        assert_eq!(Role::from(RoleArg::Admin), Role::Admin);
        assert_eq!(Role::from(RoleArg::Manager), Role::Manager);
        assert_eq!(Role::from(RoleArg::Worker), Role::Worker);
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_version_guard_debug() {
        let guard = VersionGuard {
            expected_version: Some(3),
        };
        let debug_str = format!("{guard:?}");
        assert!(debug_str.contains("expected_version"));
    }
}
