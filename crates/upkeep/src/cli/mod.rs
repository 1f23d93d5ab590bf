//! Command-line interface for upkeep.
//!
//! This module provides the CLI structure and output rendering for the
//! `upkeep` binary. Every command other than `init`, `import`, `status` and
//! `config` runs on behalf of the user selected with `--as`.

mod commands;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, InitCommand, IssueCommand, IssueListArgs, LogCommand, OccupantCommand,
    OutputFormat, ProjectCommand, ReportArgs, RoleArg, SnapshotCommand, UnitCommand, UserCommand,
    VersionGuard,
};
pub use output::Printer;

/// upkeep - Facility maintenance tracking
///
/// Report, review, resolve and verify maintenance issues across projects,
/// with every change recorded in the system log.
#[derive(Debug, Parser)]
#[command(name = "upkeep")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Act as this user (overrides session.actor_id)
    #[arg(long = "as", global = true, value_name = "USER_ID")]
    pub as_user: Option<i64>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "plain")]
    pub format: OutputFormat,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the first admin in an empty database
    Init(InitCommand),

    /// Manage users
    #[command(subcommand)]
    User(UserCommand),

    /// Manage projects and their members
    #[command(subcommand)]
    Project(ProjectCommand),

    /// Manage units
    #[command(subcommand)]
    Unit(UnitCommand),

    /// Manage occupants
    #[command(subcommand)]
    Occupant(OccupantCommand),

    /// Report and work on maintenance issues
    #[command(subcommand)]
    Issue(IssueCommand),

    /// Show the system log
    Log(LogCommand),

    /// Show database statistics
    Status,

    /// Write a snapshot of the whole database
    Export(SnapshotCommand),

    /// Load a snapshot into an empty database
    Import(SnapshotCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AttachmentPhase, Category, IssueStatus};
    use crate::query::IssueView;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_debug() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "upkeep");
    }

    #[test]
    fn test_cli_verify() {
        // Verify the CLI structure is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(
            parse(&["upkeep", "-q", "status"]).verbosity(),
            crate::logging::Verbosity::Quiet
        );
        assert_eq!(
            parse(&["upkeep", "status"]).verbosity(),
            crate::logging::Verbosity::Normal
        );
        assert_eq!(
            parse(&["upkeep", "-v", "status"]).verbosity(),
            crate::logging::Verbosity::Verbose
        );
        assert_eq!(
            parse(&["upkeep", "-vv", "status"]).verbosity(),
            crate::logging::Verbosity::Trace
        );
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = parse(&[
            "upkeep",
            "-c",
            "/custom/config.toml",
            "issue",
            "list",
            "--as",
            "3",
            "--format",
            "json",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
        assert_eq!(cli.as_user, Some(3));
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_parse_report() {
        let cli = parse(&[
            "upkeep",
            "issue",
            "report",
            "--project",
            "1",
            "--area",
            "Lobby",
            "--cause",
            "wear-and-tear",
            "--category",
            "plumbing",
            "--description",
            "Leak",
        ]);
        let Command::Issue(IssueCommand::Report(args)) = cli.command else {
            panic!("expected issue report");
        };
        assert_eq!(args.area.as_deref(), Some("Lobby"));
        assert_eq!(args.category, Category::Plumbing);
        assert!(args.priority.is_none());
    }

    #[test]
    fn test_report_needs_exactly_one_location() {
        let base = [
            "upkeep",
            "issue",
            "report",
            "--project",
            "1",
            "--cause",
            "damage",
            "--category",
            "hvac",
            "--description",
            "Noisy",
        ];
        assert!(Cli::try_parse_from(base).is_err());

        let mut both = base.to_vec();
        both.extend(["--unit", "2", "--area", "Roof"]);
        assert!(Cli::try_parse_from(both).is_err());
    }

    #[test]
    fn test_parse_transition_with_version() {
        let cli = parse(&[
            "upkeep",
            "issue",
            "approve",
            "4",
            "--vendor",
            "Acme",
            "--expected-version",
            "2",
        ]);
        let Command::Issue(IssueCommand::Approve { issue, guard, .. }) = cli.command else {
            panic!("expected issue approve");
        };
        assert_eq!(issue, 4);
        assert_eq!(guard.expected_version, Some(2));
    }

    #[test]
    fn test_parse_override_and_attach() {
        let cli = parse(&[
            "upkeep", "issue", "override", "4", "--status", "in_progress", "--note", "Urgent",
        ]);
        assert!(matches!(
            cli.command,
            Command::Issue(IssueCommand::Override {
                status: Some(IssueStatus::InProgress),
                ..
            })
        ));

        let cli = parse(&["upkeep", "issue", "attach", "4", "after.jpg", "--phase", "after"]);
        assert!(matches!(
            cli.command,
            Command::Issue(IssueCommand::Attach {
                phase: AttachmentPhase::After,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_issue_list_defaults() {
        let cli = parse(&["upkeep", "issue", "list"]);
        let Command::Issue(IssueCommand::List(args)) = cli.command else {
            panic!("expected issue list");
        };
        assert_eq!(args.view, IssueView::Active);
        assert!(args.limit.is_none());
    }

    #[test]
    fn test_parse_user_create() {
        let cli = parse(&[
            "upkeep",
            "user",
            "create",
            "--name",
            "Wes",
            "--email",
            "wes@example.com",
            "--role",
            "worker",
        ]);
        assert!(matches!(
            cli.command,
            Command::User(UserCommand::Create {
                role: RoleArg::Worker,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_unknown_enum_values() {
        assert!(Cli::try_parse_from(["upkeep", "issue", "list", "--status", "closed"]).is_err());
        assert!(Cli::try_parse_from(["upkeep", "log", "--id", "3"]).is_err());
    }
}
