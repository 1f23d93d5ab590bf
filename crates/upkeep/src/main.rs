//! `upkeep` - CLI for the facility maintenance tracker
//!
//! This binary plays the admin, manager and worker portals: every command
//! runs on behalf of the user selected with `--as` or `session.actor_id`.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::json;

use upkeep::cli::{
    Cli, Command, ConfigCommand, IssueCommand, IssueListArgs, LogCommand, OccupantCommand,
    OutputFormat, Printer, ProjectCommand, ReportArgs, SnapshotCommand, UnitCommand, UserCommand,
    VersionGuard,
};
use upkeep::{
    init_logging, Actor, Config, Error, IssueQuery, Location, LogFilter, NewAttachment, NewIssue,
    NewOccupant, NewProject, NewUnit, NewUser, Snapshot, Tracker, Transition,
};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;
    let printer = Printer::new(cli.format, config.display.date_format.clone());
    let actor_id = cli.as_user.or(config.session.actor_id);

    let output = match cli.command {
        Command::Config(cmd) => handle_config(&config, cmd, &printer)?,
        Command::Init(cmd) => {
            let mut tracker = Tracker::open(&config)?;
            let admin = tracker.bootstrap_admin(&cmd.name, &cmd.email, cmd.phone.as_deref())?;
            printer.done(
                &admin,
                format!(
                    "Created admin {} (#{}). Run commands with --as {}.",
                    admin.name, admin.id, admin.id
                ),
            )?
        }
        Command::Status => {
            let tracker = Tracker::open(&config)?;
            let database = config.database_path().display().to_string();
            printer.stats(&tracker.stats()?, &database)?
        }
        Command::Import(cmd) => handle_import(&config, &cmd, &printer)?,
        command => {
            let tracker = Tracker::open(&config)?;
            let actor = tracker.actor(actor_id.ok_or(Error::NoActor)?)?;
            let mut session = Session {
                tracker,
                actor,
                printer,
                list_limit: config.display.list_limit,
            };
            session.run(command)?
        }
    };

    if !output.is_empty() {
        println!("{output}");
    }
    Ok(())
}

fn handle_import(config: &Config, cmd: &SnapshotCommand, printer: &Printer) -> anyhow::Result<String> {
    let snapshot = Snapshot::load(&cmd.file)
        .with_context(|| format!("failed to read snapshot {}", cmd.file.display()))?;
    let mut tracker = Tracker::open(config)?;
    tracker.import(&snapshot)?;
    Ok(printer.done(
        &json!({ "file": cmd.file, "records": snapshot.record_count() }),
        format!(
            "Imported {} records from {}",
            snapshot.record_count(),
            cmd.file.display()
        ),
    )?)
}

fn handle_config(config: &Config, cmd: ConfigCommand, printer: &Printer) -> anyhow::Result<String> {
    let output = match cmd {
        ConfigCommand::Show => {
            if printer.format() == OutputFormat::Json {
                serde_json::to_string_pretty(config)?
            } else {
                let actor = config
                    .session
                    .actor_id
                    .map_or_else(|| "-".to_string(), |id| id.to_string());
                [
                    "Current Configuration".to_string(),
                    "=====================".to_string(),
                    String::new(),
                    "[Storage]".to_string(),
                    format!("  Database path:      {}", config.database_path().display()),
                    format!("  Busy timeout (ms):  {}", config.storage.busy_timeout_ms),
                    String::new(),
                    "[Workflow]".to_string(),
                    format!("  Default priority:   {}", config.workflow.default_priority),
                    String::new(),
                    "[Session]".to_string(),
                    format!("  Acting user:        {actor}"),
                    String::new(),
                    "[Display]".to_string(),
                    format!("  List limit:         {}", config.display.list_limit),
                    format!("  Date format:        {}", config.display.date_format),
                    String::new(),
                    "[Validation]".to_string(),
                    format!("  Phone pattern:      {}", config.validation.phone_pattern),
                ]
                .join("\n")
            }
        }
        ConfigCommand::Path => Config::default_config_path().display().to_string(),
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            Config::load_from(Some(path.clone()))
                .with_context(|| format!("invalid configuration in {}", path.display()))?;
            format!("Configuration is valid: {}", path.display())
        }
    };
    Ok(output)
}

/// Commands that run on behalf of an acting user.
#[derive(Debug)]
struct Session {
    tracker: Tracker,
    actor: Actor,
    printer: Printer,
    list_limit: usize,
}

impl Session {
    fn run(&mut self, command: Command) -> anyhow::Result<String> {
        match command {
            Command::User(cmd) => self.user(cmd),
            Command::Project(cmd) => self.project(cmd),
            Command::Unit(cmd) => self.unit(cmd),
            Command::Occupant(cmd) => self.occupant(cmd),
            Command::Issue(cmd) => self.issue(cmd),
            Command::Log(cmd) => self.log(&cmd),
            Command::Export(cmd) => self.export(&cmd.file),
            Command::Init(_) | Command::Status | Command::Import(_) | Command::Config(_) => {
                bail!("command does not run on behalf of a user")
            }
        }
    }

    fn user(&mut self, cmd: UserCommand) -> anyhow::Result<String> {
        let output = match cmd {
            UserCommand::Create {
                name,
                email,
                phone,
                role,
            } => {
                let user = self.tracker.create_user(
                    &self.actor,
                    &NewUser {
                        name,
                        email,
                        phone,
                        role: role.into(),
                    },
                )?;
                self.printer.done(
                    &user,
                    format!("Created {} {} (#{})", user.role, user.name, user.id),
                )?
            }
            UserCommand::List { active } => {
                self.printer.users(&self.tracker.users(&self.actor, active)?)?
            }
            UserCommand::Show { id } => self.printer.user(&self.tracker.user(&self.actor, id)?)?,
            UserCommand::Deactivate { id } => {
                let user = self.tracker.deactivate_user(&self.actor, id)?;
                self.printer
                    .done(&user, format!("Deactivated {} (#{})", user.name, user.id))?
            }
            UserCommand::Reactivate { id } => {
                let user = self.tracker.reactivate_user(&self.actor, id)?;
                self.printer
                    .done(&user, format!("Reactivated {} (#{})", user.name, user.id))?
            }
        };
        Ok(output)
    }

    fn project(&mut self, cmd: ProjectCommand) -> anyhow::Result<String> {
        let output = match cmd {
            ProjectCommand::Create {
                name,
                address,
                manager,
            } => {
                let project = self.tracker.create_project(
                    &self.actor,
                    &NewProject {
                        name,
                        address,
                        manager_id: manager,
                    },
                )?;
                self.printer.done(
                    &project,
                    format!("Created project {} (#{})", project.name, project.id),
                )?
            }
            ProjectCommand::List => self.printer.projects(&self.tracker.projects(&self.actor)?)?,
            ProjectCommand::Show { id } => {
                self.printer.project(&self.tracker.project(&self.actor, id)?)?
            }
            ProjectCommand::AddMember { project, user } => {
                let added = self.tracker.add_member(&self.actor, project, user)?;
                let message = if added {
                    format!("Added user #{user} to project #{project}")
                } else {
                    format!("User #{user} is already on project #{project}")
                };
                self.printer.done(
                    &json!({ "project_id": project, "user_id": user, "added": added }),
                    message,
                )?
            }
        };
        Ok(output)
    }

    fn unit(&mut self, cmd: UnitCommand) -> anyhow::Result<String> {
        let output = match cmd {
            UnitCommand::Add {
                project,
                label,
                floor,
            } => {
                let unit = self.tracker.create_unit(
                    &self.actor,
                    &NewUnit {
                        project_id: project,
                        label,
                        floor,
                    },
                )?;
                self.printer.done(
                    &unit,
                    format!(
                        "Added unit {} (#{}) to project #{}",
                        unit.label, unit.id, unit.project_id
                    ),
                )?
            }
            UnitCommand::List { project } => {
                self.printer.units(&self.tracker.units(&self.actor, project)?)?
            }
        };
        Ok(output)
    }

    fn occupant(&mut self, cmd: OccupantCommand) -> anyhow::Result<String> {
        let output = match cmd {
            OccupantCommand::Add {
                unit,
                name,
                phone,
                email,
            } => {
                let occupant = self.tracker.add_occupant(
                    &self.actor,
                    &NewOccupant {
                        unit_id: unit,
                        name,
                        phone,
                        email,
                    },
                )?;
                self.printer.done(
                    &occupant,
                    format!(
                        "{} (#{}) moved into unit #{}",
                        occupant.name, occupant.id, occupant.unit_id
                    ),
                )?
            }
            OccupantCommand::List { unit, all } => self
                .printer
                .occupants(&self.tracker.occupants(&self.actor, unit, all)?)?,
            OccupantCommand::MoveOut { id } => {
                let occupant = self.tracker.move_out(&self.actor, id)?;
                self.printer.done(
                    &occupant,
                    format!("{} (#{}) moved out", occupant.name, occupant.id),
                )?
            }
        };
        Ok(output)
    }

    fn issue(&mut self, cmd: IssueCommand) -> anyhow::Result<String> {
        let (issue_id, transition, guard) = match cmd {
            IssueCommand::Report(args) => return self.report(args),
            IssueCommand::Attach {
                issue,
                reference,
                kind,
                phase,
            } => return self.attach(issue, &reference, kind, phase),
            IssueCommand::List(args) => return self.issues(&args),
            IssueCommand::Show { issue } => {
                let detail = self.tracker.issue(&self.actor, issue)?;
                let names = self.tracker.user_names()?;
                return Ok(self.printer.issue(&detail, &names)?);
            }
            IssueCommand::Approve {
                issue,
                vendor,
                note,
                guard,
            } => (issue, Transition::Approve { vendor, note }, guard),
            IssueCommand::Reject {
                issue,
                reason,
                guard,
            } => (issue, Transition::Reject { reason }, guard),
            IssueCommand::Resolve { issue, guard } => (issue, Transition::Resolve, guard),
            IssueCommand::Verify { issue, guard } => (issue, Transition::Verify, guard),
            IssueCommand::Override {
                issue,
                status,
                priority,
                note,
                guard,
            } => (
                issue,
                Transition::Override {
                    status,
                    priority,
                    note,
                },
                guard,
            ),
        };
        self.transition(issue_id, &transition, guard)
    }

    fn report(&mut self, args: ReportArgs) -> anyhow::Result<String> {
        let location = match (args.unit, args.area) {
            (Some(unit), _) => Location::Unit(unit),
            (None, Some(area)) => Location::CommonArea(area),
            (None, None) => bail!("either --unit or --area is required"),
        };
        let issue = self.tracker.report_issue(
            &self.actor,
            &NewIssue {
                project_id: args.project,
                location,
                cause: args.cause,
                category: args.category,
                description: args.description,
                priority: args.priority,
            },
        )?;
        Ok(self.printer.done(
            &issue,
            format!(
                "Reported issue #{} ({} priority) at {}",
                issue.id, issue.priority, issue.location
            ),
        )?)
    }

    fn attach(
        &mut self,
        issue_id: i64,
        reference: &str,
        kind: upkeep::AttachmentKind,
        phase: upkeep::AttachmentPhase,
    ) -> anyhow::Result<String> {
        // Files are deduplicated by content; other references by their text.
        let content = std::fs::read(reference).unwrap_or_else(|_| reference.as_bytes().to_vec());
        let input = NewAttachment::new(issue_id, kind, phase, reference, &content);
        let output = match self.tracker.attach(&self.actor, &input)? {
            Some(attachment) => self.printer.done(
                &attachment,
                format!(
                    "Attached {} {} (#{}) to issue #{}",
                    attachment.phase, attachment.kind, attachment.id, issue_id
                ),
            )?,
            None => self.printer.done(
                &json!({ "issue_id": issue_id, "duplicate": true }),
                format!("Issue #{issue_id} already has this attachment; skipped"),
            )?,
        };
        Ok(output)
    }

    fn transition(
        &mut self,
        issue_id: i64,
        transition: &Transition,
        guard: VersionGuard,
    ) -> anyhow::Result<String> {
        let issue = self
            .tracker
            .transition(&self.actor, issue_id, transition, guard.expected_version)?;
        Ok(self.printer.done(
            &issue,
            format!(
                "Issue #{} is now {} (version {})",
                issue.id,
                issue.state_label(),
                issue.version
            ),
        )?)
    }

    fn issues(&self, args: &IssueListArgs) -> anyhow::Result<String> {
        let query = IssueQuery {
            view: args.view,
            project_id: args.project,
            status: args.status,
            priority: args.priority,
            reporter_id: args.reporter,
            limit: Some(args.limit.unwrap_or(self.list_limit)),
        };
        let issues = self.tracker.issues(&self.actor, &query)?;
        let names = self.tracker.user_names()?;
        Ok(self.printer.issues(&issues, &names)?)
    }

    fn log(&self, cmd: &LogCommand) -> anyhow::Result<String> {
        let filter = LogFilter {
            entity: cmd.entity,
            entity_id: cmd.id,
            actor_id: cmd.actor,
            action: cmd.action,
            limit: Some(cmd.limit.unwrap_or(self.list_limit)),
        };
        let entries = self.tracker.log(&self.actor, &filter)?;
        let names = self.tracker.user_names()?;
        Ok(self.printer.log(&entries, &names)?)
    }

    fn export(&self, file: &Path) -> anyhow::Result<String> {
        let snapshot = self.tracker.export(&self.actor)?;
        snapshot
            .save(file)
            .with_context(|| format!("failed to write snapshot {}", file.display()))?;
        Ok(self.printer.done(
            &json!({ "file": file, "records": snapshot.record_count() }),
            format!(
                "Exported {} records to {}",
                snapshot.record_count(),
                file.display()
            ),
        )?)
    }
}
