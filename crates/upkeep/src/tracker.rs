//! The tracker service.
//!
//! [`Tracker`] is what the portals talk to: every operation runs on behalf
//! of an [`Actor`], checks the role policy, validates input and performs its
//! writes through a single [`Store::mutate`] call so the change and its audit
//! entries land together.

use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    Action, Attachment, EntityKind, Issue, Location, LogEntry, NewAttachment, NewIssue,
    NewOccupant, NewProject, NewUnit, NewUser, Occupant, Priority, Project, Role, Unit, User,
};
use crate::policy::Actor;
use crate::query::IssueQuery;
use crate::storage::{
    AttachmentRepo, IssueRepo, Journal, LogFilter, LogRepo, SiteRepo, Snapshot, Store,
    StoreStats, UserRepo,
};
use crate::validate::{optional_text, required_text, ContactRules};
use crate::workflow::{self, Transition, TransitionContext};

/// An issue with its evidence and history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueDetail {
    /// The issue.
    pub issue: Issue,
    /// Attached photos and voice notes, oldest first.
    pub attachments: Vec<Attachment>,
    /// Log entries about the issue, newest first.
    pub history: Vec<LogEntry>,
}

/// A project with the people and units attached to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectDetail {
    /// The project.
    pub project: Project,
    /// Its manager, if assigned.
    pub manager: Option<User>,
    /// Members, by id.
    pub members: Vec<User>,
    /// Units, by label.
    pub units: Vec<Unit>,
}

/// Maintenance tracker operations over a [`Store`].
#[derive(Debug)]
pub struct Tracker {
    store: Store,
    rules: ContactRules,
    default_priority: Priority,
}

impl Tracker {
    /// Wrap an open store.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured validation rules do not compile.
    pub fn new(store: Store, config: &Config) -> Result<Self> {
        Ok(Self {
            store,
            rules: config.contact_rules()?,
            default_priority: config.workflow.default_priority,
        })
    }

    /// Open the configured database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(config: &Config) -> Result<Self> {
        let store = Store::open_with_timeout(config.database_path(), config.busy_timeout())?;
        Self::new(store, config)
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Resolve the user an operation runs on behalf of.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown user and
    /// [`Error::InactiveUser`] for a deactivated one.
    pub fn actor(&self, user_id: i64) -> Result<Actor> {
        let conn = self.store.conn();
        let user = UserRepo::require(conn, user_id)?;
        let projects = SiteRepo::project_ids_for_user(conn, user_id)?;
        let actor = Actor::new(user, projects);
        actor.ensure_active()?;
        Ok(actor)
    }

    /// Run a write on behalf of `actor`, rechecking inside the transaction
    /// that the actor is still active.
    fn write<F, R>(&mut self, actor: &Actor, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Connection, &mut Journal) -> Result<R>,
    {
        actor.ensure_active()?;
        let actor_id = actor.id();
        self.store.mutate(Some(actor_id), op, |conn, journal| {
            if !UserRepo::require(conn, actor_id)?.active {
                return Err(Error::InactiveUser { id: actor_id });
            }
            debug!(actor = ?journal.actor_id(), op, "Write authorized");
            f(conn, journal)
        })
    }

    // === Users ===

    /// Create the first admin of an empty store.
    ///
    /// # Errors
    ///
    /// Returns a validation error if any user already exists or the input
    /// is malformed.
    pub fn bootstrap_admin(
        &mut self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<User> {
        let new = self.validate_user(name, email, phone, Role::Admin)?;

        let user = self.store.mutate(None, "bootstrap_admin", |conn, journal| {
            if UserRepo::count(conn)? > 0 {
                return Err(Error::validation(
                    "init",
                    "users already exist; bootstrap only works on an empty store",
                ));
            }
            let user = UserRepo::insert(conn, &new, journal.now())?;
            journal.record(
                Action::UserCreated,
                EntityKind::User,
                user.id,
                format!("bootstrapped admin {}", user.name),
            );
            Ok(user)
        })?;

        info!(user_id = user.id, "Bootstrapped first admin");
        Ok(user)
    }

    /// Create a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not an admin, the input is malformed
    /// or the email is taken.
    pub fn create_user(&mut self, actor: &Actor, input: &NewUser) -> Result<User> {
        actor.ensure(actor.can_manage_users(), "create users")?;
        let new = self.validate_user(
            &input.name,
            &input.email,
            input.phone.as_deref(),
            input.role,
        )?;

        let user = self.write(actor, "create_user", |conn, journal| {
            let user = UserRepo::insert(conn, &new, journal.now())?;
            journal.record(
                Action::UserCreated,
                EntityKind::User,
                user.id,
                format!("created {} {}", user.role, user.name),
            );
            Ok(user)
        })?;

        info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    fn validate_user(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
        role: Role,
    ) -> Result<NewUser> {
        Ok(NewUser {
            name: required_text("name", name)?,
            email: self.rules.email(email)?,
            phone: self.rules.phone(phone)?,
            role,
        })
    }

    /// List users; deactivated users are included unless `active_only`.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is a worker or the query fails.
    pub fn users(&self, actor: &Actor, active_only: bool) -> Result<Vec<User>> {
        actor.ensure(actor.role() != Role::Worker, "list users")?;
        UserRepo::list(self.store.conn(), active_only)
    }

    /// Look up a user. Anyone may look up themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if the user does not exist or the actor may not see it.
    pub fn user(&self, actor: &Actor, id: i64) -> Result<User> {
        actor.ensure(
            actor.id() == id || actor.role() != Role::Worker,
            "view other users",
        )?;
        UserRepo::require(self.store.conn(), id)
    }

    /// Deactivate a user. The record stays and remains listable.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not an admin, targets themselves, or
    /// the user does not exist.
    pub fn deactivate_user(&mut self, actor: &Actor, id: i64) -> Result<User> {
        actor.ensure(actor.can_manage_users(), "deactivate users")?;
        if actor.id() == id {
            return Err(Error::validation("user", "you cannot deactivate yourself"));
        }
        self.set_user_active(actor, id, false)
    }

    /// Reactivate a deactivated user.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not an admin or the user does not exist.
    pub fn reactivate_user(&mut self, actor: &Actor, id: i64) -> Result<User> {
        actor.ensure(actor.can_manage_users(), "reactivate users")?;
        self.set_user_active(actor, id, true)
    }

    fn set_user_active(&mut self, actor: &Actor, id: i64, active: bool) -> Result<User> {
        let (op, action) = if active {
            ("reactivate_user", Action::UserReactivated)
        } else {
            ("deactivate_user", Action::UserDeactivated)
        };

        self.write(actor, op, |conn, journal| {
            let user = UserRepo::require(conn, id)?;
            if user.active == active {
                debug!(user_id = id, active, "User already in requested state");
                return Ok(user);
            }
            UserRepo::set_active(conn, id, active, journal.now())?;
            journal.record(action, EntityKind::User, id, user.name.clone());
            UserRepo::require(conn, id)
        })
    }

    // === Projects ===

    /// Create a project, optionally with a manager.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not an admin, the name is blank or
    /// taken, or the manager is not an active manager.
    pub fn create_project(&mut self, actor: &Actor, input: &NewProject) -> Result<Project> {
        actor.ensure(actor.can_manage_projects(), "create projects")?;
        let new = NewProject {
            name: required_text("name", &input.name)?,
            address: optional_text(input.address.as_deref()),
            manager_id: input.manager_id,
        };

        let project = self.write(actor, "create_project", |conn, journal| {
            if let Some(manager_id) = new.manager_id {
                let manager = UserRepo::require(conn, manager_id)?;
                if manager.role != Role::Manager || !manager.active {
                    return Err(Error::validation(
                        "manager",
                        format!("user {manager_id} is not an active manager"),
                    ));
                }
            }
            let project = SiteRepo::insert_project(conn, &new, journal.now())?;
            journal.record(
                Action::ProjectCreated,
                EntityKind::Project,
                project.id,
                project.name.clone(),
            );
            Ok(project)
        })?;

        info!(project_id = project.id, "Project created");
        Ok(project)
    }

    /// Add a user to a project. Returns `false` if they were already a member.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not an admin or the project or user
    /// does not exist or is inactive.
    pub fn add_member(&mut self, actor: &Actor, project_id: i64, user_id: i64) -> Result<bool> {
        actor.ensure(actor.can_manage_projects(), "assign project members")?;

        self.write(actor, "add_member", |conn, journal| {
            SiteRepo::require_project(conn, project_id)?;
            let user = UserRepo::require(conn, user_id)?;
            if !user.active {
                return Err(Error::InactiveUser { id: user_id });
            }
            let added = SiteRepo::add_member(conn, project_id, user_id, journal.now())?;
            if added {
                journal.record(
                    Action::MemberAdded,
                    EntityKind::Project,
                    project_id,
                    format!("added {} {} (user {user_id})", user.role, user.name),
                );
            }
            Ok(added)
        })
    }

    /// Projects the actor can see: all for admins, otherwise their own.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn projects(&self, actor: &Actor) -> Result<Vec<Project>> {
        let projects = SiteRepo::projects(self.store.conn())?;
        Ok(projects
            .into_iter()
            .filter(|p| self.can_view_project(actor, p.id))
            .collect())
    }

    /// A project with its manager, members and units.
    ///
    /// # Errors
    ///
    /// Returns an error if the project does not exist or is not visible.
    pub fn project(&self, actor: &Actor, id: i64) -> Result<ProjectDetail> {
        let conn = self.store.conn();
        let project = SiteRepo::require_project(conn, id)?;
        actor.ensure(self.can_view_project(actor, id), "view this project")?;

        let manager = match project.manager_id {
            Some(manager_id) => UserRepo::get(conn, manager_id)?,
            None => None,
        };
        let members = SiteRepo::members(conn, id)?
            .into_iter()
            .map(|user_id| UserRepo::require(conn, user_id))
            .collect::<Result<Vec<_>>>()?;
        let units = SiteRepo::units(conn, Some(id))?;

        Ok(ProjectDetail {
            project,
            manager,
            members,
            units,
        })
    }

    fn can_view_project(&self, actor: &Actor, project_id: i64) -> bool {
        actor.role() == Role::Admin || actor.in_project(project_id)
    }

    // === Units and occupants ===

    /// Add a unit to a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor cannot manage the project, the project
    /// does not exist, or the label is blank or taken.
    pub fn create_unit(&mut self, actor: &Actor, input: &NewUnit) -> Result<Unit> {
        actor.ensure(actor.can_manage_sites(input.project_id), "add units here")?;
        let new = NewUnit {
            project_id: input.project_id,
            label: required_text("label", &input.label)?,
            floor: input.floor,
        };

        self.write(actor, "create_unit", |conn, journal| {
            SiteRepo::require_project(conn, new.project_id)?;
            let unit = SiteRepo::insert_unit(conn, &new, journal.now())?;
            journal.record(
                Action::UnitCreated,
                EntityKind::Unit,
                unit.id,
                format!("unit {} in project {}", unit.label, unit.project_id),
            );
            Ok(unit)
        })
    }

    /// Units of a project, or of every visible project.
    ///
    /// # Errors
    ///
    /// Returns an error if the project is not visible or the query fails.
    pub fn units(&self, actor: &Actor, project_id: Option<i64>) -> Result<Vec<Unit>> {
        if let Some(project_id) = project_id {
            actor.ensure(self.can_view_project(actor, project_id), "view this project")?;
        }
        let units = SiteRepo::units(self.store.conn(), project_id)?;
        Ok(units
            .into_iter()
            .filter(|u| self.can_view_project(actor, u.project_id))
            .collect())
    }

    /// Register an occupant moving into a unit.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit does not exist, the actor cannot manage
    /// its project, or the contact details are malformed.
    pub fn add_occupant(&mut self, actor: &Actor, input: &NewOccupant) -> Result<Occupant> {
        let unit = SiteRepo::require_unit(self.store.conn(), input.unit_id)?;
        actor.ensure(actor.can_manage_sites(unit.project_id), "add occupants here")?;
        let new = NewOccupant {
            unit_id: unit.id,
            name: required_text("name", &input.name)?,
            phone: self.rules.phone(input.phone.as_deref())?,
            email: self.rules.optional_email(input.email.as_deref())?,
        };

        self.write(actor, "add_occupant", |conn, journal| {
            let occupant = SiteRepo::insert_occupant(conn, &new, journal.now())?;
            journal.record(
                Action::OccupantAdded,
                EntityKind::Occupant,
                occupant.id,
                format!("{} moved into unit {}", occupant.name, unit.label),
            );
            Ok(occupant)
        })
    }

    /// Occupants of a unit or of every visible unit; past occupants only
    /// when `include_past`.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit is not visible or the query fails.
    pub fn occupants(
        &self,
        actor: &Actor,
        unit_id: Option<i64>,
        include_past: bool,
    ) -> Result<Vec<Occupant>> {
        let conn = self.store.conn();
        let visible_units: HashSet<i64> = SiteRepo::units(conn, None)?
            .into_iter()
            .filter(|u| self.can_view_project(actor, u.project_id))
            .map(|u| u.id)
            .collect();
        if let Some(unit_id) = unit_id {
            SiteRepo::require_unit(conn, unit_id)?;
            actor.ensure(visible_units.contains(&unit_id), "view this unit")?;
        }

        let occupants = SiteRepo::occupants(conn, unit_id, include_past)?;
        Ok(occupants
            .into_iter()
            .filter(|o| visible_units.contains(&o.unit_id))
            .collect())
    }

    /// Record that an occupant moved out.
    ///
    /// # Errors
    ///
    /// Returns an error if the occupant does not exist, already left, or the
    /// actor cannot manage the project.
    pub fn move_out(&mut self, actor: &Actor, occupant_id: i64) -> Result<Occupant> {
        let conn = self.store.conn();
        let occupant =
            SiteRepo::occupant(conn, occupant_id)?.ok_or_else(|| Error::not_found("occupant", occupant_id))?;
        let unit = SiteRepo::require_unit(conn, occupant.unit_id)?;
        actor.ensure(actor.can_manage_sites(unit.project_id), "move occupants out here")?;

        self.write(actor, "move_out", |conn, journal| {
            if !SiteRepo::move_out(conn, occupant_id, journal.now())? {
                return Err(Error::validation("occupant", "has already moved out"));
            }
            journal.record(
                Action::OccupantMovedOut,
                EntityKind::Occupant,
                occupant_id,
                format!("{} moved out of unit {}", occupant.name, unit.label),
            );
            SiteRepo::occupant(conn, occupant_id)?
                .ok_or_else(|| Error::not_found("occupant", occupant_id))
        })
    }

    // === Issues ===

    /// Report an issue. It starts open and unverified.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor cannot report in the project, the
    /// location is not part of it, or the description is blank.
    pub fn report_issue(&mut self, actor: &Actor, input: &NewIssue) -> Result<Issue> {
        actor.ensure(actor.can_report(input.project_id), "report issues here")?;
        let location = match &input.location {
            Location::Unit(id) => Location::Unit(*id),
            Location::CommonArea(area) => Location::CommonArea(required_text("common area", area)?),
        };
        let new = NewIssue {
            project_id: input.project_id,
            location,
            cause: input.cause,
            category: input.category,
            description: required_text("description", &input.description)?,
            priority: input.priority,
        };
        let priority = new.priority.unwrap_or(self.default_priority);
        let reporter_id = actor.id();

        let issue = self.write(actor, "report_issue", |conn, journal| {
            SiteRepo::require_project(conn, new.project_id)?;
            if let Location::Unit(unit_id) = new.location {
                let unit = SiteRepo::require_unit(conn, unit_id)?;
                if unit.project_id != new.project_id {
                    return Err(Error::validation(
                        "unit",
                        format!("unit {unit_id} is not part of project {}", new.project_id),
                    ));
                }
            }
            let issue = IssueRepo::insert(conn, reporter_id, &new, priority, journal.now())?;
            journal.record(
                Action::IssueReported,
                EntityKind::Issue,
                issue.id,
                format!("{} issue at {}", issue.category, issue.location),
            );
            Ok(issue)
        })?;

        info!(issue_id = issue.id, project_id = issue.project_id, "Issue reported");
        Ok(issue)
    }

    /// Attach a photo or voice note. Returns `None` when the same content is
    /// already attached to the issue.
    ///
    /// # Errors
    ///
    /// Returns an error if the issue does not exist, the actor may not attach
    /// to it, or the reference is blank.
    pub fn attach(&mut self, actor: &Actor, input: &NewAttachment) -> Result<Option<Attachment>> {
        let new = NewAttachment {
            reference: required_text("reference", &input.reference)?,
            ..input.clone()
        };
        let uploaded_by = actor.id();

        let attachment = self.write(actor, "attach", |conn, journal| {
            let issue = IssueRepo::require(conn, new.issue_id)?;
            actor.ensure(actor.can_attach(&issue), "attach to this issue")?;
            let attachment = AttachmentRepo::insert(conn, &new, uploaded_by, journal.now())?;
            if let Some(attachment) = &attachment {
                journal.record(
                    Action::AttachmentAdded,
                    EntityKind::Attachment,
                    attachment.id,
                    format!(
                        "{} {} on issue {}",
                        attachment.phase, attachment.kind, attachment.issue_id
                    ),
                );
            }
            Ok(attachment)
        })?;

        if let Some(attachment) = &attachment {
            info!(attachment_id = attachment.id, issue_id = attachment.issue_id, "Attachment added");
        }
        Ok(attachment)
    }

    /// Move an issue through its lifecycle.
    ///
    /// With `expected_version`, the transition only applies if the issue is
    /// still at that version.
    ///
    /// # Errors
    ///
    /// Returns a permission, validation, invalid-transition or version
    /// conflict error; the issue is left untouched in every case.
    pub fn transition(
        &mut self,
        actor: &Actor,
        issue_id: i64,
        transition: &Transition,
        expected_version: Option<i64>,
    ) -> Result<Issue> {
        let name = transition.name();

        let issue = self.write(actor, name, |conn, journal| {
            let current = IssueRepo::require(conn, issue_id)?;
            let allowed = match transition {
                Transition::Approve { .. } | Transition::Reject { .. } | Transition::Verify => {
                    actor.can_review(&current)
                }
                Transition::Resolve => actor.can_resolve(&current),
                Transition::Override { .. } => actor.can_override(),
            };
            actor.ensure(allowed, name)?;

            if let Some(expected) = expected_version {
                if expected != current.version {
                    return Err(Error::VersionConflict {
                        entity: "issue",
                        id: issue_id,
                        expected,
                        actual: current.version,
                    });
                }
            }

            let ctx = TransitionContext {
                actor_id: actor.id(),
                now: journal.now(),
                after_photos: AttachmentRepo::count_after_photos(conn, issue_id)?,
            };
            let applied = workflow::apply(&current, transition, &ctx)?;
            IssueRepo::update(conn, &applied.issue, current.version)?;
            journal.record(transition.action(), EntityKind::Issue, issue_id, applied.detail);
            Ok(applied.issue)
        })?;

        info!(
            issue_id,
            action = name,
            status = %issue.status,
            version = issue.version,
            "Issue updated"
        );
        Ok(issue)
    }

    /// An issue with its attachments and history.
    ///
    /// # Errors
    ///
    /// Returns an error if the issue does not exist or is not visible.
    pub fn issue(&self, actor: &Actor, id: i64) -> Result<IssueDetail> {
        let conn = self.store.conn();
        let issue = IssueRepo::require(conn, id)?;
        actor.ensure(actor.can_see(&issue), "view this issue")?;

        Ok(IssueDetail {
            attachments: AttachmentRepo::list(conn, Some(id))?,
            history: LogRepo::list(conn, &LogFilter::for_entity(EntityKind::Issue, id))?,
            issue,
        })
    }

    /// Issues visible to the actor that match the query, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn issues(&self, actor: &Actor, query: &IssueQuery) -> Result<Vec<Issue>> {
        let stored = IssueRepo::list(self.store.conn(), query.project_id, query.status)?;
        let visible: Vec<Issue> = stored.into_iter().filter(|i| actor.can_see(i)).collect();
        Ok(query.select(&visible).into_iter().cloned().collect())
    }

    // === Log, statistics, snapshots ===

    /// System log entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is a worker or the query fails.
    pub fn log(&self, actor: &Actor, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        actor.ensure(actor.can_read_log(), "read the system log")?;
        LogRepo::list(self.store.conn(), filter)
    }

    /// Store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    /// Capture the whole store.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor is not an admin or the export fails.
    pub fn export(&self, actor: &Actor) -> Result<Snapshot> {
        actor.ensure(actor.can_manage_users(), "export the store")?;
        let snapshot = self.store.export_snapshot()?;
        info!(records = snapshot.record_count(), "Snapshot exported");
        Ok(snapshot)
    }

    /// Load a snapshot into this (empty) store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is not empty or the snapshot is invalid.
    pub fn import(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.store.import_snapshot(snapshot, None)
    }

    /// Names of users by id, for display.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn user_names(&self) -> Result<HashMap<i64, String>> {
        Ok(UserRepo::list(self.store.conn(), false)?
            .into_iter()
            .map(|u| (u.id, u.name))
            .collect())
    }
}
