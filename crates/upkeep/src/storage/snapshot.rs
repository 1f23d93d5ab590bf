//! Whole-store JSON snapshots for backup and migration.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{AttachmentRepo, IssueRepo, LogFilter, LogRepo, SiteRepo, Store, UserRepo};
use crate::error::{Error, Result};
use crate::model::{
    Action, Attachment, EntityKind, Issue, LogEntry, Membership, Occupant, Project, Unit, User,
};

/// Version of the snapshot layout written by this build.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Every record in the store, serialized as one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Layout version; must equal [`SNAPSHOT_FORMAT_VERSION`] to import.
    pub format_version: u32,
    /// When the snapshot was taken.
    pub exported_at: DateTime<Utc>,
    /// Users, active and deactivated.
    pub users: Vec<User>,
    /// Projects.
    pub projects: Vec<Project>,
    /// Project membership pairs.
    #[serde(default)]
    pub project_members: Vec<Membership>,
    /// Units.
    pub units: Vec<Unit>,
    /// Occupants, current and past.
    pub occupants: Vec<Occupant>,
    /// Issues in every state.
    pub issues: Vec<Issue>,
    /// Attachments.
    pub attachments: Vec<Attachment>,
    /// The system log, oldest first.
    pub logs: Vec<LogEntry>,
}

impl Snapshot {
    /// Read a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a snapshot.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Write the snapshot as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Total number of records, logs included.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.users.len()
            + self.projects.len()
            + self.project_members.len()
            + self.units.len()
            + self.occupants.len()
            + self.issues.len()
            + self.attachments.len()
            + self.logs.len()
    }
}

impl Store {
    /// Capture every record in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn export_snapshot(&self) -> Result<Snapshot> {
        let conn = self.conn();
        let mut logs = LogRepo::list(conn, &LogFilter::default())?;
        logs.reverse();
        let mut issues = IssueRepo::list(conn, None, None)?;
        issues.reverse();

        Ok(Snapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            exported_at: Utc::now(),
            users: UserRepo::list(conn, false)?,
            projects: SiteRepo::projects(conn)?,
            project_members: SiteRepo::memberships(conn)?,
            units: SiteRepo::units(conn, None)?,
            occupants: SiteRepo::occupants(conn, None, true)?,
            issues,
            attachments: AttachmentRepo::list(conn, None)?,
            logs,
        })
    }

    /// Load a snapshot into an empty store, keeping every identifier.
    ///
    /// The import itself is logged on top of the restored history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreNotEmpty`] if the store already holds users,
    /// a validation error for an unsupported format version, or a database
    /// error if the snapshot is inconsistent (nothing is imported then).
    pub fn import_snapshot(&mut self, snapshot: &Snapshot, actor_id: Option<i64>) -> Result<()> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(Error::validation(
                "format_version",
                format!(
                    "unsupported snapshot format {} (expected {SNAPSHOT_FORMAT_VERSION})",
                    snapshot.format_version
                ),
            ));
        }

        self.mutate(actor_id, "import_snapshot", |conn, journal| {
            let users = UserRepo::count(conn)?;
            if users > 0 {
                return Err(Error::StoreNotEmpty { users });
            }

            for user in &snapshot.users {
                UserRepo::restore(conn, user)?;
            }
            for project in &snapshot.projects {
                SiteRepo::restore_project(conn, project)?;
            }
            for member in &snapshot.project_members {
                SiteRepo::restore_member(conn, member)?;
            }
            for unit in &snapshot.units {
                SiteRepo::restore_unit(conn, unit)?;
            }
            for occupant in &snapshot.occupants {
                SiteRepo::restore_occupant(conn, occupant)?;
            }
            for issue in &snapshot.issues {
                IssueRepo::restore(conn, issue)?;
            }
            for attachment in &snapshot.attachments {
                AttachmentRepo::restore(conn, attachment)?;
            }
            for entry in &snapshot.logs {
                LogRepo::restore(conn, entry)?;
            }

            journal.record(
                Action::SnapshotImported,
                EntityKind::Store,
                0,
                format!(
                    "imported {} records exported at {}",
                    snapshot.record_count(),
                    snapshot.exported_at.to_rfc3339()
                ),
            );
            Ok(())
        })?;

        info!(records = snapshot.record_count(), "Snapshot imported");
        Ok(())
    }
}
