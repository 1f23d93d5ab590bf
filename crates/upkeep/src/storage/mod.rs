//! Storage layer for upkeep.
//!
//! This module is the single persistence boundary of the tracker: one
//! `SQLite` database holding users, projects, units, occupants, issues,
//! attachments and the system log.
//!
//! Reads go straight to the connection. Writes go through [`Store::mutate`],
//! which runs the change inside an `IMMEDIATE` transaction so concurrent
//! writers (another shell, another process) serialize instead of silently
//! overwriting each other, and appends the change's audit entries in the same
//! transaction.

mod attachments;
mod issues;
mod logs;
pub mod migrations;
pub mod schema;
mod sites;
mod snapshot;
mod users;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use tracing::{debug, info, trace};

use crate::error::{Error, Result};
use crate::model::{Action, EntityKind};

pub(crate) use attachments::AttachmentRepo;
pub(crate) use issues::IssueRepo;
pub use logs::LogFilter;
pub(crate) use logs::LogRepo;
pub(crate) use sites::SiteRepo;
pub use snapshot::{Snapshot, SNAPSHOT_FORMAT_VERSION};
pub(crate) use users::UserRepo;

/// Default time a writer waits for another writer's lock.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent store for all tracker records.
#[derive(Debug)]
pub struct Store {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Store {
    /// Open or create a store at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist
    /// and brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open or create a store, waiting up to `busy_timeout` for other writers.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open_with_timeout(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read-only access for queries.
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a mutation atomically.
    ///
    /// The closure receives the open transaction and a [`Journal`] for the
    /// audit entries describing the change. On success the journal is written
    /// and the transaction committed; on error everything is rolled back and
    /// nothing is logged.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a database error if the transaction
    /// cannot be started, logged or committed.
    pub fn mutate<F, R>(&mut self, actor_id: Option<i64>, op: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Connection, &mut Journal) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut journal = Journal::new(actor_id);

        let result = match f(&*tx, &mut journal) {
            Ok(result) => result,
            Err(err) => {
                debug!(op, error = %err, "Mutation rolled back");
                return Err(err);
            }
        };

        for entry in &journal.entries {
            trace!(op, action = %entry.action, entity_id = entry.entity_id, "Appending log entry");
            tx.execute(
                r"
                INSERT INTO logs (actor_id, action, entity, entity_id, detail, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ",
                params![
                    journal.actor_id,
                    entry.action.as_str(),
                    entry.entity.as_str(),
                    entry.entity_id,
                    entry.detail,
                    fmt_timestamp(&journal.now),
                ],
            )?;
        }

        tx.commit()?;
        debug!(op, entries = journal.entries.len(), "Mutation committed");
        Ok(result)
    }

    /// Get store statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };
        let by_status = |status: &str| -> Result<i64> {
            Ok(self.conn.query_row(
                "SELECT COUNT(*) FROM issues WHERE status = ?1",
                [status],
                |row| row.get(0),
            )?)
        };

        let newest_activity: Option<String> = self
            .conn
            .query_row(
                "SELECT created_at FROM logs ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        let open = by_status("open")?;
        let in_progress = by_status("in_progress")?;
        let resolved = by_status("resolved")?;
        let rejected = by_status("rejected")?;
        let verified = count("SELECT COUNT(*) FROM issues WHERE verified = 1")?;

        Ok(StoreStats {
            users: count("SELECT COUNT(*) FROM users")?,
            active_users: count("SELECT COUNT(*) FROM users WHERE active = 1")?,
            projects: count("SELECT COUNT(*) FROM projects")?,
            units: count("SELECT COUNT(*) FROM units")?,
            current_occupants: count("SELECT COUNT(*) FROM occupants WHERE moved_out_at IS NULL")?,
            open_issues: open,
            in_progress_issues: in_progress,
            resolved_issues: resolved,
            rejected_issues: rejected,
            verified_issues: verified,
            active_issues: open + in_progress + (resolved - verified),
            archived_issues: rejected + verified,
            log_entries: count("SELECT COUNT(*) FROM logs")?,
            last_activity: newest_activity
                .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            db_size_bytes,
        })
    }
}

/// Audit entries collected while a mutation runs.
///
/// Every entry shares the mutation's actor and timestamp; [`Journal::now`]
/// is also the timestamp writers should stamp on the records they touch.
#[derive(Debug)]
pub struct Journal {
    actor_id: Option<i64>,
    now: DateTime<Utc>,
    entries: Vec<PendingEntry>,
}

#[derive(Debug)]
struct PendingEntry {
    action: Action,
    entity: EntityKind,
    entity_id: i64,
    detail: String,
}

impl Journal {
    fn new(actor_id: Option<i64>) -> Self {
        Self {
            actor_id,
            now: Utc::now().trunc_subsecs(6),
            entries: Vec::new(),
        }
    }

    /// The acting user, if any.
    #[must_use]
    pub fn actor_id(&self) -> Option<i64> {
        self.actor_id
    }

    /// Timestamp of this mutation.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Queue an audit entry.
    pub fn record(
        &mut self,
        action: Action,
        entity: EntityKind,
        entity_id: i64,
        detail: impl Into<String>,
    ) {
        self.entries.push(PendingEntry {
            action,
            entity,
            entity_id,
            detail: detail.into(),
        });
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Statistics about the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// All user records, active or not.
    pub users: i64,
    /// Users allowed to act.
    pub active_users: i64,
    /// Projects.
    pub projects: i64,
    /// Units across all projects.
    pub units: i64,
    /// Occupants who have not moved out.
    pub current_occupants: i64,
    /// Issues awaiting review.
    pub open_issues: i64,
    /// Approved issues being worked on.
    pub in_progress_issues: i64,
    /// Resolved issues, verified or not.
    pub resolved_issues: i64,
    /// Rejected issues.
    pub rejected_issues: i64,
    /// Resolved issues with confirmed repairs.
    pub verified_issues: i64,
    /// Issues still in the workflow.
    pub active_issues: i64,
    /// Rejected or verified issues.
    pub archived_issues: i64,
    /// System log length.
    pub log_entries: i64,
    /// Time of the latest logged mutation.
    pub last_activity: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Format a timestamp for storage.
///
/// Fixed precision keeps lexical order equal to chronological order.
pub(crate) fn fmt_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn fmt_opt_timestamp(ts: Option<&DateTime<Utc>>) -> Option<String> {
    ts.map(fmt_timestamp)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

/// Read a required timestamp column.
pub(crate) fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

/// Read a nullable timestamp column.
pub(crate) fn opt_timestamp_at(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

/// Read a string-backed enum column.
pub(crate) fn enum_at<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

/// Convert a result limit to an SQL parameter.
pub(crate) fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Whether a value is already in use, ignoring case.
pub(crate) fn exists(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<bool> {
    let count: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(count > 0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::model::{
        Category, Cause, Issue, Location, NewIssue, NewProject, NewUser, Priority, Role, User,
    };

    pub fn store() -> Store {
        crate::logging::init_test_logging();
        Store::open_in_memory().expect("failed to create test store")
    }

    pub fn add_user(store: &mut Store, name: &str, role: Role) -> User {
        let new = NewUser {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            phone: None,
            role,
        };
        store
            .mutate(None, "test_add_user", |conn, journal| {
                UserRepo::insert(conn, &new, journal.now())
            })
            .expect("failed to add user")
    }

    pub fn add_project(store: &mut Store, name: &str, manager_id: Option<i64>) -> i64 {
        let new = NewProject {
            name: name.to_string(),
            address: None,
            manager_id,
        };
        store
            .mutate(None, "test_add_project", |conn, journal| {
                SiteRepo::insert_project(conn, &new, journal.now())
            })
            .expect("failed to add project")
            .id
    }

    pub fn report(store: &mut Store, reporter_id: i64, project_id: i64) -> Issue {
        let new = NewIssue {
            project_id,
            location: Location::CommonArea("Lobby".to_string()),
            cause: Cause::WearAndTear,
            category: Category::Plumbing,
            description: "Dripping tap".to_string(),
            priority: None,
        };
        store
            .mutate(Some(reporter_id), "test_report", |conn, journal| {
                IssueRepo::insert(conn, reporter_id, &new, Priority::Medium, journal.now())
            })
            .expect("failed to report issue")
    }
}
