//! Issue records.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{enum_at, fmt_opt_timestamp, fmt_timestamp, opt_timestamp_at, timestamp_at};
use crate::error::{Error, Result};
use crate::model::{Issue, IssueStatus, Location, NewIssue, Priority};

const ISSUE_COLUMNS: &str = r"
    id, project_id, reporter_id, unit_id, common_area, cause, category, description,
    status, verified, priority, vendor, approved_by, approved_at, approval_note,
    rejection_reason, rejected_by, rejected_at, resolved_by, resolved_at,
    verified_by, verified_at, created_at, updated_at, version
";

/// Queries and writes for the `issues` table.
#[derive(Debug)]
pub(crate) struct IssueRepo;

impl IssueRepo {
    /// Insert a freshly reported issue: open, unverified, version 1.
    pub(crate) fn insert(
        conn: &Connection,
        reporter_id: i64,
        new: &NewIssue,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Result<Issue> {
        let (unit_id, common_area) = split_location(&new.location);
        conn.execute(
            r"
            INSERT INTO issues (
                project_id, reporter_id, unit_id, common_area, cause, category, description,
                status, verified, priority, created_at, updated_at, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?10, 1)
            ",
            params![
                new.project_id,
                reporter_id,
                unit_id,
                common_area,
                new.cause.as_str(),
                new.category.as_str(),
                new.description,
                IssueStatus::Open.as_str(),
                priority.as_str(),
                fmt_timestamp(&now),
            ],
        )?;

        Ok(Issue {
            id: conn.last_insert_rowid(),
            project_id: new.project_id,
            reporter_id,
            location: new.location.clone(),
            cause: new.cause,
            category: new.category,
            description: new.description.clone(),
            status: IssueStatus::Open,
            verified: false,
            priority,
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
        })
    }

    /// Insert an issue exactly as given, for snapshot imports.
    pub(crate) fn restore(conn: &Connection, issue: &Issue) -> Result<()> {
        let (unit_id, common_area) = split_location(&issue.location);
        conn.execute(
            &format!(
                r"
                INSERT INTO issues ({ISSUE_COLUMNS}) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                    ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
                )
                "
            ),
            params![
                issue.id,
                issue.project_id,
                issue.reporter_id,
                unit_id,
                common_area,
                issue.cause.as_str(),
                issue.category.as_str(),
                issue.description,
                issue.status.as_str(),
                issue.verified,
                issue.priority.as_str(),
                issue.vendor,
                issue.approved_by,
                fmt_opt_timestamp(issue.approved_at.as_ref()),
                issue.approval_note,
                issue.rejection_reason,
                issue.rejected_by,
                fmt_opt_timestamp(issue.rejected_at.as_ref()),
                issue.resolved_by,
                fmt_opt_timestamp(issue.resolved_at.as_ref()),
                issue.verified_by,
                fmt_opt_timestamp(issue.verified_at.as_ref()),
                fmt_timestamp(&issue.created_at),
                fmt_timestamp(&issue.updated_at),
                issue.version,
            ],
        )?;
        Ok(())
    }

    pub(crate) fn get(conn: &Connection, id: i64) -> Result<Option<Issue>> {
        let issue = conn
            .query_row(
                &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1"),
                [id],
                Self::row_to_issue,
            )
            .optional()?;
        Ok(issue)
    }

    pub(crate) fn require(conn: &Connection, id: i64) -> Result<Issue> {
        Self::get(conn, id)?.ok_or_else(|| Error::not_found("issue", id))
    }

    /// Issues newest first, optionally narrowed to a project and a status.
    pub(crate) fn list(
        conn: &Connection,
        project_id: Option<i64>,
        status: Option<IssueStatus>,
    ) -> Result<Vec<Issue>> {
        let mut stmt = conn.prepare(&format!(
            r"
            SELECT {ISSUE_COLUMNS} FROM issues
            WHERE (?1 IS NULL OR project_id = ?1) AND (?2 IS NULL OR status = ?2)
            ORDER BY id DESC
            "
        ))?;
        let issues = stmt
            .query_map(
                params![project_id, status.map(|s| s.as_str())],
                Self::row_to_issue,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(issues)
    }

    /// Write back a transitioned issue.
    ///
    /// `issue.version` must already be bumped; the row is only updated if it
    /// still holds `expected_version`. Otherwise another writer got there
    /// first and [`Error::VersionConflict`] is returned.
    pub(crate) fn update(conn: &Connection, issue: &Issue, expected_version: i64) -> Result<()> {
        let affected = conn.execute(
            r"
            UPDATE issues SET
                status = ?1, verified = ?2, priority = ?3, vendor = ?4,
                approved_by = ?5, approved_at = ?6, approval_note = ?7,
                rejection_reason = ?8, rejected_by = ?9, rejected_at = ?10,
                resolved_by = ?11, resolved_at = ?12,
                verified_by = ?13, verified_at = ?14,
                updated_at = ?15, version = ?16
            WHERE id = ?17 AND version = ?18
            ",
            params![
                issue.status.as_str(),
                issue.verified,
                issue.priority.as_str(),
                issue.vendor,
                issue.approved_by,
                fmt_opt_timestamp(issue.approved_at.as_ref()),
                issue.approval_note,
                issue.rejection_reason,
                issue.rejected_by,
                fmt_opt_timestamp(issue.rejected_at.as_ref()),
                issue.resolved_by,
                fmt_opt_timestamp(issue.resolved_at.as_ref()),
                issue.verified_by,
                fmt_opt_timestamp(issue.verified_at.as_ref()),
                fmt_timestamp(&issue.updated_at),
                issue.version,
                issue.id,
                expected_version,
            ],
        )?;

        if affected == 0 {
            let actual: Option<i64> = conn
                .query_row(
                    "SELECT version FROM issues WHERE id = ?1",
                    [issue.id],
                    |row| row.get(0),
                )
                .optional()?;
            return Err(match actual {
                Some(actual) => Error::VersionConflict {
                    entity: "issue",
                    id: issue.id,
                    expected: expected_version,
                    actual,
                },
                None => Error::not_found("issue", issue.id),
            });
        }
        Ok(())
    }

    fn row_to_issue(row: &rusqlite::Row) -> rusqlite::Result<Issue> {
        let unit_id: Option<i64> = row.get(3)?;
        let common_area: Option<String> = row.get(4)?;
        let location = match (unit_id, common_area) {
            (Some(unit_id), _) => Location::Unit(unit_id),
            (None, Some(area)) => Location::CommonArea(area),
            (None, None) => {
                return Err(rusqlite::Error::InvalidColumnType(
                    3,
                    "unit_id".to_string(),
                    rusqlite::types::Type::Null,
                ))
            }
        };

        Ok(Issue {
            id: row.get(0)?,
            project_id: row.get(1)?,
            reporter_id: row.get(2)?,
            location,
            cause: enum_at(row, 5)?,
            category: enum_at(row, 6)?,
            description: row.get(7)?,
            status: enum_at(row, 8)?,
            verified: row.get(9)?,
            priority: enum_at(row, 10)?,
            vendor: row.get(11)?,
            approved_by: row.get(12)?,
            approved_at: opt_timestamp_at(row, 13)?,
            approval_note: row.get(14)?,
            rejection_reason: row.get(15)?,
            rejected_by: row.get(16)?,
            rejected_at: opt_timestamp_at(row, 17)?,
            resolved_by: row.get(18)?,
            resolved_at: opt_timestamp_at(row, 19)?,
            verified_by: row.get(20)?,
            verified_at: opt_timestamp_at(row, 21)?,
            created_at: timestamp_at(row, 22)?,
            updated_at: timestamp_at(row, 23)?,
            version: row.get(24)?,
        })
    }
}

fn split_location(location: &Location) -> (Option<i64>, Option<&str>) {
    match location {
        Location::Unit(id) => (Some(*id), None),
        Location::CommonArea(area) => (None, Some(area.as_str())),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{add_project, add_user, report, store};
    use super::*;
    use crate::model::{Category, Cause, Role};

    #[test]
    fn test_insert_starts_open_and_unverified() {
        let mut store = store();
        let worker = add_user(&mut store, "Wes", Role::Worker);
        let project = add_project(&mut store, "North", None);

        let issue = report(&mut store, worker.id, project);
        assert_eq!(issue.status, IssueStatus::Open);
        assert!(!issue.verified);
        assert_eq!(issue.version, 1);

        let stored = IssueRepo::require(store.conn(), issue.id).unwrap();
        assert_eq!(stored, issue);
    }

    #[test]
    fn test_update_checks_version() {
        let mut store = store();
        let worker = add_user(&mut store, "Wes", Role::Worker);
        let project = add_project(&mut store, "North", None);
        let issue = report(&mut store, worker.id, project);

        let mut first = issue.clone();
        first.priority = Priority::High;
        first.version += 1;
        store
            .mutate(None, "bump", |conn, _| IssueRepo::update(conn, &first, issue.version))
            .unwrap();

        let mut stale = issue.clone();
        stale.priority = Priority::Low;
        stale.version += 1;
        let err = store
            .mutate(None, "stale", |conn, _| IssueRepo::update(conn, &stale, issue.version))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));

        let stored = IssueRepo::require(store.conn(), issue.id).unwrap();
        assert_eq!(stored.priority, Priority::High);
    }

    #[test]
    fn test_update_missing_issue() {
        let mut store = store();
        let worker = add_user(&mut store, "Wes", Role::Worker);
        let project = add_project(&mut store, "North", None);
        let mut issue = report(&mut store, worker.id, project);
        issue.id = 999;

        let err = store
            .mutate(None, "missing", |conn, _| IssueRepo::update(conn, &issue, 1))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_verified_requires_resolved_in_storage() {
        let mut store = store();
        let worker = add_user(&mut store, "Wes", Role::Worker);
        let project = add_project(&mut store, "North", None);
        let issue = report(&mut store, worker.id, project);

        let mut bad = issue.clone();
        bad.verified = true;
        bad.version += 1;
        let result = store.mutate(None, "bad", |conn, _| IssueRepo::update(conn, &bad, 1));
        assert!(result.is_err());
    }

    #[test]
    fn test_list_filters() {
        let mut store = store();
        let worker = add_user(&mut store, "Wes", Role::Worker);
        let north = add_project(&mut store, "North", None);
        let south = add_project(&mut store, "South", None);
        let first = report(&mut store, worker.id, north);
        let second = report(&mut store, worker.id, north);
        report(&mut store, worker.id, south);

        let all = IssueRepo::list(store.conn(), None, None).unwrap();
        assert_eq!(all.len(), 3);

        let north_only = IssueRepo::list(store.conn(), Some(north), None).unwrap();
        assert_eq!(
            north_only.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        let open = IssueRepo::list(store.conn(), None, Some(IssueStatus::Open)).unwrap();
        assert_eq!(open.len(), 3);
        let rejected = IssueRepo::list(store.conn(), None, Some(IssueStatus::Rejected)).unwrap();
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_unit_location_round_trips() {
        let mut store = store();
        let worker = add_user(&mut store, "Wes", Role::Worker);
        let project = add_project(&mut store, "North", None);
        let unit = store
            .mutate(None, "unit", |conn, j| {
                super::super::SiteRepo::insert_unit(
                    conn,
                    &crate::model::NewUnit {
                        project_id: project,
                        label: "A-1".to_string(),
                        floor: None,
                    },
                    j.now(),
                )
            })
            .unwrap();

        let new = NewIssue {
            project_id: project,
            location: Location::Unit(unit.id),
            cause: Cause::Damage,
            category: Category::Electrical,
            description: "Outlet sparks".to_string(),
            priority: Some(Priority::High),
        };
        let issue = store
            .mutate(None, "report", |conn, j| {
                IssueRepo::insert(conn, worker.id, &new, Priority::High, j.now())
            })
            .unwrap();

        let stored = IssueRepo::require(store.conn(), issue.id).unwrap();
        assert_eq!(stored.location, Location::Unit(unit.id));
        assert_eq!(stored.priority, Priority::High);
    }
}
