//! Projects, their members, units and occupants.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{exists, fmt_opt_timestamp, fmt_timestamp, opt_timestamp_at, timestamp_at};
use crate::error::{Error, Result};
use crate::model::{Membership, NewOccupant, NewProject, NewUnit, Occupant, Project, Unit};

const PROJECT_COLUMNS: &str = "id, name, address, manager_id, created_at";
const UNIT_COLUMNS: &str = "id, project_id, label, floor, created_at";
const OCCUPANT_COLUMNS: &str = "id, unit_id, name, phone, email, moved_in_at, moved_out_at";

/// Queries and writes for the location tables.
#[derive(Debug)]
pub(crate) struct SiteRepo;

impl SiteRepo {
    // === Projects ===

    pub(crate) fn insert_project(
        conn: &Connection,
        new: &NewProject,
        now: DateTime<Utc>,
    ) -> Result<Project> {
        if exists(
            conn,
            "SELECT COUNT(*) FROM projects WHERE name = ?1 COLLATE NOCASE",
            [&new.name],
        )? {
            return Err(Error::duplicate("project", "name", &new.name));
        }

        conn.execute(
            "INSERT INTO projects (name, address, manager_id, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![new.name, new.address, new.manager_id, fmt_timestamp(&now)],
        )?;

        Ok(Project {
            id: conn.last_insert_rowid(),
            name: new.name.clone(),
            address: new.address.clone(),
            manager_id: new.manager_id,
            created_at: now,
        })
    }

    pub(crate) fn restore_project(conn: &Connection, project: &Project) -> Result<()> {
        conn.execute(
            &format!("INSERT INTO projects ({PROJECT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                project.id,
                project.name,
                project.address,
                project.manager_id,
                fmt_timestamp(&project.created_at),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn project(conn: &Connection, id: i64) -> Result<Option<Project>> {
        let project = conn
            .query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                [id],
                Self::row_to_project,
            )
            .optional()?;
        Ok(project)
    }

    pub(crate) fn require_project(conn: &Connection, id: i64) -> Result<Project> {
        Self::project(conn, id)?.ok_or_else(|| Error::not_found("project", id))
    }

    pub(crate) fn projects(conn: &Connection) -> Result<Vec<Project>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id"
        ))?;
        let projects = stmt
            .query_map([], Self::row_to_project)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    // === Membership ===

    /// Add a member. Returns `false` if they already belonged to the project.
    pub(crate) fn add_member(
        conn: &Connection,
        project_id: i64,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = conn.execute(
            r"
            INSERT OR IGNORE INTO project_members (project_id, user_id, added_at)
            VALUES (?1, ?2, ?3)
            ",
            params![project_id, user_id, fmt_timestamp(&now)],
        )?;
        Ok(affected > 0)
    }

    pub(crate) fn members(conn: &Connection, project_id: i64) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT user_id FROM project_members WHERE project_id = ?1 ORDER BY user_id",
        )?;
        let ids = stmt
            .query_map([project_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Insert a membership keeping its join time, for snapshot imports.
    pub(crate) fn restore_member(conn: &Connection, member: &Membership) -> Result<()> {
        conn.execute(
            "INSERT INTO project_members (project_id, user_id, added_at) VALUES (?1, ?2, ?3)",
            params![member.project_id, member.user_id, fmt_timestamp(&member.added_at)],
        )?;
        Ok(())
    }

    pub(crate) fn memberships(conn: &Connection) -> Result<Vec<Membership>> {
        let mut stmt = conn.prepare(
            "SELECT project_id, user_id, added_at FROM project_members ORDER BY project_id, user_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Membership {
                    project_id: row.get(0)?,
                    user_id: row.get(1)?,
                    added_at: timestamp_at(row, 2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Projects a user manages or belongs to.
    pub(crate) fn project_ids_for_user(conn: &Connection, user_id: i64) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(
            r"
            SELECT id FROM projects WHERE manager_id = ?1
            UNION
            SELECT project_id FROM project_members WHERE user_id = ?1
            ORDER BY 1
            ",
        )?;
        let ids = stmt
            .query_map([user_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    // === Units ===

    pub(crate) fn insert_unit(conn: &Connection, new: &NewUnit, now: DateTime<Utc>) -> Result<Unit> {
        if exists(
            conn,
            "SELECT COUNT(*) FROM units WHERE project_id = ?1 AND label = ?2 COLLATE NOCASE",
            params![new.project_id, new.label],
        )? {
            return Err(Error::duplicate("unit", "label", &new.label));
        }

        conn.execute(
            "INSERT INTO units (project_id, label, floor, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![new.project_id, new.label, new.floor, fmt_timestamp(&now)],
        )?;

        Ok(Unit {
            id: conn.last_insert_rowid(),
            project_id: new.project_id,
            label: new.label.clone(),
            floor: new.floor,
            created_at: now,
        })
    }

    pub(crate) fn restore_unit(conn: &Connection, unit: &Unit) -> Result<()> {
        conn.execute(
            &format!("INSERT INTO units ({UNIT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
            params![
                unit.id,
                unit.project_id,
                unit.label,
                unit.floor,
                fmt_timestamp(&unit.created_at),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn unit(conn: &Connection, id: i64) -> Result<Option<Unit>> {
        let unit = conn
            .query_row(
                &format!("SELECT {UNIT_COLUMNS} FROM units WHERE id = ?1"),
                [id],
                Self::row_to_unit,
            )
            .optional()?;
        Ok(unit)
    }

    pub(crate) fn require_unit(conn: &Connection, id: i64) -> Result<Unit> {
        Self::unit(conn, id)?.ok_or_else(|| Error::not_found("unit", id))
    }

    /// Units of one project, or of every project.
    pub(crate) fn units(conn: &Connection, project_id: Option<i64>) -> Result<Vec<Unit>> {
        let units = if let Some(project_id) = project_id {
            let mut stmt = conn.prepare(&format!(
                "SELECT {UNIT_COLUMNS} FROM units WHERE project_id = ?1 ORDER BY label"
            ))?;
            let rows = stmt
                .query_map([project_id], Self::row_to_unit)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        } else {
            let mut stmt = conn.prepare(&format!("SELECT {UNIT_COLUMNS} FROM units ORDER BY id"))?;
            let rows = stmt
                .query_map([], Self::row_to_unit)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };
        Ok(units)
    }

    // === Occupants ===

    pub(crate) fn insert_occupant(
        conn: &Connection,
        new: &NewOccupant,
        now: DateTime<Utc>,
    ) -> Result<Occupant> {
        conn.execute(
            r"
            INSERT INTO occupants (unit_id, name, phone, email, moved_in_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![new.unit_id, new.name, new.phone, new.email, fmt_timestamp(&now)],
        )?;

        Ok(Occupant {
            id: conn.last_insert_rowid(),
            unit_id: new.unit_id,
            name: new.name.clone(),
            phone: new.phone.clone(),
            email: new.email.clone(),
            moved_in_at: now,
            moved_out_at: None,
        })
    }

    pub(crate) fn restore_occupant(conn: &Connection, occupant: &Occupant) -> Result<()> {
        conn.execute(
            &format!("INSERT INTO occupants ({OCCUPANT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                occupant.id,
                occupant.unit_id,
                occupant.name,
                occupant.phone,
                occupant.email,
                fmt_timestamp(&occupant.moved_in_at),
                fmt_opt_timestamp(occupant.moved_out_at.as_ref()),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn occupant(conn: &Connection, id: i64) -> Result<Option<Occupant>> {
        let occupant = conn
            .query_row(
                &format!("SELECT {OCCUPANT_COLUMNS} FROM occupants WHERE id = ?1"),
                [id],
                Self::row_to_occupant,
            )
            .optional()?;
        Ok(occupant)
    }

    /// Occupants of a unit (or of all units); past occupants only when asked for.
    pub(crate) fn occupants(
        conn: &Connection,
        unit_id: Option<i64>,
        include_past: bool,
    ) -> Result<Vec<Occupant>> {
        let mut stmt = conn.prepare(&format!(
            r"
            SELECT {OCCUPANT_COLUMNS} FROM occupants
            WHERE (?1 IS NULL OR unit_id = ?1) AND (?2 OR moved_out_at IS NULL)
            ORDER BY unit_id, moved_in_at
            "
        ))?;
        let rows = stmt
            .query_map(params![unit_id, include_past], Self::row_to_occupant)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Record a move-out. Returns `false` if the occupant had already left.
    pub(crate) fn move_out(conn: &Connection, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let affected = conn.execute(
            "UPDATE occupants SET moved_out_at = ?1 WHERE id = ?2 AND moved_out_at IS NULL",
            params![fmt_timestamp(&now), id],
        )?;
        Ok(affected > 0)
    }

    fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
        Ok(Project {
            id: row.get(0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            manager_id: row.get(3)?,
            created_at: timestamp_at(row, 4)?,
        })
    }

    fn row_to_unit(row: &rusqlite::Row) -> rusqlite::Result<Unit> {
        Ok(Unit {
            id: row.get(0)?,
            project_id: row.get(1)?,
            label: row.get(2)?,
            floor: row.get(3)?,
            created_at: timestamp_at(row, 4)?,
        })
    }

    fn row_to_occupant(row: &rusqlite::Row) -> rusqlite::Result<Occupant> {
        Ok(Occupant {
            id: row.get(0)?,
            unit_id: row.get(1)?,
            name: row.get(2)?,
            phone: row.get(3)?,
            email: row.get(4)?,
            moved_in_at: timestamp_at(row, 5)?,
            moved_out_at: opt_timestamp_at(row, 6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{add_project, add_user, store};
    use super::super::Store;
    use super::*;
    use crate::model::Role;

    fn add_unit(store: &mut Store, project_id: i64, label: &str) -> Result<Unit> {
        let new = NewUnit {
            project_id,
            label: label.to_string(),
            floor: Some(2),
        };
        store.mutate(None, "add_unit", |conn, journal| {
            SiteRepo::insert_unit(conn, &new, journal.now())
        })
    }

    #[test]
    fn test_project_insert_and_duplicate_name() {
        let mut store = store();
        let id = add_project(&mut store, "Harbour View", None);
        let project = SiteRepo::require_project(store.conn(), id).unwrap();
        assert_eq!(project.name, "Harbour View");

        let dup = NewProject {
            name: "harbour view".to_string(),
            address: None,
            manager_id: None,
        };
        let err = store
            .mutate(None, "dup", |conn, journal| {
                SiteRepo::insert_project(conn, &dup, journal.now())
            })
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_project_ids_for_user_covers_manager_and_member() {
        let mut store = store();
        let manager = add_user(&mut store, "Mia", Role::Manager);
        let worker = add_user(&mut store, "Wes", Role::Worker);
        let managed = add_project(&mut store, "North", Some(manager.id));
        let joined = add_project(&mut store, "South", None);
        add_project(&mut store, "East", None);

        store
            .mutate(None, "members", |conn, journal| {
                SiteRepo::add_member(conn, joined, manager.id, journal.now())?;
                SiteRepo::add_member(conn, joined, worker.id, journal.now())
            })
            .unwrap();

        assert_eq!(
            SiteRepo::project_ids_for_user(store.conn(), manager.id).unwrap(),
            vec![managed, joined]
        );
        assert_eq!(
            SiteRepo::project_ids_for_user(store.conn(), worker.id).unwrap(),
            vec![joined]
        );
        assert_eq!(SiteRepo::members(store.conn(), joined).unwrap().len(), 2);
        assert_eq!(SiteRepo::memberships(store.conn()).unwrap().len(), 2);
    }

    #[test]
    fn test_add_member_twice_is_a_no_op() {
        let mut store = store();
        let worker = add_user(&mut store, "Wes", Role::Worker);
        let project = add_project(&mut store, "North", None);

        let first = store
            .mutate(None, "m", |conn, j| SiteRepo::add_member(conn, project, worker.id, j.now()))
            .unwrap();
        let second = store
            .mutate(None, "m", |conn, j| SiteRepo::add_member(conn, project, worker.id, j.now()))
            .unwrap();
        assert!(first);
        assert!(!second);
    }

    #[test]
    fn test_unit_labels_unique_per_project() {
        let mut store = store();
        let north = add_project(&mut store, "North", None);
        let south = add_project(&mut store, "South", None);

        add_unit(&mut store, north, "A-101").unwrap();
        add_unit(&mut store, south, "A-101").unwrap();
        let err = add_unit(&mut store, north, "a-101").unwrap_err();
        assert!(err.is_validation());

        assert_eq!(SiteRepo::units(store.conn(), Some(north)).unwrap().len(), 1);
        assert_eq!(SiteRepo::units(store.conn(), None).unwrap().len(), 2);
    }

    #[test]
    fn test_unit_requires_existing_project() {
        let mut store = store();
        assert!(add_unit(&mut store, 404, "X").is_err());
    }

    #[test]
    fn test_occupant_move_out() {
        let mut store = store();
        let project = add_project(&mut store, "North", None);
        let unit = add_unit(&mut store, project, "B-2").unwrap();
        let new = NewOccupant {
            unit_id: unit.id,
            name: "Dana".to_string(),
            phone: Some("555-0100".to_string()),
            email: None,
        };
        let occupant = store
            .mutate(None, "occ", |conn, j| SiteRepo::insert_occupant(conn, &new, j.now()))
            .unwrap();
        assert!(occupant.is_current());

        let moved = store
            .mutate(None, "out", |conn, j| SiteRepo::move_out(conn, occupant.id, j.now()))
            .unwrap();
        assert!(moved);
        let again = store
            .mutate(None, "out", |conn, j| SiteRepo::move_out(conn, occupant.id, j.now()))
            .unwrap();
        assert!(!again);

        assert!(SiteRepo::occupants(store.conn(), Some(unit.id), false)
            .unwrap()
            .is_empty());
        let all = SiteRepo::occupants(store.conn(), Some(unit.id), true).unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_current());
        assert!(SiteRepo::occupant(store.conn(), occupant.id).unwrap().is_some());
    }
}
