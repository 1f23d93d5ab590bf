//! User records.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{enum_at, fmt_timestamp, timestamp_at};
use crate::error::{Error, Result};
use crate::model::{NewUser, User};

const USER_COLUMNS: &str = "id, name, email, phone, role, active, created_at, updated_at";

/// Queries and writes for the `users` table.
#[derive(Debug)]
pub(crate) struct UserRepo;

impl UserRepo {
    /// Insert a user; emails are unique regardless of case.
    pub(crate) fn insert(conn: &Connection, new: &NewUser, now: DateTime<Utc>) -> Result<User> {
        if let Some(existing) = Self::find_by_email(conn, &new.email)? {
            return Err(Error::duplicate("user", "email", existing.email));
        }

        conn.execute(
            r"
            INSERT INTO users (name, email, phone, role, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
            ",
            params![
                new.name,
                new.email,
                new.phone,
                new.role.as_str(),
                fmt_timestamp(&now),
            ],
        )?;

        Ok(User {
            id: conn.last_insert_rowid(),
            name: new.name.clone(),
            email: new.email.clone(),
            phone: new.phone.clone(),
            role: new.role,
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Insert a user keeping its identifier, for snapshot imports.
    pub(crate) fn restore(conn: &Connection, user: &User) -> Result<()> {
        conn.execute(
            &format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                user.id,
                user.name,
                user.email,
                user.phone,
                user.role.as_str(),
                user.active,
                fmt_timestamp(&user.created_at),
                fmt_timestamp(&user.updated_at),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn get(conn: &Connection, id: i64) -> Result<Option<User>> {
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// Like [`UserRepo::get`], but a missing user is an error.
    pub(crate) fn require(conn: &Connection, id: i64) -> Result<User> {
        Self::get(conn, id)?.ok_or_else(|| Error::not_found("user", id))
    }

    pub(crate) fn find_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
        let user = conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 COLLATE NOCASE"),
                [email],
                Self::row_to_user,
            )
            .optional()?;
        Ok(user)
    }

    /// List users by id. Deactivated users are included unless `active_only`.
    pub(crate) fn list(conn: &Connection, active_only: bool) -> Result<Vec<User>> {
        let sql = if active_only {
            format!("SELECT {USER_COLUMNS} FROM users WHERE active = 1 ORDER BY id")
        } else {
            format!("SELECT {USER_COLUMNS} FROM users ORDER BY id")
        };
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map([], Self::row_to_user)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Flip the `active` flag. Returns `false` if the user does not exist.
    pub(crate) fn set_active(
        conn: &Connection,
        id: i64,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = conn.execute(
            "UPDATE users SET active = ?1, updated_at = ?2 WHERE id = ?3",
            params![active, fmt_timestamp(&now), id],
        )?;
        Ok(affected > 0)
    }

    pub(crate) fn count(conn: &Connection) -> Result<i64> {
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            role: enum_at(row, 4)?,
            active: row.get(5)?,
            created_at: timestamp_at(row, 6)?,
            updated_at: timestamp_at(row, 7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{add_user, store};
    use super::*;
    use crate::model::Role;

    #[test]
    fn test_insert_and_get() {
        let mut store = store();
        let user = add_user(&mut store, "Ada", Role::Manager);

        let fetched = UserRepo::get(store.conn(), user.id).unwrap().unwrap();
        assert_eq!(fetched, user);
        assert!(fetched.active);
        assert_eq!(fetched.role, Role::Manager);
    }

    #[test]
    fn test_duplicate_email_is_rejected_case_insensitively() {
        let mut store = store();
        add_user(&mut store, "Ada", Role::Worker);

        let dup = NewUser {
            name: "Other Ada".to_string(),
            email: "ADA@example.com".to_string(),
            phone: None,
            role: Role::Worker,
        };
        let err = store
            .mutate(None, "dup", |conn, journal| {
                UserRepo::insert(conn, &dup, journal.now())
            })
            .unwrap_err();
        assert!(matches!(err, Error::Duplicate { field: "email", .. }));
    }

    #[test]
    fn test_require_missing_user() {
        let store = store();
        let err = UserRepo::require(store.conn(), 404).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_deactivated_user_stays_listed() {
        let mut store = store();
        let ada = add_user(&mut store, "Ada", Role::Worker);
        add_user(&mut store, "Bob", Role::Worker);

        let changed = store
            .mutate(None, "deactivate", |conn, journal| {
                UserRepo::set_active(conn, ada.id, false, journal.now())
            })
            .unwrap();
        assert!(changed);

        let all = UserRepo::list(store.conn(), false).unwrap();
        assert_eq!(all.len(), 2);
        assert!(!all.iter().find(|u| u.id == ada.id).unwrap().active);

        let active = UserRepo::list(store.conn(), true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Bob");
    }

    #[test]
    fn test_set_active_missing_user() {
        let mut store = store();
        let changed = store
            .mutate(None, "deactivate", |conn, journal| {
                UserRepo::set_active(conn, 77, false, journal.now())
            })
            .unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_find_by_email() {
        let mut store = store();
        let ada = add_user(&mut store, "Ada", Role::Admin);

        let found = UserRepo::find_by_email(store.conn(), "Ada@Example.com")
            .unwrap()
            .unwrap();
        assert_eq!(found.id, ada.id);
        assert!(UserRepo::find_by_email(store.conn(), "nobody@example.com")
            .unwrap()
            .is_none());
        assert_eq!(UserRepo::count(store.conn()).unwrap(), 1);
    }
}
