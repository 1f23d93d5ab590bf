//! System log records.
//!
//! Entries are written by [`Store::mutate`](super::Store::mutate) in the same
//! transaction as the change they describe; this module only reads them back
//! (and restores them from snapshots).

use rusqlite::{params, Connection};

use super::{enum_at, fmt_timestamp, limit_param, timestamp_at};
use crate::error::Result;
use crate::model::{Action, EntityKind, LogEntry};

const LOG_COLUMNS: &str = "id, actor_id, action, entity, entity_id, detail, created_at";

/// Narrows a log listing. The default returns everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Only entries about this kind of record.
    pub entity: Option<EntityKind>,
    /// Only entries about this record id (combine with `entity`).
    pub entity_id: Option<i64>,
    /// Only entries by this user.
    pub actor_id: Option<i64>,
    /// Only this action.
    pub action: Option<Action>,
    /// At most this many entries.
    pub limit: Option<usize>,
}

impl LogFilter {
    /// History of a single record.
    #[must_use]
    pub fn for_entity(entity: EntityKind, id: i64) -> Self {
        Self {
            entity: Some(entity),
            entity_id: Some(id),
            ..Self::default()
        }
    }
}

/// Queries for the `logs` table.
#[derive(Debug)]
pub(crate) struct LogRepo;

impl LogRepo {
    /// Matching entries, newest first.
    pub(crate) fn list(conn: &Connection, filter: &LogFilter) -> Result<Vec<LogEntry>> {
        let mut stmt = conn.prepare(&format!(
            r"
            SELECT {LOG_COLUMNS} FROM logs
            WHERE (?1 IS NULL OR entity = ?1)
              AND (?2 IS NULL OR entity_id = ?2)
              AND (?3 IS NULL OR actor_id = ?3)
              AND (?4 IS NULL OR action = ?4)
            ORDER BY id DESC
            LIMIT ?5
            "
        ))?;
        let limit = filter.limit.map_or(-1, limit_param);
        let entries = stmt
            .query_map(
                params![
                    filter.entity.map(|e| e.as_str()),
                    filter.entity_id,
                    filter.actor_id,
                    filter.action.map(|a| a.as_str()),
                    limit,
                ],
                Self::row_to_entry,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub(crate) fn restore(conn: &Connection, entry: &LogEntry) -> Result<()> {
        conn.execute(
            &format!("INSERT INTO logs ({LOG_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                entry.id,
                entry.actor_id,
                entry.action.as_str(),
                entry.entity.as_str(),
                entry.entity_id,
                entry.detail,
                fmt_timestamp(&entry.created_at),
            ],
        )?;
        Ok(())
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<LogEntry> {
        Ok(LogEntry {
            id: row.get(0)?,
            actor_id: row.get(1)?,
            action: enum_at(row, 2)?,
            entity: enum_at(row, 3)?,
            entity_id: row.get(4)?,
            detail: row.get(5)?,
            created_at: timestamp_at(row, 6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::store;
    use super::super::Store;
    use super::*;

    fn seed(store: &mut Store) {
        store
            .mutate(Some(1), "seed", |_, journal| {
                journal.record(Action::IssueReported, EntityKind::Issue, 10, "reported");
                journal.record(Action::IssueApproved, EntityKind::Issue, 10, "approved");
                journal.record(Action::IssueReported, EntityKind::Issue, 11, "reported");
                Ok(())
            })
            .unwrap();
        store
            .mutate(Some(2), "seed", |_, journal| {
                journal.record(Action::UserCreated, EntityKind::User, 2, "created");
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_list_newest_first() {
        let mut store = store();
        seed(&mut store);

        let entries = LogRepo::list(store.conn(), &LogFilter::default()).unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].action, Action::UserCreated);
        assert!(entries.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[test]
    fn test_filter_by_entity() {
        let mut store = store();
        seed(&mut store);

        let history =
            LogRepo::list(store.conn(), &LogFilter::for_entity(EntityKind::Issue, 10)).unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|e| e.entity_id == 10));
    }

    #[test]
    fn test_filter_by_actor_action_and_limit() {
        let mut store = store();
        seed(&mut store);

        let by_actor = LogRepo::list(
            store.conn(),
            &LogFilter {
                actor_id: Some(1),
                ..LogFilter::default()
            },
        )
        .unwrap();
        assert_eq!(by_actor.len(), 3);

        let reported = LogRepo::list(
            store.conn(),
            &LogFilter {
                action: Some(Action::IssueReported),
                limit: Some(1),
                ..LogFilter::default()
            },
        )
        .unwrap();
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0].entity_id, 11);
    }
}
