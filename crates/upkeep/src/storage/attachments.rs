//! Attachment records.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{enum_at, fmt_timestamp, timestamp_at};
use crate::error::Result;
use crate::model::{Attachment, AttachmentKind, AttachmentPhase, NewAttachment};

const ATTACHMENT_COLUMNS: &str =
    "id, issue_id, kind, phase, reference, content_hash, uploaded_by, created_at";

/// Queries and writes for the `attachments` table.
#[derive(Debug)]
pub(crate) struct AttachmentRepo;

impl AttachmentRepo {
    /// Attach evidence to an issue.
    ///
    /// Returns `None` if the same content is already attached to the issue.
    pub(crate) fn insert(
        conn: &Connection,
        new: &NewAttachment,
        uploaded_by: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Attachment>> {
        if let Some(existing) = Self::find_by_hash(conn, new.issue_id, &new.content_hash)? {
            debug!(
                issue_id = new.issue_id,
                existing = existing.id,
                "Duplicate attachment skipped"
            );
            return Ok(None);
        }

        conn.execute(
            r"
            INSERT INTO attachments (issue_id, kind, phase, reference, content_hash, uploaded_by, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
            params![
                new.issue_id,
                new.kind.as_str(),
                new.phase.as_str(),
                new.reference,
                new.content_hash,
                uploaded_by,
                fmt_timestamp(&now),
            ],
        )?;

        Ok(Some(Attachment {
            id: conn.last_insert_rowid(),
            issue_id: new.issue_id,
            kind: new.kind,
            phase: new.phase,
            reference: new.reference.clone(),
            content_hash: new.content_hash.clone(),
            uploaded_by,
            created_at: now,
        }))
    }

    pub(crate) fn restore(conn: &Connection, attachment: &Attachment) -> Result<()> {
        conn.execute(
            &format!(
                "INSERT INTO attachments ({ATTACHMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            params![
                attachment.id,
                attachment.issue_id,
                attachment.kind.as_str(),
                attachment.phase.as_str(),
                attachment.reference,
                attachment.content_hash,
                attachment.uploaded_by,
                fmt_timestamp(&attachment.created_at),
            ],
        )?;
        Ok(())
    }

    pub(crate) fn find_by_hash(
        conn: &Connection,
        issue_id: i64,
        content_hash: &str,
    ) -> Result<Option<Attachment>> {
        let attachment = conn
            .query_row(
                &format!(
                    "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE issue_id = ?1 AND content_hash = ?2"
                ),
                params![issue_id, content_hash],
                Self::row_to_attachment,
            )
            .optional()?;
        Ok(attachment)
    }

    /// Attachments of one issue (or all issues) in upload order.
    pub(crate) fn list(conn: &Connection, issue_id: Option<i64>) -> Result<Vec<Attachment>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {ATTACHMENT_COLUMNS} FROM attachments WHERE ?1 IS NULL OR issue_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([issue_id], Self::row_to_attachment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of after-repair photos on an issue.
    pub(crate) fn count_after_photos(conn: &Connection, issue_id: i64) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM attachments WHERE issue_id = ?1 AND kind = ?2 AND phase = ?3",
            params![
                issue_id,
                AttachmentKind::Photo.as_str(),
                AttachmentPhase::After.as_str(),
            ],
            |row| row.get(0),
        )?)
    }

    fn row_to_attachment(row: &rusqlite::Row) -> rusqlite::Result<Attachment> {
        Ok(Attachment {
            id: row.get(0)?,
            issue_id: row.get(1)?,
            kind: enum_at(row, 2)?,
            phase: enum_at(row, 3)?,
            reference: row.get(4)?,
            content_hash: row.get(5)?,
            uploaded_by: row.get(6)?,
            created_at: timestamp_at(row, 7)?,
        })
    }
}
