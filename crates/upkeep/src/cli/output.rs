//! Rendering of records for the terminal.

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::commands::OutputFormat;
use crate::error::Result;
use crate::model::{Attachment, Issue, LogEntry, Occupant, Project, Unit, User};
use crate::storage::StoreStats;
use crate::tracker::{IssueDetail, ProjectDetail};

/// Renders records in the chosen [`OutputFormat`].
#[derive(Debug, Clone)]
pub struct Printer {
    format: OutputFormat,
    date_format: String,
}

impl Printer {
    /// Create a printer; `date_format` is a `chrono` format string.
    #[must_use]
    pub fn new(format: OutputFormat, date_format: impl Into<String>) -> Self {
        Self {
            format,
            date_format: date_format.into(),
        }
    }

    /// The output format.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn time(&self, ts: &DateTime<Utc>) -> String {
        let mut out = String::new();
        if write!(out, "{}", ts.format(&self.date_format)).is_err() {
            return ts.to_rfc3339();
        }
        out
    }

    fn opt_time(&self, ts: Option<&DateTime<Utc>>) -> String {
        ts.map_or_else(|| "-".to_string(), |ts| self.time(ts))
    }

    /// Render a list: one line per item in plain mode, aligned columns in
    /// table mode, a JSON array otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn list<T: Serialize>(
        &self,
        items: &[T],
        headers: &[&str],
        row: impl Fn(&T) -> Vec<String>,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(items)?),
            OutputFormat::Plain => Ok(items
                .iter()
                .map(|item| row(item).join("  "))
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let rows: Vec<Vec<String>> = items.iter().map(row).collect();
                Ok(render_table(headers, &rows))
            }
        }
    }

    /// Render one record as `label: value` lines, or JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn record<T: Serialize>(&self, item: &T, fields: &[(&str, String)]) -> Result<String> {
        if self.format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(item)?);
        }
        let width = fields.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        Ok(fields
            .iter()
            .map(|(label, value)| format!("{:<width$}  {value}", format!("{label}:"), width = width + 1))
            .collect::<Vec<_>>()
            .join("\n"))
    }

    /// Render a confirmation for a write. JSON mode prints the record.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn done<T: Serialize>(&self, item: &T, message: impl Into<String>) -> Result<String> {
        if self.format == OutputFormat::Json {
            Ok(serde_json::to_string_pretty(item)?)
        } else {
            Ok(message.into())
        }
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn users(&self, users: &[User]) -> Result<String> {
        self.list(users, &["ID", "NAME", "EMAIL", "ROLE", "ACTIVE"], |u| {
            vec![
                u.id.to_string(),
                u.name.clone(),
                u.email.clone(),
                u.role.to_string(),
                if u.active { "yes" } else { "no" }.to_string(),
            ]
        })
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn user(&self, user: &User) -> Result<String> {
        self.record(
            user,
            &[
                ("id", user.id.to_string()),
                ("name", user.name.clone()),
                ("email", user.email.clone()),
                ("phone", dash(user.phone.as_deref())),
                ("role", user.role.to_string()),
                ("active", user.active.to_string()),
                ("created", self.time(&user.created_at)),
                ("updated", self.time(&user.updated_at)),
            ],
        )
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn projects(&self, projects: &[Project]) -> Result<String> {
        self.list(projects, &["ID", "NAME", "ADDRESS", "MANAGER"], |p| {
            vec![
                p.id.to_string(),
                p.name.clone(),
                dash(p.address.as_deref()),
                p.manager_id.map_or_else(|| "-".to_string(), |id| id.to_string()),
            ]
        })
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn project(&self, detail: &ProjectDetail) -> Result<String> {
        let p = &detail.project;
        let names = |users: &[User]| {
            users
                .iter()
                .map(|u| format!("{} (#{})", u.name, u.id))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let units = detail
            .units
            .iter()
            .map(|u| format!("{} (#{})", u.label, u.id))
            .collect::<Vec<_>>()
            .join(", ");
        self.record(
            detail,
            &[
                ("id", p.id.to_string()),
                ("name", p.name.clone()),
                ("address", dash(p.address.as_deref())),
                (
                    "manager",
                    detail
                        .manager
                        .as_ref()
                        .map_or_else(|| "-".to_string(), |m| format!("{} (#{})", m.name, m.id)),
                ),
                ("members", or_dash(names(&detail.members))),
                ("units", or_dash(units)),
                ("created", self.time(&p.created_at)),
            ],
        )
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn units(&self, units: &[Unit]) -> Result<String> {
        self.list(units, &["ID", "PROJECT", "LABEL", "FLOOR"], |u| {
            vec![
                u.id.to_string(),
                u.project_id.to_string(),
                u.label.clone(),
                u.floor.map_or_else(|| "-".to_string(), |f| f.to_string()),
            ]
        })
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn occupants(&self, occupants: &[Occupant]) -> Result<String> {
        self.list(
            occupants,
            &["ID", "UNIT", "NAME", "PHONE", "MOVED IN", "MOVED OUT"],
            |o| {
                vec![
                    o.id.to_string(),
                    o.unit_id.to_string(),
                    o.name.clone(),
                    dash(o.phone.as_deref()),
                    self.time(&o.moved_in_at),
                    self.opt_time(o.moved_out_at.as_ref()),
                ]
            },
        )
    }

    /// Issues, with reporter names resolved from `names`.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn issues(&self, issues: &[Issue], names: &HashMap<i64, String>) -> Result<String> {
        self.list(
            issues,
            &["ID", "PRIORITY", "STATE", "CATEGORY", "LOCATION", "REPORTER", "V", "UPDATED"],
            |i| {
                vec![
                    i.id.to_string(),
                    i.priority.to_string(),
                    i.state_label(),
                    i.category.to_string(),
                    i.location.to_string(),
                    user_name(names, i.reporter_id),
                    i.version.to_string(),
                    self.time(&i.updated_at),
                ]
            },
        )
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn issue(&self, detail: &IssueDetail, names: &HashMap<i64, String>) -> Result<String> {
        let i = &detail.issue;
        let by = |id: Option<i64>| id.map_or_else(|| "-".to_string(), |id| user_name(names, id));
        let mut fields = vec![
            ("id", i.id.to_string()),
            ("project", i.project_id.to_string()),
            ("location", i.location.to_string()),
            ("category", i.category.to_string()),
            ("cause", i.cause.to_string()),
            ("description", i.description.clone()),
            ("state", i.state_label()),
            ("priority", i.priority.to_string()),
            ("reporter", user_name(names, i.reporter_id)),
            ("reported", self.time(&i.created_at)),
            ("version", i.version.to_string()),
        ];
        if let Some(vendor) = &i.vendor {
            fields.push(("vendor", vendor.clone()));
            fields.push(("approved by", by(i.approved_by)));
            fields.push(("approved", self.opt_time(i.approved_at.as_ref())));
        }
        if let Some(note) = &i.approval_note {
            fields.push(("approval note", note.clone()));
        }
        if let Some(reason) = &i.rejection_reason {
            fields.push(("rejected by", by(i.rejected_by)));
            fields.push(("reason", reason.clone()));
        }
        if i.resolved_by.is_some() {
            fields.push(("resolved by", by(i.resolved_by)));
            fields.push(("resolved", self.opt_time(i.resolved_at.as_ref())));
        }
        if i.verified {
            fields.push(("verified by", by(i.verified_by)));
            fields.push(("verified", self.opt_time(i.verified_at.as_ref())));
        }
        for attachment in &detail.attachments {
            fields.push(("attachment", self.attachment_line(attachment)));
        }
        for entry in &detail.history {
            fields.push(("history", self.log_line(entry, names)));
        }
        self.record(detail, &fields)
    }

    fn attachment_line(&self, a: &Attachment) -> String {
        let proof = if a.is_after_photo() { " (proof)" } else { "" };
        format!(
            "#{} {} {} {} {}{proof}",
            a.id,
            self.time(&a.created_at),
            a.phase,
            a.kind,
            a.reference
        )
    }

    fn log_line(&self, entry: &LogEntry, names: &HashMap<i64, String>) -> String {
        format!(
            "{} {} {}: {}",
            self.time(&entry.created_at),
            entry
                .actor_id
                .map_or_else(|| "system".to_string(), |id| user_name(names, id)),
            entry.action,
            entry.detail
        )
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn log(&self, entries: &[LogEntry], names: &HashMap<i64, String>) -> Result<String> {
        self.list(entries, &["TIME", "ACTOR", "ACTION", "ENTITY", "DETAIL"], |e| {
            vec![
                self.time(&e.created_at),
                e.actor_id
                    .map_or_else(|| "system".to_string(), |id| user_name(names, id)),
                e.action.to_string(),
                format!("{} #{}", e.entity, e.entity_id),
                e.detail.clone(),
            ]
        })
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn stats(&self, stats: &StoreStats, database: &str) -> Result<String> {
        self.record(
            stats,
            &[
                ("database", database.to_string()),
                ("size", format!("{} bytes", stats.db_size_bytes)),
                (
                    "users",
                    format!("{} ({} active)", stats.users, stats.active_users),
                ),
                ("projects", stats.projects.to_string()),
                ("units", stats.units.to_string()),
                ("occupants", stats.current_occupants.to_string()),
                (
                    "issues",
                    format!(
                        "{} active, {} archived",
                        stats.active_issues, stats.archived_issues
                    ),
                ),
                ("open", stats.open_issues.to_string()),
                ("in progress", stats.in_progress_issues.to_string()),
                (
                    "resolved",
                    format!("{} ({} verified)", stats.resolved_issues, stats.verified_issues),
                ),
                ("rejected", stats.rejected_issues.to_string()),
                ("log entries", stats.log_entries.to_string()),
                ("last activity", self.opt_time(stats.last_activity.as_ref())),
            ],
        )
    }
}

fn dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn or_dash(value: String) -> String {
    if value.is_empty() {
        "-".to_string()
    } else {
        value
    }
}

fn user_name(names: &HashMap<i64, String>, id: i64) -> String {
    names
        .get(&id)
        .map_or_else(|| format!("#{id}"), |name| format!("{name} (#{id})"))
}

/// Left-aligned columns separated by two spaces, with a header rule.
fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let line = |cells: Vec<&str>| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &width)| format!("{cell:<width$}"))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers.to_vec())];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::model::{AttachmentKind, AttachmentPhase, Role};

    fn user() -> User {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        User {
            id: 7,
            name: "Mia".to_string(),
            email: "mia@example.com".to_string(),
            phone: None,
            role: Role::Manager,
            active: true,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_table_aligns_columns() {
        let table = render_table(
            &["ID", "NAME"],
            &[
                vec!["1".to_string(), "Ada".to_string()],
                vec!["12".to_string(), "Bo".to_string()],
            ],
        );
        assert_eq!(table, "ID  NAME\n--  ----\n1   Ada\n12  Bo");
    }

    #[test]
    fn test_plain_list() {
        let printer = Printer::new(OutputFormat::Plain, "%Y-%m-%d");
        let out = printer.users(&[user()]).unwrap();
        assert_eq!(out, "7  Mia  mia@example.com  manager  yes");
    }

    #[test]
    fn test_json_record() {
        let printer = Printer::new(OutputFormat::Json, "%Y-%m-%d");
        let out = printer.user(&user()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["role"], "manager");
    }

    #[test]
    fn test_record_uses_date_format() {
        let printer = Printer::new(OutputFormat::Plain, "%d/%m/%Y");
        let out = printer.user(&user()).unwrap();
        assert!(out.contains("created:  01/03/2024"));
        assert!(out.contains("phone:    -"));
    }

    #[test]
    fn test_attachment_line_marks_proof_photos() {
        let printer = Printer::new(OutputFormat::Plain, "%Y-%m-%d");
        let mut attachment = Attachment {
            id: 3,
            issue_id: 1,
            kind: AttachmentKind::Photo,
            phase: AttachmentPhase::After,
            reference: "after.jpg".to_string(),
            content_hash: String::new(),
            uploaded_by: 7,
            created_at: Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap(),
        };
        assert_eq!(
            printer.attachment_line(&attachment),
            "#3 2024-03-02 after photo after.jpg (proof)"
        );

        attachment.phase = AttachmentPhase::Before;
        assert!(!printer.attachment_line(&attachment).contains("(proof)"));
    }

    #[test]
    fn test_user_name_fallback() {
        let mut names = HashMap::new();
        names.insert(1, "Ada".to_string());
        assert_eq!(user_name(&names, 1), "Ada (#1)");
        assert_eq!(user_name(&names, 2), "#2");
    }
}
