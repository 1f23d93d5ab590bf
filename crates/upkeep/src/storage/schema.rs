//! `SQLite` schema definitions for upkeep.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the users table.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    phone TEXT,
    role TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the projects table.
pub const CREATE_PROJECTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS projects (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    address TEXT,
    manager_id INTEGER REFERENCES users(id),
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the project membership table.
pub const CREATE_PROJECT_MEMBERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS project_members (
    project_id INTEGER NOT NULL REFERENCES projects(id),
    user_id INTEGER NOT NULL REFERENCES users(id),
    added_at TEXT NOT NULL,
    PRIMARY KEY (project_id, user_id)
)
";

/// SQL statement to create the units table.
pub const CREATE_UNITS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    label TEXT NOT NULL COLLATE NOCASE,
    floor INTEGER,
    created_at TEXT NOT NULL,
    UNIQUE (project_id, label)
)
";

/// SQL statement to create the occupants table.
pub const CREATE_OCCUPANTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS occupants (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unit_id INTEGER NOT NULL REFERENCES units(id),
    name TEXT NOT NULL,
    phone TEXT,
    email TEXT,
    moved_in_at TEXT NOT NULL,
    moved_out_at TEXT
)
";

/// SQL statement to create the issues table.
///
/// Exactly one of `unit_id` and `common_area` is set, and `verified` can
/// only hold on a resolved issue.
pub const CREATE_ISSUES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS issues (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id INTEGER NOT NULL REFERENCES projects(id),
    reporter_id INTEGER NOT NULL REFERENCES users(id),
    unit_id INTEGER REFERENCES units(id),
    common_area TEXT,
    cause TEXT NOT NULL,
    category TEXT NOT NULL,
    description TEXT NOT NULL,
    status TEXT NOT NULL,
    verified INTEGER NOT NULL DEFAULT 0,
    priority TEXT NOT NULL,
    vendor TEXT,
    approved_by INTEGER,
    approved_at TEXT,
    approval_note TEXT,
    rejection_reason TEXT,
    rejected_by INTEGER,
    rejected_at TEXT,
    resolved_by INTEGER,
    resolved_at TEXT,
    verified_by INTEGER,
    verified_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    CHECK ((unit_id IS NULL) <> (common_area IS NULL)),
    CHECK (verified = 0 OR status = 'resolved')
)
";

/// SQL statement to create the attachments table.
pub const CREATE_ATTACHMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS attachments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    issue_id INTEGER NOT NULL REFERENCES issues(id),
    kind TEXT NOT NULL,
    phase TEXT NOT NULL,
    reference TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    uploaded_by INTEGER NOT NULL REFERENCES users(id),
    created_at TEXT NOT NULL,
    UNIQUE (issue_id, content_hash)
)
";

/// SQL statement to create the system log table.
pub const CREATE_LOGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    actor_id INTEGER,
    action TEXT NOT NULL,
    entity TEXT NOT NULL,
    entity_id INTEGER NOT NULL,
    detail TEXT NOT NULL,
    created_at TEXT NOT NULL
)
";

/// Indexes backing the common lookups.
pub const CREATE_INDEXES: &str = r"
CREATE INDEX IF NOT EXISTS idx_issues_project ON issues(project_id);
CREATE INDEX IF NOT EXISTS idx_issues_status ON issues(status);
CREATE INDEX IF NOT EXISTS idx_issues_reporter ON issues(reporter_id);
CREATE INDEX IF NOT EXISTS idx_attachments_issue ON attachments(issue_id);
CREATE INDEX IF NOT EXISTS idx_units_project ON units(project_id);
CREATE INDEX IF NOT EXISTS idx_occupants_unit ON occupants(unit_id);
CREATE INDEX IF NOT EXISTS idx_logs_entity ON logs(entity, entity_id);
CREATE INDEX IF NOT EXISTS idx_members_user ON project_members(user_id)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in dependency order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_PROJECTS_TABLE,
    CREATE_PROJECT_MEMBERS_TABLE,
    CREATE_UNITS_TABLE,
    CREATE_OCCUPANTS_TABLE,
    CREATE_ISSUES_TABLE,
    CREATE_ATTACHMENTS_TABLE,
    CREATE_LOGS_TABLE,
    CREATE_INDEXES,
    CREATE_METADATA_TABLE,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_statements_not_empty() {
        assert!(!SCHEMA_STATEMENTS.is_empty());
        for stmt in SCHEMA_STATEMENTS {
            assert!(!stmt.trim().is_empty());
        }
    }

    #[test]
    fn test_issues_table_guards_verification() {
        assert!(CREATE_ISSUES_TABLE.contains("CHECK (verified = 0 OR status = 'resolved')"));
        assert!(CREATE_ISSUES_TABLE.contains("version INTEGER NOT NULL"));
    }

    #[test]
    fn test_users_email_unique() {
        assert!(CREATE_USERS_TABLE.contains("email TEXT NOT NULL UNIQUE"));
    }
}
