//! Error types for upkeep.
//!
//! This module defines all error types used throughout the upkeep crate,
//! providing detailed context for debugging and user-facing messages that the
//! CLI prints verbatim.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for upkeep operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Domain Errors ===
    /// A required field was missing or malformed.
    #[error("{field}: {message}")]
    Validation {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// A lookup did not find the requested record.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Kind of record.
        entity: &'static str,
        /// Identifier that was looked up.
        id: i64,
    },

    /// The requested action is not valid from the issue's current state.
    #[error("cannot {action} an issue that is {state}")]
    InvalidTransition {
        /// Action that was attempted.
        action: &'static str,
        /// Description of the current state.
        state: String,
    },

    /// The acting user's role does not allow the action.
    #[error("permission denied: {role} cannot {action}")]
    PermissionDenied {
        /// Role of the acting user.
        role: String,
        /// Action that was attempted.
        action: &'static str,
    },

    /// The acting user has been deactivated.
    #[error("user {id} is inactive")]
    InactiveUser {
        /// The inactive user.
        id: i64,
    },

    /// No acting user was supplied.
    #[error("no acting user: pass --as <USER_ID> or set session.actor_id")]
    NoActor,

    /// The record changed since the caller last read it.
    #[error("{entity} {id} was modified concurrently (expected version {expected}, found {actual})")]
    VersionConflict {
        /// Kind of record.
        entity: &'static str,
        /// Identifier of the record.
        id: i64,
        /// Version the caller expected.
        expected: i64,
        /// Version found in storage.
        actual: i64,
    },

    /// A unique value is already taken.
    #[error("{entity} with {field} '{value}' already exists")]
    Duplicate {
        /// Kind of record.
        entity: &'static str,
        /// Unique field.
        field: &'static str,
        /// Conflicting value.
        value: String,
    },

    /// Snapshots can only be imported into an empty store.
    #[error("cannot import snapshot: store already contains {users} users")]
    StoreNotEmpty {
        /// Number of users already present.
        users: i64,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for upkeep operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a validation error for a field.
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Create a not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    /// Create an invalid-transition error.
    #[must_use]
    pub fn invalid_transition(action: &'static str, state: impl Into<String>) -> Self {
        Self::InvalidTransition {
            action,
            state: state.into(),
        }
    }

    /// Create a permission error.
    #[must_use]
    pub fn permission_denied(role: impl Into<String>, action: &'static str) -> Self {
        Self::PermissionDenied {
            role: role.into(),
            action,
        }
    }

    /// Create a duplicate-value error.
    #[must_use]
    pub fn duplicate(entity: &'static str, field: &'static str, value: impl Into<String>) -> Self {
        Self::Duplicate {
            entity,
            field,
            value: value.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error was caused by bad user input.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::Duplicate { .. })
    }

    /// Check if this error is a missing record.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is an authorization failure.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied { .. } | Self::InactiveUser { .. } | Self::NoActor
        )
    }

    /// Check if this error is an optimistic concurrency failure.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = Error::validation("vendor", "is required to approve an issue");
        assert_eq!(err.to_string(), "vendor: is required to approve an issue");
        assert!(err.is_validation());
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found("issue", 42);
        assert_eq!(err.to_string(), "issue 42 not found");
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = Error::invalid_transition("approve", "rejected");
        assert_eq!(err.to_string(), "cannot approve an issue that is rejected");
    }

    #[test]
    fn test_permission_errors() {
        assert!(Error::permission_denied("worker", "approve issues").is_permission_error());
        assert!(Error::InactiveUser { id: 3 }.is_permission_error());
        assert!(Error::NoActor.is_permission_error());
        assert!(!Error::internal("x").is_permission_error());
    }

    #[test]
    fn test_version_conflict_display() {
        let err = Error::VersionConflict {
            entity: "issue",
            id: 7,
            expected: 2,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("issue 7"));
        assert!(msg.contains("expected version 2"));
        assert!(err.is_conflict());
    }

    #[test]
    fn test_duplicate_display() {
        let err = Error::duplicate("user", "email", "a@b.co");
        assert_eq!(err.to_string(), "user with email 'a@b.co' already exists");
        assert!(err.is_validation());
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_open_error_display() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err = Error::DatabaseOpen {
                path: PathBuf::from("/nonexistent/path/db.sqlite"),
                source: sqlite_err,
            };
            assert!(err.to_string().contains("/nonexistent/path/db.sqlite"));
        }
    }

    #[test]
    fn test_store_not_empty_display() {
        let err = Error::StoreNotEmpty { users: 4 };
        assert!(err.to_string().contains("4 users"));
    }
}
