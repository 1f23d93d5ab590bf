//! `upkeep` - Facility maintenance tracking
//!
//! This library provides the core of a role-based maintenance tracker:
//! users, projects, units and occupants, maintenance issues moving through
//! an approve/resolve/verify lifecycle, and a system log of every change,
//! all kept in a single SQLite store.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod policy;
pub mod query;
pub mod storage;
pub mod tracker;
pub mod validate;
pub mod workflow;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{
    Action, Attachment, AttachmentKind, AttachmentPhase, Category, Cause, EntityKind, Issue,
    IssueStatus, Location, LogEntry, NewAttachment, NewIssue, NewOccupant, NewProject, NewUnit,
    NewUser, Occupant, Priority, Project, Role, Unit, User,
};
pub use policy::Actor;
pub use query::{IssueQuery, IssueView};
pub use storage::{LogFilter, Snapshot, Store, StoreStats};
pub use tracker::{IssueDetail, ProjectDetail, Tracker};
pub use workflow::Transition;
