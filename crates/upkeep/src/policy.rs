//! Role-based permissions.
//!
//! An [`Actor`] is a user together with the projects they manage or belong
//! to. The predicates here decide what that actor may do; they never touch
//! storage.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::model::{Issue, Role, User};

/// The user an operation runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    /// The acting user.
    pub user: User,
    /// Projects the user manages or is a member of.
    projects: HashSet<i64>,
}

impl Actor {
    /// Build an actor from a user and their project ids.
    #[must_use]
    pub fn new(user: User, projects: impl IntoIterator<Item = i64>) -> Self {
        Self {
            user,
            projects: projects.into_iter().collect(),
        }
    }

    /// The acting user's id.
    #[must_use]
    pub fn id(&self) -> i64 {
        self.user.id
    }

    /// The acting user's role.
    #[must_use]
    pub fn role(&self) -> Role {
        self.user.role
    }

    /// Whether the user manages or belongs to the project.
    #[must_use]
    pub fn in_project(&self, project_id: i64) -> bool {
        self.projects.contains(&project_id)
    }

    fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }

    fn manages(&self, project_id: i64) -> bool {
        self.user.role == Role::Manager && self.in_project(project_id)
    }

    /// Deactivated users may not act at all.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InactiveUser`] for a deactivated user.
    pub fn ensure_active(&self) -> Result<()> {
        if self.user.active {
            Ok(())
        } else {
            Err(Error::InactiveUser { id: self.user.id })
        }
    }

    /// Turn a predicate result into a permission error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PermissionDenied`] when `allowed` is false.
    pub fn ensure(&self, allowed: bool, action: &'static str) -> Result<()> {
        if allowed {
            Ok(())
        } else {
            Err(Error::permission_denied(self.user.role.as_str(), action))
        }
    }

    /// Report an issue in a project.
    #[must_use]
    pub fn can_report(&self, project_id: i64) -> bool {
        self.is_admin() || self.in_project(project_id)
    }

    /// Approve, reject or verify an issue.
    #[must_use]
    pub fn can_review(&self, issue: &Issue) -> bool {
        self.is_admin() || self.manages(issue.project_id)
    }

    /// Mark an issue resolved.
    #[must_use]
    pub fn can_resolve(&self, issue: &Issue) -> bool {
        self.is_admin() || self.in_project(issue.project_id)
    }

    /// Force an issue's status or priority.
    #[must_use]
    pub fn can_override(&self) -> bool {
        self.is_admin()
    }

    /// Attach evidence to an issue.
    #[must_use]
    pub fn can_attach(&self, issue: &Issue) -> bool {
        self.is_admin() || issue.reporter_id == self.user.id || self.in_project(issue.project_id)
    }

    /// Create, deactivate and reactivate users.
    #[must_use]
    pub fn can_manage_users(&self) -> bool {
        self.is_admin()
    }

    /// Create projects and assign members.
    #[must_use]
    pub fn can_manage_projects(&self) -> bool {
        self.is_admin()
    }

    /// Add units and occupants to a project.
    #[must_use]
    pub fn can_manage_sites(&self, project_id: i64) -> bool {
        self.is_admin() || self.manages(project_id)
    }

    /// Read an issue.
    #[must_use]
    pub fn can_see(&self, issue: &Issue) -> bool {
        match self.user.role {
            Role::Admin => true,
            Role::Manager => self.in_project(issue.project_id),
            Role::Worker => {
                issue.reporter_id == self.user.id || self.in_project(issue.project_id)
            }
        }
    }

    /// Read the system log.
    #[must_use]
    pub fn can_read_log(&self) -> bool {
        self.user.role != Role::Worker
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::{Category, Cause, IssueStatus, Location, Priority};

    fn user(id: i64, role: Role) -> User {
        let now = Utc::now();
        User {
            id,
            name: format!("user{id}"),
            email: format!("user{id}@example.com"),
            phone: None,
            role,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    fn issue(project_id: i64, reporter_id: i64) -> Issue {
        let now = Utc::now();
        Issue {
            id: 1,
            project_id,
            reporter_id,
            location: Location::CommonArea("Roof".to_string()),
            cause: Cause::WearAndTear,
            category: Category::Structural,
            description: "Loose tiles".to_string(),
            status: IssueStatus::Open,
            verified: false,
            priority: Priority::Medium,
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
        }
    }

    #[test]
    fn test_admin_can_do_everything() {
        let admin = Actor::new(user(1, Role::Admin), []);
        let issue = issue(9, 5);

        assert!(admin.can_report(9));
        assert!(admin.can_review(&issue));
        assert!(admin.can_resolve(&issue));
        assert!(admin.can_override());
        assert!(admin.can_attach(&issue));
        assert!(admin.can_manage_users());
        assert!(admin.can_manage_projects());
        assert!(admin.can_manage_sites(9));
        assert!(admin.can_see(&issue));
    }

    #[test]
    fn test_manager_is_scoped_to_projects() {
        let manager = Actor::new(user(2, Role::Manager), [1]);
        let mine = issue(1, 5);
        let other = issue(2, 5);

        assert!(manager.can_review(&mine));
        assert!(!manager.can_review(&other));
        assert!(manager.can_see(&mine));
        assert!(!manager.can_see(&other));
        assert!(manager.can_manage_sites(1));
        assert!(!manager.can_manage_sites(2));
        assert!(!manager.can_override());
        assert!(!manager.can_manage_users());
    }

    #[test]
    fn test_worker_permissions() {
        let worker = Actor::new(user(3, Role::Worker), [1]);
        let member_issue = issue(1, 5);
        let own_elsewhere = issue(2, 3);
        let foreign = issue(2, 5);

        assert!(worker.can_report(1));
        assert!(!worker.can_report(2));
        assert!(worker.can_resolve(&member_issue));
        assert!(!worker.can_review(&member_issue));
        assert!(worker.can_attach(&own_elsewhere));
        assert!(worker.can_see(&own_elsewhere));
        assert!(!worker.can_see(&foreign));
        assert!(!worker.can_resolve(&foreign));
        assert!(!worker.can_read_log());
    }

    #[test]
    fn test_ensure_helpers() {
        let mut inactive = user(4, Role::Admin);
        inactive.active = false;
        let actor = Actor::new(inactive, []);
        assert!(matches!(
            actor.ensure_active(),
            Err(Error::InactiveUser { id: 4 })
        ));

        let worker = Actor::new(user(3, Role::Worker), []);
        let err = worker.ensure(worker.can_override(), "override issues").unwrap_err();
        assert_eq!(err.to_string(), "permission denied: worker cannot override issues");
    }
}
