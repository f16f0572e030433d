//! Every role-gated operation is described by a [`Gate`]. Handlers check the
//! role half before touching the store, so a caller with the wrong role always
//! gets a 403, and check the relationship half once the target is loaded.

use crate::error::AppError;
use crate::models::{Profile, Task};

use super::{Permission, User};

pub const TASK_NOT_FOUND: &str = "Task not found.";
pub const NOT_FOUND: &str = "Not found.";

/// What the caller must be to the target of an operation.
#[derive(Debug)]
pub enum Relation<'a> {
    CreatorOf(&'a Task),
    AssignedTo(&'a [i64]),
    Account(i64),
    OwnerOf(&'a Profile),
}

impl Relation<'_> {
    pub fn holds_for(&self, user: &User) -> bool {
        match self {
            Relation::CreatorOf(task) => task.assigned_by == Some(user.id),
            Relation::AssignedTo(players) => players.contains(&user.id),
            Relation::Account(id) => *id == user.id,
            Relation::OwnerOf(profile) => profile.user_id == user.id,
        }
    }
}

/// How a failed relationship check is reported.
#[derive(Debug, Clone, Copy)]
pub enum Denial {
    /// Conflated with a missing target so callers cannot probe for existence.
    NotFound(&'static str),
    Forbidden(&'static str),
}

#[derive(Debug, Clone, Copy)]
pub struct Gate {
    pub permission: Permission,
    /// Holding this permission passes the role check and skips the relationship check.
    pub bypass: Option<Permission>,
    pub denial: Denial,
}

pub const CREATE_TASK: Gate = Gate {
    permission: Permission::CreateTasks,
    bypass: None,
    denial: Denial::NotFound(NOT_FOUND),
};

pub const MODIFY_TASK: Gate = Gate {
    permission: Permission::CreateTasks,
    bypass: Some(Permission::ManageAllTasks),
    denial: Denial::NotFound(NOT_FOUND),
};

pub const START_TASK: Gate = Gate {
    permission: Permission::StartTasks,
    bypass: None,
    denial: Denial::NotFound(TASK_NOT_FOUND),
};

pub const COMPLETE_TASK: Gate = Gate {
    permission: Permission::CompleteTasks,
    bypass: None,
    denial: Denial::NotFound(NOT_FOUND),
};

pub const VIEW_CHILD_DASHBOARD: Gate = Gate {
    permission: Permission::ViewChildDashboard,
    bypass: None,
    denial: Denial::NotFound("No child linked to this parent account."),
};

pub const EDIT_ACCOUNT: Gate = Gate {
    permission: Permission::EditOwnAccount,
    bypass: Some(Permission::EditAnyAccount),
    denial: Denial::Forbidden("Only management can modify other accounts."),
};

pub const EDIT_PROFILE: Gate = Gate {
    permission: Permission::EditOwnAccount,
    bypass: Some(Permission::EditAnyAccount),
    denial: Denial::Forbidden("You can only modify your own profile."),
};

impl Gate {
    fn bypassed_by(&self, user: &User) -> bool {
        self.bypass.is_some_and(|p| user.has_permission(p))
    }

    pub fn check_role(&self, user: &User) -> Result<(), AppError> {
        if self.bypassed_by(user) {
            return Ok(());
        }

        match self.bypass {
            Some(bypass) if !user.has_permission(self.permission) => {
                tracing::warn!(
                    username = %user.username,
                    role = %user.role.as_str(),
                    permission = ?self.permission,
                    "Permission denied"
                );
                Err(AppError::Authorization(bypass.denial_message().to_string()))
            }
            _ => user.require_permission(self.permission),
        }
    }

    pub fn check_relation(&self, user: &User, relation: Relation<'_>) -> Result<(), AppError> {
        if self.bypassed_by(user) || relation.holds_for(user) {
            return Ok(());
        }

        tracing::warn!(
            username = %user.username,
            relation = ?relation,
            "Caller lacks relationship to target"
        );

        Err(self.deny())
    }

    pub fn deny(&self) -> AppError {
        match self.denial {
            Denial::NotFound(msg) => AppError::NotFound(msg.to_string()),
            Denial::Forbidden(msg) => AppError::Authorization(msg.to_string()),
        }
    }

    pub fn check(&self, user: &User, relation: Relation<'_>) -> Result<(), AppError> {
        self.check_role(user)?;
        self.check_relation(user, relation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::models::ProfileSummary;
    use chrono::Utc;

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            username: format!("user_{}", id),
            email: String::new(),
            role,
            profile: ProfileSummary::default(),
            player_id: None,
            membership_start_date: None,
            membership_end_date: None,
            photo: None,
        }
    }

    fn task_by(coach_id: i64) -> Task {
        Task {
            id: 1,
            title: "Serve practice".to_string(),
            description: String::new(),
            assigned_by: Some(coach_id),
            created_at: Utc::now(),
            due_date: None,
            time_limit_minutes: None,
            academy: None,
            sport: None,
        }
    }

    #[test]
    fn test_wrong_role_is_forbidden_with_fixed_message() {
        let coach = user(1, Role::Coach);
        match START_TASK.check_role(&coach) {
            Err(AppError::Authorization(msg)) => assert_eq!(msg, "Only players can start tasks."),
            other => panic!("Expected Authorization error, got {:?}", other),
        }

        let player = user(2, Role::Player);
        match COMPLETE_TASK.check_role(&player) {
            Err(AppError::Authorization(msg)) => {
                assert_eq!(msg, "Only coaches can perform this action.")
            }
            other => panic!("Expected Authorization error, got {:?}", other),
        }
    }

    #[test]
    fn test_other_coaches_task_reads_as_not_found() {
        let coach = user(1, Role::Coach);
        let task = task_by(99);

        match COMPLETE_TASK.check(&coach, Relation::CreatorOf(&task)) {
            Err(AppError::NotFound(msg)) => assert_eq!(msg, "Not found."),
            other => panic!("Expected NotFound error, got {:?}", other),
        }

        let own = task_by(1);
        assert!(COMPLETE_TASK.check(&coach, Relation::CreatorOf(&own)).is_ok());
    }

    #[test]
    fn test_unassigned_player_cannot_start() {
        let player = user(7, Role::Player);
        assert!(START_TASK.check(&player, Relation::AssignedTo(&[7, 8])).is_ok());
        assert!(matches!(
            START_TASK.check(&player, Relation::AssignedTo(&[8])),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_management_bypasses_task_ownership() {
        let manager = user(3, Role::Management);
        let task = task_by(99);
        assert!(MODIFY_TASK.check(&manager, Relation::CreatorOf(&task)).is_ok());

        let parent = user(4, Role::Parent);
        assert!(matches!(
            MODIFY_TASK.check_role(&parent),
            Err(AppError::Authorization(_))
        ));
    }

    #[test]
    fn test_accounts_are_self_editable_only() {
        let player = user(7, Role::Player);
        assert!(EDIT_ACCOUNT.check(&player, Relation::Account(7)).is_ok());
        assert!(matches!(
            EDIT_ACCOUNT.check(&player, Relation::Account(8)),
            Err(AppError::Authorization(_))
        ));
    }
}
