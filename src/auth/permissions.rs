use anyhow::Error;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewUsers,
    EditOwnAccount,
    EditAnyAccount,
    EditMembership,

    ViewTasks,
    StartTasks,

    CreateTasks,
    CompleteTasks,

    ManageAllTasks,

    ViewChildDashboard,
}

impl Permission {
    /// Fixed message sent with the 403 when a role lacks this permission.
    pub fn denial_message(&self) -> &'static str {
        match self {
            Permission::StartTasks => "Only players can start tasks.",
            Permission::CreateTasks => "Only coaches can create tasks.",
            Permission::CompleteTasks => "Only coaches can perform this action.",
            Permission::ManageAllTasks => "Only the task's coach or management can modify tasks.",
            Permission::ViewChildDashboard => "Not a parent account.",
            Permission::EditAnyAccount => "Only management can modify other accounts.",
            Permission::EditMembership => "Only management can change membership dates.",
            Permission::ViewUsers | Permission::EditOwnAccount | Permission::ViewTasks => {
                "You do not have permission to perform this action."
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Management,
    Coach,
    #[default]
    Player,
    Parent,
}

static BASE_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewUsers);
    permissions.insert(Permission::EditOwnAccount);
    permissions.insert(Permission::ViewTasks);

    permissions
});

static PLAYER_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(BASE_PERMISSIONS.iter().copied());

    permissions.insert(Permission::StartTasks);

    permissions
});

static PARENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(BASE_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewChildDashboard);

    permissions
});

static COACH_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(BASE_PERMISSIONS.iter().copied());

    permissions.insert(Permission::CreateTasks);
    permissions.insert(Permission::CompleteTasks);

    permissions
});

static MANAGEMENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(BASE_PERMISSIONS.iter().copied());

    permissions.insert(Permission::EditAnyAccount);
    permissions.insert(Permission::EditMembership);
    permissions.insert(Permission::ManageAllTasks);

    permissions
});

impl Role {
    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Management => &MANAGEMENT_PERMISSIONS,
            Role::Coach => &COACH_PERMISSIONS,
            Role::Player => &PLAYER_PERMISSIONS,
            Role::Parent => &PARENT_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Management => "management",
            Role::Coach => "coach",
            Role::Player => "player",
            Role::Parent => "parent",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "management" => Ok(Role::Management),
            "coach" => Ok(Role::Coach),
            "player" => Ok(Role::Player),
            "parent" => Ok(Role::Parent),
            _ => Err(Error::msg(format!("Unknown role: {}", s))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
