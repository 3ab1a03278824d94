//! User directory: player name to privilege role.

use std::collections::HashMap;

use tracing::debug;

/// Privilege role. Level is derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Normal,
    Admin,
    SuperAdmin,
}

impl Role {
    pub fn level(&self) -> u8 {
        match self {
            Role::Normal => 0,
            Role::Admin => 1,
            Role::SuperAdmin => 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub role: Role,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role >= Role::Admin
    }

    pub fn is_super_admin(&self) -> bool {
        self.role == Role::SuperAdmin
    }

    pub fn level(&self) -> u8 {
        self.role.level()
    }
}

#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<String, User>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a normal user; an existing entry keeps its role.
    pub fn register(&mut self, name: &str) {
        self.users.entry(name.to_string()).or_insert_with(|| User {
            name: name.to_string(),
            role: Role::Normal,
        });
    }

    /// Raise a user to admin, registering the name first if needed.
    /// Super-admins stay super-admins.
    pub fn promote_admin(&mut self, name: &str) {
        self.raise(name, Role::Admin);
    }

    pub fn promote_super_admin(&mut self, name: &str) {
        self.raise(name, Role::SuperAdmin);
    }

    fn raise(&mut self, name: &str, role: Role) {
        self.register(name);
        if let Some(user) = self.users.get_mut(name) {
            if user.role < role {
                debug!(player = %name, role = ?role, "User promoted");
                user.role = role;
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&User> {
        self.users.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.users.contains_key(name)
    }

    /// Level of a user; unknown names have level 0.
    pub fn level(&self, name: &str) -> u8 {
        self.users.get(name).map(User::level).unwrap_or(0)
    }

    pub fn is_admin(&self, name: &str) -> bool {
        self.users.get(name).is_some_and(User::is_admin)
    }

    /// Drop a departing user unless they hold a privileged role.
    /// Returns true when the entry was removed.
    pub fn forget_if_unprivileged(&mut self, name: &str) -> bool {
        match self.users.get(name) {
            Some(user) if !user.is_admin() => {
                self.users.remove(name);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
