//! In-process credential store for tests and ephemeral mode.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::AuthError;
use super::store::CredentialStore;
use crate::models::auth::{User, UserWithPassword};

#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    users: DashMap<String, String>,
    roles: DashMap<String, Vec<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserWithPassword>, AuthError> {
        Ok(self.users.get(username).map(|hash| UserWithPassword {
            user: User {
                username: username.to_string(),
            },
            password_hash: hash.value().clone(),
        }))
    }

    async fn create_user(&self, username: &str, password_hash: &str) -> Result<User, AuthError> {
        match self.users.entry(username.to_string()) {
            Entry::Occupied(_) => Err(AuthError::ValidationError(
                "Username already registered".into(),
            )),
            Entry::Vacant(vacant) => {
                vacant.insert(password_hash.to_string());
                Ok(User {
                    username: username.to_string(),
                })
            }
        }
    }

    async fn delete_user(&self, username: &str) -> Result<(), AuthError> {
        if self.users.remove(username).is_none() {
            return Err(AuthError::NotFound(format!("user '{username}'")));
        }
        self.roles.remove(username);
        Ok(())
    }

    async fn find_roles(&self, username: &str) -> Result<Vec<String>, AuthError> {
        Ok(self
            .roles
            .get(username)
            .map(|roles| roles.value().clone())
            .unwrap_or_default())
    }

    async fn insert_role(&self, username: &str, role: &str) -> Result<(), AuthError> {
        if !self.users.contains_key(username) {
            return Err(AuthError::NotFound(format!("user '{username}'")));
        }
        let mut roles = self.roles.entry(username.to_string()).or_default();
        if roles.iter().any(|r| r == role) {
            return Err(AuthError::DuplicateRole(role.to_string()));
        }
        roles.push(role.to_string());
        Ok(())
    }
}
