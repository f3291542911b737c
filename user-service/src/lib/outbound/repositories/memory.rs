use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::UpsertOutcome;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserRepository;
use crate::user::errors::UserError;

/// Process-local user store with the same uniqueness rules as the
/// PostgreSQL adapter. Used for development and tests.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(users: &HashMap<UserId, User>, email: &EmailAddress, owner: &UserId) -> bool {
    users
        .values()
        .any(|u| u.email == *email && u.id != *owner)
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == *email)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, UserError> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn insert(&self, user: User) -> Result<User, UserError> {
        let mut users = self.users.write().await;

        if users.contains_key(&user.id) {
            return Err(UserError::DatabaseError(format!(
                "duplicate user id: {}",
                user.id
            )));
        }
        if email_taken(&users, &user.email, &user.id) {
            return Err(UserError::EmailAlreadyExists(
                user.email.as_str().to_string(),
            ));
        }

        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn upsert(&self, id: &UserId, user: User) -> Result<UpsertOutcome, UserError> {
        let mut users = self.users.write().await;

        if email_taken(&users, &user.email, id) {
            return Err(UserError::EmailAlreadyExists(
                user.email.as_str().to_string(),
            ));
        }

        match users.get_mut(id) {
            Some(existing) => {
                existing.email = user.email;
                existing.password_hash = user.password_hash;
                existing.role = user.role;
                Ok(UpsertOutcome::Matched)
            }
            None => {
                users.insert(id.clone(), User { id: id.clone(), ..user });
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    async fn delete(&self, id: &UserId) -> Result<(), UserError> {
        self.users
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or(UserError::NotFound(id.to_string()))
    }
}
