use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auth::AuthenticationError;
use auth::Authenticator;

use crate::domain::user::authorization;
use crate::domain::user::cache_aside::CacheAside;
use crate::domain::user::models::CreateUserCommand;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::Principal;
use crate::domain::user::models::Role;
use crate::domain::user::models::UpdateUserCommand;
use crate::domain::user::models::UpsertOutcome;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::UserError;
use crate::user::ports::UserCache;
use crate::user::ports::UserRepository;
use crate::user::ports::UserServicePort;

/// Domain service implementation for user operations.
///
/// Concrete implementation of UserServicePort with dependency injection.
pub struct UserService<UR, UC>
where
    UR: UserRepository,
    UC: UserCache,
{
    users: CacheAside<UR, UC>,
    authenticator: Arc<Authenticator>,
}

impl<UR, UC> UserService<UR, UC>
where
    UR: UserRepository,
    UC: UserCache,
{
    /// Create a new user service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User persistence implementation
    /// * `cache` - Cache backend placed in front of the repository
    /// * `cache_ttl` - Lifetime of cache entries
    /// * `authenticator` - Password hashing and token issuance
    ///
    /// # Returns
    /// Configured user service instance
    pub fn new(
        repository: Arc<UR>,
        cache: Arc<UC>,
        cache_ttl: Duration,
        authenticator: Arc<Authenticator>,
    ) -> Self {
        Self {
            users: CacheAside::new(repository, cache, cache_ttl),
            authenticator,
        }
    }

    /// Bound each cache call by `timeout` instead of the default.
    pub fn with_cache_timeout(self, timeout: Duration) -> Self {
        Self {
            users: self.users.with_timeout(timeout),
            ..self
        }
    }

    fn hash_password(&self, password: &str) -> Result<String, UserError> {
        self.authenticator
            .hash_password(password)
            .map_err(|e| UserError::Unknown(format!("Password hashing failed: {}", e)))
    }
}

#[async_trait]
impl<UR, UC> UserServicePort for UserService<UR, UC>
where
    UR: UserRepository,
    UC: UserCache,
{
    async fn create_user(&self, command: CreateUserCommand) -> Result<User, UserError> {
        let password_hash = self.hash_password(&command.password)?;

        let user = User {
            id: UserId::new(),
            email: command.email,
            password_hash,
            role: Role::Standard,
            created_at: User::creation_timestamp(),
        };

        let created_user = self.users.insert(user).await?;
        tracing::info!(user_id = %created_user.id, "User created");

        Ok(created_user)
    }

    async fn login(&self, email: &EmailAddress, password: &str) -> Result<String, UserError> {
        let Some(user) = self.users.repository().find_by_email(email).await? else {
            tracing::debug!("Login for unknown email");
            return Err(UserError::InvalidCredentials);
        };

        let result = self
            .authenticator
            .authenticate(
                password,
                &user.password_hash,
                user.id.as_str(),
                user.role.as_str(),
            )
            .map_err(|e| match e {
                AuthenticationError::InvalidCredentials => UserError::InvalidCredentials,
                AuthenticationError::JwtError(err) => {
                    tracing::error!(error = %err, "Token signing failed");
                    UserError::Unknown(format!("Token generation failed: {}", err))
                }
            })?;

        tracing::info!(user_id = %user.id, "User logged in");
        Ok(result.access_token)
    }

    async fn get_user(&self, id: &UserId) -> Result<User, UserError> {
        self.users
            .get(id)
            .await?
            .ok_or(UserError::NotFound(id.to_string()))
    }

    async fn list_users(&self, principal: &Principal) -> Result<Vec<User>, UserError> {
        if !authorization::can_list(principal) {
            return Err(UserError::Forbidden("*".to_string()));
        }

        self.users.repository().list_all().await
    }

    async fn update_user(
        &self,
        principal: &Principal,
        id: &UserId,
        command: UpdateUserCommand,
    ) -> Result<User, UserError> {
        authorization::ensure_can_modify(principal, id)?;

        // Merge against the store, never against a possibly stale cache entry
        let user = match self.users.repository().find_by_id(id).await? {
            Some(mut user) => {
                if let Some(new_email) = command.email {
                    user.email = new_email;
                }
                if let Some(new_password) = command.password {
                    user.password_hash = self.hash_password(&new_password)?;
                }
                user
            }
            None => {
                let email = command.email.ok_or(UserError::MissingField("email"))?;
                let password = command.password.ok_or(UserError::MissingField("password"))?;
                User {
                    id: id.clone(),
                    email,
                    password_hash: self.hash_password(&password)?,
                    role: Role::Standard,
                    created_at: User::creation_timestamp(),
                }
            }
        };

        // The update path never grants privileges
        let user = User {
            role: Role::Standard,
            ..user
        };

        match self.users.put(id, user.clone()).await? {
            UpsertOutcome::Matched => {
                tracing::info!(user_id = %id, "Matched and replaced an existing user")
            }
            UpsertOutcome::Inserted => tracing::info!(user_id = %id, "Inserted a new user"),
        }

        Ok(user)
    }

    async fn delete_user(&self, principal: &Principal, id: &UserId) -> Result<(), UserError> {
        authorization::ensure_can_modify(principal, id)?;

        self.users.repository().delete(id).await?;
        self.users.invalidate(id).await;

        tracing::info!(user_id = %id, deleted_by = %principal.user_id, "User deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;
    use chrono::Utc;
    use mockall::mock;
    use mockall::predicate::*;

    use super::*;
    use crate::outbound::cache::InMemoryUserCache;

    mock! {
        pub TestUserRepository {}

        #[async_trait]
        impl UserRepository for TestUserRepository {
            async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError>;
            async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError>;
            async fn list_all(&self) -> Result<Vec<User>, UserError>;
            async fn insert(&self, user: User) -> Result<User, UserError>;
            async fn upsert(&self, id: &UserId, user: User) -> Result<UpsertOutcome, UserError>;
            async fn delete(&self, id: &UserId) -> Result<(), UserError>;
        }
    }

    const SECRET: &[u8] = b"test_secret_key_at_least_32_bytes!";

    fn service(
        repository: MockTestUserRepository,
    ) -> UserService<MockTestUserRepository, InMemoryUserCache> {
        UserService::new(
            Arc::new(repository),
            Arc::new(InMemoryUserCache::new()),
            Duration::from_secs(3600),
            Arc::new(Authenticator::new(SECRET)),
        )
    }

    fn principal(id: &str, role: Role) -> Principal {
        Principal {
            user_id: UserId::from_string(id).unwrap(),
            role,
        }
    }

    fn stored_user(id: &str, email: &str, password: &str, role: Role) -> User {
        User {
            id: UserId::from_string(id).unwrap(),
            email: EmailAddress::new(email.to_string()).unwrap(),
            password_hash: Authenticator::new(SECRET).hash_password(password).unwrap(),
            role,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_user_success() {
        let mut repository = MockTestUserRepository::new();

        repository
            .expect_insert()
            .withf(|user| {
                user.email.as_str() == "a@x.com"
                    && user.password_hash.starts_with("$argon2id")
                    && user.role == Role::Standard
            })
            .times(1)
            .returning(Ok);
        // Served from the write-through cache afterwards
        repository.expect_find_by_id().times(0);

        let service = service(repository);

        let command = CreateUserCommand::new(
            EmailAddress::new("a@x.com".to_string()).unwrap(),
            "secret".to_string(),
        );

        let user = service.create_user(command).await.unwrap();
        assert_ne!(user.password_hash, "secret");
        // Matches the microsecond precision of the stored column
        assert_eq!(user.created_at.nanosecond() % 1_000, 0);

        let fetched = service.get_user(&user.id).await.unwrap();
        assert_eq!(fetched, user);
    }

    #[tokio::test]
    async fn test_create_user_duplicate_email() {
        let mut repository = MockTestUserRepository::new();

        repository.expect_insert().times(1).returning(|user| {
            Err(UserError::EmailAlreadyExists(
                user.email.as_str().to_string(),
            ))
        });

        let service = service(repository);

        let command = CreateUserCommand::new(
            EmailAddress::new("a@x.com".to_string()).unwrap(),
            "secret".to_string(),
        );

        assert!(matches!(
            service.create_user(command).await,
            Err(UserError::EmailAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_login_issues_token_for_subject_and_role() {
        let mut repository = MockTestUserRepository::new();
        let user = stored_user("u1", "a@x.com", "secret", Role::Admin);

        let returned = user.clone();
        repository
            .expect_find_by_email()
            .with(eq(user.email.clone()))
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));

        let service = service(repository);

        let token = service.login(&user.email, "secret").await.unwrap();

        let claims = Authenticator::new(SECRET).validate_token(&token).unwrap();
        assert_eq!(claims.id, "u1");
        assert_eq!(claims.role, "admin");
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let mut repository = MockTestUserRepository::new();
        let user = stored_user("u1", "a@x.com", "secret", Role::Standard);

        repository
            .expect_find_by_email()
            .times(1)
            .returning(move |_| Ok(Some(user.clone())));

        let service = service(repository);

        let email = EmailAddress::new("a@x.com".to_string()).unwrap();
        assert!(matches!(
            service.login(&email, "wrong").await,
            Err(UserError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_login_unknown_email() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_find_by_email()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(repository);

        let email = EmailAddress::new("nobody@x.com".to_string()).unwrap();
        assert!(matches!(
            service.login(&email, "secret").await,
            Err(UserError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(repository);

        let result = service.get_user(&UserId::new()).await;
        assert!(matches!(result, Err(UserError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_other_user_forbidden() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_find_by_id().times(0);
        repository.expect_upsert().times(0);

        let service = service(repository);

        let result = service
            .update_user(
                &principal("alice", Role::Standard),
                &UserId::from_string("bob").unwrap(),
                UpdateUserCommand::default(),
            )
            .await;

        assert!(matches!(result, Err(UserError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_update_self_forces_standard_role() {
        let mut repository = MockTestUserRepository::new();
        let existing = stored_user("alice", "alice@x.com", "secret", Role::Admin);

        let returned = existing.clone();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));
        repository
            .expect_upsert()
            .withf(|id, user| {
                id.as_str() == "alice"
                    && user.role == Role::Standard
                    && user.email.as_str() == "new@x.com"
            })
            .times(1)
            .returning(|_, _| Ok(UpsertOutcome::Matched));

        let service = service(repository);

        let command = UpdateUserCommand {
            email: Some(EmailAddress::new("new@x.com".to_string()).unwrap()),
            password: None,
        };

        let updated = service
            .update_user(&principal("alice", Role::Admin), &existing.id, command)
            .await
            .unwrap();

        assert_eq!(updated.role, Role::Standard);
        assert_eq!(updated.password_hash, existing.password_hash);
        assert_eq!(updated.created_at, existing.created_at);

        // Read-your-own-write from the cache
        assert_eq!(service.get_user(&existing.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_admin_updates_other_user_and_rehashes_password() {
        let mut repository = MockTestUserRepository::new();
        let existing = stored_user("bob", "bob@x.com", "old", Role::Standard);

        let returned = existing.clone();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(move |_| Ok(Some(returned.clone())));
        repository
            .expect_upsert()
            .times(1)
            .returning(|_, _| Ok(UpsertOutcome::Matched));

        let service = service(repository);

        let command = UpdateUserCommand {
            email: None,
            password: Some("new".to_string()),
        };

        let updated = service
            .update_user(&principal("root", Role::Admin), &existing.id, command)
            .await
            .unwrap();

        let authenticator = Authenticator::new(SECRET);
        assert!(authenticator.verify_password("new", &updated.password_hash));
        assert!(!authenticator.verify_password("old", &updated.password_hash));
    }

    #[tokio::test]
    async fn test_update_missing_user_creates_it() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));
        repository
            .expect_upsert()
            .withf(|id, user| id.as_str() == "carol" && user.id.as_str() == "carol")
            .times(1)
            .returning(|_, _| Ok(UpsertOutcome::Inserted));

        let service = service(repository);

        let command = UpdateUserCommand {
            email: Some(EmailAddress::new("carol@x.com".to_string()).unwrap()),
            password: Some("secret".to_string()),
        };

        let created = service
            .update_user(
                &principal("carol", Role::Standard),
                &UserId::from_string("carol").unwrap(),
                command,
            )
            .await
            .unwrap();

        assert_eq!(created.role, Role::Standard);
        assert!(created.password_hash.starts_with("$argon2id"));
        assert_eq!(created.created_at.nanosecond() % 1_000, 0);
    }

    #[tokio::test]
    async fn test_update_missing_user_requires_password() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));
        repository.expect_upsert().times(0);

        let service = service(repository);

        let command = UpdateUserCommand {
            email: Some(EmailAddress::new("carol@x.com".to_string()).unwrap()),
            password: None,
        };

        let result = service
            .update_user(
                &principal("carol", Role::Standard),
                &UserId::from_string("carol").unwrap(),
                command,
            )
            .await;

        assert!(matches!(result, Err(UserError::MissingField("password"))));
    }

    #[tokio::test]
    async fn test_delete_other_user_forbidden() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_delete().times(0);

        let service = service(repository);

        let result = service
            .delete_user(
                &principal("alice", Role::Standard),
                &UserId::from_string("bob").unwrap(),
            )
            .await;

        assert!(matches!(result, Err(UserError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_self_invalidates_cache() {
        let mut repository = MockTestUserRepository::new();

        repository.expect_insert().times(1).returning(Ok);
        repository.expect_delete().times(1).returning(|_| Ok(()));
        // After invalidation the read goes to the store
        repository
            .expect_find_by_id()
            .times(1)
            .returning(|_| Ok(None));

        let service = service(repository);

        let command = CreateUserCommand::new(
            EmailAddress::new("a@x.com".to_string()).unwrap(),
            "secret".to_string(),
        );
        let user = service.create_user(command).await.unwrap();

        service
            .delete_user(&principal(user.id.as_str(), Role::Standard), &user.id)
            .await
            .unwrap();

        assert!(matches!(
            service.get_user(&user.id).await,
            Err(UserError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_list_users_requires_admin() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_list_all()
            .times(1)
            .returning(|| Ok(vec![]));

        let service = service(repository);

        assert!(matches!(
            service.list_users(&principal("alice", Role::Standard)).await,
            Err(UserError::Forbidden(_))
        ));
        assert!(service
            .list_users(&principal("root", Role::Admin))
            .await
            .unwrap()
            .is_empty());
    }
}
