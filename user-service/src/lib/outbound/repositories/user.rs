use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use sqlx::PgPool;

use super::deadline::with_deadline;
use crate::domain::user::models::EmailAddress;
use crate::domain::user::models::UpsertOutcome;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::UserRepository;
use crate::user::errors::RoleError;
use crate::user::errors::UserError;

/// PostgreSQL user store.
///
/// Rows are addressed by `user_id`; the table's own `pk` never leaves this
/// module. Connections are borrowed from the pool per statement and returned
/// when the statement future completes or is dropped.
pub struct PostgresUserRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = UserError;

    fn try_from(r: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: UserId::from_string(&r.user_id)?,
            email: EmailAddress::new(r.email)?,
            password_hash: r.password_hash,
            role: r
                .role
                .parse()
                .map_err(|e: RoleError| UserError::DatabaseError(e.to_string()))?,
            created_at: r.created_at,
        })
    }
}

fn map_error(e: sqlx::Error, email: &EmailAddress) -> UserError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() && db_err.constraint() == Some("users_email_key") {
            return UserError::EmailAlreadyExists(email.as_str().to_string());
        }
    }
    map_backend_error(e)
}

fn map_backend_error(e: sqlx::Error) -> UserError {
    match e {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => UserError::BackendUnavailable(e.to_string()),
        _ => UserError::DatabaseError(e.to_string()),
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let row = with_deadline(self.timeout, async {
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT user_id, email, password_hash, role, created_at
                FROM users
                WHERE user_id = $1
                "#,
            )
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_backend_error)
        })
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn find_by_email(&self, email: &EmailAddress) -> Result<Option<User>, UserError> {
        let row = with_deadline(self.timeout, async {
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT user_id, email, password_hash, role, created_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_backend_error)
        })
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn list_all(&self) -> Result<Vec<User>, UserError> {
        let rows = with_deadline(self.timeout, async {
            sqlx::query_as::<_, UserRow>(
                r#"
                SELECT user_id, email, password_hash, role, created_at
                FROM users
                ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(map_backend_error)
        })
        .await?;

        rows.into_iter().map(User::try_from).collect()
    }

    async fn insert(&self, user: User) -> Result<User, UserError> {
        with_deadline(self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO users (user_id, email, password_hash, role, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(user.id.as_str())
            .bind(user.email.as_str())
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_error(e, &user.email))
        })
        .await?;

        Ok(user)
    }

    async fn upsert(&self, id: &UserId, user: User) -> Result<UpsertOutcome, UserError> {
        let inserted = with_deadline(self.timeout, async {
            // xmax is zero only for a freshly inserted row version
            sqlx::query_scalar::<_, bool>(
                r#"
                INSERT INTO users (user_id, email, password_hash, role, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id) DO UPDATE
                SET email = EXCLUDED.email,
                    password_hash = EXCLUDED.password_hash,
                    role = EXCLUDED.role
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(id.as_str())
            .bind(user.email.as_str())
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_error(e, &user.email))
        })
        .await?;

        Ok(if inserted {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Matched
        })
    }

    async fn delete(&self, id: &UserId) -> Result<(), UserError> {
        let result = with_deadline(self.timeout, async {
            sqlx::query(
                r#"
                DELETE FROM users
                WHERE user_id = $1
                "#,
            )
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(map_backend_error)
        })
        .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(id.to_string()));
        }

        Ok(())
    }
}
