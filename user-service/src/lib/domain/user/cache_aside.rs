use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::user::models::CachedUser;
use crate::domain::user::models::UpsertOutcome;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::user::errors::CacheError;
use crate::user::errors::UserError;
use crate::user::ports::UserCache;
use crate::user::ports::UserRepository;

/// Read-through, write-through cache in front of a [`UserRepository`].
///
/// The repository is the source of truth. A cache hit is returned without
/// consulting the store, so an entry written elsewhere can shadow a store
/// change until its TTL elapses. Cache failures are logged and never fail
/// the surrounding operation, and every cache call is bounded by a timeout
/// so a stalled cache degrades to the store instead of hanging.
pub struct CacheAside<R, C>
where
    R: UserRepository,
    C: UserCache,
{
    repository: Arc<R>,
    cache: Arc<C>,
    ttl: Duration,
    timeout: Duration,
}

/// Upper bound on a single cache call unless overridden.
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(500);

impl<R, C> CacheAside<R, C>
where
    R: UserRepository,
    C: UserCache,
{
    pub fn new(repository: Arc<R>, cache: Arc<C>, ttl: Duration) -> Self {
        Self {
            repository,
            cache,
            ttl,
            timeout: DEFAULT_CACHE_TIMEOUT,
        }
    }

    /// Override the bound applied to each cache call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Underlying store, for operations that must bypass the cache.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    fn key(id: &UserId) -> String {
        format!("user:{}", id)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, CacheError>
    where
        F: Future<Output = Result<T, CacheError>>,
    {
        tokio::time::timeout(self.timeout, call)
            .await
            .unwrap_or(Err(CacheError::Timeout(self.timeout)))
    }

    /// Look a user up, populating the cache on a store hit.
    ///
    /// # Returns
    /// The user, or None when neither cache nor store holds it
    ///
    /// # Errors
    /// Store errors only
    pub async fn get(&self, id: &UserId) -> Result<Option<User>, UserError> {
        let key = Self::key(id);

        match self.bounded(self.cache.get(&key)).await {
            Ok(Some(payload)) => match decode(&payload) {
                Ok(user) => {
                    tracing::debug!(key = %key, "cache hit");
                    return Ok(Some(user));
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                }
            },
            Ok(None) => tracing::debug!(key = %key, "cache miss"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Cache read failed"),
        }

        let user = self.repository.find_by_id(id).await?;

        if let Some(user) = &user {
            self.populate(user).await;
        }

        Ok(user)
    }

    /// Insert a new user into the store, then write it through to the cache.
    pub async fn insert(&self, user: User) -> Result<User, UserError> {
        let user = self.repository.insert(user).await?;
        self.populate(&user).await;
        Ok(user)
    }

    /// Upsert a user into the store, then write it through to the cache.
    ///
    /// The cache is left untouched when the store rejects the write.
    pub async fn put(&self, id: &UserId, user: User) -> Result<UpsertOutcome, UserError> {
        let outcome = self.repository.upsert(id, user.clone()).await?;
        self.populate(&user).await;
        Ok(outcome)
    }

    /// Drop the cache entry for `id`.
    ///
    /// A failed delete is only logged; the entry still expires with its TTL.
    pub async fn invalidate(&self, id: &UserId) {
        let key = Self::key(id);

        match self.bounded(self.cache.delete(&key)).await {
            Ok(()) => tracing::debug!(key = %key, "cache invalidated"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Cache invalidation failed"),
        }
    }

    async fn populate(&self, user: &User) {
        let key = Self::key(&user.id);

        let result = match encode(user) {
            Ok(payload) => self.bounded(self.cache.set(&key, payload, self.ttl)).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => tracing::debug!(key = %key, ttl_secs = self.ttl.as_secs(), "cache set"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Not cached"),
        }
    }
}

fn encode(user: &User) -> Result<String, CacheError> {
    serde_json::to_string(&CachedUser::from(user))
        .map_err(|e| CacheError::Serialization(e.to_string()))
}

fn decode(payload: &str) -> Result<User, UserError> {
    let cached: CachedUser =
        serde_json::from_str(payload).map_err(|e| UserError::Unknown(e.to_string()))?;
    User::try_from(cached)
}
