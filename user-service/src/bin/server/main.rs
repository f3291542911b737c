use std::sync::Arc;

use auth::Authenticator;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use user_service::cache::InMemoryUserCache;
use user_service::cache::RedisUserCache;
use user_service::config::CacheBackend;
use user_service::config::Config;
use user_service::config::DatabaseBackend;
use user_service::domain::user::ports::UserCache;
use user_service::domain::user::ports::UserRepository;
use user_service::domain::user::service::UserService;
use user_service::inbound::http::router::create_router;
use user_service::repositories::InMemoryUserRepository;
use user_service::repositories::PostgresUserRepository;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "user_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        service = "user-service",
        version = env!("CARGO_PKG_VERSION"),
        "Service starting"
    );

    let config = Config::load()?;

    tracing::info!(
        database_backend = ?config.database.backend,
        cache_backend = ?config.cache.backend,
        http_port = config.server.http_port,
        store_timeout_secs = config.database.timeout_secs,
        cache_ttl_secs = config.cache.ttl_secs,
        cache_timeout_ms = config.cache.timeout_ms,
        "Configuration loaded"
    );

    match config.database.backend {
        DatabaseBackend::Postgres => {
            let pg_pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .acquire_timeout(config.database.timeout())
                .connect(&config.database.url)
                .await?;
            tracing::info!(
                max_connections = config.database.max_connections,
                database = "postgresql",
                "Database connection pool created"
            );

            sqlx::migrate!("./migrations").run(&pg_pool).await?;
            tracing::info!(database = "postgresql", "Database migrations completed");

            let repository = PostgresUserRepository::new(pg_pool, config.database.timeout());
            serve_with_cache(config, Arc::new(repository)).await
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory user store, data is lost on restart");
            serve_with_cache(config, Arc::new(InMemoryUserRepository::new())).await
        }
    }
}

async fn serve_with_cache<UR: UserRepository>(
    config: Config,
    repository: Arc<UR>,
) -> Result<(), anyhow::Error> {
    match config.cache.backend {
        CacheBackend::Redis => {
            let cache = RedisUserCache::connect(&config.cache.url, config.cache.timeout())?;
            tracing::info!(cache = "redis", "Cache connection pool created");
            serve(config, repository, Arc::new(cache)).await
        }
        CacheBackend::Memory => {
            tracing::info!(cache = "memory", "Using in-process cache");
            serve(config, repository, Arc::new(InMemoryUserCache::new())).await
        }
    }
}

async fn serve<UR: UserRepository, UC: UserCache>(
    config: Config,
    repository: Arc<UR>,
    cache: Arc<UC>,
) -> Result<(), anyhow::Error> {
    let authenticator = Arc::new(Authenticator::new(config.jwt.secret.as_bytes()));

    let user_service = UserService::new(
        repository,
        cache,
        config.cache.ttl(),
        Arc::clone(&authenticator),
    )
    .with_cache_timeout(config.cache.timeout());
    let user_service = Arc::new(user_service);

    let http_address = format!("0.0.0.0:{}", config.server.http_port);
    let http_listener = tokio::net::TcpListener::bind(&http_address).await?;
    tracing::info!(
        address = %http_address,
        port = config.server.http_port,
        protocol = "http",
        "Http server listening"
    );

    let http_application = create_router(user_service, authenticator);

    if let Err(e) = axum::serve(http_listener, http_application).await {
        tracing::error!(error = %e, "Server error");
        return Err(e.into());
    }

    tracing::info!("Server exited successfully");
    Ok(())
}
