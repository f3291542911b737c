#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use auth::Authenticator;
use auth::FixedClock;
use auth::SigningKey;
use chrono::Utc;
use serde_json::json;
use serde_json::Value;
use user_service::cache::InMemoryUserCache;
use user_service::domain::user::models::EmailAddress;
use user_service::domain::user::models::Role;
use user_service::domain::user::models::User;
use user_service::domain::user::models::UserId;
use user_service::domain::user::ports::UserRepository;
use user_service::domain::user::service::UserService;
use user_service::inbound::http::router::create_router;
use user_service::repositories::InMemoryUserRepository;

pub const JWT_SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

/// Test application that spawns a real server over in-memory backends
pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub repository: Arc<InMemoryUserRepository>,
    pub authenticator: Arc<Authenticator>,
    pub clock: Arc<FixedClock>,
    pub api_client: reqwest::Client,
}

impl TestApp {
    /// Spawn the application in a background task and return TestApp
    pub async fn spawn() -> Self {
        // Use random port (0 = OS assigns)
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind random port");
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let repository = Arc::new(InMemoryUserRepository::new());
        let cache = Arc::new(InMemoryUserCache::new());

        let clock = Arc::new(FixedClock::at(Utc::now()));
        let authenticator = Arc::new(Authenticator::with_key(
            SigningKey::from_secret(JWT_SECRET),
            clock.clone(),
        ));

        let user_service = Arc::new(UserService::new(
            Arc::clone(&repository),
            cache,
            Duration::from_secs(3600),
            Arc::clone(&authenticator),
        ));

        let router = create_router(user_service, Arc::clone(&authenticator));

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Server error");
        });

        Self {
            address,
            port,
            repository,
            authenticator,
            clock,
            api_client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Helper to make GET request
    pub fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.get(self.url(path))
    }

    /// Helper to make POST request
    pub fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.api_client.post(self.url(path))
    }

    /// Helper to make GET request with the Token header
    pub fn get_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.get(path).header("Token", token)
    }

    /// Helper to make PUT request with the Token header
    pub fn put_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client.put(self.url(path)).header("Token", token)
    }

    /// Helper to make DELETE request with the Token header
    pub fn delete_authenticated(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.api_client.delete(self.url(path)).header("Token", token)
    }

    /// Register a user over HTTP and return its id
    pub async fn create_user(&self, email: &str, password: &str) -> String {
        let response = self
            .post("/users")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"]["id"].as_str().unwrap().to_string()
    }

    /// Log in over HTTP and return the token
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post("/login")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.expect("Failed to parse response");
        body["data"]["token"].as_str().unwrap().to_string()
    }

    /// Provision an admin straight into the store and return its id and token
    pub async fn seed_admin(&self, email: &str) -> (String, String) {
        let admin = User {
            id: UserId::new(),
            email: EmailAddress::new(email.to_string()).unwrap(),
            password_hash: self.authenticator.hash_password("admin-password").unwrap(),
            role: Role::Admin,
            created_at: Utc::now(),
        };
        let id = admin.id.to_string();
        self.repository.insert(admin).await.unwrap();

        let token = self.login(email, "admin-password").await;
        (id, token)
    }
}
