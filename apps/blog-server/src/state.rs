//! Application state - shared across all handlers.

use std::sync::Arc;

use blog_core::domain::User;
use blog_core::ports::{
    CommentRepository, Mailer, PostRepository, RateLimiter, TagRepository, UserRepository,
};
use blog_infra::{
    ConsoleMailer, InMemoryCommentRepository, InMemoryDatabase, InMemoryMailer,
    InMemoryPostRepository, InMemoryTagRepository, InMemoryUserRepository,
};

#[cfg(feature = "postgres")]
use blog_infra::database::DbConn;

#[cfg(feature = "postgres")]
use blog_infra::{
    PostgresCommentRepository, PostgresPostRepository, PostgresTagRepository,
    PostgresUserRepository,
};

use crate::config::{AppConfig, MailBackend};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<dyn PostRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub users: Arc<dyn UserRepository>,
    pub mailer: Arc<dyn Mailer>,
    /// Sender address for share emails.
    pub mail_from: String,
    /// Limits share submissions per client; `None` disables limiting.
    pub share_limiter: Option<Arc<dyn RateLimiter>>,
    /// "postgres" or "memory", reported by the health check.
    pub storage: &'static str,
}

/// The four repositories, however they are backed.
struct Repositories {
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    tags: Arc<dyn TagRepository>,
    users: Arc<dyn UserRepository>,
    storage: &'static str,
}

impl Repositories {
    fn in_memory() -> Self {
        let db = InMemoryDatabase::new();
        Self {
            posts: Arc::new(InMemoryPostRepository::new(db.clone())),
            comments: Arc::new(InMemoryCommentRepository::new(db.clone())),
            tags: Arc::new(InMemoryTagRepository::new(db.clone())),
            users: Arc::new(InMemoryUserRepository::new(db)),
            storage: "memory",
        }
    }

    #[cfg(feature = "postgres")]
    fn postgres(conn: Arc<DbConn>) -> Self {
        Self {
            posts: Arc::new(PostgresPostRepository::new(conn.clone())),
            comments: Arc::new(PostgresCommentRepository::new(conn.clone())),
            tags: Arc::new(PostgresTagRepository::new(conn.clone())),
            users: Arc::new(PostgresUserRepository::new(conn)),
            storage: "postgres",
        }
    }
}

impl AppState {
    /// Build the application state with appropriate implementations.
    pub async fn new(config: &AppConfig) -> Self {
        let repos = Self::repositories(config).await;

        if repos.storage == "memory" {
            Self::seed_admin_user(repos.users.as_ref()).await;
        }

        let state = Self {
            posts: repos.posts,
            comments: repos.comments,
            tags: repos.tags,
            users: repos.users,
            mailer: Self::mailer(config.mail.backend),
            mail_from: config.mail.from.clone(),
            share_limiter: Self::share_limiter(config),
            storage: repos.storage,
        };

        tracing::info!(storage = state.storage, "Application state initialized");
        state
    }

    /// In-memory state with the given mailer and no rate limiting.
    #[cfg(test)]
    pub fn in_memory(mailer: Arc<dyn Mailer>) -> Self {
        let repos = Repositories::in_memory();
        Self {
            posts: repos.posts,
            comments: repos.comments,
            tags: repos.tags,
            users: repos.users,
            mailer,
            mail_from: "webmaster@localhost".to_string(),
            share_limiter: None,
            storage: repos.storage,
        }
    }

    #[cfg(feature = "postgres")]
    async fn repositories(config: &AppConfig) -> Repositories {
        let Some(db_config) = &config.database else {
            tracing::warn!("DATABASE_URL not set. Running without database (in-memory mode).");
            return Repositories::in_memory();
        };

        match blog_infra::database::connect(db_config).await {
            Ok(conn) => Repositories::postgres(Arc::new(conn)),
            Err(e) => {
                tracing::error!(
                    "Failed to connect to database: {}. Using in-memory fallback.",
                    e
                );
                Repositories::in_memory()
            }
        }
    }

    #[cfg(not(feature = "postgres"))]
    async fn repositories(config: &AppConfig) -> Repositories {
        if config.database.is_some() {
            tracing::warn!("DATABASE_URL ignored: built without the postgres feature");
        }
        tracing::info!("Running without postgres feature - using in-memory repositories");
        Repositories::in_memory()
    }

    /// In-memory mode has no users table to manage, so the admin gets one
    /// author to attach posts to.
    async fn seed_admin_user(users: &dyn UserRepository) {
        match users
            .insert(User::new("admin".to_string(), "admin@localhost".to_string()))
            .await
        {
            Ok(user) => tracing::info!(author_id = %user.id, "Seeded in-memory admin author"),
            Err(e) => tracing::warn!(error = %e, "Could not seed admin author"),
        }
    }

    fn mailer(backend: MailBackend) -> Arc<dyn Mailer> {
        match backend {
            #[cfg(feature = "smtp")]
            MailBackend::Smtp => {
                match blog_infra::SmtpMailer::new(blog_infra::SmtpConfig::from_env()) {
                    Ok(mailer) => Arc::new(mailer),
                    Err(e) => {
                        tracing::error!("Failed to configure SMTP: {}. Using console mailer.", e);
                        Arc::new(ConsoleMailer::new())
                    }
                }
            }
            #[cfg(not(feature = "smtp"))]
            MailBackend::Smtp => {
                tracing::warn!("Built without the smtp feature - using console mailer");
                Arc::new(ConsoleMailer::new())
            }
            MailBackend::Console => Arc::new(ConsoleMailer::new()),
            MailBackend::Memory => Arc::new(InMemoryMailer::new()),
        }
    }

    #[cfg(feature = "rate-limit")]
    fn share_limiter(config: &AppConfig) -> Option<Arc<dyn RateLimiter>> {
        match blog_infra::InMemoryRateLimiter::new(config.rate_limit.clone()) {
            Ok(limiter) => Some(Arc::new(limiter)),
            Err(e) => {
                tracing::warn!("Share rate limiting disabled: {}", e);
                None
            }
        }
    }

    #[cfg(not(feature = "rate-limit"))]
    fn share_limiter(_config: &AppConfig) -> Option<Arc<dyn RateLimiter>> {
        None
    }
}
