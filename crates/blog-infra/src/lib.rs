//! # Blog Infrastructure
//!
//! Concrete implementations of the ports defined in `blog-core`.
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `minimal` - No external services, in-memory only
//! - `postgres` - PostgreSQL repositories via SeaORM
//! - `smtp` - SMTP mail transport via lettre
//! - `rate-limit` - Per-client rate limiting via governor

pub mod database;
pub mod mail;

#[cfg(feature = "rate-limit")]
pub mod rate_limit;

// Re-exports - In-Memory
pub use database::memory::{
    InMemoryCommentRepository, InMemoryDatabase, InMemoryPostRepository, InMemoryTagRepository,
    InMemoryUserRepository,
};
pub use mail::{ConsoleMailer, InMemoryMailer};

#[cfg(feature = "postgres")]
pub use database::{
    PostgresCommentRepository, PostgresPostRepository, PostgresTagRepository,
    PostgresUserRepository,
};

#[cfg(feature = "smtp")]
pub use mail::{SmtpConfig, SmtpMailer};

#[cfg(feature = "rate-limit")]
pub use rate_limit::{InMemoryRateLimiter, RateLimitConfig};
