//! # Blog Core
//!
//! The domain layer of the blog.
//! This crate contains posts, comments and tags, the rules around them
//! (slugs, pagination, form validation, similarity ranking) and the ports
//! that infrastructure implements. It performs no I/O.

pub mod admin;
pub mod domain;
pub mod error;
pub mod forms;
pub mod pagination;
pub mod ports;
pub mod query;
pub mod share;
pub mod slug;

pub use error::{DomainError, RepoError};
