//! # Blog Shared
//!
//! Types exchanged with clients: the view contexts handlers produce for the
//! renderer, and RFC 7807 error bodies.

pub mod dto;
pub mod response;

pub use response::{ApiResponse, ErrorResponse};
