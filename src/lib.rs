//! bookswap: a book-sharing backend.
//!
//! Users list books they are willing to share, attach a cover image hosted
//! on an external image service, and leave reviews on each other's books.
//!
//! # Features
//!
//! - Book listings with a fixed category set
//! - Cover uploads forwarded to Imgur
//! - Reviews embedded in each book, editable only by their author
//! - Owner-only updates and deletes
//! - Bearer token authentication with CLI-provisioned users

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Authentication and user management.
pub mod auth;
/// Configuration and CLI.
pub mod config;
/// Database operations.
pub mod db;
/// Error types.
pub mod error;
/// Image upload pipeline.
pub mod images;
/// Books, reviews and ownership rules.
pub mod library;
/// HTTP server.
pub mod server;

#[cfg(test)]
mod tests;

pub use config::{Cli, Command, Config};
pub use db::Database;
pub use error::{AppError, Result};
pub use server::AppState;
