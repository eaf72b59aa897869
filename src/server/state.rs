//! Application state shared across handlers.

use crate::auth::AuthService;
use crate::config::Config;
use crate::db::Database;
use crate::images::ImageHost;
use crate::library::BookService;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Authentication service.
    pub auth: Arc<AuthService>,
    /// Book and review operations.
    pub books: Arc<BookService>,
}

impl AppState {
    /// Create application state over an open database and an image host.
    pub fn new(config: &Config, db: Database, images: Arc<dyn ImageHost>) -> Self {
        let auth = AuthService::new(db.clone(), config.auth.session_days);
        let books = BookService::new(db.clone(), images, config.upload.max_bytes);

        Self {
            db,
            auth: Arc::new(auth),
            books: Arc::new(books),
        }
    }
}
