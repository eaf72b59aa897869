use crate::db::*;
use crate::error::{AppError, Result};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Store(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Store(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                created_at INTEGER NOT NULL
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Books table, reviews embedded as a JSON array
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL CHECK (length(title) > 0),
                description TEXT NOT NULL CHECK (length(description) > 0),
                category TEXT NOT NULL CHECK (category IN (
                    'Fantasy', 'Horror', 'Science fiction', 'Thriller',
                    'Mystery', 'Biography', 'Graphic novel'
                )),
                owner_id TEXT NOT NULL,
                image TEXT,
                reviews_json TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY (owner_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_created ON books(created_at);
            CREATE INDEX IF NOT EXISTS idx_books_owner ON books(owner_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            "#,
        )
        .map_err(|e| AppError::Store(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![user.id, user.name, user.created_at],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::Validation(format!("User '{}' already exists", user.name))
            } else {
                AppError::Store(format!("Failed to create user: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get user by name.
    pub fn get_user_by_name(&self, name: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, created_at FROM users WHERE name = ?1",
            params![name],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Store(format!("Failed to get user: {}", e)))
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, name, created_at FROM users WHERE id = ?1",
            params![id],
            Self::row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Store(format!("Failed to get user: {}", e)))
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, name, created_at FROM users ORDER BY name")
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let users = stmt
            .query_map([], Self::row_to_user)
            .map_err(|e| AppError::Store(format!("Failed to list users: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Store(format!("Failed to collect users: {}", e)))?;

        Ok(users)
    }

    /// Look up display names for a set of user IDs. Unknown IDs are absent
    /// from the result.
    pub fn get_user_names(&self, ids: &[&str]) -> Result<HashMap<String, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let conn = self.conn.lock();
        let placeholders: Vec<String> = ids.iter().map(|_| "?".to_string()).collect();
        let sql = format!(
            "SELECT id, name FROM users WHERE id IN ({})",
            placeholders.join(",")
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let names = stmt
            .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| AppError::Store(format!("Failed to resolve users: {}", e)))?
            .collect::<std::result::Result<HashMap<_, _>, _>>()
            .map_err(|e| AppError::Store(format!("Failed to collect users: {}", e)))?;

        Ok(names)
    }

    /// Delete user. Their sessions and books go with them.
    pub fn delete_user(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM users WHERE name = ?1", params![name])
            .map_err(|e| AppError::Store(format!("Failed to delete user: {}", e)))?;
        Ok(rows > 0)
    }

    fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
        })
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, session.expires_at],
        )
        .map_err(|e| AppError::Store(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    expires_at: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Store(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Store(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Remove expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Store(format!("Failed to cleanup sessions: {}", e)))?;
        Ok(rows)
    }

    // ========== BOOK OPERATIONS ==========

    /// Insert a new book.
    pub fn insert_book(&self, book: &StoredBook) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO books
             (id, title, description, category, owner_id, image, reviews_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                book.id,
                book.title,
                book.description,
                book.category,
                book.owner_id,
                book.image,
                book.reviews_json,
                book.created_at,
                book.updated_at,
            ],
        )
        .map_err(|e| map_write_error("Failed to create book", e))?;
        Ok(())
    }

    /// Get book by ID.
    pub fn get_book(&self, id: &str) -> Result<Option<StoredBook>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, title, description, category, owner_id, image, reviews_json,
                    created_at, updated_at
             FROM books WHERE id = ?1",
            params![id],
            Self::row_to_stored_book,
        )
        .optional()
        .map_err(|e| AppError::Store(format!("Failed to get book: {}", e)))
    }

    /// List all books, most recently created first.
    pub fn list_books(&self) -> Result<Vec<StoredBook>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, title, description, category, owner_id, image, reviews_json,
                        created_at, updated_at
                 FROM books ORDER BY created_at DESC, rowid DESC",
            )
            .map_err(|e| AppError::Store(format!("Failed to prepare query: {}", e)))?;

        let books = stmt
            .query_map([], Self::row_to_stored_book)
            .map_err(|e| AppError::Store(format!("Failed to list books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Store(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// Overwrite the mutable fields of a book. Owner and creation time are
    /// never touched. Returns false when the book no longer exists.
    pub fn update_book(&self, book: &StoredBook) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE books SET
                    title = ?2,
                    description = ?3,
                    category = ?4,
                    image = ?5,
                    reviews_json = ?6,
                    updated_at = ?7
                 WHERE id = ?1",
                params![
                    book.id,
                    book.title,
                    book.description,
                    book.category,
                    book.image,
                    book.reviews_json,
                    book.updated_at,
                ],
            )
            .map_err(|e| map_write_error("Failed to update book", e))?;
        Ok(rows > 0)
    }

    /// Delete a single book by ID.
    pub fn delete_book(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute("DELETE FROM books WHERE id = ?1", params![id])
            .map_err(|e| AppError::Store(format!("Failed to delete book: {}", e)))?;
        Ok(rows > 0)
    }

    /// Number of stored books.
    pub fn book_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
            .map_err(|e| AppError::Store(format!("Failed to count books: {}", e)))?;
        Ok(count as usize)
    }

    /// Helper to convert a row to StoredBook.
    fn row_to_stored_book(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredBook> {
        Ok(StoredBook {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            category: row.get(3)?,
            owner_id: row.get(4)?,
            image: row.get(5)?,
            reviews_json: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }
}

/// CHECK violations are bad input; anything else is a store fault.
fn map_write_error(context: &str, e: rusqlite::Error) -> AppError {
    let message = e.to_string();
    if message.contains("CHECK constraint") {
        AppError::Validation("Book fields failed validation".to_string())
    } else if message.contains("FOREIGN KEY constraint") {
        AppError::Validation("Book owner does not exist".to_string())
    } else {
        AppError::Store(format!("{}: {}", context, message))
    }
}
