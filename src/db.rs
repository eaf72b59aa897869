mod schema;

pub use schema::Database;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID.
    pub id: String,
    /// Display name, unique across users.
    pub name: String,
    /// Account creation timestamp.
    pub created_at: i64,
}

/// Access token session.
#[derive(Debug, Clone)]
pub struct Session {
    /// Session token.
    pub token: String,
    /// User ID.
    pub user_id: String,
    /// Expiration timestamp.
    pub expires_at: i64,
}

/// Stored book row. Reviews live embedded in `reviews_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredBook {
    /// Book ID.
    pub id: String,
    /// Book title.
    pub title: String,
    /// Book description.
    pub description: String,
    /// Category label.
    pub category: String,
    /// ID of the creating user.
    pub owner_id: String,
    /// Hosted image URL.
    pub image: Option<String>,
    /// Embedded reviews (JSON array of [`StoredReview`]).
    pub reviews_json: String,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Review as embedded in a book row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReview {
    /// Review ID.
    pub id: String,
    /// Review text.
    pub text: String,
    /// Author user ID.
    pub owner_id: String,
    /// Creation timestamp.
    pub created_at: i64,
    /// Last update timestamp.
    pub updated_at: i64,
}

/// Timestamp helper.
pub fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// Convert timestamp to DateTime.
pub fn timestamp_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_else(Utc::now)
}
