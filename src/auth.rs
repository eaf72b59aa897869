//! Identity verification: user provisioning and bearer tokens.

use crate::db::{Database, Session, User, now_timestamp};
use crate::error::{AppError, Result};
use crate::library::Identity;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Generate a secure random token.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Authentication service.
pub struct AuthService {
    db: Database,
    session_duration_days: u32,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: Database, session_duration_days: u32) -> Self {
        Self {
            db,
            session_duration_days,
        }
    }

    /// Create a new user (admin function).
    pub fn create_user(&self, name: &str) -> Result<User> {
        let name = name.trim();
        if name.is_empty() || name.len() > 64 {
            return Err(AppError::Validation(
                "Name must be 1-64 characters".to_string(),
            ));
        }

        if !name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == ' ')
        {
            return Err(AppError::Validation(
                "Name can only contain letters, numbers, spaces, _ and -".to_string(),
            ));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_at: now_timestamp(),
        };

        self.db.create_user(&user)?;
        tracing::info!(user_id = %user.id, name = %user.name, "User created");
        Ok(user)
    }

    /// Issue a new access token for an existing user.
    pub fn issue_token(&self, name: &str) -> Result<(User, String)> {
        let user = self
            .db
            .get_user_by_name(name)?
            .ok_or_else(|| AppError::NotFound(format!("User not found: {}", name)))?;

        let token = generate_token();
        let expires_at = now_timestamp() + (self.session_duration_days as i64 * 24 * 60 * 60);

        self.db.create_session(&Session {
            token: token.clone(),
            user_id: user.id.clone(),
            expires_at,
        })?;

        Ok((user, token))
    }

    /// Validate a token and return the identity it belongs to.
    pub fn validate_token(&self, token: &str) -> Result<Option<Identity>> {
        let session = match self.db.get_session(token)? {
            Some(s) => s,
            None => return Ok(None),
        };

        // Check expiration
        if session.expires_at < now_timestamp() {
            self.db.delete_session(token)?;
            return Ok(None);
        }

        Ok(self
            .db
            .get_user_by_id(&session.user_id)?
            .map(|user| Identity::new(user.id, user.name)))
    }

    /// Revoke a token.
    pub fn revoke(&self, token: &str) -> Result<()> {
        self.db.delete_session(token)
    }

    /// Drop expired sessions.
    pub fn cleanup_expired(&self) -> Result<usize> {
        self.db.cleanup_expired_sessions()
    }

    /// Delete a user.
    pub fn delete_user(&self, name: &str) -> Result<bool> {
        self.db.delete_user(name)
    }

    /// List all users.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.db.list_users()
    }
}
