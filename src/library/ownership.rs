//! Owner references and the ownership guard.

use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Public identity of a user, as shown next to books and reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User ID.
    pub id: String,
    /// Display name.
    pub name: String,
}

impl Identity {
    /// Create an identity.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Reference to the owner of a book or the author of a review.
///
/// Serialized as a bare id string until resolved, then as an identity object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OwnerRef {
    /// Raw user ID.
    Id(String),
    /// User ID expanded with display attributes.
    Resolved(Identity),
}

impl OwnerRef {
    /// Canonical identifier, whichever form the reference is in.
    pub fn id(&self) -> &str {
        match self {
            OwnerRef::Id(id) => id,
            OwnerRef::Resolved(identity) => &identity.id,
        }
    }

    /// Expand to a resolved identity when the name is known.
    pub fn resolve(&mut self, names: &HashMap<String, String>) {
        if let Some(name) = names.get(self.id()) {
            *self = OwnerRef::Resolved(Identity::new(self.id().to_string(), name.clone()));
        }
    }

    /// Whether this reference points at the given user.
    pub fn is(&self, user_id: &str) -> bool {
        self.id() == user_id
    }
}

impl From<Identity> for OwnerRef {
    fn from(identity: Identity) -> Self {
        OwnerRef::Resolved(identity)
    }
}

impl From<&Identity> for OwnerRef {
    fn from(identity: &Identity) -> Self {
        OwnerRef::Resolved(identity.clone())
    }
}

/// Fail with `Forbidden` unless `acting_id` owns the resource.
pub fn assert_owner(owner: &OwnerRef, acting_id: &str) -> Result<()> {
    if owner.is(acting_id) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the owner may modify this resource".to_string(),
        ))
    }
}
