//! Book aggregate model.

use crate::db::{StoredBook, StoredReview, timestamp_to_datetime};
use crate::error::{AppError, Result};
use crate::library::ownership::OwnerRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed set of book categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Fantasy.
    Fantasy,
    /// Horror.
    Horror,
    /// Science fiction.
    #[serde(rename = "Science fiction")]
    ScienceFiction,
    /// Thriller.
    Thriller,
    /// Mystery.
    Mystery,
    /// Biography.
    Biography,
    /// Graphic novel.
    #[serde(rename = "Graphic novel")]
    GraphicNovel,
}

impl Category {
    /// Every accepted category.
    pub const ALL: [Category; 7] = [
        Category::Fantasy,
        Category::Horror,
        Category::ScienceFiction,
        Category::Thriller,
        Category::Mystery,
        Category::Biography,
        Category::GraphicNovel,
    ];

    /// Label as stored and exchanged with clients.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Fantasy => "Fantasy",
            Category::Horror => "Horror",
            Category::ScienceFiction => "Science fiction",
            Category::Thriller => "Thriller",
            Category::Mystery => "Mystery",
            Category::Biography => "Biography",
            Category::GraphicNovel => "Graphic novel",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("Unknown category: {}", s)))
    }
}

/// A review embedded in a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Review ID, unique within the parent book.
    pub id: String,
    /// Review text.
    pub text: String,
    /// Author.
    pub owner: OwnerRef,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Review {
    fn from_stored(stored: StoredReview) -> Self {
        Self {
            id: stored.id,
            text: stored.text,
            owner: OwnerRef::Id(stored.owner_id),
            created_at: timestamp_to_datetime(stored.created_at),
            updated_at: timestamp_to_datetime(stored.updated_at),
        }
    }

    fn to_stored(&self) -> StoredReview {
        StoredReview {
            id: self.id.clone(),
            text: self.text.clone(),
            owner_id: self.owner.id().to_string(),
            created_at: self.created_at.timestamp(),
            updated_at: self.updated_at.timestamp(),
        }
    }
}

/// A book listing together with its reviews.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Book ID.
    pub id: String,
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Category.
    pub category: Category,
    /// Creating user.
    pub owner: OwnerRef,
    /// Hosted image URL.
    pub image: Option<String>,
    /// Reviews in creation order.
    pub reviews: Vec<Review>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// Build a new, unsaved book owned by `owner`.
    pub fn new(draft: BookDraft, owner: OwnerRef, image: Option<String>) -> Self {
        let now = timestamp_to_datetime(crate::db::now_timestamp());
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: draft.title,
            description: draft.description,
            category: draft.category,
            owner,
            image,
            reviews: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Convert a stored row into the domain model.
    pub fn from_stored(stored: StoredBook) -> Result<Self> {
        let category = stored.category.parse::<Category>().map_err(|_| {
            AppError::Store(format!(
                "Book {} has unknown category {}",
                stored.id, stored.category
            ))
        })?;

        let reviews: Vec<StoredReview> = serde_json::from_str(&stored.reviews_json)
            .map_err(|e| AppError::Store(format!("Book {} has corrupt reviews: {}", stored.id, e)))?;

        Ok(Self {
            id: stored.id,
            title: stored.title,
            description: stored.description,
            category,
            owner: OwnerRef::Id(stored.owner_id),
            image: stored.image,
            reviews: reviews.into_iter().map(Review::from_stored).collect(),
            created_at: timestamp_to_datetime(stored.created_at),
            updated_at: timestamp_to_datetime(stored.updated_at),
        })
    }

    /// Convert into the stored row.
    pub fn to_stored(&self) -> Result<StoredBook> {
        let reviews: Vec<StoredReview> = self.reviews.iter().map(Review::to_stored).collect();
        let reviews_json = serde_json::to_string(&reviews)
            .map_err(|e| AppError::Internal(format!("Failed to encode reviews: {}", e)))?;

        Ok(StoredBook {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.as_str().to_string(),
            owner_id: self.owner.id().to_string(),
            image: self.image.clone(),
            reviews_json,
            created_at: self.created_at.timestamp(),
            updated_at: self.updated_at.timestamp(),
        })
    }

    /// Apply a validated patch. Owner and id stay as they are.
    pub fn apply(&mut self, patch: BookPatch) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(category) = patch.category {
            self.category = category;
        }
    }

    /// Mark the book as modified now.
    pub fn touch(&mut self) {
        self.updated_at = timestamp_to_datetime(crate::db::now_timestamp());
    }

    /// IDs of the owner and every review author, deduplicated.
    pub fn referenced_user_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = std::iter::once(self.owner.id())
            .chain(self.reviews.iter().map(|r| r.owner.id()))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Raw book fields as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookInput {
    /// Title.
    pub title: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Category label.
    pub category: Option<String>,
}

/// Validated fields for a new book.
#[derive(Debug, Clone, PartialEq)]
pub struct BookDraft {
    /// Title.
    pub title: String,
    /// Description.
    pub description: String,
    /// Category.
    pub category: Category,
}

/// Validated partial update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New category.
    pub category: Option<Category>,
}

impl BookInput {
    /// Validate as a full creation request. All fields are required.
    pub fn into_draft(self) -> Result<BookDraft> {
        let title = required_text("title", self.title)?;
        let description = required_text("description", self.description)?;
        let category = required_text("category", self.category)?.parse()?;

        Ok(BookDraft {
            title,
            description,
            category,
        })
    }

    /// Validate as a partial update. Supplied fields obey the creation rules.
    pub fn into_patch(self) -> Result<BookPatch> {
        let title = self
            .title
            .map(|t| required_text("title", Some(t)))
            .transpose()?;
        let description = self
            .description
            .map(|d| required_text("description", Some(d)))
            .transpose()?;
        let category = self
            .category
            .map(|c| required_text("category", Some(c))?.parse::<Category>())
            .transpose()?;

        Ok(BookPatch {
            title,
            description,
            category,
        })
    }
}

fn required_text(field: &str, value: Option<String>) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::Validation(format!("Field '{}' is required", field))),
    }
}
