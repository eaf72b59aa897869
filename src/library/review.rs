//! Review mutations on an already-loaded book.
//!
//! These functions only touch the in-memory aggregate; persisting the parent
//! book is up to the caller.

use crate::db::{now_timestamp, timestamp_to_datetime};
use crate::error::{AppError, Result};
use crate::library::book::{Book, Review};
use crate::library::ownership::{Identity, OwnerRef, assert_owner};

/// Append a review authored by `author`. Returns the new review.
pub fn add_review(book: &mut Book, text: &str, author: &Identity) -> Result<Review> {
    let text = review_text(text)?;
    let now = timestamp_to_datetime(now_timestamp());

    let review = Review {
        id: uuid::Uuid::new_v4().to_string(),
        text,
        owner: OwnerRef::from(author),
        created_at: now,
        updated_at: now,
    };

    book.reviews.push(review.clone());
    book.touch();
    Ok(review)
}

/// Replace the text of a review. Only its author may do so.
pub fn update_review(book: &mut Book, review_id: &str, text: &str, acting_id: &str) -> Result<()> {
    let text = review_text(text)?;
    let review = book
        .reviews
        .iter_mut()
        .find(|r| r.id == review_id)
        .ok_or_else(|| review_not_found(review_id))?;

    assert_owner(&review.owner, acting_id)?;

    review.text = text;
    review.updated_at = timestamp_to_datetime(now_timestamp());
    book.touch();
    Ok(())
}

/// Remove a review. Only its author may do so; the rest keep their order.
pub fn remove_review(book: &mut Book, review_id: &str, acting_id: &str) -> Result<Review> {
    let index = book
        .reviews
        .iter()
        .position(|r| r.id == review_id)
        .ok_or_else(|| review_not_found(review_id))?;

    assert_owner(&book.reviews[index].owner, acting_id)?;

    let removed = book.reviews.remove(index);
    book.touch();
    Ok(removed)
}

fn review_text(text: &str) -> Result<String> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Review text is required".to_string()));
    }
    Ok(text.to_string())
}

fn review_not_found(review_id: &str) -> AppError {
    AppError::NotFound(format!("Review not found: {}", review_id))
}
