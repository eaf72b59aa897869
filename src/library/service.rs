//! Book and review operations: validation, ownership, image upload and
//! persistence in one place.

use crate::db::Database;
use crate::error::{AppError, Result};
use crate::images::{ImageHost, ImageUpload, attach_image};
use crate::library::book::{Book, BookInput, Review};
use crate::library::ownership::{Identity, OwnerRef, assert_owner};
use crate::library::review;
use std::sync::Arc;

/// Book & review aggregate service.
///
/// Review mutations load the book, change the embedded list and write the
/// whole book back. Concurrent writers to the same book are not coordinated;
/// the last write wins.
pub struct BookService {
    db: Database,
    images: Arc<dyn ImageHost>,
    max_upload_bytes: usize,
}

impl BookService {
    /// Create a new book service.
    pub fn new(db: Database, images: Arc<dyn ImageHost>, max_upload_bytes: usize) -> Self {
        Self {
            db,
            images,
            max_upload_bytes,
        }
    }

    /// Largest image accepted, in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// Create a book owned by `owner`.
    ///
    /// When an image is supplied it is uploaded first; if that fails nothing
    /// is stored.
    pub async fn create_book(
        &self,
        owner: &Identity,
        input: BookInput,
        image: Option<ImageUpload>,
    ) -> Result<Book> {
        let draft = input.into_draft()?;
        if let Some(ref upload) = image {
            upload.validate(self.max_upload_bytes)?;
        }

        let image_url = match image {
            Some(upload) => Some(
                attach_image(self.images.as_ref(), &upload, self.max_upload_bytes).await?,
            ),
            None => None,
        };

        let book = Book::new(draft, OwnerRef::from(owner), image_url);
        self.db.insert_book(&book.to_stored()?)?;

        tracing::info!(book_id = %book.id, user_id = %owner.id, category = %book.category, "Book created");
        Ok(book)
    }

    /// All books, newest first, owners resolved.
    pub fn list_books(&self) -> Result<Vec<Book>> {
        let mut books = self
            .db
            .list_books()?
            .into_iter()
            .map(Book::from_stored)
            .collect::<Result<Vec<_>>>()?;

        let owner_ids: Vec<&str> = books.iter().map(|b| b.owner.id()).collect();
        let names = self.db.get_user_names(&owner_ids)?;
        for book in &mut books {
            book.owner.resolve(&names);
        }

        tracing::debug!(count = books.len(), "Listed books");
        Ok(books)
    }

    /// A single book with its owner and review authors resolved.
    pub fn get_book(&self, id: &str) -> Result<Book> {
        let mut book = self.load(id)?;
        self.resolve_all(&mut book)?;
        Ok(book)
    }

    /// Update a book. Only its owner may do so.
    ///
    /// Field changes are saved even when the image upload fails; the upload
    /// error is returned afterwards. The book is reloaded after the upload so
    /// reviews written in the meantime are kept.
    pub async fn update_book(
        &self,
        id: &str,
        acting: &Identity,
        input: BookInput,
        image: Option<ImageUpload>,
    ) -> Result<Book> {
        let patch = input.into_patch()?;
        if let Some(ref upload) = image {
            upload.validate(self.max_upload_bytes)?;
        }

        let book = self.load(id)?;
        assert_owner(&book.owner, &acting.id)?;

        let uploaded = match image {
            Some(upload) => Some(
                attach_image(self.images.as_ref(), &upload, self.max_upload_bytes).await,
            ),
            None => None,
        };

        let mut book = self.load(id)?;
        assert_owner(&book.owner, &acting.id)?;
        book.apply(patch);

        let upload_error = match uploaded {
            Some(Ok(url)) => {
                book.image = Some(url);
                None
            }
            Some(Err(e)) => {
                tracing::warn!(book_id = %book.id, error = %e, "Image upload failed, saving other fields");
                Some(e)
            }
            None => None,
        };

        book.touch();
        self.save(&book)?;
        tracing::info!(book_id = %book.id, user_id = %acting.id, upload_failed = upload_error.is_some(), "Book updated");

        if let Some(e) = upload_error {
            return Err(e);
        }

        self.resolve_all(&mut book)?;
        Ok(book)
    }

    /// Delete a book and its reviews. Only its owner may do so.
    pub fn delete_book(&self, id: &str, acting: &Identity) -> Result<Book> {
        let mut book = self.load(id)?;
        assert_owner(&book.owner, &acting.id)?;

        if !self.db.delete_book(id)? {
            return Err(book_not_found(id));
        }

        tracing::info!(book_id = %id, user_id = %acting.id, reviews = book.reviews.len(), "Book deleted");
        self.resolve_all(&mut book)?;
        Ok(book)
    }

    /// Reviews of a book in creation order, authors resolved.
    pub fn list_reviews(&self, book_id: &str) -> Result<Vec<Review>> {
        Ok(self.get_book(book_id)?.reviews)
    }

    /// Add a review by `author` to a book.
    pub fn add_review(&self, book_id: &str, author: &Identity, text: &str) -> Result<Review> {
        let mut book = self.load(book_id)?;
        let review = review::add_review(&mut book, text, author)?;
        self.save(&book)?;

        tracing::info!(book_id = %book_id, review_id = %review.id, user_id = %author.id, "Review added");
        Ok(review)
    }

    /// Edit a review. Only its author may do so.
    pub fn update_review(
        &self,
        book_id: &str,
        review_id: &str,
        acting: &Identity,
        text: &str,
    ) -> Result<()> {
        let mut book = self.load(book_id)?;
        review::update_review(&mut book, review_id, text, &acting.id)?;
        self.save(&book)?;

        tracing::info!(book_id = %book_id, review_id = %review_id, user_id = %acting.id, "Review updated");
        Ok(())
    }

    /// Remove a review. Only its author may do so.
    pub fn delete_review(&self, book_id: &str, review_id: &str, acting: &Identity) -> Result<()> {
        let mut book = self.load(book_id)?;
        review::remove_review(&mut book, review_id, &acting.id)?;
        self.save(&book)?;

        tracing::info!(book_id = %book_id, review_id = %review_id, user_id = %acting.id, "Review deleted");
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Book> {
        let stored = self.db.get_book(id)?.ok_or_else(|| book_not_found(id))?;
        Book::from_stored(stored)
    }

    fn save(&self, book: &Book) -> Result<()> {
        // The book may have been deleted between load and save.
        if !self.db.update_book(&book.to_stored()?)? {
            return Err(book_not_found(&book.id));
        }
        Ok(())
    }

    fn resolve_all(&self, book: &mut Book) -> Result<()> {
        let names = self.db.get_user_names(&book.referenced_user_ids())?;
        book.owner.resolve(&names);
        for review in &mut book.reviews {
            review.owner.resolve(&names);
        }
        Ok(())
    }
}

fn book_not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Book not found: {}", id))
}
