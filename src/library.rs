//! Book aggregate: books, embedded reviews and ownership rules.

pub mod book;
pub mod ownership;
pub mod review;
pub mod service;

pub use book::{Book, BookDraft, BookInput, BookPatch, Category, Review};
pub use ownership::{Identity, OwnerRef, assert_owner};
pub use service::BookService;
