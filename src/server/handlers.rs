//! HTTP request handlers.

use crate::error::{AppError, Result};
use crate::images::ImageUpload;
use crate::library::{Book, BookInput, Identity, Review};
use crate::server::AppState;
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::{HeaderMap, StatusCode, header},
};
use serde::{Deserialize, Serialize};

// ============================================================================
// MISC
// ============================================================================

/// Liveness probe.
pub async fn health() -> &'static str {
    "ok"
}

/// Identity behind the presented token.
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Identity>> {
    let user = get_authenticated_user(&state, &headers)?;
    Ok(Json(user))
}

// ============================================================================
// BOOKS
// ============================================================================

/// List all books, newest first.
pub async fn list_books(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Book>>> {
    get_authenticated_user(&state, &headers)?;
    Ok(Json(state.books.list_books()?))
}

/// Create a book from a multipart form.
pub async fn create_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<Book>)> {
    let user = get_authenticated_user(&state, &headers)?;
    let form = read_book_form(multipart, state.books.max_upload_bytes()).await?;

    let book = state
        .books
        .create_book(&user, form.input, form.image)
        .await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Get one book.
pub async fn get_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Book>> {
    get_authenticated_user(&state, &headers)?;
    Ok(Json(state.books.get_book(&id)?))
}

/// Update a book from a multipart form.
pub async fn update_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Book>> {
    let user = get_authenticated_user(&state, &headers)?;
    let form = read_book_form(multipart, state.books.max_upload_bytes()).await?;

    let book = state
        .books
        .update_book(&id, &user, form.input, form.image)
        .await?;
    Ok(Json(book))
}

/// Delete a book.
pub async fn delete_book(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Book>> {
    let user = get_authenticated_user(&state, &headers)?;
    Ok(Json(state.books.delete_book(&id, &user)?))
}

/// Book fields plus optional image, parsed from a form.
struct BookForm {
    input: BookInput,
    image: Option<ImageUpload>,
}

/// Read `title`, `description`, `category` and `image` parts.
///
/// An empty file part counts as no file.
async fn read_book_form(
    multipart: std::result::Result<Multipart, MultipartRejection>,
    max_bytes: usize,
) -> Result<BookForm> {
    let mut multipart =
        multipart.map_err(|e| AppError::Validation(format!("Expected a multipart form: {}", e)))?;

    let mut input = BookInput::default();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| map_multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" | "description" | "category" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| map_multipart_error(e, max_bytes))?;
                match name.as_str() {
                    "title" => input.title = Some(value),
                    "description" => input.description = Some(value),
                    _ => input.category = Some(value),
                }
            }
            "image" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| map_multipart_error(e, max_bytes))?;

                let upload = ImageUpload::new(data.to_vec(), content_type);
                if upload.is_empty() {
                    continue;
                }
                if upload.len() > max_bytes {
                    return Err(AppError::TooLarge(max_bytes));
                }
                image = Some(upload);
            }
            _ => {
                tracing::debug!(field = %name, "Ignoring unknown form field");
            }
        }
    }

    Ok(BookForm { input, image })
}

fn map_multipart_error(e: MultipartError, max_bytes: usize) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::TooLarge(max_bytes)
    } else {
        AppError::Validation(format!("Invalid multipart form: {}", e.body_text()))
    }
}

// ============================================================================
// REVIEWS
// ============================================================================

/// Review text payload.
#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    text: String,
}

/// Acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    message: &'static str,
}

/// List reviews of a book.
pub async fn list_reviews(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
) -> Result<Json<Vec<Review>>> {
    get_authenticated_user(&state, &headers)?;
    Ok(Json(state.books.list_reviews(&book_id)?))
}

/// Add a review.
pub async fn add_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(book_id): Path<String>,
    payload: std::result::Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Review>)> {
    let user = get_authenticated_user(&state, &headers)?;
    let Json(req) = payload.map_err(map_json_rejection)?;

    let review = state.books.add_review(&book_id, &user, &req.text)?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// Edit a review.
pub async fn update_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((book_id, review_id)): Path<(String, String)>,
    payload: std::result::Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let user = get_authenticated_user(&state, &headers)?;
    let Json(req) = payload.map_err(map_json_rejection)?;

    state
        .books
        .update_review(&book_id, &review_id, &user, &req.text)?;
    Ok(Json(MessageResponse {
        message: "Review updated",
    }))
}

/// Delete a review.
pub async fn delete_review(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((book_id, review_id)): Path<(String, String)>,
) -> Result<Json<MessageResponse>> {
    let user = get_authenticated_user(&state, &headers)?;
    state.books.delete_review(&book_id, &review_id, &user)?;
    Ok(Json(MessageResponse {
        message: "Review deleted",
    }))
}

fn map_json_rejection(e: JsonRejection) -> AppError {
    AppError::Validation(format!("Invalid JSON body: {}", e.body_text()))
}

// ============================================================================
// AUTH HELPERS
// ============================================================================

/// Extract token from Authorization header.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Get authenticated identity from token.
fn get_authenticated_user(state: &AppState, headers: &HeaderMap) -> Result<Identity> {
    let token = extract_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?;

    state
        .auth
        .validate_token(&token)?
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))
}
