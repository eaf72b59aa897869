//! HTTP server and routes.

mod handlers;
mod state;

pub use state::AppState;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Allowance on top of the image cap for the text fields of a form.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.books.max_upload_bytes() + FORM_OVERHEAD_BYTES;

    let book_routes = Router::new()
        .route("/", get(handlers::list_books).post(handlers::create_book))
        .route(
            "/{id}",
            get(handlers::get_book)
                .put(handlers::update_book)
                .delete(handlers::delete_book),
        )
        .route(
            "/{id}/reviews",
            get(handlers::list_reviews).post(handlers::add_review),
        )
        .route(
            "/{id}/reviews/{review_id}",
            put(handlers::update_review).delete(handlers::delete_review),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/me", get(handlers::me))
        .nest("/api/books", book_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
