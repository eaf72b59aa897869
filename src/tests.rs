use crate::config::Config;
use crate::db::{Database, StoredBook, User, now_timestamp};
use crate::error::AppError;
use crate::images::{ImageHost, ImageUpload};
use crate::images::testing::{FakeImageHost, png_bytes};
use crate::library::{BookInput, BookService, Category, Identity, OwnerRef};
use crate::server::{AppState, create_router};
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use std::sync::Arc;
use tower::ServiceExt;

const MAX_UPLOAD: usize = 5 * 1024 * 1024;

fn test_db() -> Database {
    Database::open_memory().unwrap()
}

fn create_user(db: &Database, id: &str, name: &str) -> Identity {
    let user = User {
        id: id.to_string(),
        name: name.to_string(),
        created_at: now_timestamp(),
    };
    db.create_user(&user).unwrap();
    Identity::new(id, name)
}

fn service_with(db: &Database, host: Arc<FakeImageHost>) -> BookService {
    BookService::new(db.clone(), host, MAX_UPLOAD)
}

fn service(db: &Database) -> BookService {
    service_with(db, Arc::new(FakeImageHost::succeeding("https://i.imgur.com/cover.png")))
}

fn input(title: &str, description: &str, category: &str) -> BookInput {
    BookInput {
        title: Some(title.to_string()),
        description: Some(description.to_string()),
        category: Some(category.to_string()),
    }
}

fn dune() -> BookInput {
    input("Dune", "Desert planet epic", "Science fiction")
}

fn png_upload() -> ImageUpload {
    ImageUpload::new(png_bytes(), "image/png")
}

fn stored_book(id: &str, owner_id: &str, created_at: i64) -> StoredBook {
    StoredBook {
        id: id.to_string(),
        title: format!("Title {}", id),
        description: "Description".to_string(),
        category: "Fantasy".to_string(),
        owner_id: owner_id.to_string(),
        image: None,
        reviews_json: "[]".to_string(),
        created_at,
        updated_at: created_at,
    }
}

// ============================================================================
// STORE
// ============================================================================

#[test]
fn db_create_and_get_user() {
    let db = test_db();
    create_user(&db, "user-1", "alice");

    let found = db.get_user_by_name("alice").unwrap().unwrap();
    assert_eq!(found.id, "user-1");

    let found_by_id = db.get_user_by_id("user-1").unwrap().unwrap();
    assert_eq!(found_by_id.name, "alice");
}

#[test]
fn db_get_user_names() {
    let db = test_db();
    create_user(&db, "u1", "alice");
    create_user(&db, "u2", "bob");

    let names = db.get_user_names(&["u1", "u2", "ghost"]).unwrap();
    assert_eq!(names.len(), 2);
    assert_eq!(names["u2"], "bob");
    assert!(db.get_user_names(&[]).unwrap().is_empty());
}

#[test]
fn db_list_books_newest_first_regardless_of_insert_order() {
    let db = test_db();
    create_user(&db, "u1", "alice");

    db.insert_book(&stored_book("middle", "u1", 200)).unwrap();
    db.insert_book(&stored_book("oldest", "u1", 100)).unwrap();
    db.insert_book(&stored_book("newest", "u1", 300)).unwrap();

    let ids: Vec<String> = db.list_books().unwrap().into_iter().map(|b| b.id).collect();
    assert_eq!(ids, ["newest", "middle", "oldest"]);
}

#[test]
fn db_rejects_unknown_category() {
    let db = test_db();
    create_user(&db, "u1", "alice");

    let mut book = stored_book("b1", "u1", 100);
    book.category = "Comedy".to_string();

    assert!(matches!(db.insert_book(&book), Err(AppError::Validation(_))));
    assert_eq!(db.book_count().unwrap(), 0);
}

#[test]
fn db_update_and_delete_book() {
    let db = test_db();
    create_user(&db, "u1", "alice");
    db.insert_book(&stored_book("b1", "u1", 100)).unwrap();

    let mut book = db.get_book("b1").unwrap().unwrap();
    book.title = "Renamed".to_string();
    book.owner_id = "someone-else".to_string();
    assert!(db.update_book(&book).unwrap());

    let found = db.get_book("b1").unwrap().unwrap();
    assert_eq!(found.title, "Renamed");
    // Owner is never rewritten.
    assert_eq!(found.owner_id, "u1");

    assert!(db.delete_book("b1").unwrap());
    assert!(db.get_book("b1").unwrap().is_none());
    assert!(!db.update_book(&book).unwrap());
    assert!(!db.delete_book("b1").unwrap());
}

#[test]
fn db_delete_user_cascades_to_books() {
    let db = test_db();
    create_user(&db, "u1", "alice");
    db.insert_book(&stored_book("b1", "u1", 100)).unwrap();

    assert!(db.delete_user("alice").unwrap());
    assert_eq!(db.book_count().unwrap(), 0);
}

#[test]
fn db_open_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("bookswap.db");

    {
        let db = Database::open(&path).unwrap();
        create_user(&db, "u1", "alice");
    }

    let db = Database::open(&path).unwrap();
    assert!(db.get_user_by_id("u1").unwrap().is_some());
}

// ============================================================================
// BOOK SERVICE
// ============================================================================

#[tokio::test]
async fn create_book_without_image() {
    let db = test_db();
    let host = Arc::new(FakeImageHost::succeeding("https://i.imgur.com/x.png"));
    let books = service_with(&db, host.clone());
    let alice = create_user(&db, "u1", "alice");

    let book = books.create_book(&alice, dune(), None).await.unwrap();

    assert!(!book.id.is_empty());
    assert!(book.image.is_none());
    assert_eq!(book.owner, OwnerRef::Resolved(alice.clone()));
    assert_eq!(book.category, Category::ScienceFiction);
    assert_eq!(host.call_count(), 0);

    let stored = books.get_book(&book.id).unwrap();
    assert_eq!(stored.title, "Dune");
    assert_eq!(stored.owner.id(), "u1");
}

#[tokio::test]
async fn create_book_with_image_stores_link() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");

    let book = books
        .create_book(&alice, dune(), Some(png_upload()))
        .await
        .unwrap();
    assert_eq!(book.image.as_deref(), Some("https://i.imgur.com/cover.png"));

    let stored = books.get_book(&book.id).unwrap();
    assert_eq!(stored.image, book.image);
}

#[tokio::test]
async fn create_book_missing_fields_persists_nothing() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");

    let cases = [
        BookInput {
            title: None,
            ..dune()
        },
        BookInput {
            description: None,
            ..dune()
        },
        BookInput {
            category: None,
            ..dune()
        },
    ];

    for case in cases {
        let result = books.create_book(&alice, case, None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
    assert_eq!(db.book_count().unwrap(), 0);
}

#[tokio::test]
async fn create_book_unknown_category() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");

    let result = books
        .create_book(&alice, input("Jokes", "Funny", "Comedy"), None)
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(db.book_count().unwrap(), 0);
}

#[tokio::test]
async fn create_book_upload_failure_persists_nothing() {
    let db = test_db();
    let host = Arc::new(FakeImageHost::failing("Image host timed out"));
    let books = service_with(&db, host.clone());
    let alice = create_user(&db, "u1", "alice");

    let result = books.create_book(&alice, dune(), Some(png_upload())).await;

    assert!(matches!(result, Err(AppError::Upload(_))));
    assert_eq!(host.call_count(), 1);
    assert_eq!(db.book_count().unwrap(), 0);
}

#[tokio::test]
async fn create_book_invalid_fields_skip_upload() {
    let db = test_db();
    let host = Arc::new(FakeImageHost::succeeding("https://i.imgur.com/x.png"));
    let books = service_with(&db, host.clone());
    let alice = create_user(&db, "u1", "alice");

    let result = books
        .create_book(&alice, input("Jokes", "Funny", "Comedy"), Some(png_upload()))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(host.call_count(), 0);
}

#[tokio::test]
async fn list_books_newest_first_with_owner_names() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");
    let bob = create_user(&db, "u2", "bob");

    let first = books.create_book(&alice, dune(), None).await.unwrap();
    let second = books
        .create_book(&bob, input("It", "Clown", "Horror"), None)
        .await
        .unwrap();

    let listed = books.list_books().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
    assert_eq!(listed[0].owner, OwnerRef::Resolved(bob));
    assert_eq!(listed[1].owner, OwnerRef::Resolved(alice));
}

#[tokio::test]
async fn get_missing_book_is_not_found() {
    let db = test_db();
    let books = service(&db);
    assert!(matches!(
        books.get_book("nope"),
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn non_owner_cannot_delete_or_update_book() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");
    let bob = create_user(&db, "u2", "bob");

    let x = books.create_book(&alice, dune(), None).await.unwrap();

    assert!(matches!(
        books.delete_book(&x.id, &bob),
        Err(AppError::Forbidden(_))
    ));

    let patch = BookInput {
        title: Some("Stolen".to_string()),
        ..BookInput::default()
    };
    assert!(matches!(
        books.update_book(&x.id, &bob, patch, None).await,
        Err(AppError::Forbidden(_))
    ));

    let still_there = books.get_book(&x.id).unwrap();
    assert_eq!(still_there.title, "Dune");
}

#[tokio::test]
async fn owner_updates_and_deletes_book() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");

    let x = books.create_book(&alice, dune(), None).await.unwrap();

    let patch = BookInput {
        category: Some("Thriller".to_string()),
        ..BookInput::default()
    };
    let updated = books.update_book(&x.id, &alice, patch, None).await.unwrap();
    assert_eq!(updated.category, Category::Thriller);
    assert_eq!(updated.title, "Dune");
    assert_eq!(updated.owner.id(), "u1");

    let bad = BookInput {
        category: Some("Comedy".to_string()),
        ..BookInput::default()
    };
    assert!(matches!(
        books.update_book(&x.id, &alice, bad, None).await,
        Err(AppError::Validation(_))
    ));

    let deleted = books.delete_book(&x.id, &alice).unwrap();
    assert_eq!(deleted.id, x.id);
    assert!(matches!(books.get_book(&x.id), Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn update_keeps_existing_image_without_file() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");

    let x = books
        .create_book(&alice, dune(), Some(png_upload()))
        .await
        .unwrap();

    let patch = BookInput {
        title: Some("Dune Messiah".to_string()),
        ..BookInput::default()
    };
    let updated = books.update_book(&x.id, &alice, patch, None).await.unwrap();
    assert_eq!(updated.title, "Dune Messiah");
    assert_eq!(updated.image, x.image);
}

#[tokio::test]
async fn update_upload_failure_still_saves_fields() {
    let db = test_db();
    let alice = create_user(&db, "u1", "alice");
    let x = service(&db).create_book(&alice, dune(), None).await.unwrap();

    let failing = service_with(&db, Arc::new(FakeImageHost::failing("bad gateway")));
    let patch = BookInput {
        title: Some("Dune Messiah".to_string()),
        ..BookInput::default()
    };
    let result = failing
        .update_book(&x.id, &alice, patch, Some(png_upload()))
        .await;
    assert!(matches!(result, Err(AppError::Upload(_))));

    let stored = failing.get_book(&x.id).unwrap();
    assert_eq!(stored.title, "Dune Messiah");
    assert!(stored.image.is_none());
}

/// Image host that lets another reader review the book while the upload is
/// in flight.
struct ReviewingHost {
    books: BookService,
    book_id: String,
    reviewer: Identity,
    fail: bool,
}

#[async_trait::async_trait]
impl ImageHost for ReviewingHost {
    async fn upload(&self, _image: &ImageUpload) -> crate::error::Result<String> {
        self.books
            .add_review(&self.book_id, &self.reviewer, "Written mid-upload")?;
        if self.fail {
            Err(AppError::Upload("Image host timed out".to_string()))
        } else {
            Ok("https://i.imgur.com/late.png".to_string())
        }
    }
}

async fn update_with_review_during_upload(fail: bool) -> (BookService, String) {
    let db = test_db();
    let alice = create_user(&db, "u1", "alice");
    let carol = create_user(&db, "u3", "carol");
    let x = service(&db).create_book(&alice, dune(), None).await.unwrap();

    let host = ReviewingHost {
        books: service(&db),
        book_id: x.id.clone(),
        reviewer: carol,
        fail,
    };
    let books = BookService::new(db.clone(), Arc::new(host), MAX_UPLOAD);

    let patch = BookInput {
        title: Some("Dune Messiah".to_string()),
        ..BookInput::default()
    };
    let result = books
        .update_book(&x.id, &alice, patch, Some(png_upload()))
        .await;
    assert_eq!(result.is_err(), fail);

    (books, x.id)
}

#[tokio::test]
async fn update_keeps_reviews_added_during_upload() {
    let (books, id) = update_with_review_during_upload(false).await;

    let stored = books.get_book(&id).unwrap();
    assert_eq!(stored.title, "Dune Messiah");
    assert_eq!(stored.image.as_deref(), Some("https://i.imgur.com/late.png"));
    assert_eq!(stored.reviews.len(), 1);
    assert_eq!(stored.reviews[0].text, "Written mid-upload");
}

#[tokio::test]
async fn failed_upload_keeps_reviews_added_during_upload() {
    let (books, id) = update_with_review_during_upload(true).await;

    let stored = books.get_book(&id).unwrap();
    assert_eq!(stored.title, "Dune Messiah");
    assert!(stored.image.is_none());
    assert_eq!(books.list_reviews(&id).unwrap().len(), 1);
}

// ============================================================================
// REVIEWS
// ============================================================================

#[tokio::test]
async fn add_review_appends_to_one_book_only() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");
    let carol = create_user(&db, "u3", "carol");

    let x = books.create_book(&alice, dune(), None).await.unwrap();
    let y = books
        .create_book(&alice, input("It", "Clown", "Horror"), None)
        .await
        .unwrap();

    let review = books.add_review(&x.id, &carol, "Great read").unwrap();
    assert_eq!(review.owner, OwnerRef::Resolved(carol.clone()));
    assert_eq!(review.text, "Great read");

    let reviews = books.list_reviews(&x.id).unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].id, review.id);
    assert_eq!(reviews[0].owner, OwnerRef::Resolved(carol));

    assert!(books.list_reviews(&y.id).unwrap().is_empty());
}

#[tokio::test]
async fn add_review_to_missing_book() {
    let db = test_db();
    let books = service(&db);
    let carol = create_user(&db, "u3", "carol");

    assert!(matches!(
        books.add_review("missing", &carol, "Great read"),
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn non_author_cannot_touch_review() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");
    let carol = create_user(&db, "u3", "carol");
    let dave = create_user(&db, "u4", "dave");

    let x = books.create_book(&alice, dune(), None).await.unwrap();
    let review = books.add_review(&x.id, &carol, "Great read").unwrap();

    assert!(matches!(
        books.delete_review(&x.id, &review.id, &dave),
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        books.update_review(&x.id, &review.id, &dave, "Vandalised"),
        Err(AppError::Forbidden(_))
    ));
    // Owning the book does not grant rights over its reviews.
    assert!(matches!(
        books.delete_review(&x.id, &review.id, &alice),
        Err(AppError::Forbidden(_))
    ));

    let reviews = books.list_reviews(&x.id).unwrap();
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].text, "Great read");
}

#[tokio::test]
async fn author_edits_and_deletes_review() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");
    let carol = create_user(&db, "u3", "carol");
    let dave = create_user(&db, "u4", "dave");

    let x = books.create_book(&alice, dune(), None).await.unwrap();
    let first = books.add_review(&x.id, &carol, "one").unwrap();
    let second = books.add_review(&x.id, &dave, "two").unwrap();
    let third = books.add_review(&x.id, &carol, "three").unwrap();

    books
        .update_review(&x.id, &first.id, &carol, "one, revised")
        .unwrap();
    books.delete_review(&x.id, &second.id, &dave).unwrap();

    let reviews = books.list_reviews(&x.id).unwrap();
    let ids: Vec<&str> = reviews.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, [first.id.as_str(), third.id.as_str()]);
    assert_eq!(reviews[0].text, "one, revised");
}

#[tokio::test]
async fn review_from_another_book_is_not_found() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");
    let carol = create_user(&db, "u3", "carol");

    let x = books.create_book(&alice, dune(), None).await.unwrap();
    let y = books
        .create_book(&alice, input("It", "Clown", "Horror"), None)
        .await
        .unwrap();
    let review = books.add_review(&x.id, &carol, "Great read").unwrap();

    assert!(matches!(
        books.delete_review(&y.id, &review.id, &carol),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        books.update_review(&y.id, &review.id, &carol, "moved"),
        Err(AppError::NotFound(_))
    ));
    assert_eq!(books.list_reviews(&x.id).unwrap().len(), 1);
}

#[tokio::test]
async fn deleting_book_discards_reviews() {
    let db = test_db();
    let books = service(&db);
    let alice = create_user(&db, "u1", "alice");
    let carol = create_user(&db, "u3", "carol");

    let x = books.create_book(&alice, dune(), None).await.unwrap();
    books.add_review(&x.id, &carol, "Great read").unwrap();

    let deleted = books.delete_book(&x.id, &alice).unwrap();
    assert_eq!(deleted.reviews.len(), 1);
    assert!(matches!(
        books.list_reviews(&x.id),
        Err(AppError::NotFound(_))
    ));
}

// ============================================================================
// HTTP
// ============================================================================

const BOUNDARY: &str = "bookswap-test-boundary";

struct TestApp {
    router: axum::Router,
    state: AppState,
}

impl TestApp {
    fn new(max_upload: usize, host: FakeImageHost) -> Self {
        let mut config = Config::default();
        config.upload.max_bytes = max_upload;
        let state = AppState::new(&config, test_db(), Arc::new(host));
        Self {
            router: create_router(state.clone()),
            state,
        }
    }

    fn standard() -> Self {
        Self::new(
            MAX_UPLOAD,
            FakeImageHost::succeeding("https://i.imgur.com/cover.png"),
        )
    }

    fn user(&self, name: &str) -> String {
        self.state.auth.create_user(name).unwrap();
        self.state.auth.issue_token(name).unwrap().1
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, body)
    }
}

fn multipart_body(fields: &[(&str, &str)], file: Option<(&[u8], &str)>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((data, content_type)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"cover\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn form_request(method: &str, uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(method: &str, uri: &str, token: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn dune_form() -> Vec<u8> {
    multipart_body(
        &[
            ("title", "Dune"),
            ("description", "Desert planet epic"),
            ("category", "Science fiction"),
        ],
        None,
    )
}

#[tokio::test]
async fn http_requires_token() {
    let app = TestApp::standard();

    let request = Request::builder()
        .uri("/api/books")
        .body(Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app.send(get_request("GET", "/api/books", "bogus")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn http_health_is_public() {
    let app = TestApp::standard();
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn http_me_returns_identity() {
    let app = TestApp::standard();
    let token = app.user("alice");

    let (status, body) = app.send(get_request("GET", "/api/me", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "alice");
}

#[tokio::test]
async fn http_create_and_fetch_book() {
    let app = TestApp::standard();
    let token = app.user("alice");

    let (status, created) = app
        .send(form_request("POST", "/api/books", &token, dune_form()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["title"], "Dune");
    assert_eq!(created["category"], "Science fiction");
    assert_eq!(created["image"], serde_json::Value::Null);
    assert_eq!(created["owner"]["name"], "alice");

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = app
        .send(get_request("GET", &format!("/api/books/{}", id), &token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], created["id"]);

    let (status, listed) = app.send(get_request("GET", "/api/books", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn http_create_with_image() {
    let app = TestApp::standard();
    let token = app.user("alice");

    let png = png_bytes();
    let body = multipart_body(
        &[
            ("title", "Dune"),
            ("description", "Desert planet epic"),
            ("category", "Science fiction"),
        ],
        Some((&png, "image/png")),
    );
    let (status, created) = app
        .send(form_request("POST", "/api/books", &token, body))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["image"], "https://i.imgur.com/cover.png");
}

#[tokio::test]
async fn http_empty_file_part_is_ignored() {
    let app = TestApp::standard();
    let token = app.user("alice");

    let body = multipart_body(
        &[
            ("title", "Dune"),
            ("description", "Desert planet epic"),
            ("category", "Science fiction"),
        ],
        Some((b"", "application/octet-stream")),
    );
    let (status, created) = app
        .send(form_request("POST", "/api/books", &token, body))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["image"], serde_json::Value::Null);
}

#[tokio::test]
async fn http_rejects_unknown_category() {
    let app = TestApp::standard();
    let token = app.user("alice");

    let body = multipart_body(
        &[
            ("title", "Jokes"),
            ("description", "Funny"),
            ("category", "Comedy"),
        ],
        None,
    );
    let (status, error) = app
        .send(form_request("POST", "/api/books", &token, body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "validation");
    assert_eq!(app.state.db.book_count().unwrap(), 0);
}

#[tokio::test]
async fn http_rejects_oversized_image() {
    let app = TestApp::new(8, FakeImageHost::succeeding("https://i.imgur.com/x.png"));
    let token = app.user("alice");

    let png = png_bytes();
    let body = multipart_body(
        &[
            ("title", "Dune"),
            ("description", "Desert planet epic"),
            ("category", "Science fiction"),
        ],
        Some((&png, "image/png")),
    );
    let (status, error) = app
        .send(form_request("POST", "/api/books", &token, body))
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(error["error"], "payload_too_large");
}

#[tokio::test]
async fn http_upload_failure_maps_to_bad_gateway() {
    let app = TestApp::new(MAX_UPLOAD, FakeImageHost::failing("Image host timed out"));
    let token = app.user("alice");

    let png = png_bytes();
    let body = multipart_body(
        &[
            ("title", "Dune"),
            ("description", "Desert planet epic"),
            ("category", "Science fiction"),
        ],
        Some((&png, "image/png")),
    );
    let (status, error) = app
        .send(form_request("POST", "/api/books", &token, body))
        .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(error["error"], "upload_failed");
    assert_eq!(app.state.db.book_count().unwrap(), 0);
}

#[tokio::test]
async fn http_non_owner_delete_is_forbidden() {
    let app = TestApp::standard();
    let alice = app.user("alice");
    let bob = app.user("bob");

    let (_, created) = app
        .send(form_request("POST", "/api/books", &alice, dune_form()))
        .await;
    let uri = format!("/api/books/{}", created["id"].as_str().unwrap());

    let (status, error) = app.send(get_request("DELETE", &uri, &bob)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(error["error"], "forbidden");

    let (status, _) = app.send(get_request("GET", &uri, &bob)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, deleted) = app.send(get_request("DELETE", &uri, &alice)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["title"], "Dune");

    let (status, error) = app.send(get_request("GET", &uri, &alice)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["error"], "not_found");
}

#[tokio::test]
async fn http_update_book_patch() {
    let app = TestApp::standard();
    let alice = app.user("alice");

    let (_, created) = app
        .send(form_request("POST", "/api/books", &alice, dune_form()))
        .await;
    let uri = format!("/api/books/{}", created["id"].as_str().unwrap());

    let body = multipart_body(&[("description", "Spice and sandworms")], None);
    let (status, updated) = app.send(form_request("PUT", &uri, &alice, body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["description"], "Spice and sandworms");
    assert_eq!(updated["title"], "Dune");
}

#[tokio::test]
async fn http_review_lifecycle() {
    let app = TestApp::standard();
    let alice = app.user("alice");
    let carol = app.user("carol");
    let dave = app.user("dave");

    let (_, created) = app
        .send(form_request("POST", "/api/books", &alice, dune_form()))
        .await;
    let reviews_uri = format!("/api/books/{}/reviews", created["id"].as_str().unwrap());

    let (status, review) = app
        .send(json_request(
            "POST",
            &reviews_uri,
            &carol,
            serde_json::json!({ "text": "Great read" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(review["owner"]["name"], "carol");

    let review_uri = format!("{}/{}", reviews_uri, review["id"].as_str().unwrap());

    let (status, _) = app.send(get_request("DELETE", &review_uri, &dave)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, ack) = app
        .send(json_request(
            "PUT",
            &review_uri,
            &carol,
            serde_json::json!({ "text": "Even better the second time" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["message"], "Review updated");

    let (status, listed) = app.send(get_request("GET", &reviews_uri, &dave)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed[0]["text"], "Even better the second time");
    assert_eq!(listed[0]["owner"]["name"], "carol");

    let (status, ack) = app.send(get_request("DELETE", &review_uri, &carol)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["message"], "Review deleted");

    let (_, listed) = app.send(get_request("GET", &reviews_uri, &dave)).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn http_review_bad_json_is_validation_error() {
    let app = TestApp::standard();
    let alice = app.user("alice");

    let (_, created) = app
        .send(form_request("POST", "/api/books", &alice, dune_form()))
        .await;
    let reviews_uri = format!("/api/books/{}/reviews", created["id"].as_str().unwrap());

    let (status, error) = app
        .send(json_request(
            "POST",
            &reviews_uri,
            &alice,
            serde_json::json!({ "body": "wrong field" }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "validation");
}
