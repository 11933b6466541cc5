//! API integration tests
//!
//! Drive the full router in-process over the in-memory store.

use axum::{
    body::Body,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method, Request, StatusCode,
    },
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::{
    api,
    config::{AppConfig, BootstrapAdmin, StorageBackend},
    repository::Repository,
    AppState,
};

struct TestApp {
    router: Router,
}

impl TestApp {
    async fn new() -> Self {
        let mut config = AppConfig::default();
        config.database.backend = StorageBackend::Memory;
        config.auth.jwt_secret = "integration-secret".to_string();
        let admin = BootstrapAdmin {
            username: "admin".to_string(),
            password: "admin-password".to_string(),
        };

        let state = AppState::new(config, Repository::in_memory());
        tokio_test::assert_ok!(state.services.auth.ensure_admin(&admin).await);

        Self {
            router: api::create_router(state),
        }
    }

    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/login",
                None,
                json!({ "username": username, "password": password }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {}", body);
        body["token"].as_str().unwrap().to_string()
    }

    /// Register a reader and return their token
    async fn reader(&self, username: &str) -> String {
        let (status, _) = self
            .post(
                "/api/auth/register",
                None,
                json!({ "username": username, "password": "secret123", "role": "user" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        self.login(username, "secret123").await
    }

    async fn admin(&self) -> String {
        self.login("admin", "admin-password").await
    }

    /// Add a book as admin and return its id
    async fn add_book(&self, isbn: &str, quantity: i32) -> i64 {
        let token = self.admin().await;
        let (status, body) = self
            .post(
                "/api/books",
                Some(&token),
                json!({
                    "title": format!("Book {}", isbn),
                    "author": "Some Author",
                    "isbn": isbn,
                    "quantity": quantity
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body["id"].as_i64().unwrap()
    }

    async fn quantity(&self, book_id: i64) -> i64 {
        let (status, body) = self.get(&format!("/api/books/{}", book_id), None).await;
        assert_eq!(status, StatusCode::OK);
        body["quantity"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/api/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = TestApp::new().await;
    let token = app.reader("alice").await;

    let (status, body) = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["role"], "user");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_register_rules() {
    let app = TestApp::new().await;
    app.reader("alice").await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "username": "mallory", "password": "secret123", "role": "admin" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin registration is not allowed");

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "username": "alice", "password": "secret123", "role": "user" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username already exists");

    let (status, body) = app
        .post(
            "/api/auth/register",
            None,
            json!({ "username": "bob", "password": "123", "role": "user" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Password must be at least 6 characters long");
}

#[tokio::test]
async fn test_login_with_bad_password() {
    let app = TestApp::new().await;
    app.reader("alice").await;

    let (status, body) = app
        .post(
            "/api/auth/login",
            None,
            json!({ "username": "alice", "password": "not-it" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid credentials");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/api/borrow/history", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/borrow/history", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/borrow", None, json!({ "bookId": 1 })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_catalog_is_admin_managed() {
    let app = TestApp::new().await;
    let reader = app.reader("alice").await;

    let (status, body) = app
        .post(
            "/api/books",
            Some(&reader),
            json!({ "title": "T", "author": "A", "isbn": "1234567890", "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admins only");

    let id = app.add_book("1234567890", 1).await;
    let admin = app.admin().await;
    let (status, body) = app
        .post(
            "/api/books",
            Some(&admin),
            json!({ "title": "T", "author": "A", "isbn": "1234567890", "quantity": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "ISBN already exists");

    let (status, body) = app
        .request(
            Method::PUT,
            &format!("/api/books/{}", id),
            Some(&admin),
            Some(json!({ "title": "New", "author": "A", "isbn": "12ab", "quantity": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Valid ISBN (10-13 digits) is required");

    let (status, body) = app.get("/api/books", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = app.get("/api/books/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_borrow_and_return_round_trip() {
    let app = TestApp::new().await;
    let book = app.add_book("9780441013593", 2).await;
    let token = app.reader("alice").await;

    let (status, body) = app.post("/api/borrow", Some(&token), json!({ "bookId": book })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book borrowed successfully");
    let record_id = body["records"][0]["id"].as_i64().unwrap();
    assert_eq!(body["records"][0]["status"], "borrowed");
    assert_eq!(app.quantity(book).await, 1);

    let (status, body) = app.get("/api/borrow/history", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["title"], "Book 9780441013593");
    assert_eq!(body[0]["status"], "borrowed");

    let uri = format!("/api/borrow/return/{}", record_id);
    let (status, body) = app.post(&uri, Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["record"]["status"], "returned");
    assert!(body["record"]["return_date"].is_string());
    assert_eq!(app.quantity(book).await, 2);

    let (status, body) = app.post(&uri, Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book already returned");
    assert_eq!(app.quantity(book).await, 2);
}

#[tokio::test]
async fn test_borrow_rejections() {
    let app = TestApp::new().await;
    let empty = app.add_book("1111111111", 0).await;
    let token = app.reader("alice").await;

    let (status, body) = app.post("/api/borrow", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book ID is required");

    let (status, body) = app.post("/api/borrow", Some(&token), json!({ "bookId": empty })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book not available");
    assert_eq!(body["book_ids"], json!([empty]));

    let (_, history) = app.get("/api/borrow/history", Some(&token)).await;
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_batch_borrow_is_all_or_nothing() {
    let app = TestApp::new().await;
    let available = app.add_book("2222222222", 3).await;
    let empty = app.add_book("3333333333", 0).await;
    let token = app.reader("alice").await;

    let (status, body) = app
        .post("/api/borrow", Some(&token), json!({ "bookIds": [available, empty] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["book_ids"], json!([empty]));
    assert_eq!(app.quantity(available).await, 3);

    let (status, body) = app
        .post("/api/borrow", Some(&token), json!({ "bookIds": [available, 4040] }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book not found");
    assert_eq!(body["book_ids"], json!([4040]));

    let (_, history) = app.get("/api/borrow/history", Some(&token)).await;
    assert_eq!(history, json!([]));

    let (status, body) = app
        .post("/api/borrow", Some(&token), json!({ "bookIds": [available, available] }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records"].as_array().unwrap().len(), 2);
    assert_eq!(app.quantity(available).await, 1);
}

#[tokio::test]
async fn test_return_ownership_and_admin_path() {
    let app = TestApp::new().await;
    let book = app.add_book("4444444444", 1).await;
    let alice = app.reader("alice").await;
    let bob = app.reader("bob").await;
    let admin = app.admin().await;

    let (_, body) = app.post("/api/borrow", Some(&alice), json!({ "bookId": book })).await;
    let record_id = body["records"][0]["id"].as_i64().unwrap();

    let (status, body) = app
        .post(&format!("/api/borrow/return/{}", record_id), Some(&bob), json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Borrow record not found");

    let admin_uri = format!("/api/borrow/admin/return/{}", record_id);
    let (status, body) = app.post(&admin_uri, Some(&bob), json!({})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admins only");

    let (status, body) = app.post(&admin_uri, Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book marked as returned successfully");
    assert_eq!(app.quantity(book).await, 1);

    let (status, _) = app.post(&admin_uri, Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/api/borrow/admin/return/999", Some(&admin), json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_all_borrows_is_admin_only() {
    let app = TestApp::new().await;
    let book = app.add_book("5555555555", 1).await;
    let alice = app.reader("alice").await;
    app.post("/api/borrow", Some(&alice), json!({ "bookId": book })).await;

    let (status, _) = app.get("/api/borrow/all", Some(&alice)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/api/borrow/all", Some(&app.admin().await)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["username"], "alice");
    assert_eq!(body[0]["title"], "Book 5555555555");
}

#[tokio::test]
async fn test_reader_stats() {
    let app = TestApp::new().await;
    let book = app.add_book("6666666666", 5).await;
    let token = app.reader("alice").await;

    let (_, body) = app
        .post("/api/borrow", Some(&token), json!({ "bookIds": [book, book] }))
        .await;
    let first = body["records"][0]["id"].as_i64().unwrap();
    app.post(&format!("/api/borrow/return/{}", first), Some(&token), json!({}))
        .await;

    let (status, body) = app.get("/api/auth/stats", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "booksBorrowed": 2,
            "currentlyReading": 1,
            "completedBooks": 1,
            "booksDueSoon": 0
        })
    );
}

#[tokio::test]
async fn test_book_with_records_cannot_be_deleted() {
    let app = TestApp::new().await;
    let borrowed = app.add_book("7777777777", 1).await;
    let unused = app.add_book("8888888888", 1).await;
    let alice = app.reader("alice").await;
    let admin = app.admin().await;
    app.post("/api/borrow", Some(&alice), json!({ "bookId": borrowed })).await;

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/books/{}", borrowed), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(Method::DELETE, &format!("/api/books/{}", unused), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Book deleted successfully");
}

#[tokio::test]
async fn test_malformed_requests_get_json_errors() {
    let app = TestApp::new().await;
    let token = app.reader("alice").await;

    let (status, body) = app.post("/api/borrow", Some(&token), json!({ "bookId": "abc" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string(), "unexpected body: {}", body);

    let (status, body) = app.post("/api/borrow/return/abc", Some(&token), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].is_string(), "unexpected body: {}", body);

    let (status, body) = app
        .post("/api/auth/register", None, json!({ "password": "secret123" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username must be at least 3 characters long");

    let (status, body) = app.post("/api/auth/login", None, json!({ "username": "alice" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username and password are required");
}

#[tokio::test]
async fn test_zero_book_id_is_required() {
    let app = TestApp::new().await;
    let token = app.reader("alice").await;

    let (status, body) = app.post("/api/borrow", Some(&token), json!({ "bookId": 0 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Book ID is required");
}
