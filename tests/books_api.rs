//! Request/response contract of the `/books` resource, driven through the
//! full router against an in-memory store.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use libris_app::Application;
use libris_kernel::settings::{DatabaseSettings, Settings};
use serde_json::{json, Value};
use std::time::Duration;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tower::ServiceExt;

async fn test_app() -> Router {
    let settings = Settings {
        database: DatabaseSettings::in_memory(),
        ..Settings::default()
    };
    Application::bootstrap(settings).await.unwrap().router()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    app.clone().oneshot(request).await.unwrap()
}

async fn body_bytes(response: Response) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

async fn create_book(app: &Router, title: &str, description: &str, author: &str) -> i64 {
    let response = send(
        app,
        "POST",
        "/books",
        Some(json!({ "title": title, "description": description, "author": author })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let location = response.headers()[header::LOCATION].to_str().unwrap();
    location.strip_prefix("/books/").unwrap().parse().unwrap()
}

fn timestamp(value: &Value) -> OffsetDateTime {
    OffsetDateTime::parse(value.as_str().unwrap(), &Rfc3339).unwrap()
}

fn book_not_found() -> Value {
    json!({ "error": { "message": "Book not found" } })
}

#[tokio::test]
async fn base_endpoint_returns_the_application_version() {
    let app = test_app().await;

    let response = send(&app, "GET", "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = String::from_utf8(body_bytes(response).await).unwrap();
    assert_eq!(body, format!("Libris ({})", env!("CARGO_PKG_VERSION")));
}

#[tokio::test]
async fn index_on_empty_store_is_an_empty_array() {
    let app = test_app().await;

    let response = send(&app, "GET", "/books", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn index_returns_every_record() {
    let app = test_app().await;
    create_book(&app, "War of the Worlds", "Martians invade London", "H. G. Wells").await;
    create_book(&app, "A Wrinkle in Time", "A tesseract adventure", "Madeleine L'Engle").await;

    let books = body_json(send(&app, "GET", "/books", None).await).await;
    let titles: Vec<&str> = books
        .as_array()
        .unwrap()
        .iter()
        .map(|book| book["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["War of the Worlds", "A Wrinkle in Time"]);
}

#[tokio::test]
async fn show_returns_a_valid_book() {
    let app = test_app().await;
    let id = create_book(&app, "The Time Machine", "Eloi and Morlocks", "H. G. Wells").await;

    let response = send(&app, "GET", &format!("/books/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let book = body_json(response).await;
    assert_eq!(book["id"], id);
    assert_eq!(book["title"], "The Time Machine");
    assert_eq!(book["description"], "Eloi and Morlocks");
    assert_eq!(book["author"], "H. G. Wells");
    assert!(book["created_at"].is_string());
    assert!(book["updated_at"].is_string());
    assert_eq!(book.as_object().unwrap().len(), 6);
}

#[tokio::test]
async fn show_fails_when_the_book_id_does_not_exist() {
    let app = test_app().await;

    let response = send(&app, "GET", "/books/99999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, book_not_found());
}

#[tokio::test]
async fn invalid_id_segment_never_reaches_the_book_handlers() {
    let app = test_app().await;

    for method in ["GET", "PUT", "PATCH", "DELETE"] {
        let response = send(&app, method, "/books/this-is-invalid", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method}");

        let body = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(!body.contains("Book not found"), "{method}: {body}");
        assert_eq!(
            serde_json::from_str::<Value>(&body).unwrap(),
            json!({ "message": "Not Found", "status": 404 })
        );
    }
}

#[tokio::test]
async fn unsupported_method_on_invalid_id_is_route_not_found() {
    let app = test_app().await;

    let response = send(&app, "POST", "/books/this-is-invalid", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "Not Found", "status": 404 })
    );

    let response = send(&app, "POST", "/books/1", None).await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn concurrent_updates_on_a_file_database_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        database: DatabaseSettings {
            url: format!("sqlite://{}?mode=rwc", dir.path().join("libris.db").display()),
            max_connections: 5,
            auto_migrate: true,
        },
        ..Settings::default()
    };
    let app = Application::bootstrap(settings).await.unwrap().router();
    let id = create_book(&app, "The First Men in the Moon", "Cavorite", "H. G. Wells").await;

    for round in 0..5 {
        let mut updates = tokio::task::JoinSet::new();
        for writer in 0..8 {
            let app = app.clone();
            let uri = format!("/books/{id}");
            updates.spawn(async move {
                let title = format!("The First Men in the Moon ({round}.{writer})");
                send(&app, "PUT", &uri, Some(json!({ "title": title })))
                    .await
                    .status()
            });
        }

        while let Some(status) = updates.join_next().await {
            assert_eq!(status.unwrap(), StatusCode::OK);
        }
    }
}

#[tokio::test]
async fn store_saves_a_new_book() {
    let app = test_app().await;

    let response = send(
        &app,
        "POST",
        "/books",
        Some(json!({
            "title": "The Invisible Man",
            "description": "An invisible man is trapped in the terror of his own creation",
            "author": "H. G. Wells"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let location = response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string();
    let digits = location.strip_prefix("/books/").unwrap();
    assert!(!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()));
    assert_eq!(body_json(response).await, json!({ "created": true }));

    let book = body_json(send(&app, "GET", &location, None).await).await;
    assert_eq!(book["title"], "The Invisible Man");
}

#[tokio::test]
async fn store_ignores_client_supplied_identity() {
    let app = test_app().await;

    let response = send(
        &app,
        "POST",
        "/books",
        Some(json!({
            "id": 77,
            "title": "The Island of Doctor Moreau",
            "description": "Vivisection on a remote island",
            "author": "H. G. Wells"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(response.headers()[header::LOCATION], "/books/1");

    let missing = send(&app, "GET", "/books/77", None).await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_rejects_an_incomplete_body() {
    let app = test_app().await;

    let response = send(&app, "POST", "/books", Some(json!({ "title": "Untitled" }))).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("missing field"));

    let books = body_json(send(&app, "GET", "/books", None).await).await;
    assert_eq!(books, json!([]));
}

#[tokio::test]
async fn update_only_changes_fillable_fields() {
    let app = test_app().await;
    let id = create_book(
        &app,
        "War of the Worlds",
        "A science fiction masterpiece about Martians invading London",
        "H. G. Wells",
    )
    .await;
    assert_eq!(id, 1);
    let before = body_json(send(&app, "GET", "/books/1", None).await).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let response = send(
        &app,
        "PUT",
        "/books/1",
        Some(json!({
            "id": 5,
            "title": "The War of the Worlds",
            "description": "The book is way better than the movie.",
            "author": "Wells, H. G.",
            "created_at": "1999-01-01T00:00:00Z"
        })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let book = body_json(response).await;
    assert_eq!(book["id"], 1);
    assert_eq!(book["title"], "The War of the Worlds");
    assert_eq!(book["description"], "The book is way better than the movie.");
    assert_eq!(book["author"], "Wells, H. G.");
    assert_eq!(book["created_at"], before["created_at"]);
    assert!(timestamp(&book["updated_at"]) > timestamp(&before["updated_at"]));

    assert_eq!(body_json(send(&app, "GET", "/books/1", None).await).await, book);
    let moved = send(&app, "GET", "/books/5", None).await;
    assert_eq!(moved.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_applies_a_partial_update() {
    let app = test_app().await;
    let id = create_book(&app, "Kipps", "The story of a simple soul", "H. G. Wells").await;
    let before = body_json(send(&app, "GET", &format!("/books/{id}"), None).await).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let response = send(
        &app,
        "PATCH",
        &format!("/books/{id}"),
        Some(json!({ "title": "Kipps: The Story of a Simple Soul" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let book = body_json(response).await;
    assert_eq!(book["title"], "Kipps: The Story of a Simple Soul");
    assert_eq!(book["description"], "The story of a simple soul");
    assert_eq!(book["author"], "H. G. Wells");
    assert_eq!(book["created_at"], before["created_at"]);
    assert!(timestamp(&book["updated_at"]) > timestamp(&before["updated_at"]));
}

#[tokio::test]
async fn patch_without_changes_keeps_updated_at() {
    let app = test_app().await;
    let id = create_book(&app, "Love and Mr Lewisham", "A struggling schoolmaster", "H. G. Wells").await;
    let before = body_json(send(&app, "GET", &format!("/books/{id}"), None).await).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    let response = send(
        &app,
        "PATCH",
        &format!("/books/{id}"),
        Some(json!({ "author": "H. G. Wells" })),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, before);

    let response = send(&app, "PUT", &format!("/books/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, before);
}

#[tokio::test]
async fn update_fails_with_an_unknown_id() {
    let app = test_app().await;

    let response = send(&app, "PUT", "/books/999999999999999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, book_not_found());
}

#[tokio::test]
async fn ids_beyond_the_integer_range_are_not_found() {
    let app = test_app().await;

    for method in ["GET", "PUT", "DELETE"] {
        let response = send(&app, method, "/books/99999999999999999999999", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method}");
        assert_eq!(body_json(response).await, book_not_found());
    }
}

#[tokio::test]
async fn destroy_removes_a_valid_book() {
    let app = test_app().await;
    let id = create_book(&app, "Tono-Bungay", "A patent medicine fortune", "H. G. Wells").await;

    let response = send(&app, "DELETE", &format!("/books/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(response).await.is_empty());

    let response = send(&app, "GET", &format!("/books/{id}"), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, book_not_found());
}

#[tokio::test]
async fn destroy_returns_404_with_an_unknown_id() {
    let app = test_app().await;

    let response = send(&app, "DELETE", "/books/99999", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await, book_not_found());
}

#[tokio::test]
async fn destroy_all_empties_the_store() {
    let app = test_app().await;
    create_book(&app, "Ann Veronica", "A modern love story", "H. G. Wells").await;
    create_book(&app, "The Sea Lady", "A tissue of moonshine", "H. G. Wells").await;

    let response = send(&app, "DELETE", "/books", None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(body_bytes(response).await.is_empty());

    let books = body_json(send(&app, "GET", "/books", None).await).await;
    assert_eq!(books, json!([]));

    let id = create_book(&app, "Ann Veronica", "A modern love story", "H. G. Wells").await;
    assert_eq!(id, 1);
}

#[tokio::test]
async fn unknown_paths_use_the_generic_not_found() {
    let app = test_app().await;

    let response = send(&app, "GET", "/authors", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({ "message": "Not Found", "status": 404 })
    );
}

#[tokio::test]
async fn openapi_document_describes_the_book_routes() {
    let app = test_app().await;

    let response = send(&app, "GET", "/docs/openapi.json", None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let document = body_json(response).await;
    assert!(document["paths"]["/books"]["post"].is_object());
    assert!(document["paths"]["/books/{id}"]["delete"].is_object());
}
