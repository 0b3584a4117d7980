//! HTTP handlers for the `/books` resource.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;

use libris_http::{
    error::AppError,
    extract::{JsonBody, NumericId},
};

use super::{
    models::{Book, BookPatch, CreateBook},
    repository::{BookError, BookRepository},
};

pub const BOOK_NOT_FOUND: &str = "Book not found";

pub type SharedRepository = Arc<dyn BookRepository>;

impl From<BookError> for AppError {
    fn from(error: BookError) -> Self {
        match error {
            BookError::NotFound(_) => AppError::not_found(BOOK_NOT_FOUND),
            BookError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

/// `/books` and `/books/{id}`; `{id}` only matches digit runs.
pub fn router(repository: SharedRepository) -> Router {
    Router::new()
        .route("/books", get(index).post(store).delete(destroy_all))
        .route(
            "/books/{id}",
            get(show)
                .put(update)
                .patch(update)
                .delete(destroy)
                .fallback(unsupported_method),
        )
        .with_state(repository)
}

fn location(book: &Book) -> String {
    format!("/books/{}", book.id)
}

/// Ids too large for the store cannot exist.
fn book_id(id: &NumericId) -> Result<i64, AppError> {
    id.as_i64()
        .ok_or_else(|| AppError::not_found(BOOK_NOT_FOUND))
}

async fn index(State(repository): State<SharedRepository>) -> Result<Json<Vec<Book>>, AppError> {
    Ok(Json(repository.list().await?))
}

async fn show(
    State(repository): State<SharedRepository>,
    id: NumericId,
) -> Result<Json<Book>, AppError> {
    let book = repository.get_by_id(book_id(&id)?).await?;
    Ok(Json(book))
}

async fn store(
    State(repository): State<SharedRepository>,
    JsonBody(payload): JsonBody<CreateBook>,
) -> Result<impl IntoResponse, AppError> {
    let book = repository.create(payload).await?;

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location(&book))],
        Json(json!({ "created": true })),
    ))
}

async fn update(
    State(repository): State<SharedRepository>,
    id: NumericId,
    JsonBody(patch): JsonBody<BookPatch>,
) -> Result<Json<Book>, AppError> {
    let book = repository.update(book_id(&id)?, patch).await?;
    Ok(Json(book))
}

async fn destroy(
    State(repository): State<SharedRepository>,
    id: NumericId,
) -> Result<StatusCode, AppError> {
    repository.delete_by_id(book_id(&id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Other methods on `/books/{id}`: a non-numeric id still misses the route.
async fn unsupported_method(_id: NumericId) -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

async fn destroy_all(State(repository): State<SharedRepository>) -> Result<StatusCode, AppError> {
    repository.delete_all().await?;
    Ok(StatusCode::NO_CONTENT)
}
