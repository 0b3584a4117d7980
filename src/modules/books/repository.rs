use async_trait::async_trait;
use sqlx::SqlitePool;
use thiserror::Error;
use time::OffsetDateTime;

use super::models::{Book, BookPatch, CreateBook};

const BOOK_COLUMNS: &str = "id, title, description, author, created_at, updated_at";

#[derive(Error, Debug)]
pub enum BookError {
    #[error("book {0} not found")]
    NotFound(i64),

    #[error("book store failure: {0}")]
    Database(#[from] sqlx::Error),
}

/// Storage seam for book records.
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// All books, oldest id first
    async fn list(&self) -> Result<Vec<Book>, BookError>;

    async fn get_by_id(&self, id: i64) -> Result<Book, BookError>;

    /// Insert a book; the store assigns id and timestamps
    async fn create(&self, book: CreateBook) -> Result<Book, BookError>;

    /// Apply `patch` to an existing book and return the stored result
    async fn update(&self, id: i64, patch: BookPatch) -> Result<Book, BookError>;

    async fn delete_by_id(&self, id: i64) -> Result<(), BookError>;

    /// Remove every book and restart id assignment; returns the number removed
    async fn delete_all(&self) -> Result<u64, BookError>;
}

/// [`BookRepository`] over the `books` table.
#[derive(Debug, Clone)]
pub struct SqliteBookRepository {
    pool: SqlitePool,
}

impl SqliteBookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookRepository for SqliteBookRepository {
    async fn list(&self) -> Result<Vec<Book>, BookError> {
        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT {BOOK_COLUMNS} FROM books ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(books)
    }

    async fn get_by_id(&self, id: i64) -> Result<Book, BookError> {
        sqlx::query_as::<_, Book>(&format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(BookError::NotFound(id))
    }

    async fn create(&self, book: CreateBook) -> Result<Book, BookError> {
        let now = OffsetDateTime::now_utc();

        let created = sqlx::query_as::<_, Book>(&format!(
            "INSERT INTO books (title, description, author, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&book.title)
        .bind(&book.description)
        .bind(&book.author)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(book_id = created.id, "book created");
        Ok(created)
    }

    async fn update(&self, id: i64, patch: BookPatch) -> Result<Book, BookError> {
        // One statement, so concurrent writers queue on the write lock instead
        // of failing a read-to-write upgrade. SET expressions see the old row,
        // which keeps updated_at untouched when nothing changes.
        let updated = sqlx::query_as::<_, Book>(&format!(
            "UPDATE books SET
                 title = COALESCE(?, title),
                 description = COALESCE(?, description),
                 author = COALESCE(?, author),
                 updated_at = CASE
                     WHEN title IS NOT COALESCE(?, title)
                       OR description IS NOT COALESCE(?, description)
                       OR author IS NOT COALESCE(?, author)
                     THEN ? ELSE updated_at END
             WHERE id = ?
             RETURNING {BOOK_COLUMNS}"
        ))
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.author)
        .bind(&patch.title)
        .bind(&patch.description)
        .bind(&patch.author)
        .bind(OffsetDateTime::now_utc())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BookError::NotFound(id))?;

        tracing::debug!(book_id = id, "book updated");
        Ok(updated)
    }

    async fn delete_by_id(&self, id: i64) -> Result<(), BookError> {
        let result = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BookError::NotFound(id));
        }

        tracing::debug!(book_id = id, "book deleted");
        Ok(())
    }

    async fn delete_all(&self) -> Result<u64, BookError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM books")
            .execute(&mut *tx)
            .await?
            .rows_affected();

        // Truncate semantics: the next book gets id 1 again
        sqlx::query("DELETE FROM sqlite_sequence WHERE name = 'books'")
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(removed, "all books deleted");
        Ok(removed)
    }
}
