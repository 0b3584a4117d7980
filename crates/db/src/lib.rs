//! SQLite connection factory and module migration runner.

use std::{str::FromStr, time::Duration};

use anyhow::Context;
use libris_kernel::{settings::DatabaseSettings, Migration};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use time::OffsetDateTime;

const MIGRATIONS_TABLE: &str = "_libris_migrations";

/// Open a pool for the configured database, creating the file if missing.
///
/// In-memory databases live only as long as their connection, so they are
/// pinned to a single connection that is never recycled. File databases use
/// WAL and wait on a locked database instead of failing straight away.
pub async fn connect(settings: &DatabaseSettings) -> anyhow::Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&settings.url)
        .with_context(|| format!("invalid database url '{}'", settings.url))?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(30));

    let (options, pool_options) = if settings.is_in_memory() {
        let pool_options = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
        (options, pool_options)
    } else {
        (
            options.journal_mode(SqliteJournalMode::Wal),
            SqlitePoolOptions::new().max_connections(settings.max_connections),
        )
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to '{}'", settings.url))?;

    tracing::info!(target: "libris-db", url = %settings.url, "database pool ready");

    Ok(pool)
}

/// Apply every migration not yet recorded, each inside its own transaction.
///
/// Returns the number of migrations applied by this call.
pub async fn migrate(pool: &SqlitePool, migrations: &[(String, Migration)]) -> anyhow::Result<usize> {
    sqlx::raw_sql(
        "CREATE TABLE IF NOT EXISTS _libris_migrations (
            module     TEXT NOT NULL,
            id         TEXT NOT NULL,
            applied_at TEXT NOT NULL,
            PRIMARY KEY (module, id)
        )",
    )
    .execute(pool)
    .await
    .with_context(|| format!("failed to create {} table", MIGRATIONS_TABLE))?;

    let mut applied = 0;

    for (module, migration) in migrations {
        let already_applied =
            sqlx::query("SELECT 1 FROM _libris_migrations WHERE module = ? AND id = ?")
                .bind(module)
                .bind(migration.id)
                .fetch_optional(pool)
                .await?
                .is_some();

        if already_applied {
            tracing::debug!(target: "libris-db", %module, migration = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await?;

        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration '{}/{}' failed", module, migration.id))?;

        sqlx::query("INSERT INTO _libris_migrations (module, id, applied_at) VALUES (?, ?, ?)")
            .bind(module)
            .bind(migration.id)
            .bind(OffsetDateTime::now_utc())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(target: "libris-db", %module, migration = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migrations() -> Vec<(String, Migration)> {
        vec![
            (
                "books".to_string(),
                Migration {
                    id: "001_init",
                    up: "CREATE TABLE shelf (id INTEGER PRIMARY KEY, label TEXT NOT NULL);",
                },
            ),
            (
                "books".to_string(),
                Migration {
                    id: "002_seed",
                    up: "INSERT INTO shelf (label) VALUES ('a'); INSERT INTO shelf (label) VALUES ('b');",
                },
            ),
        ]
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_its_data() {
        let pool = connect(&DatabaseSettings::in_memory()).await.unwrap();
        sqlx::query("CREATE TABLE probe (id INTEGER)")
            .execute(&pool)
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM probe")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn migrations_run_once() {
        let pool = connect(&DatabaseSettings::in_memory()).await.unwrap();

        assert_eq!(migrate(&pool, &migrations()).await.unwrap(), 2);
        assert_eq!(migrate(&pool, &migrations()).await.unwrap(), 0);

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM shelf")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, 2);
    }

    #[tokio::test]
    async fn failed_migration_is_not_recorded() {
        let pool = connect(&DatabaseSettings::in_memory()).await.unwrap();
        let broken = vec![(
            "books".to_string(),
            Migration {
                id: "001_broken",
                up: "CREATE TABLE;",
            },
        )];

        let err = migrate(&pool, &broken).await.unwrap_err();
        assert!(err.to_string().contains("books/001_broken"));

        let recorded: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _libris_migrations")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(recorded, 0);
    }
}
