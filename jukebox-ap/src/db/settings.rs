//! Settings table access
//!
//! Key-value rows; values are stored as text and parsed on read.

use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Create the settings table if it does not exist
pub async fn create_settings_table(db: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(db)
    .await?;
    Ok(())
}

/// Generic setting getter
///
/// `Ok(None)` when the key is absent; a stored value that fails to parse is
/// a configuration error.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value {
        Some(s) => match s.parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter (insert or update)
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_settings_table(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_missing_setting_is_none() {
        let pool = setup_test_db().await;
        let value: Option<String> = get_setting(&pool, "nope").await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn test_set_then_update() {
        let pool = setup_test_db().await;
        set_setting(&pool, "answer", 41).await.unwrap();
        set_setting(&pool, "answer", 42).await.unwrap();

        let value: Option<u32> = get_setting(&pool, "answer").await.unwrap();
        assert_eq!(value, Some(42));
    }

    #[tokio::test]
    async fn test_unparseable_value_is_config_error() {
        let pool = setup_test_db().await;
        set_setting(&pool, "answer", "forty-two").await.unwrap();

        let result: Result<Option<u32>> = get_setting(&pool, "answer").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_table_creation_is_idempotent() {
        let pool = setup_test_db().await;
        create_settings_table(&pool).await.unwrap();
    }
}
