use anyhow::Result;
use sqlx::SqlitePool;

/// Creates the article store schema. Idempotent.
///
/// `date` holds the free-form display date; `date_ts` is the midnight-UTC
/// timestamp of the parsed date (NULL when the date could not be parsed)
/// and is what date-range filters compare against. `embedding` is the
/// little-endian f32 BLOB produced by [`crate::embedding::vec_to_blob`].
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS articles (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            url TEXT NOT NULL,
            date TEXT,
            date_ts INTEGER,
            dedup_hash TEXT NOT NULL UNIQUE,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_articles_date_ts ON articles(date_ts)")
        .execute(pool)
        .await?;

    Ok(())
}
