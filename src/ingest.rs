//! Article ingestion from newline-delimited JSON files.
//!
//! Each input line is one article object (`{"title", "url", "date"?}`).
//! Articles are embedded in batches and stored through the vector index;
//! re-running over the same file is a no-op thanks to the dedup hash.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::index::{ArticleInput, VectorIndex};

/// Reads articles from `path` and stores them, returning (parsed, inserted).
///
/// A malformed line fails the whole run, reporting its line number; nothing
/// is stored from a file that does not parse end to end.
pub async fn run_ingest(
    index: Arc<dyn VectorIndex>,
    path: &Path,
    batch_size: usize,
) -> Result<(usize, u64)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read articles file: {}", path.display()))?;

    let mut articles: Vec<ArticleInput> = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let article: ArticleInput = serde_json::from_str(line)
            .with_context(|| format!("{}:{}: invalid article record", path.display(), lineno + 1))?;
        articles.push(article);
    }

    let mut inserted = 0u64;
    for batch in articles.chunks(batch_size.max(1)) {
        inserted += index.store(batch).await?;
        tracing::info!(batch = batch.len(), inserted, "stored article batch");
    }

    Ok((articles.len(), inserted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::test_support::HashEmbedder;
    use crate::index::SqliteIndex;
    use sqlx::SqlitePool;

    async fn test_index() -> Arc<dyn VectorIndex> {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        Arc::new(SqliteIndex::new(pool, Arc::new(HashEmbedder)))
    }

    #[tokio::test]
    async fn ingests_jsonl_and_skips_blank_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("articles.jsonl");
        std::fs::write(
            &path,
            r#"{"title": "AI story", "url": "https://news.example/1", "date": "2024-01-05"}

{"title": "Robotics story", "url": "https://news.example/2"}
"#,
        )
        .unwrap();

        let index = test_index().await;
        let (parsed, inserted) = run_ingest(index.clone(), &path, 64).await.unwrap();
        assert_eq!(parsed, 2);
        assert_eq!(inserted, 2);

        // Second run inserts nothing
        let (_, inserted) = run_ingest(index, &path, 64).await.unwrap();
        assert_eq!(inserted, 0);
    }

    #[tokio::test]
    async fn malformed_line_reports_line_number() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("articles.jsonl");
        std::fs::write(
            &path,
            "{\"title\": \"ok\", \"url\": \"https://news.example/1\"}\nnot json\n",
        )
        .unwrap();

        let index = test_index().await;
        let err = run_ingest(index, &path, 64).await.unwrap_err();
        assert!(format!("{err:#}").contains(":2"));
    }
}
