//! Vector index gateway over the article store.
//!
//! The [`VectorIndex`] trait abstracts the embedding+search capability:
//! store articles with metadata, search by semantic similarity with an
//! optional date-range constraint. [`SqliteIndex`] is the production
//! backend — embeddings live in an `articles` table as f32 BLOBs and
//! similarity is computed in-process.
//!
//! Search is read-only and never falls back to an empty result set on
//! store failure: an unreachable store surfaces as [`IndexUnavailable`]
//! so callers can tell "nothing matched" from "the index is down".

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::error::IndexUnavailable;
use crate::filter::{self, DateRange};
use crate::models::{NewsArticle, UNKNOWN_DATE};

/// An article to be stored, before embedding.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ArticleInput {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub date: Option<String>,
}

/// The embedding+search capability used by the retrieval pipeline.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Returns at most `k` articles ranked by descending semantic
    /// similarity to `query`, constrained to `filter` when present.
    ///
    /// Ties are broken by store-native order, which is not deterministic
    /// across backends.
    async fn search(
        &self,
        query: &str,
        filter: Option<&DateRange>,
        k: usize,
    ) -> Result<Vec<NewsArticle>, IndexUnavailable>;

    /// Embeds and stores a batch of articles; returns how many were newly
    /// inserted (duplicates are skipped).
    async fn store(&self, articles: &[ArticleInput]) -> Result<u64, IndexUnavailable>;

    /// Number of articles currently indexed.
    async fn count(&self) -> Result<i64, IndexUnavailable>;
}

/// SQLite-backed article index.
///
/// The pool is the process-wide store handle, injected at construction so
/// tests can substitute their own database and embedder.
pub struct SqliteIndex {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }
}

fn unavailable(err: impl std::fmt::Display) -> IndexUnavailable {
    IndexUnavailable::new(err.to_string())
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    async fn search(
        &self,
        query: &str,
        filter: Option<&DateRange>,
        k: usize,
    ) -> Result<Vec<NewsArticle>, IndexUnavailable> {
        let query_vec = self
            .embedder
            .embed_query(query)
            .await
            .map_err(|e| unavailable(format!("query embedding failed: {e:#}")))?;

        // Apply the date constraint in SQL; similarity is computed in Rust.
        // Articles with no parseable date never match a dated query.
        let mut sql =
            String::from("SELECT title, url, date, embedding FROM articles WHERE 1=1");
        let mut bounds: Vec<i64> = Vec::new();
        if let Some(range) = filter {
            if let Some(gte) = range.gte_timestamp() {
                sql.push_str(" AND date_ts >= ?");
                bounds.push(gte);
            }
            if let Some(lte) = range.lte_timestamp() {
                sql.push_str(" AND date_ts <= ?");
                bounds.push(lte);
            }
        }

        let mut q = sqlx::query(&sql);
        for b in &bounds {
            q = q.bind(b);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(unavailable)?;

        let mut scored: Vec<(f64, NewsArticle)> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(&query_vec, &blob_to_vec(&blob)) as f64;
                let date: Option<String> = row.get("date");
                (
                    similarity,
                    NewsArticle {
                        title: row.get("title"),
                        url: row.get("url"),
                        date: date.unwrap_or_else(|| UNKNOWN_DATE.to_string()),
                    },
                )
            })
            .collect();

        // Stable sort keeps store order between equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, a)| a).collect())
    }

    async fn store(&self, articles: &[ArticleInput]) -> Result<u64, IndexUnavailable> {
        if articles.is_empty() {
            return Ok(0);
        }

        let texts: Vec<String> = articles.iter().map(|a| a.title.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(|e| unavailable(format!("article embedding failed: {e:#}")))?;

        if vectors.len() != articles.len() {
            return Err(unavailable(format!(
                "embedding count mismatch: {} texts, {} vectors",
                articles.len(),
                vectors.len()
            )));
        }

        let mut inserted = 0u64;
        for (article, vector) in articles.iter().zip(vectors.iter()) {
            let id = Uuid::new_v4().to_string();
            let hash = dedup_hash(&article.title, &article.url);
            let date_ts = article
                .date
                .as_deref()
                .and_then(filter::parse_date)
                .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp());

            let result = sqlx::query(
                r#"
                INSERT INTO articles (id, title, url, date, date_ts, dedup_hash, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(dedup_hash) DO NOTHING
                "#,
            )
            .bind(&id)
            .bind(&article.title)
            .bind(&article.url)
            .bind(&article.date)
            .bind(date_ts)
            .bind(&hash)
            .bind(vec_to_blob(vector))
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    async fn count(&self) -> Result<i64, IndexUnavailable> {
        sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)
    }
}

/// Content hash for skipping re-ingestion of an article already stored.
fn dedup_hash(title: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}
