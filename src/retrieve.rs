//! Retrieval orchestration: transcript → ranked candidate articles.
//!
//! The only component that knows the full pipeline order: intent extraction,
//! filter compilation, then the vector search. Extraction parse faults were
//! already absorbed upstream; an unavailable index propagates unchanged.

use std::sync::Arc;

use crate::error::PipelineError;
use crate::filter;
use crate::index::VectorIndex;
use crate::intent::IntentExtractor;
use crate::models::{last_user_message, ChatMessage, ExtractedIntent, NewsArticle};

/// Runs the extract → compile → search pipeline.
pub struct Retriever {
    extractor: IntentExtractor,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
}

impl Retriever {
    pub fn new(extractor: IntentExtractor, index: Arc<dyn VectorIndex>, top_k: usize) -> Self {
        Self {
            extractor,
            index,
            top_k,
        }
    }

    /// Retrieves up to `top_k` articles relevant to the transcript.
    pub async fn retrieve(
        &self,
        transcript: &[ChatMessage],
    ) -> Result<Vec<NewsArticle>, PipelineError> {
        let intent = self.extractor.extract(transcript).await?;
        let query = effective_query(&intent, transcript);
        let range = filter::compile(&intent.date_filter);

        tracing::debug!(
            query = %query,
            filtered = range.is_some(),
            fallback = intent.queries.is_empty(),
            "running article search"
        );

        let articles = self
            .index
            .search(&query, range.as_ref(), self.top_k)
            .await?;
        Ok(articles)
    }
}

/// The query text actually sent to the index: the space-joined extracted
/// queries, or the most recent user message when extraction produced none.
fn effective_query(intent: &ExtractedIntent, transcript: &[ChatMessage]) -> String {
    if intent.queries.is_empty() {
        last_user_message(transcript).unwrap_or_default().to_string()
    } else {
        intent.queries.join(" ")
    }
}
