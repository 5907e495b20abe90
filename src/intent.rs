//! Intent extraction: chat history → structured queries + date bounds.
//!
//! An auxiliary language-model call, constrained to JSON, turns the raw
//! transcript into an [`ExtractedIntent`]. The model is told the current
//! date so relative expressions ("last week") resolve to absolute bounds.
//!
//! Failure policy: a response that is not valid JSON (or does not fit the
//! expected shape) yields the empty-default intent with an `error` marker —
//! it never raises and never blocks the pipeline. Missing keys get empty
//! defaults. Only a failed model *call* (network, quota) is an error, and
//! that propagates as [`PipelineError::Generation`].

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::error::PipelineError;
use crate::llm::ChatModel;
use crate::models::{ChatMessage, DateFilter, ExtractedIntent};

/// Marker recorded on the intent when the extraction response could not be
/// parsed and empty defaults were substituted.
pub const PARSE_ERROR_MARKER: &str = "extraction response was not valid JSON";

/// Derives search intent from conversation transcripts via a chat model.
pub struct IntentExtractor {
    model: Arc<dyn ChatModel>,
}

impl IntentExtractor {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Extracts queries and date bounds from the full transcript.
    ///
    /// Never fails on malformed model output; see module docs.
    pub async fn extract(
        &self,
        transcript: &[ChatMessage],
    ) -> Result<ExtractedIntent, PipelineError> {
        let mut messages = vec![ChatMessage::system(extraction_prompt(Utc::now()))];
        messages.extend_from_slice(transcript);

        let raw = self
            .model
            .complete(&messages, true)
            .await
            .map_err(PipelineError::generation)?;

        Ok(parse_intent(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "intent extraction returned unparseable output");
            ExtractedIntent {
                queries: Vec::new(),
                date_filter: DateFilter::default(),
                error: Some(PARSE_ERROR_MARKER.to_string()),
            }
        }))
    }
}

/// Wire shape of the extraction response. Missing keys default to empty
/// rather than failing the parse.
#[derive(serde::Deserialize)]
struct WireIntent {
    #[serde(default)]
    queries: Vec<String>,
    #[serde(default)]
    date_filter: DateFilter,
}

fn parse_intent(raw: &str) -> Result<ExtractedIntent, serde_json::Error> {
    let wire: WireIntent = serde_json::from_str(raw)?;
    Ok(ExtractedIntent {
        queries: wire.queries,
        date_filter: wire.date_filter,
        error: None,
    })
}

/// Builds the extraction instruction, grounded with the current date so the
/// model can resolve relative expressions.
fn extraction_prompt(now: DateTime<Utc>) -> String {
    format!(
        r#"Extract search queries and date filters from the conversation.
Respond with a JSON object of this shape:
{{
  "queries": ["search phrase 1", "search phrase 2"],
  "date_filter": {{
    "gte": "YYYY-MM-DD",
    "lte": "YYYY-MM-DD"
  }}
}}

For date filters:
- Dates introduced with "after", "since", "from", or "newer than" become "gte"
- Dates introduced with "before", "until", or "older than" become "lte"
- Convert every date to YYYY-MM-DD format
- If no date is mentioned for a bound, omit that field entirely
- Omit the whole "date_filter" object when no dates are mentioned

For queries:
- Extract the main topics and search terms the user is asking about
- Drop filler words like "find", "search", "show me"
- When the question spans more than one topic, split it into at least two
  separate query phrases

Example:
Input: news about AI
Output queries: ["news about AI"]

Date now: {now}"#
    )
}
