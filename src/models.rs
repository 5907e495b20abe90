//! Core data models used throughout Newsdesk.
//!
//! These types represent the chat transcripts, extracted search intent, and
//! retrieved articles that flow through the retrieval and generation pipeline.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
///
/// Closed set — unrecognized role strings are rejected at deserialization
/// rather than passed downstream as raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in a conversation transcript.
///
/// Transcripts are ordered chronologically and the order is preserved
/// end-to-end; each request carries its own full history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Returns the content of the most recent user-authored message, if any.
pub fn last_user_message(transcript: &[ChatMessage]) -> Option<&str> {
    transcript
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}

/// Raw date bounds as extracted from the conversation.
///
/// Bounds are `YYYY-MM-DD`-shaped strings straight out of the extraction
/// model and are not yet validated — that happens in [`crate::filter`].
/// The two bounds are independent: a malformed `gte` never invalidates a
/// well-formed `lte`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<String>,
}

impl DateFilter {
    pub fn is_empty(&self) -> bool {
        self.gte.is_none() && self.lte.is_none()
    }
}

/// Structured search intent derived from a transcript.
///
/// Produced fresh per request and never cached. An empty `queries` list is
/// valid — callers fall back to the raw last user message. `error` is set
/// when the extraction model returned something other than valid JSON and
/// the empty defaults were substituted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedIntent {
    #[serde(default)]
    pub queries: Vec<String>,
    #[serde(default)]
    pub date_filter: DateFilter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A retrieved news article.
///
/// Immutable once retrieved; the pipeline is read-only with respect to
/// article content. `date` is free-form display text and defaults to
/// `"Unknown date"` when the stored article has none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub url: String,
    pub date: String,
}

pub const UNKNOWN_DATE: &str = "Unknown date";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_roundtrips_lowercase() {
        let msg: ChatMessage = serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(msg.role, Role::User);
        let out = serde_json::to_string(&msg).unwrap();
        assert!(out.contains(r#""role":"user""#));
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result: Result<ChatMessage, _> =
            serde_json::from_str(r#"{"role":"narrator","content":"hi"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn last_user_message_skips_assistant_turns() {
        let transcript = vec![
            ChatMessage::user("first question"),
            ChatMessage {
                role: Role::Assistant,
                content: "an answer".to_string(),
            },
            ChatMessage::user("second question"),
            ChatMessage {
                role: Role::Assistant,
                content: "another answer".to_string(),
            },
        ];
        assert_eq!(last_user_message(&transcript), Some("second question"));
    }

    #[test]
    fn last_user_message_empty_transcript() {
        assert_eq!(last_user_message(&[]), None);
    }

    #[test]
    fn date_filter_defaults_to_empty() {
        let f: DateFilter = serde_json::from_str("{}").unwrap();
        assert!(f.is_empty());
        let f: DateFilter = serde_json::from_str(r#"{"gte":"2024-01-01"}"#).unwrap();
        assert!(!f.is_empty());
        assert_eq!(f.gte.as_deref(), Some("2024-01-01"));
        assert!(f.lte.is_none());
    }
}
