//! Grounded answer generation from retrieved articles.
//!
//! Builds a context block enumerating each article as `Source i`, wraps it
//! in a citation-disciplined instruction, and returns the model's text
//! verbatim. The enumeration order matches the search ranking, and the
//! 1-based indices are what `[Source i]` citations refer to.
//!
//! The generated text is not post-processed: a citation index exceeding the
//! article count is passed through as-is (a documented limitation, not
//! repaired here).

use std::sync::Arc;

use crate::error::PipelineError;
use crate::llm::ChatModel;
use crate::models::{last_user_message, ChatMessage, NewsArticle};

const SYSTEM_PROMPT: &str = r#"You are a helpful assistant that answers questions based on retrieved news articles.
Always use the provided news sources to inform your answers.

Guidelines:
1. Answer ONLY based on the provided sources - don't use outside knowledge
2. If the sources don't contain relevant information, acknowledge this limitation
3. Cite sources using [Source X] notation inline when referring to specific information
4. Format your response in Markdown
5. Include a "Sources" section at the end with numbered references to the original URLs
6. Be concise but comprehensive
7. If sources contradict each other, note the discrepancies"#;

/// Produces cited answers from a transcript plus retrieved articles.
pub struct ResponseGenerator {
    model: Arc<dyn ChatModel>,
}

impl ResponseGenerator {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Generates the final answer text. The model call is unconstrained
    /// free text (not JSON) and the response is returned verbatim.
    pub async fn generate(
        &self,
        transcript: &[ChatMessage],
        articles: &[NewsArticle],
    ) -> Result<String, PipelineError> {
        let question = last_user_message(transcript).unwrap_or_default();
        let user_prompt = build_user_prompt(question, articles);

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(user_prompt),
        ];

        self.model
            .complete(&messages, false)
            .await
            .map_err(PipelineError::generation)
    }
}

/// Enumerates articles as a context block, in input order.
///
/// The 1-based position is stable and is the index cited as `[Source i]`.
fn context_block(articles: &[NewsArticle]) -> String {
    let mut context = String::new();
    for (i, article) in articles.iter().enumerate() {
        context.push_str(&format!(
            "Source {}: {}\nURL: {}\n\n",
            i + 1,
            article.title,
            article.url
        ));
    }
    context
}

fn build_user_prompt(question: &str, articles: &[NewsArticle]) -> String {
    format!(
        "### Retrieved News Sources:\n\n{}\n### User Question:\n{}\n\nBased on these sources, please provide a detailed answer in Markdown format.",
        context_block(articles),
        question
    )
}
