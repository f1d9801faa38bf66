//! Answer synthesis: grounding prompt construction and the model call.

use tracing::{debug, warn};

use crate::error::{RagError, RagResult};
use crate::llm::LlmProvider;
use crate::models::CandidateRow;

/// Instruction sent with every question.
pub const SYSTEM_INSTRUCTION: &str = "You are a code expert assistant. Use only the provided code snippets to answer the question. Cite file paths when appropriate. If the answer is not in these snippets, say \"I don't know.\"";

/// Answer returned without calling the model when retrieval found nothing.
pub const FALLBACK_ANSWER: &str = "I couldn't find any relevant code snippets in the repository to answer your question. Please try rephrasing or asking about a different topic.";

/// Render the numbered source blocks followed by the question.
///
/// ```rust
/// use repo_qa::models::CandidateRow;
/// use repo_qa::synth::build_prompt;
///
/// let rows = vec![CandidateRow {
///     chunk_id: "r__a.py__0".into(),
///     file_path: "a.py".into(),
///     text: "x = 1".into(),
///     distance: 0.1,
/// }];
/// assert_eq!(
///     build_prompt("What is x?", &rows),
///     "Context:\n### Source 1: a.py\n```\nx = 1\n```\n\nQuestion: What is x?\nAnswer:"
/// );
/// ```
pub fn build_prompt(question: &str, candidates: &[CandidateRow]) -> String {
    let mut prompt = String::from("Context:\n");
    for (i, c) in candidates.iter().enumerate() {
        prompt.push_str(&format!(
            "### Source {}: {}\n```\n{}\n```\n\n",
            i + 1,
            c.file_path,
            c.text
        ));
    }
    prompt.push_str(&format!("Question: {}\nAnswer:", question));
    prompt
}

/// Ask the model to answer `question` from `candidates`.
pub async fn synthesize(
    llm: &dyn LlmProvider,
    question: &str,
    candidates: &[CandidateRow],
) -> RagResult<String> {
    let prompt = build_prompt(question, candidates);
    debug!(model = llm.model_name(), sources = candidates.len(), "calling llm");
    llm.complete(&prompt, SYSTEM_INSTRUCTION).await.map_err(|e| {
        warn!(error = %e, "llm call failed");
        RagError::Generation {
            message: e.to_string(),
        }
    })
}
