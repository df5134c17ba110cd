//! Retrieval helpers and the text layouts records are stored with.

use apiforge_core::error::MemoryError;
use apiforge_core::memory::{MemoryRecord, RecordMetadata, SimilarityMemory};
use tracing::debug;

/// Default number of records recalled per request.
pub const DEFAULT_RECALL_LIMIT: usize = 3;

/// Default character cap on the recalled context block.
pub const DEFAULT_CONTEXT_CHAR_LIMIT: usize = 8000;

/// Context block recalled for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalledContext {
    /// Record texts joined with a blank line and capped
    pub text: String,
    /// Number of records that went into `text`
    pub records: usize,
}

/// Search `memory` for `query` and join the top `k` texts with a blank line,
/// truncated to `char_limit` characters.
pub async fn retrieve_context(
    memory: &dyn SimilarityMemory,
    query: &str,
    k: usize,
    char_limit: usize,
) -> Result<RecalledContext, MemoryError> {
    let records = memory.search(query, k).await?;
    let text = join_context(&records, char_limit);
    debug!(
        recalled = records.len(),
        chars = text.chars().count(),
        "Context retrieved"
    );
    Ok(RecalledContext {
        text,
        records: records.len(),
    })
}

/// Join record texts with a blank line, truncated to `char_limit` characters.
pub fn join_context(records: &[MemoryRecord], char_limit: usize) -> String {
    let joined = records
        .iter()
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    truncate_chars(&joined, char_limit).to_string()
}

/// The first `limit` characters of `s`, never splitting a character.
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    match s.char_indices().nth(limit) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Text of a generation record: the request followed by the answer.
pub fn generation_text(request: &str, code: &str) -> String {
    format!("Q:\n{request}\n\nA:\n{code}")
}

/// Text of a record for a candidate the validator rejected.
pub fn rejection_text(request: &str, code: &str, violation: &str) -> String {
    format!("Q:\n{request}\n\nREJECTED ANSWER:\n{code}\n\nVIOLATION:\n{violation}")
}

/// Text of a human-supplied correction.
pub fn correction_text(question: &str, wrong: &str, correct: &str) -> String {
    format!(
        "\nUSER QUESTION:\n{question}\n\nWRONG ANSWER:\n{wrong}\n\nCORRECT ANSWER:\n{correct}\n"
    )
}

/// Store a human correction (high confidence, human provenance).
pub async fn store_correction(
    memory: &dyn SimilarityMemory,
    question: &str,
    wrong: &str,
    correct: &str,
) -> Result<String, MemoryError> {
    memory
        .store(
            &correction_text(question, wrong, correct),
            RecordMetadata::human_correction(),
        )
        .await
}
