//! Capped file reads.

use apiforge_core::error::ToolError;
use std::path::Path;

/// Default number of characters a single read returns.
pub const DEFAULT_READ_LIMIT: usize = 80_000;

/// Read a UTF-8 file and keep at most `limit` characters.
pub async fn read_capped(path: &Path, limit: usize) -> Result<String, ToolError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: "read_code".into(),
            reason: format!("{}: {e}", path.display()),
        })?;

    Ok(match content.char_indices().nth(limit) {
        Some((byte_idx, _)) => content[..byte_idx].to_string(),
        None => content,
    })
}
