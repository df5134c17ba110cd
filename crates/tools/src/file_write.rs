//! Append-only file writes.

use apiforge_core::error::ToolError;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// The exact bytes appended for a piece of code.
pub fn append_block(code: &str) -> String {
    format!("\n\n{}\n", code.trim())
}

/// Append `code` to `path`, creating the file and its parents if needed.
/// Existing content is never modified.
pub async fn append_code(path: &Path, code: &str) -> Result<(), ToolError> {
    let failed = |reason: String| ToolError::ExecutionFailed {
        tool_name: "write_code".into(),
        reason,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| failed(format!("Failed to create directory: {e}")))?;
    }

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| failed(format!("{}: {e}", path.display())))?;

    file.write_all(append_block(code).as_bytes())
        .await
        .map_err(|e| failed(format!("Failed to write file: {e}")))?;
    file.flush()
        .await
        .map_err(|e| failed(format!("Failed to write file: {e}")))?;

    Ok(())
}
