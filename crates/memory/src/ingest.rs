//! Seed the memory with existing source files.

use apiforge_core::error::MemoryError;
use apiforge_core::memory::{RecordMetadata, SimilarityMemory};
use apiforge_security::SandboxRoot;
use tracing::{info, warn};

/// What an ingest pass did.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// `(file, record id)` for every stored file
    pub stored: Vec<(String, String)>,
    /// `(file, reason)` for every file that was skipped
    pub skipped: Vec<(String, String)>,
}

/// Store each file (relative to `root`) as one `source_ingest` record.
///
/// Unreadable, empty or out-of-sandbox files are skipped and reported; a
/// storage failure aborts the pass.
pub async fn ingest_files(
    memory: &dyn SimilarityMemory,
    root: &SandboxRoot,
    files: &[String],
) -> Result<IngestReport, MemoryError> {
    let mut report = IngestReport::default();

    for file in files {
        let path = match root.resolve(file) {
            Ok(p) => p,
            Err(e) => {
                warn!(file = %file, error = %e, "Skipping file outside workspace");
                report.skipped.push((file.clone(), e.to_string()));
                continue;
            }
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                warn!(file = %file, error = %e, "Skipping unreadable file");
                report.skipped.push((file.clone(), e.to_string()));
                continue;
            }
        };

        if content.trim().is_empty() {
            report.skipped.push((file.clone(), "file is empty".into()));
            continue;
        }

        let id = memory
            .store(&content, RecordMetadata::source_ingest(file.as_str()))
            .await?;
        info!(file = %file, id = %id, chars = content.len(), "Ingested source file");
        report.stored.push((file.clone(), id));
    }

    Ok(report)
}
