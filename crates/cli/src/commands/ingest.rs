//! `apiforge ingest` — seed memory with existing source files.

use std::path::Path;

use apiforge_memory::ingest_files;
use apiforge_security::SandboxRoot;

use crate::runtime;

pub async fn run(config_path: Option<&Path>, files: &[String]) -> anyhow::Result<()> {
    let config = runtime::load_config(config_path)?;
    let memory = runtime::memory(&config)?;
    let root = SandboxRoot::new(&config.workspace.root);

    let report = ingest_files(memory.as_ref(), &root, files).await?;

    for (file, id) in &report.stored {
        println!("  stored   {file} ({id})");
    }
    for (file, reason) in &report.skipped {
        println!("  skipped  {file}: {reason}");
    }
    println!();
    println!(
        "  {} stored, {} skipped",
        report.stored.len(),
        report.skipped.len()
    );

    Ok(())
}
