//! `apiforge feedback` — record a human correction.

use std::path::{Path, PathBuf};

use anyhow::Context;
use apiforge_memory::store_correction;

use crate::runtime;

pub async fn run(
    config_path: Option<&Path>,
    question: &str,
    wrong: &str,
    correct: Option<String>,
    correct_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let correct = match (correct, correct_file) {
        (Some(text), _) => text,
        (None, Some(file)) => std::fs::read_to_string(&file)
            .with_context(|| format!("Failed to read correct answer from {}", file.display()))?,
        (None, None) => anyhow::bail!("Provide --correct or --correct-file"),
    };

    let config = runtime::load_config(config_path)?;
    let memory = runtime::memory(&config)?;

    let id = store_correction(memory.as_ref(), question, wrong, &correct).await?;
    println!("  Correction stored ({id})");

    Ok(())
}
