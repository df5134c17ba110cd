//! `apiforge memory` — memory inspection commands.

use std::collections::BTreeMap;
use std::path::Path;

use apiforge_core::memory::{Embedder, SimilarityMemory};

use crate::runtime;

pub async fn stats(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = runtime::load_config(config_path)?;
    let store = runtime::memory(&config)?;

    println!("Memory Statistics");
    println!("=================");
    println!("  Index:      {}", store.index_path().display());
    println!("  Metadata:   {}", store.metadata_path().display());
    println!(
        "  Embedder:   {} ({}, dim {})",
        store.embedder().kind(),
        store.embedder().model(),
        store.embedder().dimension()
    );

    let records = store.records().await?;
    println!("  Records:    {}", records.len());

    let mut by_kind: BTreeMap<String, usize> = BTreeMap::new();
    for record in &records {
        *by_kind.entry(format!("{:?}", record.metadata.kind)).or_default() += 1;
    }
    for (kind, count) in by_kind {
        println!("    {kind:<20} {count}");
    }

    Ok(())
}

pub async fn search(config_path: Option<&Path>, query: &str, limit: usize) -> anyhow::Result<()> {
    let config = runtime::load_config(config_path)?;
    let store = runtime::memory(&config)?;

    println!("Searching memories for: \"{query}\"");
    println!();

    let results = store.search(query, limit).await?;
    if results.is_empty() {
        println!("   No memories found.");
    }
    for (i, record) in results.iter().enumerate() {
        let preview: String = record.text.trim().chars().take(80).collect();
        println!(
            "  {:>2}. [score: {:.2}] [{:?}/{:?}] {}",
            i + 1,
            record.score,
            record.metadata.kind,
            record.metadata.confidence,
            preview.replace('\n', " ")
        );
    }

    Ok(())
}
