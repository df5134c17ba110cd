//! `apiforge init` — write a default configuration file.

use std::path::Path;

use anyhow::Context;
use apiforge_config::{AppConfig, DEFAULT_CONFIG_FILE};

pub fn run(config_path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));

    if path.exists() && !force {
        println!("  Config already exists: {} (use --force to overwrite)", path.display());
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, AppConfig::starter_toml()?)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("  Created config: {}", path.display());

    let root = AppConfig::starter().workspace.root;
    if !root.exists() {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create {}", root.display()))?;
        println!("  Created workspace directory: {}", root.display());
    }

    println!();
    println!("  Next steps:");
    println!("    1. Set APIFORGE_API_KEY (or NVIDIA_API_KEY)");
    println!("    2. Put the reference module under the workspace directory");
    println!("    3. apiforge ingest <file>   # optional: seed memory");
    println!("    4. apiforge run --message \"...\"");

    Ok(())
}
