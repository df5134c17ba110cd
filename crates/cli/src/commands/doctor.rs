//! `apiforge doctor` — diagnose configuration and workspace.

use std::path::Path;

use apiforge_config::AppConfig;
use apiforge_core::memory::SimilarityMemory;

use crate::runtime;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    println!("apiforge doctor");
    println!("===============\n");

    let mut issues = 0;

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  ok    Config valid");
            config
        }
        Err(e) => {
            println!("  FAIL  Config invalid: {e}");
            println!("\n  1 issue found. See above for details.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ok    API key configured");
        match runtime::provider(&config) {
            Ok(provider) => match provider.health_check().await {
                Ok(true) => println!("  ok    {} reachable at {}", config.provider, config.api_base_url),
                Ok(false) => {
                    println!("  FAIL  {} rejected the health check", config.api_base_url);
                    issues += 1;
                }
                Err(e) => {
                    println!("  FAIL  {} unreachable: {e}", config.api_base_url);
                    issues += 1;
                }
            },
            Err(e) => {
                println!("  FAIL  Provider: {e:#}");
                issues += 1;
            }
        }
    } else {
        println!("  WARN  No API key configured (set APIFORGE_API_KEY)");
        issues += 1;
    }

    let root = &config.workspace.root;
    if root.is_dir() {
        println!("  ok    Workspace root {}", root.display());
    } else {
        println!("  WARN  Workspace root {} does not exist", root.display());
        issues += 1;
    }

    if config.validation.forbidden_patterns.is_empty() {
        println!("  WARN  No forbidden patterns configured; every candidate is accepted");
        issues += 1;
    } else {
        println!(
            "  ok    {} forbidden pattern(s)",
            config.validation.forbidden_patterns.len()
        );
    }

    match runtime::memory(&config) {
        Ok(store) => match store.len().await {
            Ok(n) => println!("  ok    Memory opened ({n} records)"),
            Err(e) => {
                println!("  FAIL  Memory unreadable: {e}");
                issues += 1;
            }
        },
        Err(e) => {
            println!("  FAIL  Memory: {e:#}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
