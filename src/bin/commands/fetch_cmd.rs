use anyhow::{Context, Result};
use ipregion::acquire::{acquire, acquire_remote, HttpFetcher};
use ipregion::LoaderConfig;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_number};

pub fn cmd_fetch(
    config: Option<PathBuf>,
    cache: Option<PathBuf>,
    mirrors: Vec<String>,
    force: bool,
) -> Result<()> {
    let mut settings =
        LoaderConfig::load(config.as_deref()).context("Failed to load configuration")?;
    if let Some(cache) = cache {
        settings.cache_path = cache;
    }
    if !mirrors.is_empty() {
        settings.mirrors = mirrors;
    }

    let fetcher = HttpFetcher::new();
    let acquired = if force {
        acquire_remote(&settings, &fetcher)
    } else {
        acquire(&settings, &fetcher)
    }
    .context("No database source succeeded")?;

    println!("Source:   {}", acquired.source);
    println!("Cache:    {}", settings.cache_path.display());
    if !acquired.cached && !matches!(acquired.source, ipregion::acquire::Source::Cache(_)) {
        println!("          (not written, see log)");
    }
    println!("Size:     {}", format_bytes(acquired.database.size()));
    println!(
        "Segments: {}",
        format_number(acquired.database.segment_count() as usize)
    );
    Ok(())
}
