use anyhow::{Context, Result};
use ipregion::LoaderConfig;
use std::path::PathBuf;

pub fn cmd_config(config: Option<PathBuf>, sample: bool) -> Result<()> {
    if sample {
        print!("{}", LoaderConfig::sample_toml());
        return Ok(());
    }

    let settings =
        LoaderConfig::load(config.as_deref()).context("Failed to load configuration")?;
    print!(
        "{}",
        toml::to_string_pretty(&settings).context("Failed to render configuration")?
    );
    Ok(())
}
