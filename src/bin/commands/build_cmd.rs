use anyhow::{Context, Result};
use ipregion::DatabaseBuilder;
use std::path::PathBuf;
use std::time::Instant;

use crate::cli_utils::{format_bytes, format_number};

pub fn cmd_build(inputs: Vec<PathBuf>, output: PathBuf, created_at: Option<u32>) -> Result<()> {
    let start = Instant::now();
    let mut builder = match created_at {
        Some(secs) => DatabaseBuilder::new().with_created_at(secs),
        None => DatabaseBuilder::new(),
    };

    for input in &inputs {
        let added = builder
            .load_source(input)
            .with_context(|| format!("Failed to load source: {}", input.display()))?;
        eprintln!("Loaded {} ranges from {}", format_number(added), input.display());
    }

    let written = builder
        .write_to(&output)
        .with_context(|| format!("Failed to write database: {}", output.display()))?;

    eprintln!(
        "Wrote {} ({}) from {} ranges in {:.2}s",
        output.display(),
        format_bytes(written),
        format_number(builder.len()),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
