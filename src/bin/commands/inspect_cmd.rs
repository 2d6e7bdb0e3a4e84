use anyhow::{Context, Result};
use ipregion::validation::validate_bytes;
use ipregion::Database;
use serde_json::json;
use std::path::PathBuf;

use crate::cli_utils::{format_bytes, format_number, format_unix_timestamp};

pub fn cmd_inspect(database: PathBuf, json_output: bool) -> Result<()> {
    let db = Database::open(&database)
        .with_context(|| format!("Failed to load database: {}", database.display()))?;
    let header = db.header();
    let stats = validate_bytes(db.as_bytes()).stats;

    if json_output {
        let output = json!({
            "file": database.display().to_string(),
            "size": db.size(),
            "version": header.version,
            "index_policy": header.index_policy.to_string(),
            "created_at": header.created_at,
            "start_index_ptr": header.start_index_ptr,
            "end_index_ptr": header.end_index_ptr,
            "segment_count": db.segment_count(),
            "distinct_records": stats.distinct_records,
            "data_region_size": stats.data_region_size,
            "non_empty_buckets": stats.non_empty_buckets,
            "covered_addresses": stats.covered_addresses,
            "gaps": db.scan().gaps.len(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Database: {}", database.display());
    println!("Size:     {}", format_bytes(db.size()));
    println!();
    println!("Header:");
    println!("  Version:         {}", header.version);
    println!("  Index policy:    {}", header.index_policy);
    println!(
        "  Build time:      {} ({})",
        format_unix_timestamp(header.created_at as u64),
        header.created_at
    );
    println!(
        "  Segment index:   {}..={}",
        header.start_index_ptr, header.end_index_ptr
    );
    println!();
    println!("Contents:");
    println!("  Segments:        {}", format_number(db.segment_count() as usize));
    println!("  Records:         {}", format_number(stats.distinct_records));
    println!("  Record bytes:    {}", format_bytes(stats.data_region_size));
    println!(
        "  Buckets in use:  {} / 65,536",
        format_number(stats.non_empty_buckets)
    );
    if db.scan().is_complete() {
        println!("  Coverage:        complete");
    } else {
        println!(
            "  Coverage:        {} addresses, {} gap(s)",
            stats.covered_addresses,
            db.scan().gaps.len()
        );
    }

    Ok(())
}
