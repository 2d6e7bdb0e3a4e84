use anyhow::{Context, Result};
use ipregion::Database;
use std::path::PathBuf;

pub fn cmd_query(database: PathBuf, ips: Vec<String>, no_mmap: bool) -> Result<()> {
    let db = if no_mmap {
        Database::open_buffered(&database)
    } else {
        Database::open(&database)
    }
    .with_context(|| format!("Failed to load database: {}", database.display()))?;

    // Always an array, one entry per query, in order.
    let mut results = Vec::with_capacity(ips.len());
    for ip in &ips {
        let info = db
            .lookup(ip)
            .with_context(|| format!("Query failed for: {}", ip))?;
        results.push(info);
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
