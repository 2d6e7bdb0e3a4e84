//! Database validation for untrusted images
//!
//! Goes further than the checks done at load time. Besides the structural
//! validation performed by [`ParsedIndex::parse`], it:
//!
//! - decodes every region record (UTF-8, field count)
//! - checks that each vector bucket only references segments of its own /16
//! - reports coverage gaps and buckets with no entries
//! - collects statistics for `inspect`
//!
//! The validator never panics on malformed input; every finding ends up in
//! the report.
//!
//! # Usage
//!
//! ```rust,no_run
//! use ipregion::validation::validate_database;
//! use std::path::Path;
//!
//! let report = validate_database(Path::new("ip2region.xdb"))?;
//! if !report.is_valid() {
//!     for error in &report.errors {
//!         eprintln!("  - {}", error);
//!     }
//! }
//! # Ok::<(), ipregion::GeoError>(())
//! ```

use crate::address::format_ipv4;
use crate::error::Result;
use crate::format::{VECTOR_INDEX_COLS, VECTOR_INDEX_ROWS};
use crate::index::{IndexView, ParsedIndex};
use crate::record::FIELD_COUNT;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// Cap on repeated findings of one kind
const MAX_REPORTED: usize = 10;

/// Validation report with detailed findings
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    /// Problems that make the database unusable
    pub errors: Vec<String>,
    /// Non-fatal issues
    pub warnings: Vec<String>,
    /// Informational notes
    pub info: Vec<String>,
    /// Database statistics
    pub stats: DatabaseStats,
}

/// Statistics gathered during validation
#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseStats {
    /// Image size in bytes
    pub file_size: usize,
    /// Format version
    pub version: u16,
    /// Index policy name
    pub index_policy: String,
    /// Build time in unix seconds
    pub created_at: u32,
    /// Number of segment index entries
    pub segment_count: u32,
    /// Bytes of region strings referenced by segments
    pub data_region_size: usize,
    /// Distinct region records
    pub distinct_records: usize,
    /// Vector buckets with at least one segment
    pub non_empty_buckets: usize,
    /// Addresses covered by some segment
    pub covered_addresses: u64,
}

impl ValidationReport {
    /// Whether the database passed all checks (no errors)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    fn warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    fn info(&mut self, msg: impl Into<String>) {
        self.info.push(msg.into());
    }
}

impl DatabaseStats {
    /// Human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "Version: v{} ({}), Segments: {}, Records: {}, Buckets: {}/{}, Coverage: {:.2}%, Size: {} KB",
            self.version,
            self.index_policy,
            self.segment_count,
            self.distinct_records,
            self.non_empty_buckets,
            VECTOR_INDEX_ROWS * VECTOR_INDEX_COLS,
            self.covered_addresses as f64 * 100.0 / (1u64 << 32) as f64,
            self.file_size / 1024
        )
    }
}

/// Validate a database file
pub fn validate_database(path: &Path) -> Result<ValidationReport> {
    let buffer = std::fs::read(path)?;
    Ok(validate_bytes(&buffer))
}

/// Validate a database image held in memory
pub fn validate_bytes(data: &[u8]) -> ValidationReport {
    let mut report = ValidationReport::default();
    report.stats.file_size = data.len();
    report.info(format!(
        "File size: {} bytes ({} KB)",
        data.len(),
        data.len() / 1024
    ));

    let index = match ParsedIndex::parse(data) {
        Ok(index) => index,
        Err(e) => {
            report.error(e.to_string());
            return report;
        }
    };

    let header = index.header();
    report.stats.version = header.version;
    report.stats.index_policy = header.index_policy.to_string();
    report.stats.created_at = header.created_at;
    report.stats.segment_count = index.scan().segment_count;
    report.stats.covered_addresses = index.scan().covered;
    report.info(format!(
        "Segment index: {} entries at {}..={}",
        header.segment_count(),
        header.start_index_ptr,
        header.end_index_ptr
    ));

    check_coverage(&index, &mut report);

    let view = index.view(data);
    check_records(view, &mut report);
    check_buckets(view, &mut report);

    report
}

fn check_coverage(index: &ParsedIndex, report: &mut ValidationReport) {
    let gaps = &index.scan().gaps;
    for &(start, end) in gaps.iter().take(MAX_REPORTED) {
        report.warning(format!(
            "Addresses {}-{} are not covered by any segment",
            format_ipv4(start),
            format_ipv4(end)
        ));
    }
    if gaps.len() > MAX_REPORTED {
        report.warning(format!(
            "... and {} more uncovered ranges",
            gaps.len() - MAX_REPORTED
        ));
    }
}

fn check_records(view: IndexView<'_>, report: &mut ValidationReport) {
    let data = view.data();
    let mut seen: HashSet<(u32, u16)> = HashSet::new();
    let mut bad_utf8 = 0usize;
    let mut odd_fields = 0usize;

    for entry in view.segments() {
        let key = (entry.data_ptr.get(), entry.data_len.get());
        if !seen.insert(key) {
            continue;
        }
        report.stats.data_region_size += key.1 as usize;

        // Bounds were checked when the index was parsed.
        let start = key.0 as usize;
        let bytes = &data[start..start + key.1 as usize];
        match std::str::from_utf8(bytes) {
            Ok(region) => {
                let fields = memchr::memchr_iter(b'|', bytes).count() + 1;
                if fields != FIELD_COUNT {
                    odd_fields += 1;
                    if odd_fields <= MAX_REPORTED {
                        report.warning(format!(
                            "Record at {} has {} fields (expected {}): {:?}",
                            key.0, fields, FIELD_COUNT, region
                        ));
                    }
                }
            }
            Err(e) => {
                bad_utf8 += 1;
                if bad_utf8 <= MAX_REPORTED {
                    report.error(format!("Record at {} is not valid UTF-8: {}", key.0, e));
                }
            }
        }
    }

    if bad_utf8 > MAX_REPORTED {
        report.error(format!("{} records are not valid UTF-8 in total", bad_utf8));
    }
    report.stats.distinct_records = seen.len();
}

fn check_buckets(view: IndexView<'_>, report: &mut ValidationReport) {
    let mut empty = 0usize;
    let mut misplaced = 0usize;

    for bucket in 0..(VECTOR_INDEX_ROWS * VECTOR_INDEX_COLS) as u32 {
        let base = bucket << 16;
        let Some((s, e)) = view.vector_entry(base) else {
            empty += 1;
            continue;
        };
        report.stats.non_empty_buckets += 1;

        let mut ptr = s;
        while ptr <= e {
            let Some(entry) = view.segment_at(ptr) else {
                break;
            };
            if entry.start_ip.get() >> 16 != bucket && entry.end_ip.get() >> 16 != bucket {
                misplaced += 1;
                if misplaced <= MAX_REPORTED {
                    report.error(format!(
                        "Bucket {} references segment {}-{} outside its /16",
                        format_ipv4(base),
                        format_ipv4(entry.start_ip.get()),
                        format_ipv4(entry.end_ip.get())
                    ));
                }
            }
            ptr += crate::format::SEGMENT_INDEX_ENTRY_LEN as u32;
        }
    }

    if empty > 0 {
        report.warning(format!(
            "{} vector buckets have no segments; lookups there return empty records",
            empty
        ));
    }
}
