//! Database builder
//!
//! Turns a list of `start|end|region` ranges into a database image.
//!
//! The builder enforces the layout invariants readers rely on:
//! - ranges must not overlap (rejected with `InvalidSource`)
//! - uncovered space is filled with [`EMPTY_REGION`] so the output always
//!   partitions the whole IPv4 space
//! - adjacent ranges with the same region are merged
//! - segments are split at /16 boundaries so each one lives in exactly one
//!   vector index bucket
//! - region strings are stored once and shared between segments
//!
//! # Example
//!
//! ```rust
//! use ipregion::{Database, DatabaseBuilder};
//!
//! let mut builder = DatabaseBuilder::new();
//! builder.add_line("8.8.8.0|8.8.8.255|United States|0|0|0|Level3")?;
//! builder.add_range(0x7272_7200, 0x7272_72FF, "China|0|Jiangsu|Nanjing|0")?;
//!
//! let db = Database::from_bytes(builder.build()?)?;
//! assert_eq!(db.lookup("8.8.8.8")?.isp, "Level3");
//! # Ok::<(), ipregion::GeoError>(())
//! ```

use crate::address::parse_ipv4;
use crate::error::{GeoError, Result};
use crate::file_reader;
use crate::format::{
    vector_slot, RawHeader, SegmentIndexEntry, VectorIndexEntry, FORMAT_VERSION, HEADER_LEN,
    IndexPolicy, MIN_DATABASE_LEN, SEGMENT_INDEX_ENTRY_LEN,
};
use crate::record::EMPTY_REGION;
use crate::storage::write_atomic;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use zerocopy::{FromZeros, IntoBytes};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Range {
    start: u32,
    end: u32,
    region: String,
}

/// Builder for database images
#[derive(Debug, Default)]
pub struct DatabaseBuilder {
    ranges: Vec<Range>,
    created_at: Option<u32>,
}

impl DatabaseBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the build timestamp (unix seconds) for reproducible output
    pub fn with_created_at(mut self, secs: u32) -> Self {
        self.created_at = Some(secs);
        self
    }

    /// Add an inclusive address range with its region string
    pub fn add_range(&mut self, start: u32, end: u32, region: &str) -> Result<()> {
        if start > end {
            return Err(GeoError::InvalidAddress(format!(
                "range start {} is after end {}",
                crate::address::format_ipv4(start),
                crate::address::format_ipv4(end)
            )));
        }
        if region.len() > u16::MAX as usize {
            return Err(GeoError::InvalidSource(format!(
                "region of {} bytes exceeds {} byte limit",
                region.len(),
                u16::MAX
            )));
        }
        self.ranges.push(Range {
            start,
            end,
            region: region.to_string(),
        });
        Ok(())
    }

    /// Add a `start|end|region` line.
    ///
    /// Bounds may be dotted quads or decimal integers. Everything after the
    /// second `|` is the region string, stored verbatim.
    pub fn add_line(&mut self, line: &str) -> Result<()> {
        let mut parts = line.splitn(3, '|');
        let (start, end, region) = match (parts.next(), parts.next(), parts.next()) {
            (Some(s), Some(e), Some(r)) => (s, e, r),
            _ => {
                return Err(GeoError::InvalidSource(format!(
                    "expected 'start|end|region', got {:?}",
                    line
                )))
            }
        };
        let start = parse_bound(start.trim())?;
        let end = parse_bound(end.trim())?;
        self.add_range(start, end, region.trim_end_matches(&['\r', '\n'][..]))
    }

    /// Load a source file of `start|end|region` lines.
    ///
    /// Blank lines and lines starting with `#` are skipped. Files ending in
    /// `.gz` are decompressed. Returns the number of ranges added.
    pub fn load_source<P: AsRef<Path>>(&mut self, path: P) -> Result<usize> {
        let path = path.as_ref();
        let reader = file_reader::open(path)?;
        let mut added = 0usize;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            self.add_line(trimmed).map_err(|e| {
                GeoError::InvalidSource(format!("{}:{}: {}", path.display(), lineno + 1, e))
            })?;
            added += 1;
        }

        debug!(path = %path.display(), ranges = added, "loaded source file");
        Ok(added)
    }

    /// Number of ranges added so far
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Whether no ranges were added
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Build the database image
    pub fn build(&self) -> Result<Vec<u8>> {
        let ranges = self.normalized_ranges()?;

        // Data region directly after the vector index, one copy per region.
        let mut buf = vec![0u8; MIN_DATABASE_LEN];
        let mut data_ptrs: HashMap<&str, u32> = HashMap::new();
        for range in &ranges {
            if !data_ptrs.contains_key(range.region.as_str()) {
                let ptr = offset_u32(buf.len())?;
                buf.extend_from_slice(range.region.as_bytes());
                data_ptrs.insert(range.region.as_str(), ptr);
            }
        }

        // Segment index, split per /16 bucket.
        let start_index_ptr = offset_u32(buf.len())?;
        let mut vector = vec![VectorIndexEntry::new_zeroed(); 256 * 256];
        let mut segments = 0u32;

        for range in &ranges {
            let data_ptr = data_ptrs[range.region.as_str()];
            let data_len = range.region.len() as u16;

            let mut cur = range.start;
            loop {
                let seg_end = range.end.min(cur | 0xFFFF);
                let ptr = offset_u32(buf.len())?;
                buf.extend_from_slice(
                    SegmentIndexEntry::new(cur, seg_end, data_len, data_ptr).as_bytes(),
                );
                segments += 1;

                let bucket = &mut vector[vector_slot(cur) / 8];
                if bucket.is_empty() {
                    bucket.start_ptr.set(ptr);
                }
                bucket.end_ptr.set(ptr);

                if seg_end == range.end {
                    break;
                }
                cur = seg_end + 1;
            }
        }
        let end_index_ptr = offset_u32(buf.len() - SEGMENT_INDEX_ENTRY_LEN)?;

        let mut header = RawHeader::new_zeroed();
        header.version.set(FORMAT_VERSION);
        header.index_policy.set(IndexPolicy::VectorIndex.as_u16());
        header.created_at.set(self.created_at.unwrap_or_else(now_secs));
        header.start_index_ptr.set(start_index_ptr);
        header.end_index_ptr.set(end_index_ptr);

        buf[..HEADER_LEN].copy_from_slice(header.as_bytes());
        buf[HEADER_LEN..MIN_DATABASE_LEN].copy_from_slice(vector.as_bytes());

        info!(
            ranges = self.ranges.len(),
            segments,
            regions = data_ptrs.len(),
            bytes = buf.len(),
            "built database image"
        );
        Ok(buf)
    }

    /// Build and write the image atomically to `path`
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let bytes = self.build()?;
        write_atomic(path, &bytes)?;
        Ok(bytes.len())
    }

    /// Sorted, gap-free, merged copy of the input ranges
    fn normalized_ranges(&self) -> Result<Vec<Range>> {
        let mut sorted: Vec<&Range> = self.ranges.iter().collect();
        sorted.sort_by_key(|r| (r.start, r.end));

        let mut out: Vec<Range> = Vec::with_capacity(sorted.len() * 2 + 1);
        let mut next: Option<u32> = Some(0);

        for range in sorted {
            let expected = match next {
                Some(n) => n,
                None => return Err(overlap_error(out.last(), range)),
            };
            if range.start < expected {
                return Err(overlap_error(out.last(), range));
            }
            if range.start > expected {
                push_merged(&mut out, expected, range.start - 1, EMPTY_REGION);
            }
            push_merged(&mut out, range.start, range.end, &range.region);
            next = range.end.checked_add(1);
        }

        if let Some(expected) = next {
            push_merged(&mut out, expected, u32::MAX, EMPTY_REGION);
        }
        Ok(out)
    }
}

fn push_merged(out: &mut Vec<Range>, start: u32, end: u32, region: &str) {
    if let Some(last) = out.last_mut() {
        if last.region == region && last.end.checked_add(1) == Some(start) {
            last.end = end;
            return;
        }
    }
    out.push(Range {
        start,
        end,
        region: region.to_string(),
    });
}

fn overlap_error(prev: Option<&Range>, range: &Range) -> GeoError {
    use crate::address::format_ipv4;
    let prev = prev
        .map(|p| format!("{}-{}", format_ipv4(p.start), format_ipv4(p.end)))
        .unwrap_or_default();
    GeoError::InvalidSource(format!(
        "range {}-{} overlaps {}",
        format_ipv4(range.start),
        format_ipv4(range.end),
        prev
    ))
}

fn parse_bound(s: &str) -> Result<u32> {
    if s.contains('.') {
        parse_ipv4(s)
    } else {
        s.parse::<u32>()
            .map_err(|_| GeoError::InvalidAddress(s.to_string()))
    }
}

fn offset_u32(offset: usize) -> Result<u32> {
    u32::try_from(offset)
        .map_err(|_| GeoError::InvalidSource("database image exceeds 4 GiB".to_string()))
}

fn now_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().min(u32::MAX as u64) as u32)
        .unwrap_or(0)
}
