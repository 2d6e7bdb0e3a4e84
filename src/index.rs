//! Header and index parsing
//!
//! Parses the fixed header, then validates the vector index and the segment
//! index against the buffer before anything is searched. Only the handful of
//! header values needed for lookups are kept; the tables themselves stay in
//! the image and are read through [`IndexView`].
//!
//! Validation covers:
//! - buffer large enough for the header and the full vector index
//! - supported version and index policy
//! - segment index pointers in bounds, on the 14-byte stride, not reversed
//! - every non-empty vector bucket inside the segment index region, with an
//!   inclusive end or an exclusive end one entry past its last segment
//! - segments sorted, `start_ip <= end_ip`, no overlap, data in bounds
//!
//! Gaps between segments are tolerated (they surface as `NotFound` at lookup
//! time) and are logged once at load.

use crate::address::format_ipv4;
use crate::error::{GeoError, Result};
use crate::format::{
    vector_slot, IndexPolicy, RawHeader, SegmentIndexEntry, VectorIndexEntry, FORMAT_VERSION,
    HEADER_LEN, MIN_DATABASE_LEN, SEGMENT_INDEX_ENTRY_LEN, VECTOR_INDEX_ENTRY_LEN,
    VECTOR_INDEX_LEN,
};
use tracing::{debug, warn};
use zerocopy::FromBytes;

/// Parsed header values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Format version
    pub version: u16,
    /// Index policy
    pub index_policy: IndexPolicy,
    /// Build time in unix seconds
    pub created_at: u32,
    /// Offset of the first segment index entry
    pub start_index_ptr: u32,
    /// Offset of the last segment index entry (inclusive)
    pub end_index_ptr: u32,
}

impl IndexHeader {
    /// Read and check the header fields
    pub fn read(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_DATABASE_LEN {
            return Err(GeoError::corrupt(format!(
                "buffer is {} bytes, need at least {} for header and vector index",
                data.len(),
                MIN_DATABASE_LEN
            )));
        }

        let raw = RawHeader::read_from_bytes(&data[..HEADER_LEN])
            .map_err(|_| GeoError::corrupt("header truncated"))?;

        let version = raw.version.get();
        if version != FORMAT_VERSION {
            return Err(GeoError::corrupt(format!(
                "unsupported format version {} (expected {})",
                version, FORMAT_VERSION
            )));
        }

        let index_policy = match IndexPolicy::from_u16(raw.index_policy.get()) {
            Some(IndexPolicy::VectorIndex) => IndexPolicy::VectorIndex,
            Some(other) => {
                return Err(GeoError::corrupt(format!(
                    "index policy '{}' is not supported",
                    other
                )))
            }
            None => {
                return Err(GeoError::corrupt(format!(
                    "unknown index policy {}",
                    raw.index_policy.get()
                )))
            }
        };

        let start_index_ptr = raw.start_index_ptr.get();
        let end_index_ptr = raw.end_index_ptr.get();

        if (start_index_ptr as usize) < MIN_DATABASE_LEN {
            return Err(GeoError::corrupt(format!(
                "segment index start {} overlaps header or vector index",
                start_index_ptr
            )));
        }
        if end_index_ptr < start_index_ptr {
            return Err(GeoError::corrupt(format!(
                "segment index end {} precedes start {}",
                end_index_ptr, start_index_ptr
            )));
        }
        if (end_index_ptr - start_index_ptr) as usize % SEGMENT_INDEX_ENTRY_LEN != 0 {
            return Err(GeoError::corrupt(format!(
                "segment index span {}..={} is not a multiple of {} bytes",
                start_index_ptr, end_index_ptr, SEGMENT_INDEX_ENTRY_LEN
            )));
        }
        let index_end = end_index_ptr as usize + SEGMENT_INDEX_ENTRY_LEN;
        if index_end > data.len() {
            return Err(GeoError::corrupt(format!(
                "segment index ends at {} beyond buffer of {} bytes",
                index_end,
                data.len()
            )));
        }

        Ok(Self {
            version,
            index_policy,
            created_at: raw.created_at.get(),
            start_index_ptr,
            end_index_ptr,
        })
    }

    /// Number of segment index entries
    pub fn segment_count(&self) -> u32 {
        (self.end_index_ptr - self.start_index_ptr) / SEGMENT_INDEX_ENTRY_LEN as u32 + 1
    }

    /// Whether `ptr` addresses a whole entry inside the segment index
    fn is_entry_ptr(&self, ptr: u32) -> bool {
        ptr >= self.start_index_ptr
            && ptr <= self.end_index_ptr
            && (ptr - self.start_index_ptr) as usize % SEGMENT_INDEX_ENTRY_LEN == 0
    }

    /// Whether `ptr` is a valid bucket end: an entry, or one past the last entry
    fn is_bucket_end(&self, ptr: u32) -> bool {
        self.is_entry_ptr(ptr)
            || ptr as u64 == self.end_index_ptr as u64 + SEGMENT_INDEX_ENTRY_LEN as u64
    }
}

/// Summary of the segment table gathered during validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentScan {
    /// Number of segment entries
    pub segment_count: u32,
    /// Number of addresses covered by some segment
    pub covered: u64,
    /// Uncovered ranges, in address order
    pub gaps: Vec<(u32, u32)>,
}

impl SegmentScan {
    /// Whether the segments partition the whole address space
    pub fn is_complete(&self) -> bool {
        self.gaps.is_empty()
    }
}

/// Header plus validated table geometry, detached from the buffer
#[derive(Debug, Clone)]
pub struct ParsedIndex {
    header: IndexHeader,
    scan: SegmentScan,
}

impl ParsedIndex {
    /// Parse and validate a complete database image.
    ///
    /// Fails with `CorruptDatabase` on any structural problem; never reads
    /// out of bounds.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = IndexHeader::read(data)?;
        check_vector_index(data, &header)?;
        let scan = scan_segments(data, &header)?;

        if !scan.is_complete() {
            let (first_start, first_end) = scan.gaps[0];
            warn!(
                gaps = scan.gaps.len(),
                first_gap_start = %format_ipv4(first_start),
                first_gap_end = %format_ipv4(first_end),
                "database does not cover the whole IPv4 space"
            );
        }
        debug!(
            version = header.version,
            created_at = header.created_at,
            segments = scan.segment_count,
            "parsed database index"
        );

        Ok(Self { header, scan })
    }

    /// Parsed header values
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// Segment table summary
    pub fn scan(&self) -> &SegmentScan {
        &self.scan
    }

    /// Borrow a read view over the image this index was parsed from
    pub fn view<'a>(&'a self, data: &'a [u8]) -> IndexView<'a> {
        IndexView {
            data,
            header: &self.header,
        }
    }
}

/// Read access to the tables of a validated image
#[derive(Clone, Copy)]
pub struct IndexView<'a> {
    data: &'a [u8],
    header: &'a IndexHeader,
}

impl<'a> IndexView<'a> {
    /// The image
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Parsed header values
    pub fn header(&self) -> &'a IndexHeader {
        self.header
    }

    /// Inclusive `(start_ptr, end_ptr)` of the bucket owning `ip`.
    ///
    /// Returns `None` for a bucket with no entries. Images whose buckets end
    /// one entry past their last segment are normalized to the inclusive form.
    #[inline]
    pub fn vector_entry(&self, ip: u32) -> Option<(u32, u32)> {
        let entry = read_vector_entry(self.data, vector_slot(ip))?;
        if entry.is_empty() {
            return None;
        }
        let (s, e) = (entry.start_ptr.get(), entry.end_ptr.get());
        Some((s, self.inclusive_end(ip >> 16, s, e)))
    }

    fn inclusive_end(&self, bucket: u32, s: u32, e: u32) -> u32 {
        let stride = SEGMENT_INDEX_ENTRY_LEN as u32;
        if e > self.header.end_index_ptr {
            return self.header.end_index_ptr;
        }
        match self.segment_at(e) {
            // Exclusive end: the entry at `e` is the first one of a later bucket.
            Some(last) if e > s && last.start_ip.get() >> 16 > bucket => e - stride,
            _ => e,
        }
    }

    /// Segment entry at byte offset `ptr`
    #[inline]
    pub fn segment_at(&self, ptr: u32) -> Option<SegmentIndexEntry> {
        read_segment_entry(self.data, ptr as usize)
    }

    /// All segment entries in address order
    pub fn segments(&self) -> impl Iterator<Item = SegmentIndexEntry> + 'a {
        let data = self.data;
        let start = self.header.start_index_ptr as usize;
        let end = self.header.end_index_ptr as usize;
        (start..=end)
            .step_by(SEGMENT_INDEX_ENTRY_LEN)
            .filter_map(move |ptr| read_segment_entry(data, ptr))
    }
}

#[inline]
fn read_vector_entry(data: &[u8], slot: usize) -> Option<VectorIndexEntry> {
    let offset = HEADER_LEN + slot;
    let bytes = data.get(offset..offset + VECTOR_INDEX_ENTRY_LEN)?;
    VectorIndexEntry::read_from_bytes(bytes).ok()
}

#[inline]
fn read_segment_entry(data: &[u8], ptr: usize) -> Option<SegmentIndexEntry> {
    let bytes = data.get(ptr..ptr.checked_add(SEGMENT_INDEX_ENTRY_LEN)?)?;
    SegmentIndexEntry::read_from_bytes(bytes).ok()
}

/// Check every vector bucket against the segment index bounds
fn check_vector_index(data: &[u8], header: &IndexHeader) -> Result<()> {
    for slot in (0..VECTOR_INDEX_LEN).step_by(VECTOR_INDEX_ENTRY_LEN) {
        let entry = read_vector_entry(data, slot)
            .ok_or_else(|| GeoError::corrupt("vector index truncated"))?;
        if entry.is_empty() {
            continue;
        }

        let (s, e) = (entry.start_ptr.get(), entry.end_ptr.get());
        let bucket = slot / VECTOR_INDEX_ENTRY_LEN;
        if s > e {
            return Err(GeoError::corrupt(format!(
                "vector bucket {}.{} is reversed ({} > {})",
                bucket >> 8,
                bucket & 0xFF,
                s,
                e
            )));
        }
        if !header.is_entry_ptr(s) || !header.is_bucket_end(e) {
            return Err(GeoError::corrupt(format!(
                "vector bucket {}.{} points outside the segment index ({}..={})",
                bucket >> 8,
                bucket & 0xFF,
                s,
                e
            )));
        }
    }
    Ok(())
}

/// Walk the segment table checking order, overlap and data bounds
pub(crate) fn scan_segments(data: &[u8], header: &IndexHeader) -> Result<SegmentScan> {
    let view = IndexView { data, header };
    let mut scan = SegmentScan::default();
    // Next address expected to be covered; None once 255.255.255.255 is covered.
    let mut next: Option<u32> = Some(0);

    for entry in view.segments() {
        let (start, end) = (entry.start_ip.get(), entry.end_ip.get());
        if start > end {
            return Err(GeoError::corrupt(format!(
                "segment {} has start {} after end {}",
                scan.segment_count,
                format_ipv4(start),
                format_ipv4(end)
            )));
        }

        match next {
            None => {
                return Err(GeoError::corrupt(format!(
                    "segment {} ({}) follows a segment ending at 255.255.255.255",
                    scan.segment_count,
                    format_ipv4(start)
                )))
            }
            Some(expected) if start < expected => {
                return Err(GeoError::corrupt(format!(
                    "segment {} ({}-{}) overlaps or is out of order",
                    scan.segment_count,
                    format_ipv4(start),
                    format_ipv4(end)
                )))
            }
            Some(expected) if start > expected => scan.gaps.push((expected, start - 1)),
            Some(_) => {}
        }

        let data_end = entry.data_ptr.get() as usize + entry.data_len.get() as usize;
        if data_end > data.len() {
            return Err(GeoError::corrupt(format!(
                "segment {} data {}+{} beyond buffer of {} bytes",
                scan.segment_count,
                entry.data_ptr.get(),
                entry.data_len.get(),
                data.len()
            )));
        }

        scan.covered += (end - start) as u64 + 1;
        scan.segment_count += 1;
        next = end.checked_add(1);
    }

    if let Some(expected) = next {
        scan.gaps.push((expected, u32::MAX));
    }
    Ok(scan)
}
