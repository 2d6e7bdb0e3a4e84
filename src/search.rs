//! Two-phase range search
//!
//! Lookups never build in-memory structures. The first two octets select a
//! vector index bucket in O(1); the bucket bounds an inclusive slice of the
//! sorted segment index, which is binary searched for the segment whose
//! `[start_ip, end_ip]` interval contains the address.
//!
//! ```text
//!  ip = a.b.c.d
//!    │
//!    ▼  slot = (a * 256 + b) * 8
//!  [vector index] ──► (start_ptr, end_ptr)
//!                          │
//!                          ▼  binary search, 14-byte stride
//!  [segment index]  ... [s0][s1][s2]...[sn] ...
//!                               │
//!                               ▼
//!                      (data_ptr, data_len)
//! ```
//!
//! Buckets hold at most a few hundred entries, so the second phase is a
//! handful of comparisons instead of ~20 over the whole table.

use crate::error::{GeoError, Result};
use crate::format::SEGMENT_INDEX_ENTRY_LEN;
use crate::index::IndexView;

/// Segment that owns a looked-up address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHit {
    /// First address of the segment
    pub start_ip: u32,
    /// Last address of the segment (inclusive)
    pub end_ip: u32,
    /// Offset of the region string
    pub data_ptr: u32,
    /// Length of the region string
    pub data_len: u16,
}

/// Search engine over a validated image
pub struct RangeSearch<'a> {
    view: IndexView<'a>,
}

impl<'a> RangeSearch<'a> {
    /// Create a search engine over an index view
    pub fn new(view: IndexView<'a>) -> Self {
        Self { view }
    }

    /// Find the segment owning `ip`.
    ///
    /// Returns `NotFound` when the bucket is empty or no entry in it contains
    /// the address. Both mean the image does not partition the address space;
    /// callers degrade to an empty result.
    pub fn search(&self, ip: u32) -> Result<SegmentHit> {
        let (s_ptr, e_ptr) = self.view.vector_entry(ip).ok_or(GeoError::NotFound(ip))?;

        let stride = SEGMENT_INDEX_ENTRY_LEN as u32;
        let mut lo = 0u32;
        let mut hi = (e_ptr - s_ptr) / stride + 1;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self
                .view
                .segment_at(s_ptr + mid * stride)
                .ok_or(GeoError::NotFound(ip))?;

            if ip < entry.start_ip.get() {
                hi = mid;
            } else if ip > entry.end_ip.get() {
                lo = mid + 1;
            } else {
                return Ok(SegmentHit {
                    start_ip: entry.start_ip.get(),
                    end_ip: entry.end_ip.get(),
                    data_ptr: entry.data_ptr.get(),
                    data_len: entry.data_len.get(),
                });
            }
        }

        Err(GeoError::NotFound(ip))
    }

    /// Number of entries in the bucket owning `ip`
    pub fn bucket_len(&self, ip: u32) -> u32 {
        match self.view.vector_entry(ip) {
            Some((s, e)) => (e - s) / SEGMENT_INDEX_ENTRY_LEN as u32 + 1,
            None => 0,
        }
    }
}
