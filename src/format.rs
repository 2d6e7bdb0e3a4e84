//! On-disk layout of the two-level range index
//!
//! The database is a single little-endian image that can be used directly from
//! a buffer or a memory map without deserialization. All pointers are byte
//! offsets from the start of the image.
//!
//! # Layout
//!
//! ```text
//! [Header: 256 bytes]
//! [Vector index: 256 x 256 entries of {start_ptr: u32, end_ptr: u32}]
//! [Data region: region strings, deduplicated, no terminator]
//! [Segment index: 14-byte entries sorted by start_ip]
//! ```
//!
//! The builder places region strings before the segment index, but readers
//! must not rely on that: every offset is taken from the header and from the
//! entries themselves.
//!
//! The structs use `zerocopy`'s little-endian integer types, which have an
//! alignment of 1. That keeps `SegmentIndexEntry` at exactly 14 bytes and
//! lets all three be read at any offset of the image.

use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Fixed header length in bytes
pub const HEADER_LEN: usize = 256;

/// Number of rows and columns in the vector index (first and second octet)
pub const VECTOR_INDEX_ROWS: usize = 256;
/// Number of columns per vector index row
pub const VECTOR_INDEX_COLS: usize = 256;
/// Size of one vector index entry in bytes
pub const VECTOR_INDEX_ENTRY_LEN: usize = 8;
/// Total vector index length in bytes
pub const VECTOR_INDEX_LEN: usize = VECTOR_INDEX_ROWS * VECTOR_INDEX_COLS * VECTOR_INDEX_ENTRY_LEN;

/// Size of one segment index entry in bytes
pub const SEGMENT_INDEX_ENTRY_LEN: usize = 14;

/// Smallest buffer that can hold a header and a complete vector index
pub const MIN_DATABASE_LEN: usize = HEADER_LEN + VECTOR_INDEX_LEN;

/// Format version written by the builder and accepted by the reader
pub const FORMAT_VERSION: u16 = 2;

/// Index policy values stored in the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPolicy {
    /// Two-level vector index (the only layout this crate searches)
    VectorIndex,
    /// B-tree index used by older generators; recognized, never searched
    BTreeIndex,
}

impl IndexPolicy {
    /// Convert from the raw header value
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(IndexPolicy::VectorIndex),
            2 => Some(IndexPolicy::BTreeIndex),
            _ => None,
        }
    }

    /// Raw header value
    pub fn as_u16(self) -> u16 {
        match self {
            IndexPolicy::VectorIndex => 1,
            IndexPolicy::BTreeIndex => 2,
        }
    }
}

impl std::fmt::Display for IndexPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexPolicy::VectorIndex => write!(f, "vector"),
            IndexPolicy::BTreeIndex => write!(f, "btree"),
        }
    }
}

/// Database header (256 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RawHeader {
    /// Format version, see [`FORMAT_VERSION`]
    pub version: U16,
    /// Index policy, see [`IndexPolicy`]
    pub index_policy: U16,
    /// Build time in unix seconds
    pub created_at: U32,
    /// Offset of the first segment index entry
    pub start_index_ptr: U32,
    /// Offset of the last segment index entry (inclusive)
    pub end_index_ptr: U32,
    /// Zero padding up to [`HEADER_LEN`]
    pub reserved: [u8; HEADER_LEN - 16],
}

/// Vector index entry (8 bytes)
///
/// Bounds the inclusive slice of segment index entries for one /16 bucket.
/// Both pointers are zero for a bucket with no entries.
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct VectorIndexEntry {
    /// Offset of the first candidate segment entry
    pub start_ptr: U32,
    /// Offset of the last candidate segment entry (inclusive)
    pub end_ptr: U32,
}

impl VectorIndexEntry {
    /// Whether this bucket references no segment entries
    pub fn is_empty(&self) -> bool {
        self.start_ptr.get() == 0 && self.end_ptr.get() == 0
    }
}

/// Segment index entry (14 bytes)
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct SegmentIndexEntry {
    /// First address of the segment
    pub start_ip: U32,
    /// Last address of the segment (inclusive)
    pub end_ip: U32,
    /// Length of the region string in bytes
    pub data_len: U16,
    /// Offset of the region string
    pub data_ptr: U32,
}

impl SegmentIndexEntry {
    /// Create an entry from native values
    pub fn new(start_ip: u32, end_ip: u32, data_len: u16, data_ptr: u32) -> Self {
        Self {
            start_ip: U32::new(start_ip),
            end_ip: U32::new(end_ip),
            data_len: U16::new(data_len),
            data_ptr: U32::new(data_ptr),
        }
    }

    /// Whether `ip` falls inside `[start_ip, end_ip]`
    #[inline]
    pub fn contains(&self, ip: u32) -> bool {
        self.start_ip.get() <= ip && ip <= self.end_ip.get()
    }
}

/// Byte offset of the vector index entry for `ip`, relative to the table base
#[inline]
pub fn vector_slot(ip: u32) -> usize {
    let il0 = ((ip >> 24) & 0xFF) as usize;
    let il1 = ((ip >> 16) & 0xFF) as usize;
    (il0 * VECTOR_INDEX_COLS + il1) * VECTOR_INDEX_ENTRY_LEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn test_struct_sizes() {
        assert_eq!(size_of::<RawHeader>(), HEADER_LEN);
        assert_eq!(size_of::<VectorIndexEntry>(), VECTOR_INDEX_ENTRY_LEN);
        assert_eq!(size_of::<SegmentIndexEntry>(), SEGMENT_INDEX_ENTRY_LEN);
    }

    #[test]
    fn test_segment_entry_byte_layout() {
        let entry = SegmentIndexEntry::new(0x0102_0304, 0x0102_03FF, 7, 0x0008_0100);
        assert_eq!(
            entry.as_bytes(),
            &[0x04, 0x03, 0x02, 0x01, 0xFF, 0x03, 0x02, 0x01, 0x07, 0x00, 0x00, 0x01, 0x08, 0x00]
        );
        let back = SegmentIndexEntry::read_from_bytes(entry.as_bytes()).unwrap();
        assert_eq!(back.start_ip.get(), 0x0102_0304);
        assert_eq!(back.data_ptr.get(), 0x0008_0100);
    }

    #[test]
    fn test_vector_slot_bounds() {
        assert_eq!(vector_slot(0), 0);
        assert_eq!(vector_slot(0x0001_FFFF), 8);
        assert_eq!(vector_slot(0x0100_0000), 256 * 8);
        assert_eq!(vector_slot(u32::MAX), VECTOR_INDEX_LEN - VECTOR_INDEX_ENTRY_LEN);
    }

    #[test]
    fn test_contains() {
        let entry = SegmentIndexEntry::new(10, 20, 0, 0);
        assert!(!entry.contains(9));
        assert!(entry.contains(10));
        assert!(entry.contains(20));
        assert!(!entry.contains(21));
    }

    #[test]
    fn test_index_policy_roundtrip() {
        assert_eq!(IndexPolicy::from_u16(1), Some(IndexPolicy::VectorIndex));
        assert_eq!(IndexPolicy::from_u16(2), Some(IndexPolicy::BTreeIndex));
        assert_eq!(IndexPolicy::from_u16(0), None);
        assert_eq!(IndexPolicy::VectorIndex.as_u16(), 1);
    }
}
