//! Database API
//!
//! A [`Database`] owns one immutable image and the index parsed from it.
//! It is `Send + Sync`; any number of threads can look up concurrently
//! without locking.
//!
//! Two lookup flavours exist:
//! - [`Database::record`] surfaces every failure (`InvalidAddress`,
//!   `NotFound`, `Encoding`, `CorruptDatabase`) for callers that want to
//!   distinguish them.
//! - [`Database::find`] / [`Database::lookup`] degrade lookup-time failures to
//!   an all-empty result, logging a warning. `find` is total over `u32`;
//!   `lookup` only fails for a malformed address string.

use crate::address::{format_ipv4, parse_ipv4, IntoIpv4};
use crate::error::{GeoError, Result};
use crate::index::{IndexHeader, ParsedIndex, SegmentScan};
use crate::record::{decode, IPLocationInfo, LocationRecord};
use crate::search::{RangeSearch, SegmentHit};
use crate::storage::Storage;
use std::path::Path;
use tracing::warn;

/// Two-level range index over an IPv4 region database
///
/// # Examples
///
/// ```no_run
/// use ipregion::Database;
///
/// let db = Database::open("data/ip2region.xdb")?;
///
/// let info = db.lookup("8.8.8.8")?;
/// println!("{} {}", info.country, info.isp);
///
/// // Integer input never fails.
/// let info = db.find(0x7272_7272);
/// println!("{} {}", info.province, info.city);
/// # Ok::<(), ipregion::GeoError>(())
/// ```
pub struct Database {
    storage: Storage,
    index: ParsedIndex,
}

impl Database {
    /// Open a database file using memory mapping
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_storage(Storage::map(path)?)
    }

    /// Open a database file by reading it fully into memory
    pub fn open_buffered<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_storage(Storage::read(path)?)
    }

    /// Create a database from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_storage(Storage::from(data))
    }

    /// Validate a byte source and take ownership of it
    pub fn from_storage(storage: Storage) -> Result<Self> {
        let index = ParsedIndex::parse(storage.as_slice())?;
        Ok(Self { storage, index })
    }

    /// Find the segment owning `ip`
    pub fn search(&self, ip: u32) -> Result<SegmentHit> {
        RangeSearch::new(self.index.view(self.storage.as_slice())).search(ip)
    }

    /// Look up the raw record for an address, surfacing every error kind
    pub fn record<A: IntoIpv4>(&self, addr: A) -> Result<LocationRecord> {
        let ip = addr.into_ipv4()?;
        let hit = self.search(ip)?;
        decode(self.storage.as_slice(), hit.data_ptr, hit.data_len)
    }

    /// Look up an address given as an integer.
    ///
    /// Never fails: a missing segment or an undecodable record yields a
    /// result with every location field empty.
    pub fn find(&self, ip: u32) -> IPLocationInfo {
        self.resolve(ip, format_ipv4(ip))
    }

    /// Look up a dotted-quad address.
    ///
    /// Fails only with `InvalidAddress`; lookup-time problems degrade the
    /// same way as [`Database::find`]. The result's `ip` is the query as
    /// given.
    pub fn lookup(&self, query: &str) -> Result<IPLocationInfo> {
        let ip = parse_ipv4(query)?;
        Ok(self.resolve(ip, query.to_string()))
    }

    fn resolve(&self, ip: u32, label: String) -> IPLocationInfo {
        match self.record(ip) {
            Ok(record) => record.into_info(label),
            Err(GeoError::NotFound(_)) => {
                warn!(ip = %label, "no segment owns address, returning empty record");
                IPLocationInfo::empty(label)
            }
            Err(e) => {
                warn!(ip = %label, error = %e, "lookup degraded to empty record");
                IPLocationInfo::empty(label)
            }
        }
    }

    /// Parsed header values
    pub fn header(&self) -> &IndexHeader {
        self.index.header()
    }

    /// Segment table summary gathered at load
    pub fn scan(&self) -> &SegmentScan {
        self.index.scan()
    }

    /// Number of segment entries
    pub fn segment_count(&self) -> u32 {
        self.index.header().segment_count()
    }

    /// Image size in bytes
    pub fn size(&self) -> usize {
        self.storage.len()
    }

    /// Whether the image is memory-mapped
    pub fn is_mapped(&self) -> bool {
        self.storage.is_mapped()
    }

    /// The raw image
    pub fn as_bytes(&self) -> &[u8] {
        self.storage.as_slice()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("storage", &self.storage)
            .field("header", self.index.header())
            .finish()
    }
}
