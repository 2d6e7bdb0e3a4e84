//! Region record decoding
//!
//! Each segment points at a UTF-8 string of pipe-separated fields in the
//! order `country|region|province|city|isp`. A field equal to `"0"` means
//! unknown. Records with fewer than five fields are accepted and the missing
//! fields left empty; extra fields are ignored.

use crate::error::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Number of positional fields in a region record
pub const FIELD_COUNT: usize = 5;

/// Marker for an unknown field value
pub const UNKNOWN_FIELD: &str = "0";

/// Region string used for address space without data
pub const EMPTY_REGION: &str = "0|0|0|0|0";

/// Decoded region record
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Country name
    pub country: String,
    /// Region or area
    pub area: String,
    /// Province or state
    pub province: String,
    /// City
    pub city: String,
    /// Carrier or ISP
    pub isp: String,
}

impl LocationRecord {
    /// Parse a region string.
    pub fn parse(region: &str) -> Self {
        let mut fields = [""; FIELD_COUNT];
        let bytes = region.as_bytes();
        let mut start = 0usize;
        let mut idx = 0usize;

        // '|' is ASCII so every split point is a char boundary.
        for pos in memchr::memchr_iter(b'|', bytes).chain(std::iter::once(bytes.len())) {
            if idx == FIELD_COUNT {
                break;
            }
            fields[idx] = &region[start..pos];
            idx += 1;
            start = pos + 1;
        }

        let norm = |f: &str| {
            if f == UNKNOWN_FIELD {
                String::new()
            } else {
                f.to_string()
            }
        };

        Self {
            country: norm(fields[0]),
            area: norm(fields[1]),
            province: norm(fields[2]),
            city: norm(fields[3]),
            isp: norm(fields[4]),
        }
    }

    /// Whether every field is empty
    pub fn is_empty(&self) -> bool {
        self.country.is_empty()
            && self.area.is_empty()
            && self.province.is_empty()
            && self.city.is_empty()
            && self.isp.is_empty()
    }

    /// Attach the queried address to produce a caller-facing result
    pub fn into_info(self, ip: impl Into<String>) -> IPLocationInfo {
        IPLocationInfo {
            ip: ip.into(),
            country: self.country,
            area: self.area,
            province: self.province,
            city: self.city,
            isp: self.isp,
            info: BTreeMap::new(),
        }
    }
}

/// Decode the record of `length` bytes at `offset` in `data`.
///
/// Fails with `CorruptDatabase` if the range is outside the image and with
/// `Encoding` if the bytes are not UTF-8. Never panics.
pub fn decode(data: &[u8], offset: u32, length: u16) -> Result<LocationRecord> {
    let start = offset as usize;
    let bytes = start
        .checked_add(length as usize)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| {
            GeoError::corrupt(format!(
                "record {}+{} beyond buffer of {} bytes",
                offset,
                length,
                data.len()
            ))
        })?;

    let region =
        std::str::from_utf8(bytes).map_err(|source| GeoError::Encoding { offset, source })?;
    Ok(LocationRecord::parse(region))
}

/// Lookup result handed to callers
///
/// `info` is reserved for caller-attached metadata; lookups always leave it
/// empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IPLocationInfo {
    /// The address as queried
    pub ip: String,
    /// Country name
    pub country: String,
    /// Region or area
    pub area: String,
    /// Province or state
    pub province: String,
    /// City
    pub city: String,
    /// Carrier or ISP
    pub isp: String,
    /// Caller metadata
    #[serde(default)]
    pub info: BTreeMap<String, String>,
}

impl IPLocationInfo {
    /// Result with every location field empty
    pub fn empty(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }

    /// Whether every location field is empty
    pub fn is_empty(&self) -> bool {
        self.country.is_empty()
            && self.area.is_empty()
            && self.province.is_empty()
            && self.city.is_empty()
            && self.isp.is_empty()
    }

    /// Flatten into a single string map for transport.
    ///
    /// Caller metadata is included under `info.<key>`.
    pub fn to_flat_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        map.insert("ip".to_string(), self.ip.clone());
        map.insert("country".to_string(), self.country.clone());
        map.insert("area".to_string(), self.area.clone());
        map.insert("province".to_string(), self.province.clone());
        map.insert("city".to_string(), self.city.clone());
        map.insert("isp".to_string(), self.isp.clone());
        for (k, v) in &self.info {
            map.insert(format!("info.{}", k), v.clone());
        }
        map
    }
}
