//! IPv4 address parsing and formatting
//!
//! Lookups operate on `u32` addresses. Strings are accepted only in strict
//! dotted-quad form: exactly four `.`-separated decimal octets of one to three
//! digits each, every octet in `0..=255`. Leading zeros are accepted and
//! normalized away (`"010.001.0.0"` is `10.1.0.0`); signs, whitespace, empty
//! octets, hex and IPv6 text are rejected rather than coerced.

use crate::error::{GeoError, Result};
use std::net::Ipv4Addr;

/// Parse a dotted-quad string into its `u32` value.
///
/// # Example
///
/// ```
/// use ipregion::address::parse_ipv4;
///
/// assert_eq!(parse_ipv4("8.8.8.8")?, 0x0808_0808);
/// assert_eq!(parse_ipv4("010.001.000.255")?, 0x0A01_00FF);
/// assert!(parse_ipv4("1.2.3").is_err());
/// # Ok::<(), ipregion::GeoError>(())
/// ```
pub fn parse_ipv4(s: &str) -> Result<u32> {
    let invalid = || GeoError::InvalidAddress(s.to_string());

    let mut value = 0u32;
    let mut octets = 0usize;

    for part in s.split('.') {
        octets += 1;
        if octets > 4 || part.is_empty() || part.len() > 3 {
            return Err(invalid());
        }
        let mut octet = 0u32;
        for b in part.bytes() {
            if !b.is_ascii_digit() {
                return Err(invalid());
            }
            octet = octet * 10 + (b - b'0') as u32;
        }
        if octet > 255 {
            return Err(invalid());
        }
        value = (value << 8) | octet;
    }

    if octets != 4 {
        return Err(invalid());
    }
    Ok(value)
}

/// Render a `u32` address as a canonical dotted quad.
pub fn format_ipv4(ip: u32) -> String {
    Ipv4Addr::from(ip).to_string()
}

/// Used by error messages that only hold a reference to the address.
pub(crate) fn display_ipv4(ip: &u32) -> Ipv4Addr {
    Ipv4Addr::from(*ip)
}

/// Anything that can be resolved to an IPv4 lookup key.
///
/// Integers and `Ipv4Addr` always convert; strings go through
/// [`parse_ipv4`] and may fail with `InvalidAddress`.
pub trait IntoIpv4 {
    /// Convert into the numeric address
    fn into_ipv4(self) -> Result<u32>;
}

impl IntoIpv4 for u32 {
    fn into_ipv4(self) -> Result<u32> {
        Ok(self)
    }
}

impl IntoIpv4 for Ipv4Addr {
    fn into_ipv4(self) -> Result<u32> {
        Ok(u32::from(self))
    }
}

impl IntoIpv4 for &str {
    fn into_ipv4(self) -> Result<u32> {
        parse_ipv4(self)
    }
}

impl IntoIpv4 for &String {
    fn into_ipv4(self) -> Result<u32> {
        parse_ipv4(self)
    }
}
