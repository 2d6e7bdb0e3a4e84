//! ipregion - Offline IPv4 to region lookups
//!
//! ipregion answers "where is this IPv4 address?" from a single compact
//! database image mapping every address to a region record
//! (`country|region|province|city|isp`). Lookups are two array reads and a
//! short binary search, run lock-free from any number of threads, and never
//! fail for integer input.
//!
//! # Quick Start
//!
//! ```rust
//! use ipregion::{Database, DatabaseBuilder};
//!
//! let mut builder = DatabaseBuilder::new();
//! builder.add_line("8.8.8.0|8.8.8.255|United States|0|0|0|Level3")?;
//! builder.add_line("114.114.114.0|114.114.114.255|China|0|Jiangsu|Nanjing|0")?;
//! let db = Database::from_bytes(builder.build()?)?;
//!
//! let info = db.lookup("114.114.114.114")?;
//! assert_eq!(info.country, "China");
//! assert_eq!(info.city, "Nanjing");
//! assert_eq!(info.isp, "");
//!
//! // Unassigned space resolves to an all-empty record.
//! assert!(db.find(0x0101_0101).is_empty());
//! # Ok::<(), ipregion::GeoError>(())
//! ```
//!
//! # Serving from a cache or mirror
//!
//! ```rust,no_run
//! use ipregion::{LoaderConfig, Locator};
//!
//! let locator = Locator::new(LoaderConfig::load(None)?);
//! locator.load()?;
//! println!("{:?}", locator.lookup("8.8.8.8")?);
//!
//! // Later: fetch a fresh image; readers are never blocked.
//! locator.reload()?;
//! # Ok::<(), ipregion::GeoError>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────┐
//! │  Database Image                      │
//! ├──────────────────────────────────────┤
//! │  1. Header (256 bytes)               │
//! │  2. Vector index (256 x 256 buckets) │
//! │  3. Region strings (deduplicated)    │
//! │  4. Segment index (14-byte entries)  │
//! └──────────────────────────────────────┘
//!          ↓ mmap() or download
//! ┌──────────────────────────────────────┐
//! │  Database (immutable, Send + Sync)   │
//! │  published through a Locator        │
//! └──────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Cache and mirror acquisition
pub mod acquire;
/// IPv4 address parsing and formatting
pub mod address;
/// Database image builder
pub mod builder;
/// Loader configuration
pub mod config;
/// Database lookup API
pub mod database;
/// Error types
pub mod error;
pub mod file_reader;
pub mod format;
/// Header and index parsing
pub mod index;
/// Reloadable database handle
pub mod locator;
/// Region record decoding
pub mod record;
/// Two-phase range search
pub mod search;
pub mod storage;
pub mod validation;

pub use crate::acquire::{Fetcher, HttpFetcher};
pub use crate::address::{format_ipv4, parse_ipv4, IntoIpv4};
pub use crate::builder::DatabaseBuilder;
pub use crate::config::LoaderConfig;
pub use crate::database::Database;
pub use crate::error::{GeoError, Result};
pub use crate::locator::Locator;
pub use crate::record::{IPLocationInfo, LocationRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
