//! Reloadable database handle
//!
//! A [`Locator`] owns the currently published [`Database`] behind an
//! `ArcSwapOption`. Lookups take a lock-free snapshot of the pointer, so a
//! reload never blocks or disturbs in-flight queries: they finish against the
//! image they started with, which is dropped once the last snapshot goes away.
//!
//! New images are always acquired and validated off to the side. A failed
//! load or reload leaves the published state untouched.

use crate::acquire::{acquire, acquire_remote, Acquired, Fetcher, HttpFetcher, Source};
use crate::address::{format_ipv4, parse_ipv4};
use crate::config::LoaderConfig;
use crate::database::Database;
use crate::error::Result;
use crate::record::IPLocationInfo;
use arc_swap::ArcSwapOption;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

/// Owned, shareable handle to the current database
///
/// # Examples
///
/// ```no_run
/// use ipregion::{LoaderConfig, Locator};
///
/// let locator = Locator::new(LoaderConfig::default());
/// if let Err(e) = locator.load() {
///     eprintln!("database unavailable: {}", e);
/// }
///
/// // Works (with empty fields) even when nothing is loaded.
/// let info = locator.find(0x0808_0808);
/// println!("{} {}", info.ip, info.country);
/// ```
pub struct Locator {
    current: ArcSwapOption<Database>,
    config: LoaderConfig,
    fetcher: Arc<dyn Fetcher>,
}

impl Locator {
    /// Create an unloaded locator using the HTTP fetcher
    pub fn new(config: LoaderConfig) -> Self {
        Self::with_fetcher(config, Arc::new(HttpFetcher::new()))
    }

    /// Create an unloaded locator with a custom transport
    pub fn with_fetcher(config: LoaderConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            current: ArcSwapOption::empty(),
            config,
            fetcher,
        }
    }

    /// Create a locator that already serves `database`
    pub fn from_database(config: LoaderConfig, database: Database) -> Self {
        let locator = Self::new(config);
        locator.install(database);
        locator
    }

    /// Acquire a database (cache first, then mirrors) and publish it.
    ///
    /// On failure the previously published database, if any, stays in place.
    pub fn load(&self) -> Result<()> {
        self.publish(acquire(&self.config, self.fetcher.as_ref()))
    }

    /// Download a fresh database from the mirrors and publish it.
    ///
    /// The cache is skipped as a source but refreshed on success. On failure
    /// the previously published database stays in place.
    pub fn reload(&self) -> Result<()> {
        self.publish(acquire_remote(&self.config, self.fetcher.as_ref()))
    }

    /// Open a local database file and publish it.
    ///
    /// Honors `use_mmap`. A missing or corrupt file leaves the published
    /// state untouched.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let opened = if self.config.use_mmap {
            Database::open(path)
        } else {
            Database::open_buffered(path)
        };
        self.publish(opened.map(|database| Acquired {
            database,
            source: Source::Cache(path.to_path_buf()),
            cached: false,
        }))
    }

    fn publish(&self, acquired: Result<Acquired>) -> Result<()> {
        match acquired {
            Ok(acquired) => {
                info!(
                    source = %acquired.source,
                    segments = acquired.database.segment_count(),
                    created_at = acquired.database.header().created_at,
                    "ip region database is loaded"
                );
                self.install(acquired.database);
                Ok(())
            }
            Err(e) => {
                error!(
                    error = %e,
                    loaded = self.is_loaded(),
                    "database load failed, keeping current state"
                );
                Err(e)
            }
        }
    }

    /// Publish a caller-built database
    pub fn install(&self, database: Database) {
        self.current.store(Some(Arc::new(database)));
    }

    /// Look up an integer address.
    ///
    /// Returns an all-empty result when nothing is loaded.
    pub fn find(&self, ip: u32) -> IPLocationInfo {
        match self.current.load_full() {
            Some(db) => db.find(ip),
            None => IPLocationInfo::empty(format_ipv4(ip)),
        }
    }

    /// Look up a dotted-quad address.
    ///
    /// Fails only for a malformed address; an unloaded locator yields an
    /// all-empty result.
    pub fn lookup(&self, query: &str) -> Result<IPLocationInfo> {
        match self.current.load_full() {
            Some(db) => db.lookup(query),
            None => {
                parse_ipv4(query)?;
                Ok(IPLocationInfo::empty(query))
            }
        }
    }

    /// Whether a database is published
    pub fn is_loaded(&self) -> bool {
        self.current.load().is_some()
    }

    /// Snapshot of the published database
    pub fn current(&self) -> Option<Arc<Database>> {
        self.current.load_full()
    }

    /// Loader settings
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }
}

impl std::fmt::Debug for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Locator")
            .field("loaded", &self.is_loaded())
            .field("config", &self.config)
            .finish()
    }
}
