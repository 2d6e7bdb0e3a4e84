//! Database acquisition
//!
//! Resolution order:
//!
//! 1. the local cache file, if it exists and is non-empty
//! 2. each configured mirror in turn
//!
//! A mirror payload is gunzipped when it carries the gzip magic, then parsed.
//! The first payload that parses wins and is written back to the cache path
//! atomically; a failed cache write is logged and otherwise ignored. A payload
//! that does not parse counts as a failed mirror.
//!
//! Downloads go through the [`Fetcher`] trait so tests (and callers with their
//! own HTTP stack) can substitute the transport.

use crate::config::LoaderConfig;
use crate::database::Database;
use crate::error::{GeoError, Result};
use crate::file_reader::decompress_if_gzip;
use crate::storage::{write_atomic, Storage};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Transport used to download a database image
pub trait Fetcher: Send + Sync {
    /// Fetch the full body at `url`, giving up after `timeout`
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>>;
}

/// [`Fetcher`] backed by a blocking `reqwest` client.
///
/// One client (and its connection pool) is shared by every attempt; the
/// timeout is applied per request.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Create a new fetcher
    pub fn new() -> Self {
        Self::with_client(reqwest::blocking::Client::new())
    }

    /// Create a fetcher over a preconfigured client
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| GeoError::AcquisitionFailed(format!("{}: {}", url, e)))?;

        let body = response
            .bytes()
            .map_err(|e| GeoError::AcquisitionFailed(format!("{}: {}", url, e)))?;
        Ok(body.to_vec())
    }
}

/// Where an acquired database came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// The local cache file
    Cache(PathBuf),
    /// A mirror URL
    Mirror(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Cache(path) => write!(f, "cache {}", path.display()),
            Source::Mirror(url) => write!(f, "mirror {}", url),
        }
    }
}

/// A parsed database and its origin
#[derive(Debug)]
pub struct Acquired {
    /// The parsed database
    pub database: Database,
    /// Where it was loaded from
    pub source: Source,
    /// Whether a downloaded image was written to the cache path
    pub cached: bool,
}

/// Acquire a database: cache first, then mirrors
pub fn acquire(config: &LoaderConfig, fetcher: &dyn Fetcher) -> Result<Acquired> {
    let mut failures = Vec::new();

    match load_cache(config) {
        Ok(Some(database)) => {
            info!(path = %config.cache_path.display(), mapped = database.is_mapped(), "loaded database from cache");
            return Ok(Acquired {
                database,
                source: Source::Cache(config.cache_path.clone()),
                cached: false,
            });
        }
        Ok(None) => debug!(path = %config.cache_path.display(), "no cached database"),
        Err(e) => {
            warn!(path = %config.cache_path.display(), error = %e, "cached database unusable");
            failures.push(format!("cache {}: {}", config.cache_path.display(), e));
        }
    }

    acquire_from_mirrors(config, fetcher, failures)
}

/// Acquire a database from the mirrors only, ignoring the cache
pub fn acquire_remote(config: &LoaderConfig, fetcher: &dyn Fetcher) -> Result<Acquired> {
    acquire_from_mirrors(config, fetcher, Vec::new())
}

fn acquire_from_mirrors(
    config: &LoaderConfig,
    fetcher: &dyn Fetcher,
    mut failures: Vec<String>,
) -> Result<Acquired> {
    let timeout = config.timeout();

    for url in &config.mirrors {
        debug!(url = %url, timeout_secs = config.timeout_secs, "fetching database");
        match fetch_and_parse(fetcher, url, timeout) {
            Ok((database, bytes)) => {
                let cached = persist(&config.cache_path, &bytes);
                info!(
                    url = %url,
                    bytes = bytes.len(),
                    segments = database.segment_count(),
                    "downloaded database"
                );
                return Ok(Acquired {
                    database,
                    source: Source::Mirror(url.clone()),
                    cached,
                });
            }
            Err(e) => {
                warn!(url = %url, error = %e, "mirror failed");
                failures.push(format!("{}: {}", url, e));
            }
        }
    }

    if failures.is_empty() {
        failures.push("no cache file and no mirrors configured".to_string());
    }
    let message = failures.join("; ");
    error!(error = %message, "all database sources failed");
    Err(GeoError::AcquisitionFailed(message))
}

fn load_cache(config: &LoaderConfig) -> Result<Option<Database>> {
    let path = &config.cache_path;
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() && meta.len() > 0 => {}
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let storage = if config.use_mmap {
        Storage::map(path)?
    } else {
        Storage::read(path)?
    };
    Database::from_storage(storage).map(Some)
}

fn fetch_and_parse(
    fetcher: &dyn Fetcher,
    url: &str,
    timeout: Duration,
) -> Result<(Database, Vec<u8>)> {
    let payload = fetcher.fetch(url, timeout)?;
    let bytes = decompress_if_gzip(payload)?;
    // The parsed copy and the bytes written to disk are the same image.
    let database = Database::from_bytes(bytes.clone())?;
    Ok((database, bytes))
}

fn persist(path: &Path, bytes: &[u8]) -> bool {
    match write_atomic(path, bytes) {
        Ok(()) => {
            debug!(path = %path.display(), bytes = bytes.len(), "cached database");
            true
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to cache database");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DatabaseBuilder;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned bodies per URL and records the request order
    struct MapFetcher {
        bodies: HashMap<String, Vec<u8>>,
        calls: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn new(bodies: &[(&str, Vec<u8>)]) -> Self {
            Self {
                bodies: bodies.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl Fetcher for MapFetcher {
        fn fetch(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>> {
            self.calls.lock().unwrap().push(url.to_string());
            self.bodies
                .get(url)
                .cloned()
                .ok_or_else(|| GeoError::AcquisitionFailed(format!("{}: connection refused", url)))
        }
    }

    fn image() -> Vec<u8> {
        let mut builder = DatabaseBuilder::new().with_created_at(1);
        builder
            .add_line("8.8.8.0|8.8.8.255|United States|0|0|0|Level3")
            .unwrap();
        builder.build().unwrap()
    }

    fn config(dir: &Path, mirrors: &[&str]) -> LoaderConfig {
        LoaderConfig {
            cache_path: dir.join("cache/ip2region.xdb"),
            mirrors: mirrors.iter().map(|m| m.to_string()).collect(),
            timeout_secs: 1,
            use_mmap: true,
        }
    }

    #[test]
    fn test_falls_through_to_working_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &["http://down", "http://garbage", "http://ok"]);
        let fetcher = MapFetcher::new(&[
            ("http://garbage", b"not a database".to_vec()),
            ("http://ok", image()),
        ]);

        let acquired = acquire(&config, &fetcher).unwrap();
        assert_eq!(acquired.source, Source::Mirror("http://ok".to_string()));
        assert!(acquired.cached);
        assert_eq!(acquired.database.find(0x0808_0808).isp, "Level3");
        assert_eq!(
            *fetcher.calls.lock().unwrap(),
            vec!["http://down", "http://garbage", "http://ok"]
        );
        assert_eq!(std::fs::read(&config.cache_path).unwrap(), image());
    }

    #[test]
    fn test_cache_preferred_over_mirrors() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &["http://ok"]);
        write_atomic(&config.cache_path, &image()).unwrap();
        let fetcher = MapFetcher::new(&[]);

        let acquired = acquire(&config, &fetcher).unwrap();
        assert_eq!(acquired.source, Source::Cache(config.cache_path.clone()));
        assert!(acquired.database.is_mapped());
        assert!(fetcher.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_cache_falls_back_to_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), &["http://ok"]);
        config.use_mmap = false;
        write_atomic(&config.cache_path, b"truncated").unwrap();
        let fetcher = MapFetcher::new(&[("http://ok", image())]);

        let acquired = acquire(&config, &fetcher).unwrap();
        assert_eq!(acquired.source, Source::Mirror("http://ok".to_string()));
        // The bad cache file was replaced.
        let reopened = acquire(&config, &MapFetcher::new(&[])).unwrap();
        assert_eq!(reopened.source, Source::Cache(config.cache_path.clone()));
        assert!(!reopened.database.is_mapped());
    }

    #[test]
    fn test_gzip_payload() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(&image()).unwrap();
        let packed = encoder.finish().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &["http://gz"]);
        let acquired = acquire(&config, &MapFetcher::new(&[("http://gz", packed)])).unwrap();
        assert_eq!(acquired.database.find(0x0808_0808).country, "United States");
        // The cache holds the decompressed image.
        assert_eq!(std::fs::read(&config.cache_path).unwrap(), image());
    }

    #[test]
    fn test_all_sources_fail() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &["http://a", "http://b"]);
        let err = acquire(&config, &MapFetcher::new(&[])).unwrap_err();
        match err {
            GeoError::AcquisitionFailed(msg) => {
                assert!(msg.contains("http://a") && msg.contains("http://b"), "{}", msg);
            }
            other => panic!("unexpected error: {}", other),
        }

        let config = self::config(dir.path(), &[]);
        assert!(matches!(
            acquire(&config, &MapFetcher::new(&[])),
            Err(GeoError::AcquisitionFailed(_))
        ));
    }

    #[test]
    fn test_cache_write_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the cache directory should be.
        std::fs::write(dir.path().join("cache"), b"").unwrap();
        let config = config(dir.path(), &["http://ok"]);

        let acquired = acquire(&config, &MapFetcher::new(&[("http://ok", image())])).unwrap();
        assert!(!acquired.cached);
        assert_eq!(acquired.database.find(0x0808_0808).isp, "Level3");
    }

    #[test]
    fn test_remote_ignores_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &["http://ok"]);
        write_atomic(&config.cache_path, &image()).unwrap();
        let fetcher = MapFetcher::new(&[("http://ok", image())]);

        let acquired = acquire_remote(&config, &fetcher).unwrap();
        assert_eq!(acquired.source, Source::Mirror("http://ok".to_string()));
        assert_eq!(fetcher.calls.lock().unwrap().len(), 1);
    }

    /// Accepts connections and never answers
    fn silent_server() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let mut held = Vec::new();
            for stream in listener.incoming().flatten() {
                held.push(stream);
            }
        });
        format!("http://{}/ip2region.xdb", addr)
    }

    /// Real HTTP for every URL except the canned ones
    struct HttpOrMap {
        http: HttpFetcher,
        canned: MapFetcher,
    }

    impl Fetcher for HttpOrMap {
        fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>> {
            if self.canned.bodies.contains_key(url) {
                self.canned.fetch(url, timeout)
            } else {
                self.http.fetch(url, timeout)
            }
        }
    }

    #[test]
    fn test_http_fetch_times_out() {
        let url = silent_server();
        let fetcher = HttpFetcher::new();

        let started = std::time::Instant::now();
        let err = fetcher.fetch(&url, Duration::from_secs(1)).unwrap_err();
        let elapsed = started.elapsed();
        assert!(matches!(err, GeoError::AcquisitionFailed(_)), "{}", err);
        assert!(elapsed >= Duration::from_millis(900), "{:?}", elapsed);
        assert!(elapsed < Duration::from_secs(10), "{:?}", elapsed);

        // The shared client stays usable after a timed-out request.
        let started = std::time::Instant::now();
        assert!(fetcher.fetch(&url, Duration::from_secs(1)).is_err());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_hung_mirror_falls_through() {
        let dir = tempfile::tempdir().unwrap();
        let hung = silent_server();
        let config = config(dir.path(), &[hung.as_str(), "http://ok"]);
        let fetcher = HttpOrMap {
            http: HttpFetcher::new(),
            canned: MapFetcher::new(&[("http://ok", image())]),
        };

        let started = std::time::Instant::now();
        let acquired = acquire(&config, &fetcher).unwrap();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(acquired.source, Source::Mirror("http://ok".to_string()));
        assert_eq!(acquired.database.find(0x0808_0808).isp, "Level3");
    }
}
