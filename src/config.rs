//! Loader configuration
//!
//! Settings are merged from three layers, later layers winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`ipregion.toml` in the working directory, or an
//!    explicit path which must then exist)
//! 3. environment variables prefixed `IPREGION__`, e.g.
//!    `IPREGION__TIMEOUT_SECS=10` or `IPREGION__MIRRORS=https://a,https://b`

use crate::error::{GeoError, Result};
use ::config::{Config, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the cached database image
pub const DEFAULT_CACHE_PATH: &str = "data/ip2region.xdb";

/// Default upstream mirror
pub const DEFAULT_MIRROR: &str =
    "https://cdn.jsdelivr.net/gh/lionsoul2014/ip2region@master/data/ip2region.xdb";

/// Default per-attempt download timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const ENV_PREFIX: &str = "IPREGION";
const DEFAULT_FILE_STEM: &str = "ipregion";

/// Where and how the locator obtains its database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Local cache file, tried before any mirror and refreshed after a download
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Download URLs, tried in order
    #[serde(default = "default_mirrors")]
    pub mirrors: Vec<String>,
    /// Per-mirror timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Memory-map the cache file instead of reading it into memory
    #[serde(default = "default_use_mmap")]
    pub use_mmap: bool,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_PATH)
}

fn default_mirrors() -> Vec<String> {
    vec![DEFAULT_MIRROR.to_string()]
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_use_mmap() -> bool {
    true
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            cache_path: default_cache_path(),
            mirrors: default_mirrors(),
            timeout_secs: default_timeout_secs(),
            use_mmap: default_use_mmap(),
        }
    }
}

impl LoaderConfig {
    /// Load from defaults, an optional TOML file and the environment.
    ///
    /// With `path = None`, `ipregion.toml` is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    fn load_with_env(path: Option<&Path>, env: Option<Map<String, String>>) -> Result<Self> {
        let file = match path {
            Some(p) => File::from(p).required(true),
            None => File::with_name(DEFAULT_FILE_STEM).required(false),
        };

        let settings = Config::builder()
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("mirrors")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?;

        let config: LoaderConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that cannot work
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(GeoError::Config("timeout_secs must be positive".to_string()));
        }
        if self.cache_path.as_os_str().is_empty() {
            return Err(GeoError::Config("cache_path must not be empty".to_string()));
        }
        Ok(())
    }

    /// Per-mirror timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Render a sample TOML file holding the defaults
    pub fn sample_toml() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|e| format!("# failed to render sample config: {}\n", e))
    }
}
