//! Server configuration.
//!
//! The config file is plain `key=value` lines; `#` starts a comment and
//! blank lines are skipped. Unknown keys are ignored so configs stay
//! forward-compatible.

use std::fmt;
use std::path::Path;

/// Default TCP port.
pub const DEFAULT_PORT: u16 = 5433;
/// Default page size in bytes.
pub const DEFAULT_PAGE_SIZE: usize = 8192;

/// Deployment mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Single-process, local data directory.
    #[default]
    Embedded,
    /// Reserved for a future multi-node deployment.
    Distributed,
}

/// Engine and server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to listen on (1-65535).
    pub port: u16,
    /// Data directory holding catalog, heap, and index files.
    pub data_dir: String,
    /// Maximum concurrent client connections.
    pub max_connections: u32,
    /// Buffer pool size in pages.
    pub buffer_pool_size: u32,
    /// Page size in bytes (1024-65536); shared by every file in data_dir.
    pub page_size: usize,
    /// Deployment mode.
    pub mode: Mode,
    /// Enable debug diagnostics.
    pub debug: bool,
    /// Enable verbose logging.
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            data_dir: "data".to_string(),
            max_connections: 100,
            buffer_pool_size: 1024,
            page_size: DEFAULT_PAGE_SIZE,
            mode: Mode::Embedded,
            debug: false,
            verbose: false,
        }
    }
}

/// A configuration error, reported at startup.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Loads configuration from a file, applying values over the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError(format!("cannot read {}: {}", path.as_ref().display(), e)))?;
        let mut config = Config::default();
        config.apply(&text)?;
        Ok(config)
    }

    /// Applies `key=value` lines to this configuration.
    pub fn apply(&mut self, text: &str) -> Result<(), ConfigError> {
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            let bad = |what: &str| {
                ConfigError(format!("line {}: bad {} value '{}'", lineno + 1, what, value))
            };
            match key {
                "port" => self.port = value.parse().map_err(|_| bad("port"))?,
                "data_dir" => self.data_dir = value.to_string(),
                "max_connections" => {
                    self.max_connections = value.parse().map_err(|_| bad("max_connections"))?
                }
                "buffer_pool_size" => {
                    self.buffer_pool_size = value.parse().map_err(|_| bad("buffer_pool_size"))?
                }
                "page_size" => self.page_size = value.parse().map_err(|_| bad("page_size"))?,
                "mode" => {
                    self.mode = match value {
                        "embedded" => Mode::Embedded,
                        "distributed" => Mode::Distributed,
                        _ => return Err(bad("mode")),
                    }
                }
                "debug" => self.debug = parse_bool(value).ok_or_else(|| bad("debug"))?,
                "verbose" => self.verbose = parse_bool(value).ok_or_else(|| bad("verbose"))?,
                _ => {} // unknown keys ignored
            }
        }
        Ok(())
    }

    /// Validates the configuration; called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError("port must be between 1 and 65535".into()));
        }
        if self.data_dir.is_empty() {
            return Err(ConfigError("data_dir must not be empty".into()));
        }
        if self.max_connections < 1 {
            return Err(ConfigError("max_connections must be at least 1".into()));
        }
        if self.buffer_pool_size < 1 {
            return Err(ConfigError("buffer_pool_size must be at least 1".into()));
        }
        if !(1024..=65536).contains(&self.page_size) {
            return Err(ConfigError(format!(
                "page_size {} out of range (1024-65536)",
                self.page_size
            )));
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_apply_basic() {
        let mut config = Config::default();
        config
            .apply("port = 6000\ndata_dir=/tmp/rook\nmax_connections=5\n")
            .unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.data_dir, "/tmp/rook");
        assert_eq!(config.max_connections, 5);
    }

    #[test]
    fn test_apply_skips_comments_and_blanks() {
        let mut config = Config::default();
        config
            .apply("# a comment\n\nport=6001\n# another\n")
            .unwrap();
        assert_eq!(config.port, 6001);
    }

    #[test]
    fn test_apply_bool_forms() {
        let mut config = Config::default();
        config.apply("debug=1\nverbose=true\n").unwrap();
        assert!(config.debug);
        assert!(config.verbose);
        config.apply("debug=false\nverbose=0\n").unwrap();
        assert!(!config.debug);
        assert!(!config.verbose);
        assert!(config.apply("debug=yes\n").is_err());
    }

    #[test]
    fn test_apply_mode() {
        let mut config = Config::default();
        config.apply("mode=distributed\n").unwrap();
        assert_eq!(config.mode, Mode::Distributed);
        config.apply("mode=embedded\n").unwrap();
        assert_eq!(config.mode, Mode::Embedded);
        assert!(config.apply("mode=sharded\n").is_err());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut config = Config::default();
        config.apply("future_option=42\n").unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.data_dir.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.page_size = 512;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.page_size = 128 * 1024;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_connections = 0;
        assert!(config.validate().is_err());
    }
}
