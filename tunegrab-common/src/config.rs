//! Bootstrap configuration loading and directory resolution
//!
//! Configuration is read once at startup from a TOML file. Every value is
//! optional: a missing file or a missing key falls back to compiled defaults,
//! so a fresh install runs without any configuration at all.
//!
//! Resolution priority for overridable values:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "TUNEGRAB_CONFIG";

/// Config file name looked up in the platform config directories
pub const CONFIG_FILE_NAME: &str = "tunegrab.toml";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Working directory for in-progress downloads
    #[serde(default)]
    pub tmp_dir: Option<PathBuf>,

    /// Destination library root; artifacts stay in `tmp_dir` when unset
    #[serde(default)]
    pub dest_dir: Option<PathBuf>,

    /// Requested audio quality (bitrate or preset name)
    #[serde(default)]
    pub quality: Option<String>,

    /// Run acoustic identification and tag correction after download
    #[serde(default)]
    pub identify: bool,

    /// Number of search results to score per query
    #[serde(default)]
    pub max_results: Option<usize>,

    /// AcoustID API key
    #[serde(default)]
    pub acoustid_api_key: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scorer magnitude and threshold overrides
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Lidarr connection for wanted-list driven acquisition
    #[serde(default)]
    pub lidarr: Option<LidarrConfig>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Scorer overrides
///
/// Every field is optional. Unset fields keep the scorer's compiled default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub official_bonus: Option<f64>,
    pub music_bonus: Option<f64>,
    pub similarity_damping: Option<f64>,
    pub word_order_bonus: Option<f64>,
    pub performance_penalty: Option<f64>,
    pub reaction_penalty: Option<f64>,
    pub slowed_penalty: Option<f64>,
    pub album_penalty: Option<f64>,
    pub cover_penalty: Option<f64>,
    pub live_penalty: Option<f64>,
    pub lyrics_bonus: Option<f64>,
    pub uncensored_bonus: Option<f64>,
    pub channel_bonus: Option<f64>,
    pub duration_bonus: Option<f64>,
    pub preferred_min_secs: Option<u64>,
    pub preferred_max_secs: Option<u64>,
    pub implausible_penalty: Option<f64>,
    pub plausible_min_secs: Option<u64>,
    pub plausible_max_secs: Option<u64>,
    pub view_threshold: Option<u64>,
    pub view_bonus: Option<f64>,
    pub per_10000_views: Option<f64>,
    pub max_view_volume_bonus: Option<f64>,
    pub per_year_bonus: Option<f64>,
    pub title_format_bonus: Option<f64>,
    pub min_viable_score: Option<f64>,
}

/// Lidarr connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LidarrConfig {
    pub host: String,
    #[serde(default = "default_lidarr_port")]
    pub port: u16,
    pub api_key: String,
    #[serde(default)]
    pub ssl: bool,
    #[serde(default = "default_lidarr_page_size")]
    pub page_size: u32,
}

fn default_lidarr_port() -> u16 {
    8686
}

fn default_lidarr_page_size() -> u32 {
    50
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub tmp_dir: PathBuf,
    pub log_level: String,
    pub max_results: usize,
    pub quality: String,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        let tmp_dir = dirs::cache_dir()
            .map(|d| d.join("tunegrab").join("progress"))
            .unwrap_or_else(|| PathBuf::from("tmp/progress"));

        Self {
            tmp_dir,
            log_level: default_log_level(),
            max_results: 10,
            quality: "192".to_string(),
        }
    }
}

/// Locate the config file
///
/// Checks, in order: the explicit path, `TUNEGRAB_CONFIG`, the user config
/// directory, then `/etc/tunegrab`. Returns `None` when nothing exists.
pub fn locate_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    let user_config = dirs::config_dir().map(|d| d.join("tunegrab").join(CONFIG_FILE_NAME));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/tunegrab").join(CONFIG_FILE_NAME);
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load configuration, degrading to defaults
///
/// A missing or unreadable config file never aborts startup: a warning is
/// logged and an empty configuration is returned. An explicitly requested
/// file that fails to parse is still reported as an error.
pub fn load_or_default(explicit: Option<&Path>) -> Result<TomlConfig> {
    match locate_config_file(explicit) {
        Some(path) if path.exists() => {
            let config = load_toml_config(&path)?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        Some(path) => {
            if explicit.is_some() {
                return Err(Error::NotFound(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(TomlConfig::default())
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Write config atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolve a directory setting by priority
///
/// CLI argument → environment variable → TOML value → `default`.
/// Empty strings at any level count as unset.
pub fn resolve_dir(
    cli_arg: Option<&Path>,
    env_var_name: &str,
    toml_value: Option<&Path>,
    default: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = cli_arg.filter(|p| !p.as_os_str().is_empty()) {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    if let Some(path) = toml_value.filter(|p| !p.as_os_str().is_empty()) {
        return Some(path.to_path_buf());
    }

    default
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoring_section_is_optional() {
        let config: TomlConfig = toml::from_str("identify = true\n").unwrap();
        assert!(config.identify);
        assert_eq!(config.scoring, ScoringConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.lidarr.is_none());
    }

    #[test]
    fn test_lidarr_defaults() {
        let config: TomlConfig = toml::from_str(
            r#"
            [lidarr]
            host = "nas.local"
            api_key = "abc"
            "#,
        )
        .unwrap();
        let lidarr = config.lidarr.unwrap();
        assert_eq!(lidarr.port, 8686);
        assert_eq!(lidarr.page_size, 50);
        assert!(!lidarr.ssl);
    }

    #[test]
    fn test_resolve_dir_prefers_cli() {
        let resolved = resolve_dir(
            Some(Path::new("/cli")),
            "TUNEGRAB_TEST_UNSET_VAR",
            Some(Path::new("/toml")),
            Some(PathBuf::from("/default")),
        );
        assert_eq!(resolved, Some(PathBuf::from("/cli")));
    }

    #[test]
    fn test_resolve_dir_falls_back_to_default() {
        let resolved = resolve_dir(
            None,
            "TUNEGRAB_TEST_UNSET_VAR",
            None,
            Some(PathBuf::from("/default")),
        );
        assert_eq!(resolved, Some(PathBuf::from("/default")));
    }
}
