//! Configuration resolution for tunegrab-ai
//!
//! Builds the per-run `AcquireSettings` and resolves the AcoustID API key.
//! Every overridable value follows CLI → ENV → TOML → compiled default.

use crate::models::QualityTier;
use crate::services::scorer::ScoreWeights;
use crate::workflow::AcquireSettings;
use std::path::PathBuf;
use tracing::{info, warn};
use tunegrab_common::config::{resolve_dir, CompiledDefaults, TomlConfig};
use tunegrab_common::{Error, Result};

pub const ACOUSTID_KEY_ENV_VAR: &str = "TUNEGRAB_ACOUSTID_API_KEY";
pub const TMP_DIR_ENV_VAR: &str = "TUNEGRAB_TMP_DIR";
pub const DEST_DIR_ENV_VAR: &str = "TUNEGRAB_DEST_DIR";

/// AcoustID application keys are always this long
pub const ACOUSTID_KEY_LENGTH: usize = 10;

/// Validate API key (non-blank, AcoustID key length)
pub fn is_valid_key(key: &str) -> bool {
    let key = key.trim();
    !key.is_empty() && key.chars().count() == ACOUSTID_KEY_LENGTH
}

/// Resolve AcoustID API key
///
/// **Priority:** CLI → ENV → TOML. Invalid keys at any tier are skipped.
pub fn resolve_acoustid_api_key(cli_key: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var(ACOUSTID_KEY_ENV_VAR).ok();
    let tiers = [
        ("command line", cli_key.map(str::to_string)),
        ("environment", env_key),
        ("TOML", toml_config.acoustid_api_key.clone()),
    ];

    let valid: Vec<(&str, String)> = tiers
        .into_iter()
        .filter_map(|(source, key)| key.map(|k| (source, k.trim().to_string())))
        .filter(|(_, key)| is_valid_key(key))
        .collect();

    if valid.len() > 1 {
        let sources: Vec<&str> = valid.iter().map(|(source, _)| *source).collect();
        warn!(
            sources = %sources.join(", "),
            "AcoustID API key found in multiple sources, using {}",
            sources[0]
        );
    }

    match valid.into_iter().next() {
        Some((source, key)) => {
            info!(source, "AcoustID API key loaded");
            Ok(key)
        }
        None => Err(Error::Config(format!(
            "AcoustID API key not configured. Please configure using one of:\n\
             1. Command line: --acoustid-key your-key\n\
             2. Environment: {}=your-key\n\
             3. TOML config: acoustid_api_key = \"your-key\"\n\
             \n\
             Obtain API key at: https://acoustid.org/api-key",
            ACOUSTID_KEY_ENV_VAR
        ))),
    }
}

/// Command-line values that override the TOML file
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub tmp_dir: Option<PathBuf>,
    pub dest_dir: Option<PathBuf>,
    pub quality: Option<String>,
    pub identify: bool,
    pub max_results: Option<usize>,
    pub cover_image: Option<String>,
    pub debug_report_dir: Option<PathBuf>,
}

/// Merge CLI overrides, environment and TOML into `AcquireSettings`
pub fn build_settings(overrides: &SettingsOverrides, toml_config: &TomlConfig) -> Result<AcquireSettings> {
    let defaults = CompiledDefaults::for_current_platform();

    let tmp_dir = resolve_dir(
        overrides.tmp_dir.as_deref(),
        TMP_DIR_ENV_VAR,
        toml_config.tmp_dir.as_deref(),
        Some(defaults.tmp_dir.clone()),
    )
    .unwrap_or(defaults.tmp_dir);

    let dest_dir = resolve_dir(
        overrides.dest_dir.as_deref(),
        DEST_DIR_ENV_VAR,
        toml_config.dest_dir.as_deref(),
        None,
    );

    let quality_text = overrides
        .quality
        .as_deref()
        .or(toml_config.quality.as_deref())
        .unwrap_or(&defaults.quality);
    let quality: QualityTier = quality_text.parse().map_err(Error::InvalidInput)?;

    let weights = ScoreWeights::from_config(&toml_config.scoring)
        .map_err(|e| Error::Config(format!("[scoring]: {}", e)))?;

    let max_results = overrides
        .max_results
        .or(toml_config.max_results)
        .unwrap_or(defaults.max_results)
        .max(1);

    let mut settings = AcquireSettings::new(tmp_dir);
    settings.dest_dir = dest_dir;
    settings.quality = quality;
    settings.identify = overrides.identify || toml_config.identify;
    settings.weights = weights;
    settings.max_results = max_results;
    settings.cover_image = overrides.cover_image.clone();
    settings.debug_report_dir = overrides.debug_report_dir.clone();

    info!(
        tmp_dir = %settings.tmp_dir.display(),
        dest_dir = ?settings.dest_dir,
        quality = %settings.quality,
        identify = settings.identify,
        "Settings resolved"
    );
    Ok(settings)
}
