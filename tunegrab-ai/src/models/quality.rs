//! Audio quality presets requested from the extraction collaborator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested audio quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Best,
    High,
    Standard,
    Low,
    Minimum,
}

impl QualityTier {
    /// All presets, highest bitrate first
    pub const ALL: [QualityTier; 5] = [
        QualityTier::Best,
        QualityTier::High,
        QualityTier::Standard,
        QualityTier::Low,
        QualityTier::Minimum,
    ];

    /// Target bitrate in kbps
    pub fn bitrate_kbps(self) -> u32 {
        match self {
            QualityTier::Best => 320,
            QualityTier::High => 256,
            QualityTier::Standard => 192,
            QualityTier::Low => 128,
            QualityTier::Minimum => 96,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            QualityTier::Best => "Best",
            QualityTier::High => "High",
            QualityTier::Standard => "Standard",
            QualityTier::Low => "Low",
            QualityTier::Minimum => "Minimum",
        }
    }
}

impl Default for QualityTier {
    fn default() -> Self {
        QualityTier::Standard
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}k)", self.name(), self.bitrate_kbps())
    }
}

impl FromStr for QualityTier {
    type Err = String;

    /// Accepts a bitrate (`"320"`, `"320k"`) or a preset name (`"best"`)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let numeric = trimmed.trim_end_matches(['k', 'K']);
        if let Ok(kbps) = numeric.parse::<u32>() {
            return QualityTier::ALL
                .into_iter()
                .find(|tier| tier.bitrate_kbps() == kbps)
                .ok_or_else(|| format!("no quality preset with bitrate {}k", kbps));
        }

        QualityTier::ALL
            .into_iter()
            .find(|tier| tier.name().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| format!("unknown quality preset '{}'", trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_by_bitrate_and_name() {
        assert_eq!("320".parse::<QualityTier>(), Ok(QualityTier::Best));
        assert_eq!("128k".parse::<QualityTier>(), Ok(QualityTier::Low));
        assert_eq!("standard".parse::<QualityTier>(), Ok(QualityTier::Standard));
        assert!("1000".parse::<QualityTier>().is_err());
        assert!("lossless".parse::<QualityTier>().is_err());
    }
}
