use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use dirs_next;

const CONFIG_FILE: &str = "config.toml";

/// Anything past a century of retention is a typo.
pub const MAX_EXPIRATION_DAYS: i64 = 36_500;

/// User-tunable settings, read from `~/.reddit_highlighter/config.toml`.
///
/// Every field has a default so a partial (or missing) file is fine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// How many days to remember the last visit to a thread. Older entries
    /// with a matching prefix are purged on every activation.
    pub cache_expiration_days: i64,
    /// Border colour for new comments, `#rrggbb`.
    pub color: String,
    /// Namespace for everything persisted, "µ" sorts low and is unlikely to conflict.
    pub prefix: String,
    /// Seed for the obfuscated cache keys. Not meant to be secure.
    pub hash_seed: u32,
    pub logging_enabled: bool,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_expiration_days: 14,
            color: "#e1b000".to_string(),
            prefix: "µRCH".to_string(),
            hash_seed: 0x499602D2,
            logging_enabled: true,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Loads settings from the app data dir, falling back to defaults when
    /// the file is absent or can't be parsed.
    pub fn load() -> Self {
        let path = match app_data_dir() {
            Ok(dir) => dir.join(CONFIG_FILE),
            Err(e) => {
                eprintln!("Could not locate config directory: {}", e);
                return Self::default();
            }
        };

        match Self::from_file(&path) {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                // Logging isn't up yet when settings are loaded
                eprintln!("Ignoring malformed config {}: {:#}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(Some(Self::from_toml(&raw)?))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(raw)?;
        if !(0..=MAX_EXPIRATION_DAYS).contains(&settings.cache_expiration_days) {
            return Err(anyhow!(
                "cache_expiration_days must be between 0 and {}",
                MAX_EXPIRATION_DAYS
            ));
        }
        Ok(settings)
    }

    /// The retention window in milliseconds.
    pub fn expiration_window_ms(&self) -> i64 {
        self.cache_expiration_days.saturating_mul(24 * 60 * 60 * 1000)
    }

    /// Parses `color` into rgb, `None` if it isn't `#rrggbb`.
    pub fn color_rgb(&self) -> Option<(u8, u8, u8)> {
        let hex = self.color.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
        let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
        let b = u8::from_str_radix(&hex[4..6], 16).ok()?;
        Some((r, g, b))
    }

    pub fn log_directive(&self) -> &'static str {
        if self.logging_enabled { "info" } else { "off" }
    }
}

pub fn app_data_dir() -> Result<PathBuf> {
    let home_dir = dirs_next::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
    Ok(home_dir.join(".reddit_highlighter"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_script_settings() {
        let settings = Settings::default();
        assert_eq!(settings.cache_expiration_days, 14);
        assert_eq!(settings.prefix, "µRCH");
        assert_eq!(settings.hash_seed, 0x499602D2);
        assert_eq!(settings.color_rgb(), Some((0xe1, 0xb0, 0x00)));
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let settings = Settings::from_toml("cache_expiration_days = 3\nlogging_enabled = false\n").unwrap();
        assert_eq!(settings.cache_expiration_days, 3);
        assert_eq!(settings.log_directive(), "off");
        assert_eq!(settings.prefix, "µRCH");
        assert_eq!(settings.expiration_window_ms(), 3 * 86_400_000);
    }

    #[test]
    fn negative_expiration_is_rejected() {
        assert!(Settings::from_toml("cache_expiration_days = -1").is_err());
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Settings::from_file(&dir.path().join("nope.toml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn bad_colour_is_none() {
        let settings = Settings { color: "yellow".to_string(), ..Settings::default() };
        assert_eq!(settings.color_rgb(), None);
    }

    #[test]
    fn non_ascii_colour_is_none() {
        // Six bytes, but 'µ' straddles the first channel boundary
        let settings = Settings { color: "#aµaaa".to_string(), ..Settings::default() };
        assert_eq!(settings.color_rgb(), None);
    }

    #[test]
    fn huge_expiration_is_rejected() {
        assert!(Settings::from_toml("cache_expiration_days = 200000000000000").is_err());
        assert!(Settings::from_toml("cache_expiration_days = 36500").is_ok());
    }

    #[test]
    fn expiration_window_saturates() {
        let settings = Settings { cache_expiration_days: i64::MAX, ..Settings::default() };
        assert_eq!(settings.expiration_window_ms(), i64::MAX);
    }
}
