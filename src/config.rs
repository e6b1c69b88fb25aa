//! Configuration management

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use libmacho::{DumpOptions, Verbosity};

use crate::errors::{AppError, AppResult};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,
    /// Info dump settings
    pub dump: DumpConfig,
    /// String search heuristic settings
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Print decoder traces to stderr
    pub verbose: bool,
}

/// Amount of detail in the info dump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DumpLevel {
    Brief,
    #[default]
    Normal,
    Full,
}

impl From<DumpLevel> for Verbosity {
    fn from(level: DumpLevel) -> Self {
        match level {
            DumpLevel::Brief => Verbosity::Brief,
            DumpLevel::Normal => Verbosity::Normal,
            DumpLevel::Full => Verbosity::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DumpConfig {
    pub verbosity: DumpLevel,
    /// List individual symbols in a full dump
    pub show_symbols: bool,
    /// Digits used for addresses and offsets
    pub hex_width: usize,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            verbosity: DumpLevel::Normal,
            show_symbols: true,
            hex_width: 8,
        }
    }
}

impl DumpConfig {
    pub fn options(&self) -> DumpOptions {
        DumpOptions {
            verbosity: self.verbosity.into(),
            show_symbols: self.show_symbols,
            hex_width: self.hex_width.clamp(1, 16),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Mask applied to each halfword while walking back to a function start
    pub prologue_mask: u16,
    /// Masked value identifying the function prologue (Thumb `push {..., lr}`)
    pub prologue_value: u16,
    /// Stop after this many functions (0 = unlimited)
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            prologue_mask: 0xFF0F,
            prologue_value: 0xB500,
            max_results: 0,
        }
    }
}

/// Get the config directory path for the current platform
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        // Windows: %APPDATA%\machoman
        std::env::var("APPDATA")
            .ok()
            .map(|p| PathBuf::from(p).join("machoman"))
    }

    #[cfg(not(target_os = "windows"))]
    {
        // XDG_CONFIG_HOME first, then ~/.config
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
            .map(|p| p.join("machoman"))
    }
}

/// Get the config file path
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|p| p.join("config.toml"))
}

/// Documented default configuration file
pub fn default_config() -> &'static str {
    r#"# machoman configuration

[general]
# Print decoder traces to stderr (same as -v)
verbose = false

[dump]
# brief | normal | full
verbosity = "normal"
# List individual symbols in a full dump
show_symbols = true
# Digits used for addresses and offsets
hex_width = 8

[search]
# Function start heuristic for --search: walk back until
# (halfword & prologue_mask) == prologue_value
prologue_mask = 0xFF0F
prologue_value = 0xB500
# Stop after this many functions (0 = unlimited)
max_results = 0
"#
}

impl Config {
    /// Load configuration from the user's config file, falling back to defaults
    pub fn load() -> Self {
        let Some(config_path) = config_file() else {
            return Config::default();
        };
        if !config_path.exists() {
            return Config::default();
        }
        match Self::load_from(&config_path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{e}");
                log::warn!("Using default configuration");
                Config::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Could not read {}: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| AppError::Config(format!("Could not parse {}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self, toml_edit::de::Error> {
        toml_edit::de::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses_to_defaults() {
        let config = Config::parse(default_config()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_config() {
        let config = Config::parse(
            r#"
            [dump]
            verbosity = "full"
        "#,
        )
        .unwrap();
        assert_eq!(config.dump.verbosity, DumpLevel::Full);
        assert!(config.dump.show_symbols);
        assert_eq!(config.search.prologue_value, 0xB500);
        assert!(!config.general.verbose);
    }

    #[test]
    fn test_dump_options() {
        let mut dump = DumpConfig::default();
        dump.verbosity = DumpLevel::Brief;
        dump.hex_width = 64;
        let opts = dump.options();
        assert_eq!(opts.verbosity, Verbosity::Brief);
        assert_eq!(opts.hex_width, 16);
    }

    #[test]
    fn test_invalid_verbosity_is_an_error() {
        assert!(Config::parse("[dump]\nverbosity = \"loud\"\n").is_err());
    }

    #[test]
    fn test_load_from_missing_file() {
        let path = std::env::temp_dir().join("machoman-missing-config.toml");
        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("machoman-config-{}.toml", std::process::id()));
        fs::write(&path, "[search]\nmax_results = 3\n").unwrap();
        let config = Config::load_from(&path).unwrap();
        fs::remove_file(&path).ok();
        assert_eq!(config.search.max_results, 3);
    }
}
