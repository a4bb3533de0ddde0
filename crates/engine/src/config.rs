use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Text normalization applied to a recomposed document.
///
/// Lines spanned by a multi-line string literal are never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupOptions {
    /// Collapse runs of blank lines longer than `max_empty_lines`
    pub remove_empty_lines: bool,

    /// Longest run of blank lines kept when collapsing
    pub max_empty_lines: usize,

    /// Trim whitespace at the end of every line
    pub remove_trailing_whitespace: bool,

    /// Expand leading tabs to four spaces
    pub normalize_indentation: bool,
}

impl Default for CleanupOptions {
    fn default() -> Self {
        Self {
            remove_empty_lines: false,
            max_empty_lines: 2,
            remove_trailing_whitespace: false,
            normalize_indentation: false,
        }
    }
}

impl CleanupOptions {
    /// Every cleanup pass enabled, one blank line at most
    pub fn compact() -> Self {
        Self {
            remove_empty_lines: true,
            max_empty_lines: 1,
            remove_trailing_whitespace: true,
            normalize_indentation: true,
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.remove_empty_lines || self.remove_trailing_whitespace || self.normalize_indentation
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.remove_empty_lines && self.max_empty_lines > 100 {
            return Err(format!(
                "max_empty_lines ({}) cannot exceed 100",
                self.max_empty_lines
            ));
        }
        Ok(())
    }
}

/// Settings for the join path; the split path takes none
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecomposeConfig {
    pub cleanup: CleanupOptions,

    /// Follow the metadata record's order when one is present
    pub use_metadata: bool,

    /// Width of the `=` rule in unit banners
    pub banner_width: usize,
}

impl Default for RecomposeConfig {
    fn default() -> Self {
        Self {
            cleanup: CleanupOptions::default(),
            use_metadata: true,
            banner_width: 76,
        }
    }
}

impl RecomposeConfig {
    /// Load from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| EngineError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| EngineError::invalid_config(format!("invalid TOML: {e}")))?;
        config.validate().map_err(EngineError::invalid_config)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !(20..=200).contains(&self.banner_width) {
            return Err(format!(
                "banner_width ({}) must be between 20 and 200",
                self.banner_width
            ));
        }
        self.cleanup.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cleanup_disabled_by_default() {
        let options = CleanupOptions::default();
        assert!(!options.is_enabled());
        assert_eq!(options.max_empty_lines, 2);
        assert!(CleanupOptions::compact().is_enabled());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RecomposeConfig::from_toml_str(
            "use_metadata = false\n\n[cleanup]\nremove_trailing_whitespace = true\n",
        )
        .unwrap();

        assert!(!config.use_metadata);
        assert_eq!(config.banner_width, 76);
        assert!(config.cleanup.remove_trailing_whitespace);
        assert!(!config.cleanup.remove_empty_lines);
        assert_eq!(config.cleanup.max_empty_lines, 2);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(RecomposeConfig::from_toml_str("banner_width = 5\n").is_err());
        assert!(RecomposeConfig::from_toml_str("[cleanup]\nremove_empty_lines = true\nmax_empty_lines = 500\n").is_err());
        assert!(RecomposeConfig::from_toml_str("banner_width = \"wide\"\n").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unitsplit.toml");
        std::fs::write(&path, "[cleanup]\nremove_empty_lines = true\nmax_empty_lines = 1\n").unwrap();

        let config = RecomposeConfig::load(&path).unwrap();
        assert!(config.cleanup.remove_empty_lines);
        assert_eq!(config.cleanup.max_empty_lines, 1);
        assert!(RecomposeConfig::load(&dir.path().join("missing.toml")).is_err());
    }
}
