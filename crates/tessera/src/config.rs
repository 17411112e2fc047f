// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compiler configuration.
//!
//! Every option has a default, so an empty TOML document is a valid
//! configuration.
//!
//! # Example Configuration
//!
//! ```toml
//! template_root = "views"
//! extension = "tpl"
//! cache_dir = ".tessera/cache"
//! cache_enabled = true
//! debug = false
//! max_depth = 32
//! ```

use crate::error::{Result, TesseraError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Options consumed by the compiler, resolver and cache manager.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CompilerConfig {
    /// Base directory all template names resolve against (default: "templates").
    #[serde(default = "default_template_root")]
    pub template_root: PathBuf,

    /// Extension appended to bare template names, without the dot (default: "tpl").
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Directory compiled artifacts are persisted to (default: ".tessera/cache").
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Persist artifacts; when false every compile writes a self-deleting temp file.
    #[serde(default = "default_cache_enabled")]
    pub cache_enabled: bool,

    /// Emit traceability comments around every resolved directive.
    #[serde(default)]
    pub debug: bool,

    /// Maximum extend/embed/include nesting before compilation fails (default: 32).
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_template_root() -> PathBuf {
    PathBuf::from("templates")
}

fn default_extension() -> String {
    "tpl".to_string()
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".tessera/cache")
}

fn default_cache_enabled() -> bool {
    true
}

fn default_max_depth() -> usize {
    32
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            template_root: default_template_root(),
            extension: default_extension(),
            cache_dir: default_cache_dir(),
            cache_enabled: default_cache_enabled(),
            debug: false,
            max_depth: default_max_depth(),
        }
    }
}

impl CompilerConfig {
    /// Creates a configuration rooted at `template_root` with all other defaults.
    pub fn new<P: AsRef<Path>>(template_root: P) -> Self {
        Self {
            template_root: template_root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Sets the cache directory.
    pub fn with_cache_dir<P: AsRef<Path>>(mut self, cache_dir: P) -> Self {
        self.cache_dir = cache_dir.as_ref().to_path_buf();
        self
    }

    /// Enables or disables artifact persistence.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Enables or disables debug traceability output.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the source file extension (leading dot is ignored).
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// Parses a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config: CompilerConfig =
            toml::from_str(content).map_err(|e| TesseraError::ConfigError(e.to_string()))?;
        config.extension = config.extension.trim_start_matches('.').to_string();
        Ok(config)
    }

    /// Loads a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            TesseraError::ConfigError(format!("Cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_yields_defaults() {
        let config = CompilerConfig::from_toml_str("").unwrap();
        assert_eq!(config, CompilerConfig::default());
        assert_eq!(config.extension, "tpl");
        assert!(config.cache_enabled);
        assert!(!config.debug);
    }

    #[test]
    fn test_partial_document_overrides() {
        let config = CompilerConfig::from_toml_str(
            r#"
template_root = "views"
extension = ".html"
debug = true
"#,
        )
        .unwrap();

        assert_eq!(config.template_root, PathBuf::from("views"));
        assert_eq!(config.extension, "html");
        assert!(config.debug);
        assert_eq!(config.max_depth, 32);
    }

    #[test]
    fn test_invalid_document_is_config_error() {
        let result = CompilerConfig::from_toml_str("cache_enabled = \"sometimes\"");
        assert!(matches!(result, Err(TesseraError::ConfigError(_))));
    }
}
