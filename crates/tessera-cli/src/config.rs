// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tessera project configuration.
//!
//! Configuration is loaded from `tessera.toml` at the project root.
//! Every option is optional; command-line flags override the file.
//!
//! # Example Configuration
//!
//! ```toml
//! [compiler]
//! template_root = "views"
//! extension = "tpl"
//! cache_dir = ".tessera/cache"
//! cache_enabled = true
//! debug = false
//! max_depth = 32
//! ```

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tessera::CompilerConfig;

/// Default configuration file name.
pub const CONFIG_FILE: &str = "tessera.toml";

/// Main configuration structure loaded from `tessera.toml`.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Compiler settings.
    #[serde(default)]
    pub compiler: CompilerConfig,
}

/// Values given on the command line, applied over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    /// Template root directory.
    pub root: Option<PathBuf>,
    /// Cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Disable artifact persistence.
    pub no_cache: bool,
    /// Enable traceability comments and markers.
    pub debug: bool,
}

impl Config {
    /// Loads `tessera.toml` from the working directory, or defaults when absent.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Path::new(CONFIG_FILE);

        if !config_path.exists() {
            tracing::debug!("No {} found, using defaults", CONFIG_FILE);
            return Ok(Config::default());
        }

        Self::load_from(config_path)
    }

    /// Loads a configuration file. Unlike [`load`](Self::load), a missing
    /// file is an error.
    pub fn load_from<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;
        let mut config: Config = toml::from_str(&content)?;
        config.compiler.extension = config.compiler.extension.trim_start_matches('.').to_string();
        Ok(config)
    }

    /// Returns the compiler configuration with `overrides` applied.
    pub fn into_compiler_config(self, overrides: &Overrides) -> CompilerConfig {
        let mut compiler = self.compiler;
        if let Some(root) = &overrides.root {
            compiler.template_root = root.clone();
        }
        if let Some(cache_dir) = &overrides.cache_dir {
            compiler.cache_dir = cache_dir.clone();
        }
        if overrides.no_cache {
            compiler.cache_enabled = false;
        }
        if overrides.debug {
            compiler.debug = true;
        }
        compiler
    }
}
