// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Template source resolution.
//!
//! This module provides the [`TemplateResolver`] trait and implementations
//! for locating and loading template sources by name.
//!
//! # Resolver Implementations
//!
//! - [`FileSystemResolver`]: Loads templates below a root directory
//! - [`MemoryResolver`]: Loads templates from in-memory storage (testing)
//!
//! # Names
//!
//! A template name is a path relative to the template root, written with
//! forward slashes. Leading `/` and `./` are ignored and the configured
//! extension is appended unless the name already carries it, so
//! `layouts/base`, `/layouts/base` and `layouts/base.tpl` are the same template.

use crate::error::{Result, TesseraError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Converts a Path to a normalized string with forward slashes.
#[inline]
pub fn path_to_string<P: AsRef<Path>>(path: P) -> String {
    path.as_ref().to_string_lossy().replace('\\', "/")
}

/// Normalizes a template name and appends `extension` when missing.
pub fn normalize_name(name: &str, extension: &str) -> String {
    let mut normalized = name.trim().replace('\\', "/");
    while let Some(stripped) = normalized
        .strip_prefix("./")
        .or_else(|| normalized.strip_prefix('/'))
    {
        normalized = stripped.to_string();
    }

    if extension.is_empty() || normalized.ends_with(&format!(".{}", extension)) {
        normalized
    } else {
        format!("{}.{}", normalized, extension)
    }
}

/// Where a template lives and when it last changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateLocation {
    /// Normalized name, relative to the template root, extension included.
    pub name: String,
    /// Resolved location (canonical path for filesystem templates).
    pub path: String,
    /// Last modification time of the source.
    pub modified: SystemTime,
}

/// A template source read for one compile request.
#[derive(Debug, Clone)]
pub struct TemplateSource {
    /// Normalized name, relative to the template root, extension included.
    pub name: String,
    /// Resolved location (canonical path for filesystem templates).
    pub path: String,
    /// The raw template text.
    pub text: String,
    /// Last modification time of the source.
    pub modified: SystemTime,
}

/// Trait for locating and loading template sources.
///
/// `locate` must be cheap: the cache manager calls it for the entry template
/// and every recorded dependency on each compile request.
pub trait TemplateResolver: Send + Sync + 'static {
    /// Finds a template without reading it.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::TemplateNotFound`] when no such template exists.
    fn locate(&self, name: &str) -> Result<TemplateLocation>;

    /// Reads a template.
    fn load(&self, name: &str) -> Result<TemplateSource>;
}

/// Filesystem-based template resolver.
///
/// # Examples
///
/// ```rust,ignore
/// use tessera::FileSystemResolver;
///
/// let resolver = FileSystemResolver::new("./templates", "tpl");
/// let source = resolver.load("pages/home")?;
/// ```
#[derive(Debug, Clone)]
pub struct FileSystemResolver {
    /// The root directory for template resolution.
    pub root_dir: PathBuf,
    /// Extension appended to bare names.
    pub extension: String,
}

impl FileSystemResolver {
    /// Creates a resolver for templates below `root_dir`.
    pub fn new<P: AsRef<Path>>(root_dir: P, extension: &str) -> Self {
        Self {
            root_dir: root_dir.as_ref().to_path_buf(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    fn resolve_internal(&self, name: &str) -> Result<(String, PathBuf)> {
        let normalized = normalize_name(name, &self.extension);
        let full_path = self.root_dir.join(&normalized);

        if !full_path.is_file() {
            return Err(TesseraError::TemplateNotFound {
                name: name.to_string(),
                path: path_to_string(&full_path),
            });
        }

        let canonical_path = fs::canonicalize(&full_path).map_err(|e| {
            TesseraError::ResolutionError(format!(
                "Failed to canonicalize path '{}': {}",
                full_path.display(),
                e
            ))
        })?;

        // Symlinks and `..` segments must not leave the template root
        let canonical_root = fs::canonicalize(&self.root_dir).map_err(|e| {
            TesseraError::ResolutionError(format!(
                "Failed to canonicalize root '{}': {}",
                self.root_dir.display(),
                e
            ))
        })?;
        if !canonical_path.starts_with(&canonical_root) {
            return Err(TesseraError::ResolutionError(format!(
                "Security: template '{}' escapes the template root",
                name
            )));
        }

        tracing::trace!("Resolved template '{}' to {}", name, canonical_path.display());
        Ok((normalized, canonical_path))
    }
}

impl TemplateResolver for FileSystemResolver {
    fn locate(&self, name: &str) -> Result<TemplateLocation> {
        let (normalized, path) = self.resolve_internal(name)?;
        let modified = fs::metadata(&path)?.modified()?;
        Ok(TemplateLocation {
            name: normalized,
            path: path_to_string(&path),
            modified,
        })
    }

    fn load(&self, name: &str) -> Result<TemplateSource> {
        let location = self.locate(name)?;
        let text = fs::read_to_string(&location.path)?;
        Ok(TemplateSource {
            name: location.name,
            path: location.path,
            text,
            modified: location.modified,
        })
    }
}

/// Simple in-memory template resolver for testing.
///
/// Every template gets the time it was added as its modification time.
#[derive(Debug, Clone)]
pub struct MemoryResolver {
    extension: String,
    templates: HashMap<String, (String, SystemTime)>,
}

impl Default for MemoryResolver {
    fn default() -> Self {
        Self::new("tpl")
    }
}

impl MemoryResolver {
    /// Creates an empty memory resolver.
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
            templates: HashMap::new(),
        }
    }

    /// Adds or replaces a template.
    pub fn add_template(&mut self, name: &str, text: &str) {
        let key = normalize_name(name, &self.extension);
        self.templates.insert(key, (text.to_string(), SystemTime::now()));
    }

    /// Builder-style variant of [`add_template`](Self::add_template).
    pub fn with_template(mut self, name: &str, text: &str) -> Self {
        self.add_template(name, text);
        self
    }
}

impl TemplateResolver for MemoryResolver {
    fn locate(&self, name: &str) -> Result<TemplateLocation> {
        let key = normalize_name(name, &self.extension);
        match self.templates.get(&key) {
            Some((_, modified)) => Ok(TemplateLocation {
                path: format!("memory:{}", key),
                name: key,
                modified: *modified,
            }),
            None => Err(TesseraError::TemplateNotFound {
                name: name.to_string(),
                path: format!("memory:{}", key),
            }),
        }
    }

    fn load(&self, name: &str) -> Result<TemplateSource> {
        let location = self.locate(name)?;
        let text = self
            .templates
            .get(&location.name)
            .map(|(text, _)| text.clone())
            .unwrap_or_default();
        Ok(TemplateSource {
            name: location.name,
            path: location.path,
            text,
            modified: location.modified,
        })
    }
}
