// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! On-disk caching of compiled artifacts.
//!
//! Every template gets one artifact file in the cache directory, plus a
//! `.meta.json` sidecar listing the templates it inlined. An artifact is
//! fresh when its modification time is strictly newer than the source's and
//! every recorded dependency's.
//!
//! # File Names
//!
//! `pages/home.tpl` is stored as `pages_home_tpl.<16 hex digits>.lua`: the
//! name with non-alphanumeric characters replaced by `_`, disambiguated by a
//! SHA-256 prefix of the template name.
//!
//! # Atomicity
//!
//! Files are written to a temporary file in the cache directory and renamed
//! into place, so concurrent readers never see a partial artifact.
//!
//! # Disabled Cache
//!
//! With caching disabled, artifacts go to a throwaway file in the system temp
//! directory and are marked [`ephemeral`](CompiledArtifact::ephemeral). The
//! file is deleted by [`CacheManager::consume`] the first time it is read.

use crate::error::{Result, TesseraError};
use crate::resolver::{TemplateLocation, TemplateResolver};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

/// A compiled template artifact.
#[derive(Debug, Clone)]
pub struct CompiledArtifact {
    /// Normalized name of the source template.
    pub source_name: String,
    /// Where the artifact is stored.
    pub cache_path: PathBuf,
    /// The generated Lua code.
    pub text: String,
    /// When the artifact was written.
    pub compiled_at: SystemTime,
    /// Whether the artifact was served from the cache without recompiling.
    pub from_cache: bool,
    /// Whether the artifact file is deleted on first read.
    pub ephemeral: bool,
}

/// Sidecar metadata stored next to each cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ArtifactMeta {
    name: String,
    dependencies: Vec<String>,
    compiled_at: u64,
}

/// Manages the artifact cache directory.
#[derive(Debug, Clone)]
pub struct CacheManager {
    cache_dir: PathBuf,
    enabled: bool,
}

impl CacheManager {
    /// Creates a cache manager. The directory is created on first write.
    pub fn new<P: AsRef<Path>>(cache_dir: P, enabled: bool) -> Self {
        Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            enabled,
        }
    }

    /// The cache directory.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Whether artifacts are persisted.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Where the artifact for `name` lives when caching is enabled.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(cache_file_name(name))
    }

    fn metadata_path(artifact: &Path) -> PathBuf {
        artifact.with_extension("meta.json")
    }

    /// Returns the cached artifact for `location` if it is still fresh.
    ///
    /// `resolver` is used to look up the modification times of the
    /// templates the artifact was built from. A dependency that can no
    /// longer be located makes the artifact stale.
    pub fn lookup<R: TemplateResolver>(
        &self,
        location: &TemplateLocation,
        resolver: &R,
    ) -> Result<Option<CompiledArtifact>> {
        if !self.enabled {
            return Ok(None);
        }

        let artifact_path = self.artifact_path(&location.name);
        let artifact_modified = match fs::metadata(&artifact_path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("Cache miss for '{}'", location.name);
                return Ok(None);
            }
            Err(e) => {
                return Err(TesseraError::CacheError(format!(
                    "Failed to stat {}: {}",
                    artifact_path.display(),
                    e
                )))
            }
        };

        if artifact_modified <= location.modified {
            tracing::debug!("Cached artifact for '{}' is older than its source", location.name);
            return Ok(None);
        }

        let Some(meta) = read_metadata(&Self::metadata_path(&artifact_path)) else {
            tracing::debug!("Cached artifact for '{}' has no usable metadata", location.name);
            return Ok(None);
        };
        if meta.name != location.name {
            tracing::warn!(
                "Cache file {} belongs to '{}', not '{}'",
                artifact_path.display(),
                meta.name,
                location.name
            );
            return Ok(None);
        }

        for dependency in &meta.dependencies {
            match resolver.locate(dependency) {
                Ok(dep) if dep.modified < artifact_modified => {}
                Ok(_) => {
                    tracing::debug!("Dependency '{}' of '{}' changed", dependency, location.name);
                    return Ok(None);
                }
                Err(e) => {
                    tracing::debug!("Dependency '{}' of '{}' is gone: {}", dependency, location.name, e);
                    return Ok(None);
                }
            }
        }

        let text = fs::read_to_string(&artifact_path).map_err(|e| {
            TesseraError::CacheError(format!("Failed to read {}: {}", artifact_path.display(), e))
        })?;

        tracing::debug!("Cache hit for '{}'", location.name);
        Ok(Some(CompiledArtifact {
            source_name: location.name.clone(),
            cache_path: artifact_path,
            text,
            compiled_at: artifact_modified,
            from_cache: true,
            ephemeral: false,
        }))
    }

    /// Writes a freshly compiled artifact.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::CacheWrite`] when the artifact or its metadata
    /// cannot be written.
    pub fn store(&self, name: &str, text: &str, dependencies: &[String]) -> Result<CompiledArtifact> {
        if !self.enabled {
            return self.store_ephemeral(name, text);
        }

        fs::create_dir_all(&self.cache_dir).map_err(|source| TesseraError::CacheWrite {
            path: self.cache_dir.clone(),
            source,
        })?;

        let artifact_path = self.artifact_path(name);
        let compiled_at = SystemTime::now();
        let meta = ArtifactMeta {
            name: name.to_string(),
            dependencies: dependencies.to_vec(),
            compiled_at: compiled_at
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| TesseraError::CacheError(format!("Failed to encode metadata: {}", e)))?;

        // Metadata first: a fresh artifact must never pair with stale dependencies
        write_atomic(&self.cache_dir, &Self::metadata_path(&artifact_path), &meta_json)?;
        write_atomic(&self.cache_dir, &artifact_path, text)?;
        tracing::debug!("Stored artifact for '{}' at {}", name, artifact_path.display());

        Ok(CompiledArtifact {
            source_name: name.to_string(),
            cache_path: artifact_path,
            text: text.to_string(),
            compiled_at,
            from_cache: false,
            ephemeral: false,
        })
    }

    fn store_ephemeral(&self, name: &str, text: &str) -> Result<CompiledArtifact> {
        let write_error = |source: io::Error| TesseraError::CacheWrite {
            path: std::env::temp_dir(),
            source,
        };

        let mut file = tempfile::Builder::new()
            .prefix("tessera-")
            .suffix(".lua")
            .tempfile()
            .map_err(write_error)?;
        file.write_all(text.as_bytes()).map_err(write_error)?;
        let (_, path) = file.keep().map_err(|e| write_error(e.error))?;
        tracing::trace!("Wrote ephemeral artifact for '{}' to {}", name, path.display());

        Ok(CompiledArtifact {
            source_name: name.to_string(),
            cache_path: path,
            text: text.to_string(),
            compiled_at: SystemTime::now(),
            from_cache: false,
            ephemeral: true,
        })
    }

    /// Reads an artifact's code back, deleting the file if it is ephemeral.
    pub fn consume(&self, artifact: &CompiledArtifact) -> Result<String> {
        if !artifact.ephemeral {
            return Ok(artifact.text.clone());
        }

        let text = match fs::read_to_string(&artifact.cache_path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => artifact.text.clone(),
            Err(e) => {
                return Err(TesseraError::CacheError(format!(
                    "Failed to read {}: {}",
                    artifact.cache_path.display(),
                    e
                )))
            }
        };
        self.discard(artifact);
        Ok(text)
    }

    /// Deletes an ephemeral artifact without reading it. Cached artifacts
    /// are left alone.
    pub fn discard(&self, artifact: &CompiledArtifact) {
        if !artifact.ephemeral {
            return;
        }
        match fs::remove_file(&artifact.cache_path) {
            Ok(()) => tracing::trace!("Removed ephemeral artifact {}", artifact.cache_path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove ephemeral artifact {}: {}",
                artifact.cache_path.display(),
                e
            ),
        }
    }

    /// Removes every artifact and metadata file. Returns the number of
    /// artifacts removed.
    pub fn purge(&self) -> Result<usize> {
        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(TesseraError::CacheError(format!(
                    "Failed to read cache directory: {}",
                    e
                )))
            }
        };

        let mut removed = 0;
        for entry in entries {
            let entry = entry.map_err(|e| {
                TesseraError::CacheError(format!("Failed to read directory entry: {}", e))
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let is_artifact = file_name.ends_with(".lua");
            if is_artifact || file_name.ends_with(".meta.json") {
                fs::remove_file(&path).map_err(|e| {
                    TesseraError::CacheError(format!("Failed to remove {}: {}", path.display(), e))
                })?;
                if is_artifact {
                    removed += 1;
                }
            }
        }

        tracing::debug!("Purged {} artifact(s) from {}", removed, self.cache_dir.display());
        Ok(removed)
    }
}

/// File name of the artifact for a template name.
pub fn cache_file_name(name: &str) -> String {
    let safe_name: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let digest = Sha256::digest(name.as_bytes());
    let fingerprint: String = digest[..8].iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}.{}.lua", safe_name, fingerprint)
}

fn read_metadata(path: &Path) -> Option<ArtifactMeta> {
    let json = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&json) {
        Ok(meta) => Some(meta),
        Err(e) => {
            tracing::warn!("Ignoring corrupt cache metadata {}: {}", path.display(), e);
            None
        }
    }
}

fn write_atomic(dir: &Path, path: &Path, contents: &str) -> Result<()> {
    let write_error = |source: io::Error| TesseraError::CacheWrite {
        path: path.to_path_buf(),
        source,
    };

    let mut file = NamedTempFile::new_in(dir).map_err(write_error)?;
    file.write_all(contents.as_bytes()).map_err(write_error)?;
    file.persist(path).map_err(|e| write_error(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::FileSystemResolver;
    use std::fs::File;
    use std::time::Duration;
    use tempfile::TempDir;

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options().write(true).open(path).unwrap().set_modified(time).unwrap();
    }

    fn an_hour_ago() -> SystemTime {
        SystemTime::now() - Duration::from_secs(3600)
    }

    fn setup() -> (TempDir, FileSystemResolver, CacheManager) {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("templates");
        fs::create_dir_all(&root).unwrap();
        let resolver = FileSystemResolver::new(&root, "tpl");
        let cache = CacheManager::new(temp_dir.path().join("cache"), true);
        (temp_dir, resolver, cache)
    }

    fn write_template(temp_dir: &TempDir, name: &str, text: &str, modified: SystemTime) {
        let path = temp_dir.path().join("templates").join(name);
        fs::write(&path, text).unwrap();
        set_mtime(&path, modified);
    }

    #[test]
    fn test_cache_file_name() {
        let name = cache_file_name("pages/home.tpl");
        assert!(name.starts_with("pages_home_tpl."));
        assert!(name.ends_with(".lua"));
        assert_eq!(name.len(), "pages_home_tpl.".len() + 16 + ".lua".len());

        // Names that mangle alike still get distinct files
        assert_ne!(cache_file_name("a/b.tpl"), cache_file_name("a_b.tpl"));
        assert_eq!(cache_file_name("a/b.tpl"), cache_file_name("a/b.tpl"));
    }

    #[test]
    fn test_store_then_lookup() {
        let (temp_dir, resolver, cache) = setup();
        write_template(&temp_dir, "page.tpl", "x", an_hour_ago());
        let location = resolver.locate("page").unwrap();

        assert!(cache.lookup(&location, &resolver).unwrap().is_none());
        assert!(!cache.cache_dir().exists());

        let stored = cache.store("page.tpl", "return 1", &[]).unwrap();
        assert!(!stored.from_cache);
        assert!(stored.cache_path.exists());
        assert!(stored.cache_path.with_extension("meta.json").exists());

        let cached = cache.lookup(&location, &resolver).unwrap().unwrap();
        assert!(cached.from_cache);
        assert_eq!(cached.text, "return 1");
        assert_eq!(cached.cache_path, stored.cache_path);
    }

    #[test]
    fn test_newer_source_is_stale() {
        let (temp_dir, resolver, cache) = setup();
        write_template(&temp_dir, "page.tpl", "x", an_hour_ago());
        cache.store("page.tpl", "return 1", &[]).unwrap();

        let path = temp_dir.path().join("templates/page.tpl");
        set_mtime(&path, SystemTime::now() + Duration::from_secs(60));
        let location = resolver.locate("page").unwrap();

        assert!(cache.lookup(&location, &resolver).unwrap().is_none());
    }

    #[test]
    fn test_changed_dependency_is_stale() {
        let (temp_dir, resolver, cache) = setup();
        write_template(&temp_dir, "page.tpl", "x", an_hour_ago());
        write_template(&temp_dir, "layout.tpl", "y", an_hour_ago());
        cache.store("page.tpl", "return 1", &["layout.tpl".to_string()]).unwrap();

        let location = resolver.locate("page").unwrap();
        assert!(cache.lookup(&location, &resolver).unwrap().is_some());

        let layout = temp_dir.path().join("templates/layout.tpl");
        set_mtime(&layout, SystemTime::now() + Duration::from_secs(60));
        assert!(cache.lookup(&location, &resolver).unwrap().is_none());

        fs::remove_file(&layout).unwrap();
        assert!(cache.lookup(&location, &resolver).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_metadata_is_stale() {
        let (temp_dir, resolver, cache) = setup();
        write_template(&temp_dir, "page.tpl", "x", an_hour_ago());
        let stored = cache.store("page.tpl", "return 1", &[]).unwrap();
        fs::write(stored.cache_path.with_extension("meta.json"), "{ not json").unwrap();

        let location = resolver.locate("page").unwrap();
        assert!(cache.lookup(&location, &resolver).unwrap().is_none());
    }

    #[test]
    fn test_unwritable_cache_dir_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();

        let cache = CacheManager::new(blocker.join("cache"), true);
        let result = cache.store("page.tpl", "return 1", &[]);
        assert!(matches!(result, Err(TesseraError::CacheWrite { .. })));
    }

    #[test]
    fn test_ephemeral_artifact_is_deleted_on_consume() {
        let cache = CacheManager::new("unused", false);

        let artifact = cache.store("page.tpl", "return 2", &[]).unwrap();
        assert!(artifact.ephemeral);
        assert!(artifact.cache_path.exists());
        assert!(!cache.cache_dir().exists());

        assert_eq!(cache.consume(&artifact).unwrap(), "return 2");
        assert!(!artifact.cache_path.exists());
    }

    #[test]
    fn test_discard_only_touches_ephemeral_artifacts() {
        let disabled = CacheManager::new("unused", false);
        let ephemeral = disabled.store("page.tpl", "return 3", &[]).unwrap();
        disabled.discard(&ephemeral);
        assert!(!ephemeral.cache_path.exists());
        disabled.discard(&ephemeral);

        let (_temp_dir, _resolver, cache) = setup();
        assert!(cache.is_enabled());
        let cached = cache.store("page.tpl", "return 4", &[]).unwrap();
        cache.discard(&cached);
        assert!(cached.cache_path.exists());
    }

    #[test]
    fn test_purge() {
        let (temp_dir, _resolver, cache) = setup();
        assert_eq!(cache.purge().unwrap(), 0);

        cache.store("a.tpl", "return 1", &[]).unwrap();
        cache.store("b/c.tpl", "return 2", &[]).unwrap();
        fs::write(temp_dir.path().join("cache/keep.txt"), "unrelated").unwrap();

        assert_eq!(cache.purge().unwrap(), 2);
        let left: Vec<_> = fs::read_dir(cache.cache_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["keep.txt".to_string()]);
    }
}
