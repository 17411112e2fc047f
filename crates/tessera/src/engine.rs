// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Tessera template engine for compiling and rendering templates.
//!
//! This module provides the core [`Engine`] type that handles the complete
//! template lifecycle: resolution, compilation, caching, and evaluation.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tessera::{CompilerConfig, Engine};
//!
//! let config = CompilerConfig::new("./templates").with_cache_dir("./.cache");
//! let engine = Engine::from_config(config)?;
//!
//! let html = engine.evaluate("pages/home", &serde_json::json!({ "title": "Home" }))?;
//! ```
//!
//! # Architecture
//!
//! The engine coordinates several subsystems:
//!
//! - **Resolver**: Locates template files by name (filesystem or memory)
//! - **Compiler**: Runs the directive passes and emits Lua
//! - **Cache**: Persists artifacts and decides when they are stale
//! - **Runtime**: Executes artifacts in a sandboxed Lua state
//!
//! # Includes
//!
//! `@include` is evaluated when the including artifact runs: the engine
//! compiles (or loads from cache) the included template and evaluates it
//! against the same variables. Nesting is bounded by
//! [`CompilerConfig::max_depth`].

use crate::cache::{CacheManager, CompiledArtifact};
use crate::compiler::Compiler;
use crate::config::CompilerConfig;
use crate::error::{Result, TesseraError};
use crate::resolver::{FileSystemResolver, TemplateResolver};
use crate::runtime::Runtime;
use mlua::Table;
use serde::Serialize;

/// The template engine.
///
/// An engine owns its resolver, cache manager and Lua state. It is cheap to
/// keep around and is meant to be reused for many compiles; no compile state
/// survives between calls.
pub struct Engine<R: TemplateResolver> {
    config: CompilerConfig,
    resolver: R,
    cache: CacheManager,
    runtime: Runtime,
}

impl Engine<FileSystemResolver> {
    /// Creates an engine that reads templates from `config.template_root`.
    pub fn from_config(config: CompilerConfig) -> Result<Self> {
        let resolver = FileSystemResolver::new(&config.template_root, &config.extension);
        Self::new(config, resolver)
    }
}

impl<R: TemplateResolver> Engine<R> {
    /// Creates an engine with the given resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the Lua runtime cannot be initialized.
    pub fn new(config: CompilerConfig, resolver: R) -> Result<Self> {
        let cache = CacheManager::new(&config.cache_dir, config.cache_enabled);
        let runtime = Runtime::new()?;
        Ok(Self {
            config,
            resolver,
            cache,
            runtime,
        })
    }

    /// The engine configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// The template resolver.
    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// The artifact cache.
    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Compiles a template, reusing the cached artifact when it is fresh.
    ///
    /// # Errors
    ///
    /// - [`TesseraError::TemplateNotFound`] if the template or one of its
    ///   dependencies is missing
    /// - [`TesseraError::RecursionLimit`] if extends/embeds nest too deep
    /// - [`TesseraError::CacheWrite`] if the artifact cannot be written
    pub fn compile(&self, name: &str) -> Result<CompiledArtifact> {
        let location = self.resolver.locate(name)?;
        if let Some(artifact) = self.cache.lookup(&location, &self.resolver)? {
            return Ok(artifact);
        }

        let compiled = Compiler::new(&self.resolver, &self.config).compile(&location.name)?;
        self.cache.store(&compiled.name, &compiled.text, &compiled.dependencies)
    }

    /// Returns the Lua code of a template's artifact.
    pub fn get_compiled_content(&self, name: &str) -> Result<String> {
        let artifact = self.compile(name)?;
        self.cache.consume(&artifact)
    }

    /// Compiles and evaluates a template.
    ///
    /// `vars` must serialize to a map; its keys become the template's
    /// variables.
    ///
    /// # Errors
    ///
    /// Any compile error, [`TesseraError::InvalidContext`] for non-map
    /// variables, and [`TesseraError::TemplateRuntimeError`] when the Lua
    /// code fails.
    pub fn evaluate<T: Serialize + ?Sized>(&self, name: &str, vars: &T) -> Result<String> {
        let context = self.runtime.to_context(vars)?;
        self.render(name, &context, 0)
    }

    fn render(&self, name: &str, vars: &Table, depth: usize) -> Result<String> {
        if depth > self.config.max_depth {
            return Err(TesseraError::RecursionLimit {
                name: name.to_string(),
                depth: self.config.max_depth,
            });
        }

        let artifact = self.compile(name)?;
        let code = self.cache.consume(&artifact)?;
        tracing::debug!("Evaluating '{}' at include depth {}", artifact.source_name, depth);

        self.runtime
            .execute(&artifact.source_name, &code, vars, |included: &str| {
                tracing::trace!("'{}' includes '{}'", artifact.source_name, included);
                self.render(included, vars, depth + 1)
            })
    }

    /// Removes every cached artifact. Returns how many were removed.
    pub fn clear_cache(&self) -> Result<usize> {
        self.cache.purge()
    }
}
