// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The template compilation pipeline.
//!
//! Passes run in this order, each consuming the directives it owns:
//!
//! 1. [`dependencies`](crate::dependencies): strip `{# ... #}` from every
//!    loaded source, inline `@extends` / `@embed`
//! 2. [`include`](crate::include): rewrite `@include` into runtime calls
//! 3. [`blocks`](crate::blocks): resolve block definitions, overrides and prints
//! 4. [`codegen`](crate::codegen): emit the Lua artifact
//!
//! The compiler holds no state between calls. Caching is the engine's job.

use crate::blocks::BlockResolver;
use crate::codegen;
use crate::config::CompilerConfig;
use crate::dependencies::DependencyResolver;
use crate::error::Result;
use crate::include;
use crate::resolver::TemplateResolver;

/// The result of compiling one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    /// Normalized template name.
    pub name: String,
    /// The generated Lua code.
    pub text: String,
    /// Templates inlined through extend/embed, in first-seen order.
    pub dependencies: Vec<String>,
}

/// Runs the compilation passes for templates provided by a resolver.
pub struct Compiler<'a, R: TemplateResolver> {
    resolver: &'a R,
    config: &'a CompilerConfig,
}

impl<'a, R: TemplateResolver> Compiler<'a, R> {
    /// Creates a compiler.
    pub fn new(resolver: &'a R, config: &'a CompilerConfig) -> Self {
        Self { resolver, config }
    }

    /// Compiles `name` into a Lua artifact.
    ///
    /// # Errors
    ///
    /// - [`TesseraError::TemplateNotFound`](crate::TesseraError::TemplateNotFound)
    ///   if the template or anything it extends, embeds or includes is missing
    /// - [`TesseraError::RecursionLimit`](crate::TesseraError::RecursionLimit)
    ///   if extends/embeds nest deeper than the configured bound
    pub fn compile(&self, name: &str) -> Result<CompiledTemplate> {
        let location = self.resolver.locate(name)?;
        tracing::debug!("Compiling '{}'", location.name);

        let (merged, dependencies) = self.merge_with_dependencies(&location.name)?;

        let resolved = BlockResolver::new(self.config.debug).resolve(&merged);
        tracing::trace!("Blocks resolved for '{}'", location.name);

        let text = codegen::compile_expressions(&resolved, &location.name);

        Ok(CompiledTemplate {
            name: location.name,
            text,
            dependencies,
        })
    }

    /// Returns the text of `name` after dependency and include resolution,
    /// before blocks are resolved.
    pub fn merge(&self, name: &str) -> Result<String> {
        Ok(self.merge_with_dependencies(name)?.0)
    }

    fn merge_with_dependencies(&self, name: &str) -> Result<(String, Vec<String>)> {
        let resolved = DependencyResolver::new(self.resolver, self.config.max_depth, self.config.debug).resolve(name)?;
        tracing::trace!(
            "Inlined {} dependencies into '{}'",
            resolved.dependencies.len(),
            name
        );

        let text = include::resolve_includes(self.resolver, &resolved.text, self.config.debug)?;
        Ok((text, resolved.dependencies))
    }
}
