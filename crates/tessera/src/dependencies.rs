// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Dependency inlining for `@extends` and `@embed`.
//!
//! Each directive is replaced, in place, by the fully resolved text of the
//! template it names. Resolution is depth-first, so a parent layout's text
//! always lands *before* whatever follows the directive in the child. The
//! block resolver relies on that ordering to tell overrides from originals.
//!
//! Every loaded source has its `{# ... #}` comments stripped first, so a
//! commented-out directive is never resolved by this or any later pass.

use crate::comments;
use crate::error::{Result, TesseraError};
use crate::grammar::{self, DirectiveKind};
use crate::resolver::TemplateResolver;

/// The output of dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependencies {
    /// The entry template with every extend/embed inlined.
    pub text: String,
    /// Normalized names of all inlined templates, in first-seen order.
    pub dependencies: Vec<String>,
}

/// Recursively inlines `@extends` / `@embed` directives.
pub struct DependencyResolver<'a, R: TemplateResolver> {
    resolver: &'a R,
    max_depth: usize,
    debug: bool,
}

impl<'a, R: TemplateResolver> DependencyResolver<'a, R> {
    /// Creates a dependency resolver.
    pub fn new(resolver: &'a R, max_depth: usize, debug: bool) -> Self {
        Self {
            resolver,
            max_depth,
            debug,
        }
    }

    /// Reads `name` and inlines its dependencies.
    ///
    /// # Errors
    ///
    /// - [`TesseraError::TemplateNotFound`] if any template in the chain is missing
    /// - [`TesseraError::RecursionLimit`] if the chain nests deeper than `max_depth`
    pub fn resolve(&self, name: &str) -> Result<ResolvedDependencies> {
        let mut dependencies = Vec::new();
        let text = self.resolve_at(name, 0, &mut dependencies)?;
        Ok(ResolvedDependencies { text, dependencies })
    }

    fn resolve_at(&self, name: &str, depth: usize, dependencies: &mut Vec<String>) -> Result<String> {
        if depth > self.max_depth {
            return Err(TesseraError::RecursionLimit {
                name: name.to_string(),
                depth: self.max_depth,
            });
        }

        let source = self.resolver.load(name)?;
        if depth > 0 && !dependencies.contains(&source.name) {
            dependencies.push(source.name.clone());
        }

        let text = comments::strip_comments(&source.text, self.debug);
        let directives = grammar::find_dependencies(&text);
        if directives.is_empty() {
            return Ok(text);
        }

        let mut output = String::with_capacity(text.len());
        let mut last = 0;
        for directive in directives {
            output.push_str(&text[last..directive.span.start]);

            let inlined = self.resolve_at(&directive.payload, depth + 1, dependencies)?;
            let keyword = match directive.kind {
                DirectiveKind::Embed => "embed",
                _ => "extends",
            };
            tracing::trace!("Inlined @{} '{}' into '{}'", keyword, directive.payload, source.name);

            if self.debug {
                output.push_str(&grammar::trace_comment(&format!("@{} '{}'", keyword, directive.payload)));
                output.push_str(&inlined);
                output.push_str(&grammar::trace_comment(&format!("end @{} '{}'", keyword, directive.payload)));
            } else {
                output.push_str(&inlined);
            }
            last = directive.span.end;
        }
        output.push_str(&text[last..]);

        Ok(output)
    }
}
