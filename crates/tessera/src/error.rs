// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the tessera template compiler.
//!
//! This module defines [`TesseraError`], the main error enum, and
//! [`SourceContext`] for showing the compiled artifact around a failing line.
//!
//! # Error Categories
//!
//! - **Resolution errors**: a referenced template does not exist or escapes the root
//! - **Recursion errors**: an extend/embed/include chain nests deeper than allowed
//! - **Cache errors**: an artifact could not be written, read or purged
//! - **Runtime errors**: the compiled Lua failed while being evaluated
//!
//! A block print that names an undefined block is deliberately not an error:
//! it resolves to empty output.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Source context for enhanced error messages.
///
/// Captures a snippet of the compiled artifact around an error location,
/// so runtime failures show the Lua that was actually executed.
#[derive(Debug, Clone)]
pub struct SourceContext {
    /// All lines from the artifact.
    pub lines: Vec<String>,
    /// The line number where the error occurred (1-indexed).
    pub error_line: usize,
    /// First line number of the snippet (1-indexed).
    pub snippet_start: usize,
    /// Last line number of the snippet (1-indexed).
    pub snippet_end: usize,
}

impl SourceContext {
    /// Creates a source context from artifact text and an error line.
    ///
    /// Captures 3 lines before and after the error line.
    pub fn from_source(source: &str, line: usize) -> Self {
        let lines: Vec<String> = source.lines().map(|l| l.to_string()).collect();
        let snippet_start = line.saturating_sub(3).max(1);
        let snippet_end = (line + 3).min(lines.len());

        Self {
            lines,
            error_line: line,
            snippet_start,
            snippet_end,
        }
    }

    /// Formats the snippet with line numbers, marking the failing line.
    ///
    /// ```text
    ///   11 | __write("<li>")
    /// > 12 | __write(__escape(item.name.first))
    ///   13 | __write("</li>")
    /// ```
    pub fn format_snippet(&self) -> String {
        let mut result = String::new();

        for line_num in self.snippet_start..=self.snippet_end {
            if line_num == 0 || line_num > self.lines.len() {
                break;
            }
            let marker = if line_num == self.error_line { '>' } else { ' ' };
            result.push_str(&format!("{} {:3} | {}\n", marker, line_num, self.lines[line_num - 1]));
        }

        result
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_snippet())
    }
}

/// Helper struct for displaying optional source context.
pub struct OptSourceContextDisplay<'a>(pub &'a Option<SourceContext>);

impl<'a> fmt::Display for OptSourceContextDisplay<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(ctx) => write!(f, "{}", ctx),
            None => write!(f, ""),
        }
    }
}

/// Helper trait for formatting optional source context.
pub trait AsDisplay<'a> {
    /// Wraps self for Display formatting.
    fn as_display(&'a self) -> OptSourceContextDisplay<'a>;
}

impl<'a> AsDisplay<'a> for Option<SourceContext> {
    fn as_display(&'a self) -> OptSourceContextDisplay<'a> {
        OptSourceContextDisplay(self)
    }
}

/// The main error type for tessera operations.
#[derive(Error, Debug)]
pub enum TesseraError {
    /// A rendered, extended, embedded or included template does not exist.
    #[error("Template not found: '{name}' (looked for {path})")]
    TemplateNotFound {
        /// The template name as written in the directive or passed by the caller.
        name: String,
        /// The path that was probed after root and extension resolution.
        path: String,
    },

    /// An extend/embed/include chain nested deeper than the configured bound.
    #[error("Recursive inclusion overflow at '{name}': nesting exceeds {depth} levels")]
    RecursionLimit {
        /// The template being resolved when the bound was hit.
        name: String,
        /// The configured maximum depth.
        depth: usize,
    },

    /// The compiled artifact could not be written to the cache location.
    #[error("Cache write failed for {}: {source}", path.display())]
    CacheWrite {
        /// Destination of the artifact.
        path: PathBuf,
        /// The underlying I/O failure.
        source: std::io::Error,
    },

    /// Any other cache operation failed (reading, purging).
    #[error("Cache error: {0}")]
    CacheError(String),

    /// A template name could not be turned into a usable path.
    #[error("Resolution error: {0}")]
    ResolutionError(String),

    /// The variables passed for evaluation are not a map.
    #[error("Invalid context: {0}")]
    InvalidContext(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The compiled artifact failed while being evaluated.
    #[error("Template runtime error in {template}: {message}\n{}", source_context.as_display())]
    TemplateRuntimeError {
        /// The template whose artifact failed.
        template: String,
        /// Error message from Lua.
        message: String,
        /// Snippet of the artifact around the failing line.
        source_context: Option<SourceContext>,
    },

    /// Lua runtime error outside of artifact evaluation.
    #[error("Lua error: {0}")]
    LuaError(#[from] mlua::Error),

    /// File I/O error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience type alias for Results with [`TesseraError`].
pub type Result<T> = std::result::Result<T, TesseraError>;
