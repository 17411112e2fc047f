// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

// The runtime error variant carries a source snippet
#![allow(clippy::result_large_err)]

//! # Tessera
//!
//! A directive template compiler for Rust, with Lua as its evaluation language.
//!
//! Templates mix literal text with directives. Tessera resolves layout
//! inheritance, embeds and includes, compiles the result to a Lua chunk,
//! caches that chunk on disk and evaluates it with your variables.
//!
//! ## Features
//!
//! - Layout inheritance with named blocks and `@super`
//! - `@extends`, `@embed` (text inlining) and `@include` (nested rendering)
//! - Escaped `{{ }}` and raw `{{{ }}}` output
//! - `@if`, `@foreach`, `@while`, `@switch` control directives
//! - On-disk artifact cache with dependency-aware invalidation
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tessera::{CompilerConfig, Engine};
//!
//! let engine = Engine::from_config(CompilerConfig::new("./templates"))?;
//! let html = engine.evaluate("hello", &serde_json::json!({ "name": "World" }))?;
//! ```
//!
//! ## Template Syntax
//!
//! ```text
//! {! @extends 'layouts/base' !}
//! {# page-specific title #}
//! {! @block title !}{{ page.title }} | {! @super !}{! @endblock !}
//! {! @block content !}
//!   {! @foreach _, post in ipairs(posts) !}
//!     <article>{{{ post.html }}}</article>
//!   {! @endforeach !}
//!   {! @include 'partials/footer' !}
//! {! @endblock !}
//! ```

/// Directive delimiters, patterns and tokenizer.
pub mod grammar;
/// `@extends` / `@embed` inlining.
pub mod dependencies;
/// `@include` rewriting.
pub mod include;
/// Named block inheritance.
pub mod blocks;
/// Comment removal.
pub mod comments;
/// Lua code generation.
pub mod codegen;
/// The compilation pipeline.
pub mod compiler;
/// Compiled artifact caching.
pub mod cache;
/// Compiler configuration.
pub mod config;
/// Main template engine.
pub mod engine;
/// Error types and reporting.
pub mod error;
/// Template resolution (filesystem, memory).
pub mod resolver;
/// Sandboxed Lua evaluation.
pub mod runtime;

pub use cache::{CacheManager, CompiledArtifact};
pub use compiler::{CompiledTemplate, Compiler};
pub use config::CompilerConfig;
pub use engine::Engine;
pub use error::{Result, SourceContext, TesseraError};
pub use resolver::{FileSystemResolver, MemoryResolver, TemplateLocation, TemplateResolver, TemplateSource};
