// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! Tessera CLI library.
//!
//! This crate provides the command-line interface for the tessera template
//! compiler.
//!
//! # Usage
//!
//! This crate is primarily used through the `tessera` binary:
//!
//! ```bash
//! tessera render pages/home --vars data.json   # Render a template
//! tessera compile pages/home --print           # Show the generated Lua
//! tessera build                                # Precompile every template
//! tessera clear-cache                          # Remove cached artifacts
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `tessera.toml` at the project root.

/// CLI commands (render, compile, build, clear-cache).
pub mod commands;
/// Project configuration from `tessera.toml`.
pub mod config;
