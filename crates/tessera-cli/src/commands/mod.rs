// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! CLI command implementations.
//!
//! - `render`: Evaluate a template with variables from a JSON file
//! - `compile`: Compile one template and show its artifact
//! - `build`: Compile every template below the template root
//! - `clear_cache`: Remove cached artifacts

/// Precompile command.
pub mod build;
/// Cache removal command.
pub mod clear_cache;
/// Single-template compile command.
pub mod compile;
/// Render command.
pub mod render;
