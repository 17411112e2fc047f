// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Compile command: compiles one template and shows where its artifact lives.

use console::style;
use tessera::{CompilerConfig, Engine};

/// Runs the compile command.
///
/// Prints the artifact path, or the artifact itself with `print`.
pub fn run(config: CompilerConfig, template: &str, print: bool) -> anyhow::Result<()> {
    let engine = Engine::from_config(config)?;

    if print {
        print!("{}", engine.get_compiled_content(template)?);
        return Ok(());
    }

    let artifact = engine.compile(template)?;
    let status = if artifact.from_cache {
        style("cached").dim()
    } else {
        style("compiled").green()
    };
    println!("{} {} -> {}", status, artifact.source_name, artifact.cache_path.display());
    if artifact.ephemeral {
        println!(
            "{} caching is disabled, the artifact is removed on first read",
            style("note:").yellow()
        );
    }
    Ok(())
}
