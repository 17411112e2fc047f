// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Render command: evaluates a template and writes the output.

use serde_json::Value as JsonValue;
use std::fs;
use std::io::Write;
use std::path::Path;
use tessera::{CompilerConfig, Engine};

/// Reads template variables from a JSON file. No file means no variables.
pub fn load_vars(path: Option<&Path>) -> anyhow::Result<JsonValue> {
    let Some(path) = path else {
        return Ok(JsonValue::Object(serde_json::Map::new()));
    };

    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read variables from {}: {}", path.display(), e))?;
    let vars: JsonValue = serde_json::from_str(&content)
        .map_err(|e| anyhow::anyhow!("Invalid JSON in {}: {}", path.display(), e))?;
    if !vars.is_object() {
        anyhow::bail!("{} must contain a JSON object", path.display());
    }
    Ok(vars)
}

/// Renders `template` and returns the output.
pub fn render(config: CompilerConfig, template: &str, vars: &JsonValue) -> anyhow::Result<String> {
    let engine = Engine::from_config(config)?;
    Ok(engine.evaluate(template, vars)?)
}

/// Runs the render command, writing to `output` or stdout.
pub fn run(config: CompilerConfig, template: &str, vars: Option<&Path>, output: Option<&Path>) -> anyhow::Result<()> {
    let vars = load_vars(vars)?;
    let rendered = render(config, template, &vars)?;

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, &rendered)?;
            tracing::info!("Wrote {} bytes to {}", rendered.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(rendered.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
