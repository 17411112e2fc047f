// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build command for precompiling every template into the cache.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Instant;
use tessera::{CompilerConfig, Engine, TemplateResolver};

/// Outcome of compiling a set of templates.
#[derive(Debug, Default)]
pub struct BuildReport {
    /// Templates compiled in this run.
    pub compiled: Vec<String>,
    /// Templates whose cached artifact was still fresh.
    pub cached: Vec<String>,
    /// Templates that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

/// Lists every template below `root` with the given extension, as names
/// relative to `root`, sorted.
pub fn discover_templates(root: &Path, extension: &str) -> anyhow::Result<Vec<String>> {
    let pattern = format!("{}/**/*.{}", root.display(), extension);
    let mut names = Vec::new();
    for path in glob::glob(&pattern)?.flatten() {
        if !path.is_file() {
            continue;
        }
        let relative = path.strip_prefix(root)?;
        names.push(relative.to_string_lossy().replace('\\', "/"));
    }
    names.sort();
    Ok(names)
}

/// Compiles `names`, reporting progress through `on_progress`.
///
/// With caching disabled nothing is kept: each ephemeral artifact is
/// deleted as soon as it has been compiled.
pub fn build_all<R: TemplateResolver>(
    engine: &Engine<R>,
    names: &[String],
    mut on_progress: impl FnMut(usize),
) -> BuildReport {
    let mut report = BuildReport::default();
    for (index, name) in names.iter().enumerate() {
        match engine.compile(name) {
            Ok(artifact) if artifact.from_cache => report.cached.push(artifact.source_name),
            Ok(artifact) => {
                engine.cache().discard(&artifact);
                report.compiled.push(artifact.source_name);
            }
            Err(e) => {
                tracing::debug!("Failed to compile {}: {}", name, e);
                report.failed.push((name.clone(), e.to_string()));
            }
        }
        on_progress(index + 1);
    }
    report
}

/// Runs the build command.
pub fn run(config: CompilerConfig) -> anyhow::Result<()> {
    let root = config.template_root.clone();
    if !root.is_dir() {
        anyhow::bail!("Template root {} does not exist", root.display());
    }

    let names = discover_templates(&root, &config.extension)?;
    if names.is_empty() {
        println!("No templates found in {}", root.display());
        return Ok(());
    }

    let engine = Engine::from_config(config)?;
    if !engine.cache().is_enabled() {
        println!(
            "{} caching is disabled, nothing will be kept",
            style("note:").yellow()
        );
    }
    println!("{} {} template(s)", style("Found").green(), names.len());

    let pb = ProgressBar::new(names.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} Compiling [{bar:30.cyan/blue}] {pos}/{len}")?
            .progress_chars("━━╺"),
    );

    let start = Instant::now();
    let report = build_all(&engine, &names, |done| pb.set_position(done as u64));
    pb.finish_and_clear();

    println!(
        "{} {} compiled, {} up to date in {:.2?}",
        style("Done").green(),
        report.compiled.len(),
        report.cached.len(),
        start.elapsed()
    );

    if report.failed.is_empty() {
        return Ok(());
    }
    for (name, message) in &report.failed {
        eprintln!("{} {}: {}", style("error").red(), name, message);
    }
    anyhow::bail!("{} template(s) failed to compile", report.failed.len())
}
