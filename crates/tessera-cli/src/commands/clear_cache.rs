// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Clear-cache command.

use console::style;
use tessera::CacheManager;
use tessera::CompilerConfig;

/// Removes every cached artifact.
pub fn run(config: CompilerConfig) -> anyhow::Result<()> {
    let cache = CacheManager::new(&config.cache_dir, true);
    let removed = cache.purge()?;

    println!(
        "{} {} artifact(s) from {}",
        style("Removed").green(),
        removed,
        config.cache_dir.display()
    );
    Ok(())
}
