// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `{# ... #}` comment removal.

use crate::grammar::{self, COMMENT_RE};
use regex::Captures;

/// Removes template comments.
///
/// In debug mode each comment survives as a Lua comment in the artifact,
/// never as output.
pub fn strip_comments(text: &str, debug: bool) -> String {
    COMMENT_RE
        .replace_all(text, |caps: &Captures<'_>| {
            if debug {
                grammar::trace_comment(&format!("comment: {}", caps[1].trim()))
            } else {
                String::new()
            }
        })
        .into_owned()
}
