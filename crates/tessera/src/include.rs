// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! `@include` processing.
//!
//! Unlike extends/embed, an include contributes the *rendered output* of
//! another template. The directive is rewritten into a call to the runtime's
//! `__include` function, which compiles, caches and evaluates the included
//! template against the same variables when the artifact runs. The target
//! must exist when the including template is compiled.

use crate::codegen::escape_lua_string;
use crate::error::Result;
use crate::grammar::{self, STATEMENT_CLOSE, STATEMENT_OPEN};
use crate::resolver::TemplateResolver;

/// Rewrites every `@include` directive in `text`.
///
/// # Errors
///
/// Returns [`TesseraError::TemplateNotFound`](crate::TesseraError::TemplateNotFound)
/// for the first include whose target does not exist.
pub fn resolve_includes<R: TemplateResolver>(resolver: &R, text: &str, debug: bool) -> Result<String> {
    let directives = grammar::find_includes(text);
    if directives.is_empty() {
        return Ok(text.to_string());
    }

    let mut output = String::with_capacity(text.len());
    let mut last = 0;
    for directive in directives {
        output.push_str(&text[last..directive.span.start]);

        let location = resolver.locate(&directive.payload)?;
        tracing::trace!("Include of '{}' resolved to {}", directive.payload, location.path);

        let call = format!(
            "{} __write(__include(\"{}\")) {}",
            STATEMENT_OPEN,
            escape_lua_string(&location.name),
            STATEMENT_CLOSE
        );
        if debug {
            output.push_str(&format!("<!-- include: {} -->", location.name));
            output.push_str(&call);
            output.push_str(&format!("<!-- /include: {} -->", location.name));
        } else {
            output.push_str(&call);
        }
        last = directive.span.end;
    }
    output.push_str(&text[last..]);

    Ok(output)
}
