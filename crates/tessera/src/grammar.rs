// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! The directive grammar.
//!
//! Structural directives live in `{! ... !}`, value interpolation in
//! `{{ ... }}` (escaped) and `{{{ ... }}}` (raw), comments in `{# ... #}`.
//!
//! | Directive | Meaning |
//! |---|---|
//! | `{! @extends 'path' !}` | inline another template's resolved text |
//! | `{! @embed 'path' !}` | same as extends |
//! | `{! @include 'path' !}` | insert the evaluated output of another template |
//! | `{! @block name !} ... {! @endblock !}` | define a named block |
//! | `{! @super !}` | inside a block: the content it overrides |
//! | `{! @block(name) !}` | print a resolved block |
//! | `{! statement !}` | any Lua statement or control keyword |
//!
//! Every pass locates directives through the patterns defined here, so the
//! delimiters exist in exactly one place.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::ops::Range;

/// Opening delimiter of a structural directive.
pub const STATEMENT_OPEN: &str = "{!";
/// Closing delimiter of a structural directive.
pub const STATEMENT_CLOSE: &str = "!}";
/// Opening delimiter of an escaped print.
pub const ESCAPED_OPEN: &str = "{{";
/// Closing delimiter of an escaped print.
pub const ESCAPED_CLOSE: &str = "}}";
/// Opening delimiter of a raw print.
pub const RAW_OPEN: &str = "{{{";
/// Closing delimiter of a raw print.
pub const RAW_CLOSE: &str = "}}}";

lazy_static! {
    /// `{! @extends 'x' !}`, `{! @embed("x") !}`.
    pub static ref DEPENDENCY_RE: Regex =
        Regex::new(r#"\{!\s*@(extends|embed)\s*\(?\s*["']([^"']+)["']\s*\)?\s*!\}"#).unwrap();

    /// `{! @include 'x' !}`.
    pub static ref INCLUDE_RE: Regex =
        Regex::new(r#"\{!\s*@include\s*\(?\s*["']([^"']+)["']\s*\)?\s*!\}"#).unwrap();

    /// `{! @block name !}`. A parenthesis after `@block` makes it a print instead.
    pub static ref BLOCK_OPEN_RE: Regex =
        Regex::new(r"\{!\s*@block\s+([A-Za-z0-9_.\-]+)\s*!\}").unwrap();

    /// `{! @endblock !}`.
    pub static ref BLOCK_CLOSE_RE: Regex = Regex::new(r"\{!\s*@endblock\s*!\}").unwrap();

    /// `{! @block(name) !}`.
    pub static ref BLOCK_PRINT_RE: Regex =
        Regex::new(r"\{!\s*@block\s*\(\s*([A-Za-z0-9_.\-]+)\s*\)\s*!\}").unwrap();

    /// `{! @super !}`.
    pub static ref SUPER_RE: Regex = Regex::new(r"\{!\s*@super\s*!\}").unwrap();

    /// `{# ... #}`, possibly spanning lines.
    pub static ref COMMENT_RE: Regex = Regex::new(r"(?s)\{#(.*?)#\}").unwrap();
}

/// The kind of a recognized directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    /// `@extends`.
    Extends,
    /// `@embed`.
    Embed,
    /// `@include`.
    Include,
    /// `{{ expr }}`.
    EscapedPrint,
    /// `{{{ expr }}}`.
    RawPrint,
    /// `{! statement !}`.
    Statement,
}

/// A directive found in template text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    /// What the directive does.
    pub kind: DirectiveKind,
    /// The directive's argument: a template name, expression or statement.
    pub payload: String,
    /// Byte range of the whole directive, delimiters included.
    pub span: Range<usize>,
}

impl Directive {
    fn from_reference(caps: &Captures<'_>, kind: DirectiveKind, name_group: usize) -> Self {
        Self {
            kind,
            payload: caps[name_group].trim().to_string(),
            span: caps.get(0).map(|m| m.range()).unwrap_or_default(),
        }
    }
}

/// Finds every `@extends` / `@embed` directive, in textual order.
pub fn find_dependencies(text: &str) -> Vec<Directive> {
    DEPENDENCY_RE
        .captures_iter(text)
        .map(|caps| {
            let kind = if &caps[1] == "extends" {
                DirectiveKind::Extends
            } else {
                DirectiveKind::Embed
            };
            Directive::from_reference(&caps, kind, 2)
        })
        .collect()
}

/// Finds every `@include` directive, in textual order.
pub fn find_includes(text: &str) -> Vec<Directive> {
    INCLUDE_RE
        .captures_iter(text)
        .map(|caps| Directive::from_reference(&caps, DirectiveKind::Include, 1))
        .collect()
}

/// A piece of template text as seen by the expression compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token<'a> {
    /// Literal output.
    Text(&'a str),
    /// A print or statement directive.
    Directive(Directive),
}

/// Splits text into literal runs and print/statement directives.
///
/// An opening delimiter without its closing counterpart is kept as literal
/// text, so malformed input degrades to visible output instead of failing.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut cursor = 0;
    let mut text_start = 0;

    while let Some(offset) = text[cursor..].find('{') {
        let start = cursor + offset;
        let rest = &text[start..];

        let (kind, open, close) = if rest.starts_with(RAW_OPEN) {
            (DirectiveKind::RawPrint, RAW_OPEN, RAW_CLOSE)
        } else if rest.starts_with(ESCAPED_OPEN) {
            (DirectiveKind::EscapedPrint, ESCAPED_OPEN, ESCAPED_CLOSE)
        } else if rest.starts_with(STATEMENT_OPEN) {
            (DirectiveKind::Statement, STATEMENT_OPEN, STATEMENT_CLOSE)
        } else {
            cursor = start + 1;
            continue;
        };

        let body_start = start + open.len();
        let Some(close_offset) = text[body_start..].find(close) else {
            tracing::warn!("Unterminated '{}' at byte {}, kept as text", open, start);
            cursor = body_start;
            continue;
        };
        let end = body_start + close_offset + close.len();

        if text_start < start {
            tokens.push(Token::Text(&text[text_start..start]));
        }
        tokens.push(Token::Directive(Directive {
            kind,
            payload: text[body_start..body_start + close_offset].trim().to_string(),
            span: start..end,
        }));

        cursor = end;
        text_start = end;
    }

    if text_start < text.len() {
        tokens.push(Token::Text(&text[text_start..]));
    }
    tokens
}

/// Builds a statement directive that compiles to a Lua comment.
///
/// Debug mode leaves these behind wherever a directive was resolved.
pub fn trace_comment(message: &str) -> String {
    let message = message.replace("]==]", "] ==]").replace(STATEMENT_CLOSE, "! }");
    format!("{} --[==[ {} ]==] {}", STATEMENT_OPEN, message, STATEMENT_CLOSE)
}

/// Builds a `{! @block(name) !}` directive.
pub fn block_print(name: &str) -> String {
    format!("{} @block({}) {}", STATEMENT_OPEN, name, STATEMENT_CLOSE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_forms() {
        let text = r#"{! @extends 'layouts/base' !}x{! @embed("partials/nav") !}{!@extends('a')!}"#;
        let found = find_dependencies(text);

        assert_eq!(found.len(), 3);
        assert_eq!(found[0].kind, DirectiveKind::Extends);
        assert_eq!(found[0].payload, "layouts/base");
        assert_eq!(found[1].kind, DirectiveKind::Embed);
        assert_eq!(found[1].payload, "partials/nav");
        assert_eq!(found[2].payload, "a");
        assert_eq!(&text[found[1].span.clone()], r#"{! @embed("partials/nav") !}"#);
    }

    #[test]
    fn test_block_open_and_print_do_not_overlap() {
        let open = "{! @block content !}";
        let print = "{! @block(content) !}";
        let spaced_print = "{! @block ( content ) !}";

        assert!(BLOCK_OPEN_RE.is_match(open));
        assert!(!BLOCK_PRINT_RE.is_match(open));
        assert!(BLOCK_PRINT_RE.is_match(print));
        assert!(!BLOCK_OPEN_RE.is_match(print));
        assert!(BLOCK_PRINT_RE.is_match(spaced_print));
        assert!(!BLOCK_OPEN_RE.is_match(spaced_print));
    }

    #[test]
    fn test_tokenize_mixed_text() {
        let tokens = tokenize("a {{ x }} b {{{ y }}} c {! z = 1 !}");

        assert_eq!(tokens.len(), 6);
        assert_eq!(tokens[0], Token::Text("a "));
        match &tokens[1] {
            Token::Directive(d) => {
                assert_eq!(d.kind, DirectiveKind::EscapedPrint);
                assert_eq!(d.payload, "x");
            }
            other => panic!("unexpected token {:?}", other),
        }
        match &tokens[3] {
            Token::Directive(d) => assert_eq!(d.kind, DirectiveKind::RawPrint),
            other => panic!("unexpected token {:?}", other),
        }
        match &tokens[5] {
            Token::Directive(d) => {
                assert_eq!(d.kind, DirectiveKind::Statement);
                assert_eq!(d.payload, "z = 1");
            }
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn test_tokenize_keeps_plain_braces_and_unterminated_openers() {
        let tokens = tokenize("function() { return 1 } {{ open");
        assert_eq!(tokens, vec![Token::Text("function() { return 1 } {{ open")]);
    }

    #[test]
    fn test_trace_comment_cannot_close_early() {
        let comment = trace_comment("evil ]==] text !} more");
        assert!(comment.starts_with("{! --[==["));
        assert_eq!(comment.matches("]==]").count(), 1);
        assert_eq!(comment.matches(STATEMENT_CLOSE).count(), 1);
    }
}
