// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Named block inheritance.
//!
//! Input: text with every extend/embed inlined, so a parent's block
//! definitions appear before the child's redefinitions.
//! Output: text with every block definition removed and every
//! `{! @block(name) !}` replaced by the content that wins for `name`.
//!
//! # Algorithm
//!
//! 1. The document is wrapped in one synthetic block so it can be treated
//!    like any other block.
//! 2. The right-most block whose body holds no further block definitions is
//!    cut out of the text, repeatedly, until only the wrapper is left.
//! 3. The first definition seen for a name is the active one (`Assign`).
//!    Because extraction runs right to left, that is the child's override.
//!    A later-seen definition of the same name is stored as `<name>Super`
//!    (`Inherit`) and is what `{! @super !}` in the override prints.
//! 4. Block prints are expanded, recursively, from the symbol table.
//!
//! Only one level of `@super` is tracked: a third definition of the same name
//! replaces the `<name>Super` entry.

use crate::grammar::{self, BLOCK_CLOSE_RE, BLOCK_OPEN_RE, BLOCK_PRINT_RE, SUPER_RE};
use regex::Captures;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::ops::Range;

/// Suffix of the shadow entry holding overridden content.
pub const SUPER_SUFFIX: &str = "Super";

/// How a block entered the symbol table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// The active definition.
    Assign,
    /// Content overridden by the active definition, reachable through `@super`.
    Inherit,
}

/// A symbol table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block name (`<name>Super` for `Inherit` entries).
    pub name: String,
    /// Block body with `@super` already rewritten into a block print.
    pub content: String,
    /// How the block entered the table.
    pub kind: BlockKind,
}

/// A complete block definition located in the text.
#[derive(Debug)]
struct LocatedBlock {
    name: String,
    span: Range<usize>,
    body: Range<usize>,
}

/// Resolves block definitions and prints.
///
/// The symbol table lives only for the duration of one
/// [`resolve`](Self::resolve) call, so a resolver can be reused freely.
#[derive(Debug, Clone, Copy)]
pub struct BlockResolver {
    debug: bool,
}

impl BlockResolver {
    /// Creates a block resolver.
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    /// Runs block inheritance over `text`.
    pub fn resolve(&self, text: &str) -> String {
        let wrapper = wrapper_name(text);
        let prefix = format!("{} @block {} {}", grammar::STATEMENT_OPEN, wrapper, grammar::STATEMENT_CLOSE);
        let suffix = format!("{} @endblock {}", grammar::STATEMENT_OPEN, grammar::STATEMENT_CLOSE);
        let mut current = format!("{}{}{}", prefix, text, suffix);
        let mut blocks: HashMap<String, Block> = HashMap::new();

        let document = loop {
            let Some(found) = find_last_innermost(&current) else {
                tracing::warn!("Unbalanced block directives, stripping the leftovers");
                break current;
            };

            if found.name == wrapper {
                // Stray @endblock tags in the body must not cut the document short
                break match current.strip_prefix(&prefix).and_then(|rest| rest.strip_suffix(&suffix)) {
                    Some(body) => body.to_string(),
                    None => current[found.body].to_string(),
                };
            }

            let body = current[found.body.clone()].to_string();
            self.define(&mut blocks, found.name.clone(), &body);

            let replacement = if self.debug {
                grammar::trace_comment(&format!("block '{}' defined", found.name))
            } else {
                String::new()
            };
            current.replace_range(found.span, &replacement);
        };

        let mut stack = Vec::new();
        let printed = self.print_blocks(&document, &blocks, &mut stack);
        strip_stray_directives(&printed)
    }

    fn define(&self, blocks: &mut HashMap<String, Block>, name: String, body: &str) {
        let super_name = format!("{}{}", name, SUPER_SUFFIX);
        let content = SUPER_RE
            .replace_all(body, grammar::block_print(&super_name).as_str())
            .into_owned();

        if blocks.contains_key(&name) {
            tracing::trace!("Block '{}' is overridden, kept as '{}'", name, super_name);
            blocks.insert(
                super_name.clone(),
                Block {
                    name: super_name,
                    content,
                    kind: BlockKind::Inherit,
                },
            );
        } else {
            tracing::trace!("Block '{}' defined", name);
            blocks.insert(
                name.clone(),
                Block {
                    name,
                    content,
                    kind: BlockKind::Assign,
                },
            );
        }
    }

    fn print_blocks(&self, text: &str, blocks: &HashMap<String, Block>, stack: &mut Vec<String>) -> String {
        BLOCK_PRINT_RE
            .replace_all(text, |caps: &Captures<'_>| self.expand(&caps[1], blocks, stack))
            .into_owned()
    }

    fn expand(&self, name: &str, blocks: &HashMap<String, Block>, stack: &mut Vec<String>) -> String {
        // A block printing itself (directly or through @super) expands once
        if stack.iter().any(|open| open == name) {
            tracing::debug!("Block '{}' prints itself, recursion cut", name);
            return self.undefined(name);
        }

        match blocks.get(name) {
            Some(block) => {
                stack.push(name.to_string());
                let content = self.print_blocks(&block.content, blocks, stack);
                stack.pop();

                if self.debug {
                    format!("{}{}", grammar::trace_comment(&format!("@block({})", name)), content)
                } else {
                    content
                }
            }
            None => {
                tracing::debug!("Unresolved block reference '{}'", name);
                self.undefined(name)
            }
        }
    }

    fn undefined(&self, name: &str) -> String {
        if self.debug {
            format!("<!-- undefined block: {} -->", name)
        } else {
            String::new()
        }
    }
}

/// Resolves blocks in `text`; see [`BlockResolver`].
pub fn resolve_blocks(text: &str, debug: bool) -> String {
    BlockResolver::new(debug).resolve(text)
}

fn wrapper_name(text: &str) -> String {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    format!("__document_{:016x}", hasher.finish())
}

/// Finds the right-most block definition whose body contains no other definition.
fn find_last_innermost(text: &str) -> Option<LocatedBlock> {
    let opens: Vec<(Range<usize>, String)> = BLOCK_OPEN_RE
        .captures_iter(text)
        .filter_map(|caps| Some((caps.get(0)?.range(), caps[1].to_string())))
        .collect();
    let closes: Vec<Range<usize>> = BLOCK_CLOSE_RE.find_iter(text).map(|m| m.range()).collect();

    for (index, (open, name)) in opens.iter().enumerate().rev() {
        let Some(close) = closes.iter().find(|close| close.start >= open.end) else {
            continue;
        };
        let nested = opens
            .get(index + 1)
            .map_or(false, |(next, _)| next.start < close.start);
        if !nested {
            return Some(LocatedBlock {
                name: name.clone(),
                span: open.start..close.end,
                body: open.end..close.start,
            });
        }
    }
    None
}

fn strip_stray_directives(text: &str) -> String {
    let mut output = text.to_string();
    for pattern in [&*BLOCK_OPEN_RE, &*BLOCK_CLOSE_RE, &*SUPER_RE] {
        if pattern.is_match(&output) {
            tracing::warn!("Stray block directive removed: {}", pattern.as_str());
            output = pattern.replace_all(&output, "").into_owned();
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_with_super() {
        let text = "{! @block X !}A{! @endblock !}\
                    {! @block X !}B{! @super !}C{! @endblock !}\
                    {! @block(X) !}";
        assert_eq!(resolve_blocks(text, false), "BAC");
    }

    #[test]
    fn test_override_without_super_replaces_parent() {
        let text = "<title>{! @block(title) !}</title>\
                    {! @block title !}Default{! @endblock !}\
                    {! @block title !}Home{! @endblock !}";
        assert_eq!(resolve_blocks(text, false), "<title>Home</title>");
    }

    #[test]
    fn test_undefined_block_prints_nothing() {
        assert_eq!(resolve_blocks("[{! @block(missing) !}]", false), "[]");
    }

    #[test]
    fn test_undefined_block_debug_marker() {
        let output = resolve_blocks("[{! @block(missing) !}]", true);
        assert_eq!(output, "[<!-- undefined block: missing -->]");
    }

    #[test]
    fn test_nested_definitions() {
        let text = "{! @block outer !}<div>{! @block inner !}I{! @endblock !}\
                    {! @block(inner) !}</div>{! @endblock !}\
                    {! @block(outer) !}";
        assert_eq!(resolve_blocks(text, false), "<div>I</div>");
    }

    #[test]
    fn test_definitions_leave_no_text_behind() {
        let text = "a{! @block x !}hidden{! @endblock !}b";
        assert_eq!(resolve_blocks(text, false), "ab");
    }

    #[test]
    fn test_super_without_parent_is_empty() {
        let text = "{! @block x !}[{! @super !}]{! @endblock !}{! @block(x) !}";
        assert_eq!(resolve_blocks(text, false), "[]");
    }

    #[test]
    fn test_parent_super_cannot_recurse_forever() {
        let text = "{! @block x !}P{! @super !}{! @endblock !}\
                    {! @block x !}C{! @super !}{! @endblock !}\
                    {! @block(x) !}";
        assert_eq!(resolve_blocks(text, false), "CP");
    }

    #[test]
    fn test_third_definition_replaces_super_entry() {
        let text = "{! @block x !}G{! @endblock !}\
                    {! @block x !}P{! @super !}{! @endblock !}\
                    {! @block x !}C{! @super !}{! @endblock !}\
                    {! @block(x) !}";
        assert_eq!(resolve_blocks(text, false), "CG");
    }

    #[test]
    fn test_resolver_state_does_not_leak_between_calls() {
        let resolver = BlockResolver::new(false);
        let first = resolver.resolve("{! @block a !}one{! @endblock !}{! @block(a) !}");
        let second = resolver.resolve("{! @block(a) !}");

        assert_eq!(first, "one");
        assert_eq!(second, "");
    }

    #[test]
    fn test_unbalanced_tags_do_not_leak() {
        let output = resolve_blocks("x{! @endblock !}y{! @super !}", false);
        assert_eq!(output, "xy");
    }

    #[test]
    fn test_find_last_innermost_prefers_rightmost() {
        let text = "{! @block a !}1{! @endblock !}{! @block b !}2{! @endblock !}";
        let found = find_last_innermost(text).unwrap();
        assert_eq!(found.name, "b");
        assert_eq!(&text[found.body], "2");
    }
}
