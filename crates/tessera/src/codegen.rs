// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Lua code generation from resolved template text.
//!
//! This is the last compiler pass. Its input holds no extend, include, block
//! or comment directives any more, only literal text, prints and statements.
//!
//! # Generated Code Structure
//!
//! ```lua
//! -- tessera artifact
//! -- Template: pages/home.tpl
//! local __buffer = {}
//! local function __write(value)
//!   __buffer[#__buffer + 1] = value
//! end
//!
//! __write("<h1>")
//! __write(__escape(title))
//! __write("</h1>\n")
//! for _, item in ipairs(items) do
//!   __write(__str(item.html))
//! end
//! return __concat(__buffer)
//! ```
//!
//! `__escape`, `__str`, `__concat` and `__include` are provided by the
//! runtime environment the artifact is evaluated in.

use crate::grammar::{self, DirectiveKind, Token};

/// Header line every artifact starts with.
pub const ARTIFACT_HEADER: &str = "-- tessera artifact";

/// Compiles resolved template text into a Lua artifact.
///
/// # Examples
///
/// ```rust,ignore
/// let lua = compile_expressions("Hello {{ name }}!", "hello.tpl");
/// assert!(lua.contains("__write(__escape(name))"));
/// ```
pub fn compile_expressions(text: &str, template_name: &str) -> String {
    let mut generator = LuaCodeGenerator::new(template_name);
    generator.generate(text)
}

/// Escapes a string for use in a Lua string literal.
pub fn escape_lua_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('\0', "\\0")
}

/// Turns a statement directive payload into a complete Lua statement.
///
/// `@`-keywords are translated to Lua, control openers get their missing
/// `then`/`do`, and any other statement is terminated with `;`.
///
/// | Payload | Result |
/// |---|---|
/// | `@if (x)` | `if (x) then` |
/// | `@foreach _, v in ipairs(t)` | `for _, v in ipairs(t) do` |
/// | `@endif` | `end` |
/// | `y = 1` | `y = 1;` |
pub fn normalize_statement(payload: &str) -> String {
    let payload = payload.trim();
    if payload.is_empty() || payload.starts_with("--") {
        return payload.to_string();
    }

    if let Some(directive) = payload.strip_prefix('@') {
        let (keyword, rest) = split_keyword(directive);
        let rest = rest.trim();
        match keyword {
            "if" | "elseif" => return control_opener(keyword, rest, "then"),
            "for" | "foreach" => return control_opener("for", rest, "do"),
            "while" => return control_opener("while", rest, "do"),
            "else" | "default" => return "else".to_string(),
            "switch" => return format!("repeat local __switch = ({}) if false then", rest),
            "case" => return format!("elseif __switch == ({}) then", rest),
            "break" => return "break".to_string(),
            "endif" | "endfor" | "endforeach" | "endwhile" => return "end".to_string(),
            "endswitch" => return "end until true".to_string(),
            _ => tracing::warn!("Unknown directive keyword '@{}'", keyword),
        }
    }

    let (keyword, rest) = split_keyword(payload);
    match keyword {
        "if" | "elseif" => control_opener(keyword, rest.trim(), "then"),
        "for" | "while" => control_opener(keyword, rest.trim(), "do"),
        _ if payload.ends_with(';') => payload.to_string(),
        _ => format!("{};", payload),
    }
}

fn split_keyword(text: &str) -> (&str, &str) {
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    text.split_at(end)
}

fn control_opener(keyword: &str, condition: &str, terminator: &str) -> String {
    if ends_with_word(condition, terminator) {
        format!("{} {}", keyword, condition)
    } else {
        format!("{} {} {}", keyword, condition, terminator)
    }
}

fn ends_with_word(text: &str, word: &str) -> bool {
    match text.strip_suffix(word) {
        Some(head) => head
            .chars()
            .last()
            .map_or(true, |c| !(c.is_ascii_alphanumeric() || c == '_')),
        None => false,
    }
}

/// Indentation change implied by a statement: (levels closed before, levels opened after).
fn block_delta(statement: &str) -> (usize, usize) {
    let words: Vec<&str> = statement
        .trim_end_matches(';')
        .split(|c: char| c.is_whitespace() || c == ';')
        .filter(|w| !w.is_empty())
        .collect();

    let mut closes: usize = 0;
    let mut opens: usize = 0;
    let mut leading = true;
    for (index, word) in words.iter().enumerate() {
        match *word {
            "end" | "until" if leading => closes += 1,
            "else" | "elseif" if index == 0 => {
                closes += 1;
                if *word == "else" {
                    opens += 1;
                }
                leading = false;
            }
            "then" | "do" | "repeat" | "function" => {
                opens += 1;
                leading = false;
            }
            "end" | "until" => {
                opens = opens.saturating_sub(1);
            }
            _ => leading = false,
        }
    }
    (closes, opens)
}

struct LuaCodeGenerator {
    template_name: String,
    output: String,
    indent_level: usize,
}

impl LuaCodeGenerator {
    fn new(template_name: &str) -> Self {
        Self {
            template_name: template_name.to_string(),
            output: String::new(),
            indent_level: 0,
        }
    }

    fn generate(&mut self, text: &str) -> String {
        self.write_line(ARTIFACT_HEADER);
        self.write_line(&format!("-- Template: {}", self.template_name));
        self.write_line("local __buffer = {}");
        self.write_line("local function __write(value)");
        self.indent();
        self.write_line("__buffer[#__buffer + 1] = value");
        self.dedent();
        self.write_line("end");
        self.write_line("");

        for token in grammar::tokenize(text) {
            match token {
                Token::Text(content) => self.generate_text(content),
                Token::Directive(directive) => match directive.kind {
                    DirectiveKind::EscapedPrint => self.generate_print(&directive.payload, true),
                    DirectiveKind::RawPrint => self.generate_print(&directive.payload, false),
                    _ => self.generate_statement(&directive.payload),
                },
            }
        }

        if self.indent_level > 0 {
            tracing::debug!(
                "Template '{}' leaves {} control block(s) open",
                self.template_name,
                self.indent_level
            );
            self.indent_level = 0;
        }
        self.write_line("return __concat(__buffer)");

        std::mem::take(&mut self.output)
    }

    fn generate_text(&mut self, content: &str) {
        if !content.is_empty() {
            self.write_line(&format!("__write(\"{}\")", escape_lua_string(content)));
        }
    }

    fn generate_print(&mut self, expression: &str, escaped: bool) {
        if expression.is_empty() {
            return;
        }
        if escaped {
            self.write_line(&format!("__write(__escape({}))", expression));
        } else {
            self.write_line(&format!("__write(__str({}))", expression));
        }
    }

    fn generate_statement(&mut self, payload: &str) {
        let statement = normalize_statement(payload);
        if statement.is_empty() {
            return;
        }
        if statement.starts_with("--") {
            self.write_line(&statement);
            return;
        }

        let (closes, opens) = block_delta(&statement);
        self.indent_level = self.indent_level.saturating_sub(closes);
        self.write_line(&statement);
        self.indent_level += opens;
    }

    fn write_line(&mut self, line: &str) {
        if !line.is_empty() {
            for _ in 0..self.indent_level {
                self.output.push_str("  ");
            }
        }
        self.output.push_str(line);
        self.output.push('\n');
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }
}
