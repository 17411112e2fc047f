// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Sandboxed Lua execution of compiled artifacts.
//!
//! Every evaluation runs the artifact with its own environment table. Global
//! lookups in that table fall back to the variable context first and to the
//! sandboxed globals second, so template variables read like plain Lua
//! identifiers and assignments made by one template never leak into the next.

use crate::error::{Result, SourceContext, TesseraError};
use mlua::{Function, Lua, LuaSerdeExt, SerializeOptions, Table, Value};
use regex::Regex;
use serde::Serialize;
use std::cell::RefCell;

/// Builds per-evaluation environments. Receives the HTML escaper.
const ENV_FACTORY: &str = r#"
local escape_html = ...
local tostring, concat = tostring, table.concat
local globals = _G

local function str(value)
  if value == nil then
    return ""
  end
  return tostring(value)
end

local function escape(value)
  return escape_html(str(value))
end

return function(vars, include)
  local env = {
    __str = str,
    __escape = escape,
    __concat = concat,
    __include = include,
  }
  return setmetatable(env, {
    __index = function(_, key)
      local value = vars[key]
      if value == nil then
        value = globals[key]
      end
      return value
    end,
  })
end
"#;

/// Encodes the five HTML-unsafe characters.
pub fn escape_html(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// A sandboxed Lua state that evaluates compiled artifacts.
pub struct Runtime {
    lua: Lua,
    env_factory: Function,
}

impl Runtime {
    /// Creates a sandboxed Lua state.
    pub fn new() -> Result<Self> {
        let lua = Lua::new();
        sandbox_lua(&lua, &lua.globals())?;

        let escape = lua.create_function(|_, s: String| Ok(escape_html(&s)))?;
        let env_factory: Function = lua
            .load(ENV_FACTORY)
            .set_name("=tessera:environment")
            .call(escape)?;

        Ok(Self { lua, env_factory })
    }

    /// Converts template variables into a Lua table.
    ///
    /// `None`, unit and JSON `null` become `nil`, so `{{ missing }}` and
    /// `{{ explicitly_null }}` both print nothing.
    ///
    /// # Errors
    ///
    /// Returns [`TesseraError::InvalidContext`] unless `vars` serializes to a
    /// map or struct.
    pub fn to_context<T: Serialize + ?Sized>(&self, vars: &T) -> Result<Table> {
        let options = SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false);
        let value = self.lua.to_value_with(vars, options)?;

        match value {
            Value::Table(table) => {
                if table.metatable() == Some(self.lua.array_metatable()) {
                    return Err(TesseraError::InvalidContext(
                        "variables must be a map, got a sequence".to_string(),
                    ));
                }
                Ok(table)
            }
            Value::Nil => Ok(self.lua.create_table()?),
            other => Err(TesseraError::InvalidContext(format!(
                "variables must be a map, got {}",
                other.type_name()
            ))),
        }
    }

    /// Runs an artifact and returns its output.
    ///
    /// `include` renders a nested template; it backs the `__include` function
    /// that `@include` directives compile to. An error it returns aborts the
    /// artifact and is returned unchanged.
    pub fn execute<F>(&self, template: &str, code: &str, vars: &Table, include: F) -> Result<String>
    where
        F: Fn(&str) -> Result<String>,
    {
        let failure: RefCell<Option<TesseraError>> = RefCell::new(None);

        let result = self.lua.scope(|scope| {
            let include_fn = scope.create_function(|_, name: String| {
                include(&name).map_err(|e| {
                    let message = e.to_string();
                    failure.borrow_mut().get_or_insert(e);
                    mlua::Error::RuntimeError(message)
                })
            })?;

            let env: Table = self.env_factory.call((vars.clone(), include_fn))?;
            self.lua
                .load(code)
                .set_name(format!("@{}", template))
                .set_environment(env)
                .call::<String>(())
        });

        match result {
            Ok(output) => Ok(output),
            Err(e) => match failure.into_inner() {
                Some(nested) => Err(nested),
                None => Err(runtime_error(template, code, e)),
            },
        }
    }
}

/// Removes the libraries a template has no business touching.
fn sandbox_lua(lua: &Lua, globals: &Table) -> Result<()> {
    let os_table: Table = globals.get("os")?;
    let os_date: Function = os_table.get("date")?;
    let os_time: Function = os_table.get("time")?;
    let os_clock: Function = os_table.get("clock")?;
    let os_difftime: Function = os_table.get("difftime")?;

    globals.set("io", Value::Nil)?;
    globals.set("debug", Value::Nil)?;
    globals.set("load", Value::Nil)?;
    globals.set("loadstring", Value::Nil)?;
    globals.set("loadfile", Value::Nil)?;
    globals.set("dofile", Value::Nil)?;
    globals.set("require", Value::Nil)?;
    globals.set("package", Value::Nil)?;

    let safe_os = lua.create_table()?;
    safe_os.set("date", os_date)?;
    safe_os.set("time", os_time)?;
    safe_os.set("clock", os_clock)?;
    safe_os.set("difftime", os_difftime)?;
    globals.set("os", safe_os)?;

    Ok(())
}

fn runtime_error(template: &str, code: &str, error: mlua::Error) -> TesseraError {
    let message = match &error {
        mlua::Error::RuntimeError(message) => message.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    };
    let source_context = error_line(template, &message).map(|line| SourceContext::from_source(code, line));

    TesseraError::TemplateRuntimeError {
        template: template.to_string(),
        message,
        source_context,
    }
}

/// Extracts the artifact line from a Lua error message (`name:LINE: ...`).
fn error_line(template: &str, message: &str) -> Option<usize> {
    let pattern = Regex::new(&format!(r"{}:(\d+):", regex::escape(template))).ok()?;
    pattern.captures(message)?.get(1)?.as_str().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn no_include(name: &str) -> Result<String> {
        Err(TesseraError::TemplateNotFound {
            name: name.to_string(),
            path: String::new(),
        })
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">'&'</a>"#), "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;");
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_variables_and_globals_resolve() {
        let runtime = Runtime::new().unwrap();
        let vars = runtime.to_context(&json!({ "name": "Ada", "items": [1, 2, 3] })).unwrap();

        let output = runtime
            .execute("t.tpl", "return __escape(name) .. #items .. string.upper('x')", &vars, no_include)
            .unwrap();
        assert_eq!(output, "Ada3X");
    }

    #[test]
    fn test_helpers_survive_shadowing_variables() {
        let runtime = Runtime::new().unwrap();
        let vars = runtime.to_context(&json!({ "table": "t", "tostring": 1 })).unwrap();

        let output = runtime
            .execute("t.tpl", "return __concat({ __str(table), __str(nil), __escape('<') })", &vars, no_include)
            .unwrap();
        assert_eq!(output, "t&lt;");
    }

    #[test]
    fn test_null_becomes_nil() {
        let runtime = Runtime::new().unwrap();
        let vars = runtime.to_context(&json!({ "gone": null })).unwrap();

        let output = runtime
            .execute("t.tpl", "return tostring(gone == nil)", &vars, no_include)
            .unwrap();
        assert_eq!(output, "true");
    }

    #[test]
    fn test_non_map_context_is_rejected() {
        let runtime = Runtime::new().unwrap();

        assert!(matches!(runtime.to_context(&json!([1, 2])), Err(TesseraError::InvalidContext(_))));
        assert!(matches!(runtime.to_context(&json!("text")), Err(TesseraError::InvalidContext(_))));
        assert!(runtime.to_context(&json!({})).is_ok());
    }

    #[test]
    fn test_sandbox() {
        let runtime = Runtime::new().unwrap();
        let vars = runtime.to_context(&json!({})).unwrap();

        let output = runtime
            .execute(
                "t.tpl",
                "return tostring(io == nil and load == nil and os.execute == nil and os.time ~= nil)",
                &vars,
                no_include,
            )
            .unwrap();
        assert_eq!(output, "true");
    }

    #[test]
    fn test_assignments_stay_in_one_evaluation() {
        let runtime = Runtime::new().unwrap();
        let vars = runtime.to_context(&json!({})).unwrap();

        runtime.execute("a.tpl", "leaked = 'yes' return ''", &vars, no_include).unwrap();
        let output = runtime
            .execute("b.tpl", "return tostring(leaked)", &vars, no_include)
            .unwrap();
        assert_eq!(output, "nil");
    }

    #[test]
    fn test_include_callback() {
        let runtime = Runtime::new().unwrap();
        let vars = runtime.to_context(&json!({})).unwrap();

        let output = runtime
            .execute("t.tpl", "return '[' .. __include('nav.tpl') .. ']'", &vars, |name: &str| {
                Ok(format!("<{}>", name))
            })
            .unwrap();
        assert_eq!(output, "[<nav.tpl>]");
    }

    #[test]
    fn test_include_error_is_returned_typed() {
        let runtime = Runtime::new().unwrap();
        let vars = runtime.to_context(&json!({})).unwrap();

        let result = runtime.execute("t.tpl", "return __include('gone.tpl')", &vars, no_include);
        match result {
            Err(TesseraError::TemplateNotFound { name, .. }) => assert_eq!(name, "gone.tpl"),
            other => panic!("Expected TemplateNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_runtime_error_carries_snippet() {
        let runtime = Runtime::new().unwrap();
        let vars = runtime.to_context(&json!({})).unwrap();
        let code = "local a = 1\nlocal b = 2\nlocal c = missing.field\nreturn ''";

        match runtime.execute("pages/broken.tpl", code, &vars, no_include) {
            Err(TesseraError::TemplateRuntimeError {
                template,
                message,
                source_context,
            }) => {
                assert_eq!(template, "pages/broken.tpl");
                assert!(message.contains("attempt to index"), "unexpected message: {}", message);
                let context = source_context.expect("line number should be found");
                assert_eq!(context.error_line, 3);
                assert!(context.format_snippet().contains(">   3 | local c = missing.field"));
            }
            other => panic!("Expected TemplateRuntimeError, got {:?}", other),
        }
    }
}
