//! VM construction with a restricted global environment.
//!
//! # Security Model
//!
//! The VM starts from mlua's safe standard library set and then drops the
//! globals that reach outside the process or compile code at runtime:
//!
//! | Removed | Reason |
//! |---------|--------|
//! | `load`, `loadfile`, `dofile` | runtime compilation / file access |
//! | `require`, `package` | module search on disk |
//! | `debug` | hook and upvalue tampering |
//! | `os.execute`, `os.exit`, `os.remove`, `os.rename`, `os.tmpname`, `os.getenv`, `os.setlocale` | process and filesystem access |
//! | `io.*` except `io.write` | file handles |
//!
//! `print` and `io.write` are replaced by functions writing into the
//! runtime's [`OutputSink`] instead of stdout.

use crate::error::LuaError;
use mlua::{Function, Lua, MultiValue, Value};
use parking_lot::Mutex;
use runpad_runtime::OutputChannel;
use std::sync::Arc;

/// Output target shared between the runtime and its Lua closures.
///
/// The engine rebinds the inner channel before and after every run.
pub(crate) type OutputSink = Arc<Mutex<OutputChannel>>;

const REMOVED_GLOBALS: &[&str] = &["load", "loadfile", "dofile", "require", "package", "debug"];

const REMOVED_OS: &[&str] = &[
    "execute",
    "exit",
    "remove",
    "rename",
    "tmpname",
    "getenv",
    "setlocale",
];

/// Creates a sandboxed VM whose output goes to `sink`.
///
/// # Errors
///
/// Returns error if the environment cannot be installed or the memory
/// limit cannot be applied.
pub(crate) fn create_vm(sink: &OutputSink, memory_limit: Option<usize>) -> Result<Lua, LuaError> {
    let lua = Lua::new();

    {
        let globals = lua.globals();
        for name in REMOVED_GLOBALS {
            globals.set(*name, Value::Nil)?;
        }

        if let Ok(os) = globals.get::<mlua::Table>("os") {
            for name in REMOVED_OS {
                os.set(*name, Value::Nil)?;
            }
        }

        let io = lua.create_table()?;
        io.set("write", io_write(&lua, sink)?)?;
        globals.set("io", io)?;
        globals.set("print", print(&lua, sink)?)?;
    }

    if let Some(limit) = memory_limit {
        lua.set_memory_limit(limit)?;
    }

    Ok(lua)
}

/// `print(...)`: each argument as `tostring` would show it, tab-separated,
/// plus newline. Does not read the global `tostring`.
fn print(lua: &Lua, sink: &OutputSink) -> mlua::Result<Function> {
    let sink = Arc::clone(sink);
    lua.create_function(move |_, args: MultiValue| {
        let mut line = String::new();
        for (i, value) in args.iter().enumerate() {
            if i > 0 {
                line.push('\t');
            }
            line.push_str(&display(value)?);
        }
        line.push('\n');
        sink.lock().write(&line);
        Ok(())
    })
}

/// Text for a value as Lua's `tostring` produces it, `__tostring` included.
pub(crate) fn display(value: &Value) -> mlua::Result<String> {
    match value {
        Value::String(s) => Ok(s.to_string_lossy()),
        Value::Number(n) => Ok(format_float(*n)),
        other => other.to_string(),
    }
}

/// `io.write(...)`: strings and numbers, written as-is.
fn io_write(lua: &Lua, sink: &OutputSink) -> mlua::Result<Function> {
    let sink = Arc::clone(sink);
    lua.create_function(move |_, args: MultiValue| {
        let mut text = String::new();
        for (i, value) in args.into_iter().enumerate() {
            match value {
                Value::String(s) => text.push_str(&s.to_string_lossy()),
                Value::Integer(n) => text.push_str(&n.to_string()),
                Value::Number(n) => text.push_str(&format_float(n)),
                other => {
                    return Err(mlua::Error::RuntimeError(format!(
                        "bad argument #{} to 'write' (string expected, got {})",
                        i + 1,
                        other.type_name()
                    )))
                }
            }
        }
        sink.lock().write(&text);
        Ok(())
    })
}

/// Float formatting matching Lua's `tostring` for the common cases.
fn format_float(n: f64) -> String {
    if n.is_finite() && n == n.trunc() && n.abs() < 1e15 {
        format!("{n:.1}")
    } else {
        format!("{n}")
    }
}
