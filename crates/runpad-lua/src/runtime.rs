//! [`Runtime`] implementation backed by a sandboxed Lua 5.4 VM.
//!
//! Global state persists across runs on the same instance, so a session
//! behaves like a REPL: `x = 1` in one run is visible in the next.
//!
//! # Interrupts
//!
//! While a run is active a VM hook fires on every function call and every
//! [`HOOK_INTERVAL`](crate::HOOK_INTERVAL) instructions, on whichever thread is running (see
//! [`crate::hook`]). It polls the [`Interrupt`] and counts instructions
//! against the budget. Once it trips it keeps raising on every later firing,
//! so a `pcall` loop cannot swallow the interrupt and keep going.
//!
//! # Errors
//!
//! User code runs under `xpcall` with a message handler that records the raw
//! error value before it is turned into a string. `error()`, `error(nil)` and
//! error tables without `__tostring` carry no description and surface as
//! [`RuntimeFault::Raised`] with no message.

use crate::error::LuaError;
use crate::hook::{self, GuardSlot, Raised, RunGuard};
use crate::sandbox::{create_vm, display, OutputSink};
use mlua::{Function, Lua, Value};
use parking_lot::Mutex;
use runpad_runtime::{Interrupt, OutputChannel, Runtime, RuntimeFault};
use std::sync::Arc;
use tracing::trace;

/// Chunk name shown in error messages for user code.
const CHUNK_NAME: &str = "=code";

/// Error object Lua leaves behind when an allocation fails.
const MEMORY_ERROR: &str = "not enough memory";

/// Sandboxed Lua interpreter instance.
pub struct LuaRuntime {
    xpcall: Function,
    handler: Function,
    lua: Lua,
    sink: OutputSink,
    slot: GuardSlot,
}

impl std::fmt::Debug for LuaRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaRuntime")
            .field("used_memory", &self.lua.used_memory())
            .finish_non_exhaustive()
    }
}

impl LuaRuntime {
    /// Creates a sandboxed VM with an optional heap cap in bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the VM cannot be set up.
    pub fn new(memory_limit: Option<usize>) -> Result<Self, LuaError> {
        let sink: OutputSink = Arc::new(Mutex::new(OutputChannel::new()));
        let lua = create_vm(&sink, memory_limit)?;
        let slot: GuardSlot = Arc::new(Mutex::new(None));
        hook::install(&lua, &slot)?;
        let xpcall: Function = lua.globals().get("xpcall")?;
        let handler = error_handler(&lua, &slot)?;
        Ok(Self {
            xpcall,
            handler,
            lua,
            sink,
            slot,
        })
    }

    /// Runs trusted setup code (the bootstrap prelude) in this VM.
    ///
    /// The prelude is bound by `interrupt` like user code. Output written by
    /// the prelude is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`LuaError::Prelude`] if the code fails to compile, raises, or
    /// is interrupted.
    pub fn run_prelude(
        &self,
        name: &str,
        source: &str,
        interrupt: &Interrupt,
    ) -> Result<(), LuaError> {
        let guard = Arc::new(RunGuard::new(interrupt.clone()));
        let result = self.guarded(&guard, || self.lua.load(source).set_name(name).exec());
        self.sink.lock().reset();

        if let Some(reason) = guard.tripped() {
            return Err(LuaError::Prelude(reason.to_string()));
        }
        result.map_err(|e| LuaError::Prelude(lua_message(&e)))
    }

    /// Bytes currently allocated by the VM.
    #[must_use]
    pub fn used_memory(&self) -> usize {
        self.lua.used_memory()
    }

    /// Runs `f` with `guard` as the hook's active guard.
    fn guarded<T>(&self, guard: &Arc<RunGuard>, f: impl FnOnce() -> T) -> T {
        hook::hook_main(&self.lua, &self.slot);
        *self.slot.lock() = Some(Arc::clone(guard));
        let out = f();
        *self.slot.lock() = None;
        out
    }
}

impl Runtime for LuaRuntime {
    fn name(&self) -> &str {
        "lua"
    }

    fn bind_output(&mut self, channel: OutputChannel) {
        *self.sink.lock() = channel;
    }

    fn run(&mut self, source: &str, interrupt: &Interrupt) -> Result<(), RuntimeFault> {
        if let Some(reason) = interrupt.check() {
            return Err(RuntimeFault::Interrupted(reason));
        }

        let chunk = self
            .lua
            .load(source)
            .set_name(CHUNK_NAME)
            .into_function()
            .map_err(fault_from_lua)?;

        let guard = Arc::new(RunGuard::new(interrupt.clone()));
        let result = self.guarded(&guard, || {
            self.xpcall
                .call::<(bool, Value)>((chunk, self.handler.clone()))
        });

        trace!(
            executed = guard.executed(),
            memory = self.lua.used_memory(),
            "Lua run finished"
        );

        if let Some(reason) = guard.tripped() {
            return Err(RuntimeFault::Interrupted(reason));
        }
        match result {
            Ok((true, _)) => Ok(()),
            Ok((false, value)) => Err(match guard.take_raised() {
                Some(raised) => fault_from_raised(raised),
                // Lua skips the message handler for allocation failures.
                None => fault_from_unhandled(value),
            }),
            Err(e) => Err(fault_from_lua(e)),
        }
    }
}

/// Message handler passed to `xpcall`; records what was raised.
fn error_handler(lua: &Lua, slot: &GuardSlot) -> mlua::Result<Function> {
    let slot = Arc::clone(slot);
    lua.create_function(move |_, err: Value| {
        let raised = describe(&err);
        if let Some(guard) = slot.lock().as_ref() {
            guard.record(raised);
        }
        Ok(err)
    })
}

fn describe(value: &Value) -> Raised {
    match value {
        Value::String(_) | Value::Integer(_) | Value::Number(_) => {
            display(value).map_or(Raised::Undescribed, Raised::Message)
        }
        Value::Error(err) => Raised::Lua((**err).clone()),
        Value::Table(t) if has_tostring(t) => {
            display(value).map_or(Raised::Undescribed, Raised::Message)
        }
        _ => Raised::Undescribed,
    }
}

fn has_tostring(table: &mlua::Table) -> bool {
    table
        .metatable()
        .is_some_and(|mt| mt.contains_key("__tostring").unwrap_or(false))
}

fn fault_from_raised(raised: Raised) -> RuntimeFault {
    match raised {
        Raised::Message(msg) => {
            let msg = strip_traceback(&msg);
            RuntimeFault::Raised((!msg.is_empty()).then_some(msg))
        }
        Raised::Lua(err) => fault_from_lua(err),
        Raised::Undescribed => RuntimeFault::Raised(None),
    }
}

fn fault_from_unhandled(value: Value) -> RuntimeFault {
    match value {
        Value::String(s) => {
            let msg = s.to_string_lossy();
            if msg == MEMORY_ERROR {
                RuntimeFault::LimitExceeded(msg)
            } else {
                RuntimeFault::Raised(Some(msg))
            }
        }
        Value::Error(err) => fault_from_lua(*err),
        _ => RuntimeFault::Raised(None),
    }
}

/// Maps an mlua error to a runtime fault.
fn fault_from_lua(err: mlua::Error) -> RuntimeFault {
    match err {
        mlua::Error::SyntaxError { message, .. } => RuntimeFault::Syntax(strip_traceback(&message)),
        mlua::Error::MemoryError(msg) if msg.trim().is_empty() => {
            RuntimeFault::LimitExceeded(MEMORY_ERROR.into())
        }
        mlua::Error::MemoryError(msg) => RuntimeFault::LimitExceeded(msg),
        mlua::Error::CallbackError { cause, .. } => fault_from_lua((*cause).clone()),
        other => {
            let msg = lua_message(&other);
            RuntimeFault::Raised((!msg.is_empty()).then_some(msg))
        }
    }
}

/// User-facing message for an mlua error, without traceback.
fn lua_message(err: &mlua::Error) -> String {
    match err {
        mlua::Error::RuntimeError(msg) => strip_traceback(msg),
        mlua::Error::SyntaxError { message, .. } => strip_traceback(message),
        mlua::Error::CallbackError { cause, .. } => lua_message(cause),
        other => strip_traceback(&other.to_string()),
    }
}

fn strip_traceback(msg: &str) -> String {
    let head = msg
        .find("stack traceback:")
        .map_or(msg, |idx| &msg[..idx]);
    head.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedded::{PRELUDE, PRELUDE_NAME};
    use runpad_runtime::InterruptReason;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn runtime() -> (LuaRuntime, OutputChannel) {
        let mut rt = LuaRuntime::new(None).expect("create runtime");
        rt.run_prelude(PRELUDE_NAME, PRELUDE, &Interrupt::default())
            .expect("prelude");
        let out = OutputChannel::new();
        rt.bind_output(out.clone());
        (rt, out)
    }

    fn run(rt: &mut LuaRuntime, source: &str) -> Result<(), RuntimeFault> {
        rt.run(source, &Interrupt::default())
    }

    #[test]
    fn print_hello() {
        let (mut rt, out) = runtime();
        run(&mut rt, "print('Hello, World!')").expect("run");
        assert_eq!(out.drain(), "Hello, World!\n");
    }

    #[test]
    fn empty_source_is_ok() {
        let (mut rt, out) = runtime();
        run(&mut rt, "").expect("run");
        assert_eq!(out.drain(), "");
    }

    #[test]
    fn globals_persist_between_runs() {
        let (mut rt, out) = runtime();
        run(&mut rt, "counter = 41").expect("first run");
        run(&mut rt, "counter = counter + 1 print(counter)").expect("second run");
        assert_eq!(out.drain(), "42\n");
    }

    #[test]
    fn syntax_error_is_reported() {
        let (mut rt, _out) = runtime();
        let err = run(&mut rt, "print('x'").unwrap_err();
        match err {
            RuntimeFault::Syntax(msg) => {
                assert!(!msg.is_empty());
                assert!(msg.contains("code:1"), "unexpected message: {msg}");
            }
            other => panic!("expected syntax fault, got {other:?}"),
        }
    }

    #[test]
    fn runtime_error_has_no_traceback() {
        let (mut rt, _out) = runtime();
        let err = run(&mut rt, "error('boom')").unwrap_err();
        match err {
            RuntimeFault::Raised(Some(msg)) => {
                assert!(msg.ends_with("boom"), "unexpected message: {msg}");
                assert!(!msg.contains("stack traceback"));
            }
            other => panic!("expected raised fault, got {other:?}"),
        }
    }

    #[test]
    fn empty_error_message_has_no_text() {
        let (mut rt, _out) = runtime();
        let err = run(&mut rt, "error('', 0)").unwrap_err();
        assert_eq!(err, RuntimeFault::Raised(None));
    }

    #[test]
    fn error_without_value_has_no_text() {
        let (mut rt, _out) = runtime();
        for code in ["error()", "error(nil)", "error(false)"] {
            assert_eq!(
                run(&mut rt, code).unwrap_err(),
                RuntimeFault::Raised(None),
                "for {code}"
            );
        }
    }

    #[test]
    fn error_table_does_not_leak_address() {
        let (mut rt, _out) = runtime();
        let err = run(&mut rt, "error({code = 1})").unwrap_err();
        assert_eq!(err, RuntimeFault::Raised(None));
    }

    #[test]
    fn error_table_with_tostring_is_described() {
        let (mut rt, _out) = runtime();
        let err = run(
            &mut rt,
            "error(setmetatable({}, { __tostring = function() return 'custom' end }))",
        )
        .unwrap_err();
        assert_eq!(err, RuntimeFault::Raised(Some("custom".into())));
    }

    #[test]
    fn numeric_error_is_a_message() {
        let (mut rt, _out) = runtime();
        let err = run(&mut rt, "error(42)").unwrap_err();
        assert_eq!(err, RuntimeFault::Raised(Some("42".into())));
    }

    #[test]
    fn caught_error_table_keeps_its_value() {
        let (mut rt, out) = runtime();
        run(
            &mut rt,
            "local ok, e = pcall(error, {code = 7}) print(ok, type(e), e.code)",
        )
        .expect("run");
        assert_eq!(out.drain(), "false\ttable\t7\n");
    }

    #[test]
    fn callback_error_keeps_its_message() {
        let (mut rt, _out) = runtime();
        let err = run(&mut rt, "io.write({})").unwrap_err();
        match err {
            RuntimeFault::Raised(Some(msg)) => {
                assert!(msg.contains("bad argument #1 to 'write'"), "got {msg}");
            }
            other => panic!("expected raised fault, got {other:?}"),
        }
    }

    #[test]
    fn output_before_error_is_kept() {
        let (mut rt, out) = runtime();
        let _ = run(&mut rt, "print('partial') error('late')");
        assert_eq!(out.drain(), "partial\n");
    }

    #[test]
    fn instruction_budget_stops_infinite_loop() {
        let (mut rt, _out) = runtime();
        let interrupt = Interrupt::default().with_instruction_budget(10_000);
        let err = rt.run("while true do end", &interrupt).unwrap_err();
        assert_eq!(
            err,
            RuntimeFault::Interrupted(InterruptReason::InstructionLimit(10_000))
        );
    }

    #[test]
    fn pcall_cannot_swallow_interrupt() {
        let (mut rt, _out) = runtime();
        let interrupt = Interrupt::default().with_instruction_budget(50_000);
        let err = rt
            .run(
                "while true do pcall(function() while true do end end) end",
                &interrupt,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeFault::Interrupted(InterruptReason::InstructionLimit(_))
        ));
    }

    #[test]
    fn deadline_stops_infinite_loop() {
        let (mut rt, _out) = runtime();
        let interrupt = Interrupt::default().with_timeout(Duration::from_millis(50));
        let err = rt.run("while true do end", &interrupt).unwrap_err();
        assert!(matches!(
            err,
            RuntimeFault::Interrupted(InterruptReason::Timeout(_))
        ));
    }

    #[test]
    fn coroutine_from_earlier_run_honours_deadline() {
        let (mut rt, out) = runtime();
        run(&mut rt, "co = coroutine.wrap(function() while true do end end)").expect("define");

        let interrupt = Interrupt::default().with_timeout(Duration::from_millis(200));
        let err = rt.run("co()", &interrupt).unwrap_err();
        assert!(matches!(
            err,
            RuntimeFault::Interrupted(InterruptReason::Timeout(_))
        ));

        run(&mut rt, "print('alive')").expect("run after timeout");
        assert_eq!(out.drain(), "alive\n");
    }

    #[test]
    fn suspended_coroutine_from_earlier_run_honours_budget() {
        let (mut rt, _out) = runtime();
        run(
            &mut rt,
            "co = coroutine.create(function() coroutine.yield() while true do end end) \
             coroutine.resume(co)",
        )
        .expect("define");

        let interrupt = Interrupt::default().with_instruction_budget(20_000);
        let err = rt
            .run("while true do coroutine.resume(co) end", &interrupt)
            .unwrap_err();
        assert_eq!(
            err,
            RuntimeFault::Interrupted(InterruptReason::InstructionLimit(20_000))
        );
    }

    #[test]
    fn loop_inside_coroutine_hits_budget() {
        let (mut rt, _out) = runtime();
        let interrupt = Interrupt::default().with_instruction_budget(10_000);
        let err = rt
            .run(
                "coroutine.wrap(function() while true do end end)()",
                &interrupt,
            )
            .unwrap_err();
        assert_eq!(
            err,
            RuntimeFault::Interrupted(InterruptReason::InstructionLimit(10_000))
        );
    }

    #[test]
    fn coroutines_still_behave_like_lua() {
        let (mut rt, out) = runtime();
        run(
            &mut rt,
            r#"
            local gen = coroutine.wrap(function() for i = 1, 3 do coroutine.yield(i) end end)
            print(gen(), gen(), gen())

            local co = coroutine.create(function(a)
                local b = coroutine.yield(a + 1)
                error({code = b})
            end)
            local ok1, v = coroutine.resume(co, 1)
            local ok2, e = coroutine.resume(co, 5)
            print(ok1, v, ok2, type(e), e.code, coroutine.status(co))

            local failing = coroutine.wrap(function() error('inner', 0) end)
            print(pcall(failing))
            print(coroutine.resume(co))
            "#,
        )
        .expect("run");
        assert_eq!(
            out.drain(),
            "1\t2\t3\n\
             true\t2\tfalse\ttable\t5\tdead\n\
             false\tinner\n\
             false\tcannot resume dead coroutine\n"
        );
    }

    #[test]
    fn cancelled_before_start() {
        let (mut rt, out) = runtime();
        let token = CancellationToken::new();
        token.cancel();
        let err = rt.run("print('never')", &Interrupt::new(token)).unwrap_err();
        assert_eq!(err, RuntimeFault::Interrupted(InterruptReason::Cancelled));
        assert_eq!(out.drain(), "");
    }

    #[test]
    fn runtime_usable_after_interrupt() {
        let (mut rt, out) = runtime();
        let interrupt = Interrupt::default().with_instruction_budget(5_000);
        let _ = rt.run("while true do end", &interrupt);
        run(&mut rt, "print('alive')").expect("run after interrupt");
        assert_eq!(out.drain(), "alive\n");
    }

    #[test]
    fn memory_limit_is_a_limit_fault() {
        let mut rt = LuaRuntime::new(Some(4 * 1024 * 1024)).expect("create runtime");
        rt.bind_output(OutputChannel::new());
        let err = rt
            .run(
                "local t = {} for i = 1, 1e8 do t[i] = string.rep('x', 64) .. i end",
                &Interrupt::default(),
            )
            .unwrap_err();
        assert!(matches!(err, RuntimeFault::LimitExceeded(_)), "got {err:?}");
    }

    #[test]
    fn prelude_helpers() {
        let (mut rt, out) = runtime();
        run(
            &mut rt,
            "printf('%d-%s\\n', 7, 'x') print(inspect({1, 2, x = 'y', nested = {}}))",
        )
        .expect("run");
        assert_eq!(out.drain(), "7-x\n{1, 2, nested = {}, x = \"y\"}\n");
    }

    #[test]
    fn inspect_marks_cycles() {
        let (mut rt, out) = runtime();
        run(&mut rt, "local t = {} t.self = t print(inspect(t))").expect("run");
        assert_eq!(out.drain(), "{self = <cycle>}\n");
    }

    #[test]
    fn prelude_failure_is_reported() {
        let rt = LuaRuntime::new(None).expect("create runtime");
        let err = rt
            .run_prelude("=broken", "error('bad prelude', 0)", &Interrupt::default())
            .unwrap_err();
        assert!(matches!(err, LuaError::Prelude(ref msg) if msg == "bad prelude"));
    }

    #[test]
    fn looping_prelude_is_stopped_by_deadline() {
        let rt = LuaRuntime::new(None).expect("create runtime");
        let interrupt = Interrupt::default().with_timeout(Duration::from_millis(50));
        let err = rt
            .run_prelude("=looping", "while true do end", &interrupt)
            .unwrap_err();
        assert!(
            matches!(err, LuaError::Prelude(ref msg) if msg.contains("timed out")),
            "got {err:?}"
        );
    }

    #[test]
    fn strip_traceback_cuts_tail() {
        assert_eq!(
            strip_traceback("code:1: boom\nstack traceback:\n\t[C]: in ?"),
            "code:1: boom"
        );
        assert_eq!(strip_traceback("plain"), "plain");
    }
}
