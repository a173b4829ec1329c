//! Interrupt hook shared by every thread of a VM.
//!
//! mlua dispatches a hook to one Lua thread at a time and clears it from any
//! other thread that fires it. The hook is therefore installed once per VM
//! with a swappable [`RunGuard`] slot, and the coroutine library is wrapped so
//! that every switch (`resume`, `wrap`, `close`) moves the hook onto the
//! thread about to run and back onto the caller afterwards.
//!
//! With no guard in the slot the hook does nothing, so code created in one
//! run and resumed in a later one is always checked against the later run's
//! interrupt.

use mlua::{Debug, DebugEvent, HookTriggers, Lua, MultiValue, Value, VmState};
use parking_lot::Mutex;
use runpad_runtime::{Interrupt, InterruptReason};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Instructions between two interrupt polls.
pub const HOOK_INTERVAL: u32 = 1_000;

const COROUTINE_SWITCH: &str = include_str!("../scripts/coroutine.lua");

/// The guard of the active run, if any.
pub(crate) type GuardSlot = Arc<Mutex<Option<Arc<RunGuard>>>>;

/// What the error handler saw for an error that escaped user code.
#[derive(Debug, Clone)]
pub(crate) enum Raised {
    /// String or number error value.
    Message(String),
    /// Error from a Rust callback or the hook.
    Lua(mlua::Error),
    /// `nil`, a boolean, or a value with no `__tostring`.
    Undescribed,
}

/// Per-run interrupt state read by the VM hook.
pub(crate) struct RunGuard {
    interrupt: Interrupt,
    executed: AtomicU64,
    tripped: Mutex<Option<InterruptReason>>,
    raised: Mutex<Option<Raised>>,
}

impl RunGuard {
    pub(crate) fn new(interrupt: Interrupt) -> Self {
        Self {
            interrupt,
            executed: AtomicU64::new(0),
            tripped: Mutex::new(None),
            raised: Mutex::new(None),
        }
    }

    /// Returns the stop reason, latching it on first trip.
    fn poll(&self, counted: bool) -> Option<InterruptReason> {
        let mut tripped = self.tripped.lock();
        if tripped.is_some() {
            return *tripped;
        }

        let executed = if counted {
            self.executed
                .fetch_add(u64::from(HOOK_INTERVAL), Ordering::Relaxed)
                + u64::from(HOOK_INTERVAL)
        } else {
            self.executed.load(Ordering::Relaxed)
        };

        let reason = self.interrupt.check().or_else(|| {
            self.interrupt
                .instruction_budget()
                .filter(|max| executed > *max)
                .map(InterruptReason::InstructionLimit)
        })?;
        *tripped = Some(reason);
        Some(reason)
    }

    pub(crate) fn tripped(&self) -> Option<InterruptReason> {
        *self.tripped.lock()
    }

    pub(crate) fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub(crate) fn record(&self, raised: Raised) {
        *self.raised.lock() = Some(raised);
    }

    pub(crate) fn take_raised(&self) -> Option<Raised> {
        self.raised.lock().take()
    }
}

fn triggers() -> HookTriggers {
    HookTriggers::new()
        .on_calls()
        .every_nth_instruction(HOOK_INTERVAL)
}

fn hook(slot: &GuardSlot) -> impl Fn(&Lua, Debug) -> mlua::Result<VmState> + Send + 'static {
    let slot = Arc::clone(slot);
    move |_lua: &Lua, debug: Debug<'_>| {
        let Some(guard) = slot.lock().clone() else {
            return Ok(VmState::Continue);
        };
        let counted = matches!(debug.event(), DebugEvent::Count);
        match guard.poll(counted) {
            Some(reason) => Err(mlua::Error::RuntimeError(reason.to_string())),
            None => Ok(VmState::Continue),
        }
    }
}

/// Puts the hook back on the main thread.
///
/// A switch that unwound between `enter` and `leave` leaves the hook on a
/// coroutine, so this runs before every top-level entry into the VM.
pub(crate) fn hook_main(lua: &Lua, slot: &GuardSlot) {
    lua.set_hook(triggers(), hook(slot));
}

/// Installs the hook and replaces the coroutine switches.
pub(crate) fn install(lua: &Lua, slot: &GuardSlot) -> mlua::Result<()> {
    hook_main(lua, slot);

    let enter_slot = Arc::clone(slot);
    let enter = lua.create_function(move |_, co: Value| {
        if let Value::Thread(co) = co {
            co.set_hook(triggers(), hook(&enter_slot));
        }
        Ok(())
    })?;

    let leave_slot = Arc::clone(slot);
    let leave = lua.create_function(move |lua, results: MultiValue| {
        lua.current_thread().set_hook(triggers(), hook(&leave_slot));
        Ok(results)
    })?;

    lua.load(COROUTINE_SWITCH)
        .set_name("=coroutine")
        .call::<()>((enter, leave))
}
