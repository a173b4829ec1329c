//! Test doubles for the execution core.
//!
//! [`FakeRuntime`] understands a tiny line-oriented language so tests can
//! drive every fault path without a real interpreter:
//!
//! | Line | Effect |
//! |------|--------|
//! | `print('text')` | writes `text\n` |
//! | `write('text')` | writes `text` |
//! | `error('msg')` | raises with message |
//! | `error()` | raises without message |
//! | `spin` | loops until interrupted |
//! | `panic` | panics |
//! | `oom` | reports a memory limit fault |
//! | blank / `-- comment` | ignored |
//!
//! Anything else is a syntax error.
//!
//! [`FakeProvider`] and [`FakeFactory`] count invocations and can be told to
//! fail, so loader tests can assert single-flight and retry behaviour.

use crate::error::BootstrapError;
use crate::handle::{Interrupt, InterruptReason, Runtime, RuntimeFault};
use crate::output::OutputChannel;
use crate::provider::{FactoryRegistry, RuntimeFactory, RuntimeProvider};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Scriptable in-memory runtime.
#[derive(Debug, Default)]
pub struct FakeRuntime {
    output: OutputChannel,
    runs: usize,
}

impl FakeRuntime {
    /// Creates a runtime with no output bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed or failed runs.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs
    }

    fn run_line(&self, line: &str, interrupt: &Interrupt) -> Result<(), RuntimeFault> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("--") {
            return Ok(());
        }
        if let Some(text) = call_arg(line, "print") {
            self.output.write(text);
            self.output.write("\n");
            return Ok(());
        }
        if let Some(text) = call_arg(line, "write") {
            self.output.write(text);
            return Ok(());
        }
        if line == "error()" {
            return Err(RuntimeFault::Raised(None));
        }
        if let Some(msg) = call_arg(line, "error") {
            return Err(RuntimeFault::Raised(Some(msg.to_string())));
        }
        match line {
            "spin" => spin(interrupt),
            "panic" => panic!("fake runtime panic"),
            "oom" => Err(RuntimeFault::LimitExceeded("not enough memory".into())),
            _ => Err(RuntimeFault::Syntax(format!(
                "syntax error near '{line}'"
            ))),
        }
    }
}

impl Runtime for FakeRuntime {
    fn name(&self) -> &str {
        "fake"
    }

    fn bind_output(&mut self, channel: OutputChannel) {
        self.output = channel;
    }

    fn run(&mut self, source: &str, interrupt: &Interrupt) -> Result<(), RuntimeFault> {
        self.runs += 1;
        for line in source.lines() {
            self.run_line(line, interrupt)?;
        }
        Ok(())
    }
}

/// Extracts `text` from `name('text')` or `name("text")`.
fn call_arg<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(name)?.strip_prefix('(')?.strip_suffix(')')?;
    let quoted = rest
        .strip_prefix('\'')
        .and_then(|r| r.strip_suffix('\''))
        .or_else(|| rest.strip_prefix('"').and_then(|r| r.strip_suffix('"')))?;
    Some(quoted)
}

fn spin(interrupt: &Interrupt) -> Result<(), RuntimeFault> {
    let mut steps: u64 = 0;
    loop {
        steps += 1;
        if let Some(max) = interrupt.instruction_budget() {
            if steps > max {
                return Err(RuntimeFault::Interrupted(InterruptReason::InstructionLimit(
                    max,
                )));
            }
        }
        if let Some(reason) = interrupt.check() {
            return Err(RuntimeFault::Interrupted(reason));
        }
        std::thread::yield_now();
    }
}

/// Factory producing [`FakeRuntime`]s.
#[derive(Debug, Default)]
pub struct FakeFactory {
    calls: AtomicUsize,
    failures: AtomicUsize,
    panic: AtomicBool,
}

impl FakeFactory {
    /// Number of `instantiate` calls.
    #[must_use]
    pub fn instantiate_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Makes the next `n` instantiations fail.
    pub fn fail_next_instantiations(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Makes every instantiation panic.
    pub fn panic_on_instantiate(&self) {
        self.panic.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl RuntimeFactory for FakeFactory {
    async fn instantiate(&self) -> Result<Box<dyn Runtime>, BootstrapError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic.load(Ordering::SeqCst) {
            panic!("fake factory panic");
        }
        if take_one(&self.failures) {
            return Err(BootstrapError::Instantiation(
                "fake factory refused to start".into(),
            ));
        }
        Ok(Box::new(FakeRuntime::new()))
    }
}

/// Releases a gated [`FakeProvider`] bootstrap.
#[derive(Debug, Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    /// Lets every pending and future bootstrap proceed.
    pub fn open(&self) {
        self.permits.add_permits(1024);
    }
}

/// Provider whose bootstrap "artifact" registers a [`FakeFactory`].
#[derive(Debug)]
pub struct FakeProvider {
    registry: FactoryRegistry,
    factory: Arc<FakeFactory>,
    inject_calls: AtomicUsize,
    inject_failures: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl FakeProvider {
    /// Creates a provider that bootstraps immediately.
    #[must_use]
    pub fn new() -> (Self, Arc<FakeFactory>) {
        let provider = Self::build(None);
        let factory = provider.factory();
        (provider, factory)
    }

    /// Creates a provider whose bootstrap waits until the gate opens.
    #[must_use]
    pub fn gated() -> (Self, Gate) {
        let permits = Arc::new(Semaphore::new(0));
        let provider = Self::build(Some(Arc::clone(&permits)));
        (provider, Gate { permits })
    }

    fn build(gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            registry: FactoryRegistry::new(),
            factory: Arc::new(FakeFactory::default()),
            inject_calls: AtomicUsize::new(0),
            inject_failures: AtomicUsize::new(0),
            gate,
        }
    }

    /// The factory this provider registers.
    #[must_use]
    pub fn factory(&self) -> Arc<FakeFactory> {
        Arc::clone(&self.factory)
    }

    /// The host registry.
    #[must_use]
    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }

    /// Number of `inject_bootstrap` calls.
    #[must_use]
    pub fn inject_calls(&self) -> usize {
        self.inject_calls.load(Ordering::SeqCst)
    }

    /// Makes the next `n` injections fail.
    pub fn fail_next_injections(&self, n: usize) {
        self.inject_failures.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl RuntimeProvider for FakeProvider {
    fn registered_factory(&self) -> Option<Arc<dyn RuntimeFactory>> {
        self.registry.get()
    }

    async fn inject_bootstrap(&self) -> Result<Arc<dyn RuntimeFactory>, BootstrapError> {
        self.inject_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| BootstrapError::unreachable("fake://gate", e))?;
            permit.forget();
        }
        if take_one(&self.inject_failures) {
            return Err(BootstrapError::unreachable(
                "fake://bootstrap",
                "simulated network failure",
            ));
        }
        let factory: Arc<dyn RuntimeFactory> = self.factory();
        self.registry.register(Arc::clone(&factory));
        Ok(factory)
    }
}

/// Decrements `counter` if positive; returns whether it did.
fn take_one(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}
