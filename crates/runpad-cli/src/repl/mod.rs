//! Interactive editor.
//!
//! rustyline runs on a dedicated OS thread and forwards lines to the async
//! loop over a channel, so the prompt keeps working while code executes.
//! Lines typed during a run are queued and handled afterwards; Ctrl+C during
//! a run cancels it. A Ctrl+C signal while idle (stdin is not a terminal, so
//! no line editor sees the key) ends the session.

mod command;

pub use command::{ReplCommand, HELP};

use crate::buffer::SourceBuffer;
use crate::commands::failure_line;
use crate::ctrl_c::CtrlC;
use crate::printer::{PrintResult, SharedPrinterSlot};
use runpad_lua::snippets;
use runpad_runtime::config::{EditorConfig, RunpadConfig};
use runpad_runtime::{ExecutionResult, LoadState, Playground};
use rustyline::ExternalPrinter;
use std::collections::VecDeque;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

const PROMPT: &str = "lua> ";

/// Event sent from the readline thread to the async loop.
#[derive(Debug)]
enum ReadlineEvent {
    Line(String),
    /// Ctrl+C at the prompt.
    Interrupted,
    /// Ctrl+D, end of piped input, or a terminal error.
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Exit,
}

/// Interactive session state.
pub struct Repl {
    playground: Playground,
    buffer: SourceBuffer,
    editor: EditorConfig,
    preload: bool,
    printer: SharedPrinterSlot,
    ctrl_c: CtrlC,
    /// Lines received while a run was in progress.
    pending: VecDeque<String>,
    events_open: bool,
}

impl Repl {
    pub fn new(
        playground: Playground,
        config: &RunpadConfig,
        printer: SharedPrinterSlot,
        ctrl_c: CtrlC,
    ) -> Self {
        Self {
            playground,
            buffer: SourceBuffer::new(),
            editor: config.editor.clone(),
            preload: config.runtime.preload,
            printer,
            ctrl_c,
            pending: VecDeque::new(),
            events_open: true,
        }
    }

    /// Runs until `:quit` or end of input.
    pub async fn run(mut self) {
        self.say(&format!("runpad v{}", env!("CARGO_PKG_VERSION")));
        self.say("Type :help for commands.");

        if self.preload {
            let playground = self.playground.clone();
            tokio::spawn(async move {
                if let Err(e) = playground.preload().await {
                    tracing::warn!(error = %e, "Interpreter preload failed");
                }
            });
        }

        let interactive = std::io::stdin().is_terminal();
        let (mut events, printer) =
            spawn_readline_thread(self.editor.history_file_or_default(), interactive);
        if let Some(p) = printer {
            self.printer.set(p);
        }

        loop {
            let line = match self.pending.pop_front() {
                Some(line) => line,
                None if !self.events_open => break,
                None => tokio::select! {
                    event = events.recv() => match event {
                        Some(ReadlineEvent::Line(line)) => line,
                        Some(ReadlineEvent::Interrupted) => continue,
                        Some(ReadlineEvent::Eof) | None => break,
                    },
                    () = self.ctrl_c.pressed() => {
                        tracing::debug!("Ctrl+C while idle, ending session");
                        break;
                    }
                },
            };

            if self.handle_line(&line, &mut events).await == LoopControl::Exit {
                break;
            }
        }

        self.printer.clear();
        tracing::debug!("Interactive session ended");
    }

    async fn handle_line(
        &mut self,
        line: &str,
        events: &mut UnboundedReceiver<ReadlineEvent>,
    ) -> LoopControl {
        match ReplCommand::parse(line) {
            ReplCommand::Code(text) => self.buffer.push_line(&text),
            ReplCommand::Run => self.run_buffer(events).await,
            ReplCommand::Clear => {
                self.buffer.clear();
                self.say("Buffer cleared.");
            }
            ReplCommand::Show => {
                let numbered = self.buffer.numbered();
                self.say(&numbered);
            }
            ReplCommand::Save(path) => {
                let path = path.unwrap_or_else(|| PathBuf::from(&self.editor.download_name));
                match self.buffer.save(&path) {
                    Ok(()) => self.say(&format!("Saved to {}", path.display())),
                    Err(e) => self.say(&format!("Error: {e}")),
                }
            }
            ReplCommand::Load(path) => match self.buffer.load(&path) {
                Ok(()) => self.say(&format!(
                    "Loaded {} ({} lines)",
                    path.display(),
                    self.buffer.line_count()
                )),
                Err(e) => self.say(&format!("Error: {e}")),
            },
            ReplCommand::Example(name) => match snippets::find(&name) {
                Some(snippet) => {
                    self.buffer.set(snippet.code);
                    self.say(&format!("Loaded example: {}", snippet.title));
                }
                None => self.say(&format!("Unknown example '{name}'. Try :examples.")),
            },
            ReplCommand::Examples => {
                let listing = crate::commands::list_examples();
                self.say(&listing);
            }
            ReplCommand::Status => {
                let status = self.status();
                self.say(&status);
            }
            ReplCommand::Reset => {
                if self.playground.reset_runtime() {
                    self.say("Interpreter discarded; the next :run starts fresh.");
                } else {
                    self.say("No interpreter loaded.");
                }
            }
            ReplCommand::Help => self.say(HELP),
            ReplCommand::Quit => {
                tracing::debug!("Quit requested");
                return LoopControl::Exit;
            }
            ReplCommand::Invalid(reason) => self.say(&reason),
        }
        LoopControl::Continue
    }

    async fn run_buffer(&mut self, events: &mut UnboundedReceiver<ReadlineEvent>) {
        if self.playground.state() != LoadState::Ready {
            self.say("Loading interpreter...");
        }

        let source = self.buffer.text().to_string();
        let playground = self.playground.clone();
        let cancel = CancellationToken::new();
        let run = playground.execute_code_with_cancel(&source, cancel.clone());
        tokio::pin!(run);

        let result = loop {
            tokio::select! {
                result = &mut run => break result,
                () = self.ctrl_c.pressed() => cancel.cancel(),
                event = events.recv(), if self.events_open => match event {
                    Some(ReadlineEvent::Line(line)) => self.pending.push_back(line),
                    Some(ReadlineEvent::Interrupted) => cancel.cancel(),
                    Some(ReadlineEvent::Eof) | None => self.events_open = false,
                },
            }
        };

        self.report(&result);
    }

    fn report(&self, result: &ExecutionResult) {
        let output = result.output();
        if !output.is_empty() {
            self.say(output);
        }
        match failure_line(result) {
            Some(line) => self.say(&line),
            None if output.is_empty() => self.say("Code executed successfully (no output)"),
            None => {}
        }
    }

    fn status(&self) -> String {
        let loader = self.playground.loader();
        let mut lines = vec![match loader.handle() {
            Some(handle) => format!("interpreter: {} ({})", loader.state(), handle.name()),
            None => format!("interpreter: {}", loader.state()),
        }];
        lines.push(format!("load attempts: {}", loader.attempts()));
        if let Some(err) = loader.last_error() {
            lines.push(format!("last error: {err}"));
        }
        if self.buffer.is_template() {
            lines.push("buffer: template only".to_string());
        } else {
            lines.push(format!("buffer: {} lines", self.buffer.line_count()));
        }
        lines.join("\n")
    }

    /// Prints above the prompt when a printer is installed, else to stdout.
    fn say(&self, text: &str) {
        let mut msg = text.to_string();
        if !msg.ends_with('\n') {
            msg.push('\n');
        }
        match self.printer.try_print(msg.clone()) {
            PrintResult::Sent => {}
            PrintResult::NoPrinter | PrintResult::Dropped => {
                let mut stdout = std::io::stdout().lock();
                let _ = stdout.write_all(msg.as_bytes());
                let _ = stdout.flush();
            }
        }
    }
}

/// Starts the readline thread.
///
/// Returns the event channel and, for a real terminal, an external printer
/// for output produced while the prompt is showing.
fn spawn_readline_thread(
    history_path: PathBuf,
    interactive: bool,
) -> (
    UnboundedReceiver<ReadlineEvent>,
    Option<Box<dyn ExternalPrinter + Send>>,
) {
    let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
    let (printer_tx, printer_rx) =
        std::sync::mpsc::sync_channel::<Option<Box<dyn ExternalPrinter + Send>>>(1);

    if let Err(e) = std::thread::Builder::new()
        .name("runpad-readline".into())
        .spawn(move || {
            let config = rustyline::Config::builder().auto_add_history(true).build();
            let mut rl = match rustyline::DefaultEditor::with_config(config) {
                Ok(editor) => editor,
                Err(e) => {
                    tracing::error!("Failed to create line editor: {e}");
                    let _ = printer_tx.send(None);
                    let _ = event_tx.send(ReadlineEvent::Eof);
                    return;
                }
            };

            if let Err(e) = rl.load_history(&history_path) {
                tracing::debug!("History load: {e} (expected on first run)");
            }

            let printer = if interactive {
                rl.create_external_printer()
                    .ok()
                    .map(|p| Box::new(p) as Box<dyn ExternalPrinter + Send>)
            } else {
                None
            };
            let _ = printer_tx.send(printer);

            loop {
                match rl.readline(PROMPT) {
                    Ok(line) => {
                        if interactive {
                            let _ = rl.save_history(&history_path);
                        }
                        if event_tx.send(ReadlineEvent::Line(line)).is_err() {
                            break;
                        }
                    }
                    Err(rustyline::error::ReadlineError::Interrupted) => {
                        if event_tx.send(ReadlineEvent::Interrupted).is_err() {
                            break;
                        }
                    }
                    Err(rustyline::error::ReadlineError::Eof) => {
                        let _ = event_tx.send(ReadlineEvent::Eof);
                        break;
                    }
                    Err(e) => {
                        tracing::error!("Readline error: {e}");
                        let _ = event_tx.send(ReadlineEvent::Eof);
                        break;
                    }
                }
            }
        })
    {
        tracing::error!("Failed to spawn readline thread: {e}");
    }

    let printer = printer_rx.recv().ok().flatten();
    (event_rx, printer)
}
