//! Editor input parsing.
//!
//! Every line that does not start with `:` is source text for the buffer.
//! Lines starting with `::` are source too, so goto labels can be typed.

use std::path::PathBuf;

/// A parsed editor line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    /// Source text to append, kept verbatim.
    Code(String),
    Run,
    Clear,
    Show,
    /// Save the buffer; `None` uses the configured download name.
    Save(Option<PathBuf>),
    Load(PathBuf),
    Example(String),
    Examples,
    Status,
    Reset,
    Help,
    Quit,
    /// A `:` command that could not be parsed, with the reason.
    Invalid(String),
}

impl ReplCommand {
    /// Parses one line of editor input.
    ///
    /// | Input | Command |
    /// |-------|---------|
    /// | anything not starting with `:` | `Code` |
    /// | `::label::` | `Code` |
    /// | `:run` | `Run` |
    /// | `:clear` | `Clear` |
    /// | `:show` | `Show` |
    /// | `:save [PATH]` | `Save` |
    /// | `:load PATH` | `Load` |
    /// | `:example NAME` | `Example` |
    /// | `:examples` | `Examples` |
    /// | `:status` | `Status` |
    /// | `:reset` | `Reset` |
    /// | `:help`, `:h`, `:?` | `Help` |
    /// | `:quit`, `:q`, `:exit` | `Quit` |
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.starts_with("::") {
            return Self::Code(line.to_string());
        }
        let Some(rest) = trimmed.strip_prefix(':') else {
            return Self::Code(line.to_string());
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim()).filter(|a| !a.is_empty())),
            None => (rest, None),
        };

        match (name.to_ascii_lowercase().as_str(), arg) {
            ("run", None) => Self::Run,
            ("clear", None) => Self::Clear,
            ("show", None) => Self::Show,
            ("save", path) => Self::Save(path.map(PathBuf::from)),
            ("load", Some(path)) => Self::Load(PathBuf::from(path)),
            ("load", None) => Self::Invalid(":load needs a file path".into()),
            ("example", Some(name)) => Self::Example(name.to_string()),
            ("example", None) => Self::Invalid(":example needs a snippet name".into()),
            ("examples", None) => Self::Examples,
            ("status", None) => Self::Status,
            ("reset", None) => Self::Reset,
            ("help" | "h" | "?", None) => Self::Help,
            ("quit" | "q" | "exit", None) => Self::Quit,
            (
                "run" | "clear" | "show" | "examples" | "status" | "reset" | "help" | "h" | "?"
                | "quit" | "q" | "exit",
                Some(_),
            ) => Self::Invalid(format!(":{name} takes no arguments")),
            _ => Self::Invalid(format!("unknown command ':{name}' (try :help)")),
        }
    }
}

/// Help text for `:help`.
pub const HELP: &str = "\
Lines you type are appended to the buffer. Commands:
  :run            execute the buffer
  :show           print the buffer with line numbers
  :clear          reset the buffer to the template
  :save [PATH]    write the buffer to a file
  :load PATH      replace the buffer with a file
  :examples       list example programs
  :example NAME   load an example into the buffer
  :status         show interpreter state
  :reset          discard the interpreter and its globals
  :help           show this help
  :quit           exit";
