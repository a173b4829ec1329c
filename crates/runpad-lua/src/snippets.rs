//! Example programs offered by the editor.

/// A named example program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snippet {
    /// Short lookup key.
    pub key: &'static str,
    /// Display title.
    pub title: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Lua source.
    pub code: &'static str,
}

const SNIPPETS: &[Snippet] = &[
    Snippet {
        key: "hello",
        title: "Hello World",
        description: "Basic print statement",
        code: include_str!("../scripts/snippets/hello_world.lua"),
    },
    Snippet {
        key: "loop",
        title: "For Loop",
        description: "Basic iteration example",
        code: include_str!("../scripts/snippets/for_loop.lua"),
    },
    Snippet {
        key: "fibonacci",
        title: "Fibonacci Sequence",
        description: "Function definition and iteration",
        code: include_str!("../scripts/snippets/fibonacci.lua"),
    },
];

/// All snippets in display order.
#[must_use]
pub fn all() -> &'static [Snippet] {
    SNIPPETS
}

/// Finds a snippet by key or title (case-insensitive).
#[must_use]
pub fn find(name: &str) -> Option<&'static Snippet> {
    let name = name.trim();
    SNIPPETS
        .iter()
        .find(|s| s.key.eq_ignore_ascii_case(name) || s.title.eq_ignore_ascii_case(name))
}
