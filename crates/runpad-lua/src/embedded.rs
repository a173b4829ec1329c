//! Scripts compiled into the binary.

/// Default bootstrap prelude (`printf`, `inspect`).
pub const PRELUDE: &str = include_str!("../scripts/prelude.lua");

/// Chunk name used in error messages for the embedded prelude.
pub const PRELUDE_NAME: &str = "=prelude";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prelude_defines_helpers() {
        assert!(PRELUDE.contains("function printf"));
        assert!(PRELUDE.contains("function inspect"));
    }
}
