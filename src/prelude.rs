/// Definitions evaluated into the global environment before the REPL starts.
pub const PRELUDE: &str = include_str!("prelude.lisp");

/// Splits source text into top-level forms separated by blank lines.
pub fn chunks(source: &str) -> impl Iterator<Item = &str> {
    source
        .split("\n\n")
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
}
