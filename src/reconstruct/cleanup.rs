use std::sync::OnceLock;

use regex::Regex;

fn horizontal_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\S\n]{2,}").expect("static regex"))
}

fn whitespace_before_newline() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*\n").expect("static regex"))
}

fn whitespace_after_newline() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[^\S\n]+").expect("static regex"))
}

/// Normalise concatenated OCR text into newline-delimited lines.
///
/// Runs of spaces/tabs become one space, whitespace around line breaks is
/// dropped (which also folds blank lines), and leading/trailing whitespace
/// including the final newline is removed.
pub fn clean_text(raw: &str) -> String {
    let text = horizontal_runs().replace_all(raw, " ");
    // `\s` also matches `\n`, so consecutive breaks collapse into one.
    let text = whitespace_before_newline().replace_all(&text, "\n");
    let text = whitespace_after_newline().replace_all(&text, "\n");
    text.trim().to_string()
}
