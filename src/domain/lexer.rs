// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Lexer/normalizer for response spec text.
//!
//! Inline specs pack several rules onto one physical line using the
//! separators `|`, `@`, and `>`. Normalization rewrites a separator as a
//! newline when it introduces a rule keyword, then splits the text into
//! logical lines with their trailing newlines preserved.

use std::sync::LazyLock;

use regex::Regex;

/// A single leading separator, optionally surrounded by whitespace.
static LEADING_SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*[|@>]\s*(.*)$").unwrap());

/// A separator immediately preceding a rule-introducing keyword.
static KEYWORD_SEPARATOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[|@>]\s*((?:HEADER|PATH|PARAM|JSON|BODY|text|file):)").unwrap()
});

/// Split spec text into logical lines.
///
/// Separators not followed by a keyword are left untouched, so `|` inside
/// response content survives. The leading separator, if any, is dropped
/// first so the rewrite does not create a spurious blank opening line.
#[must_use]
pub fn lines(text: &str) -> Vec<String> {
    let text = LEADING_SEPARATOR_RE
        .captures(text)
        .map_or_else(|| text.to_string(), |caps| caps[1].to_string());

    let text = KEYWORD_SEPARATOR_RE.replace_all(&text, "\n$1");

    text.split_inclusive('\n').map(String::from).collect()
}
