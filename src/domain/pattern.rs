// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Pattern specs of the form `[!]/<regex>/[i]`.
//!
//! A leading `!` inverts the match and a trailing `i` makes it
//! case-insensitive. The body is recovered by stripping the decorations in
//! order rather than by parsing a regex with a regex, so the body itself may
//! contain slashes.

use regex::RegexBuilder;

/// Evaluate a pattern spec against the given text.
///
/// The match is a search, not an anchor. A body that fails to compile never
/// matches, regardless of negation; the compile failure is logged once per
/// evaluation.
#[must_use]
pub fn matches(spec: &str, text: &str) -> bool {
    let mut spec = spec.trim();

    let negated = spec.starts_with('!');
    if negated {
        spec = &spec[1..];
    }

    let insensitive = spec.ends_with('i');
    if insensitive {
        spec = &spec[..spec.len() - 1];
    }

    let body = spec.strip_prefix('/').unwrap_or(spec);
    let body = body.strip_suffix('/').unwrap_or(body);

    let regex = match RegexBuilder::new(body).case_insensitive(insensitive).build() {
        Ok(regex) => regex,
        Err(err) => {
            tracing::warn!(pattern = %body, %err, "pattern does not compile, treating as no match");
            return false;
        }
    };

    let found = regex.is_match(text);
    if negated { !found } else { found }
}
