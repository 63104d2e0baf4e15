// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Post-parse cleanup of rule content.
//!
//! Response header directives are written inside rule content (`HEADER:
//! Name: value`) so they survive the lexer untouched; this pass lifts them
//! out of each variant slot into its header map, then trims the leading
//! whitespace that inline specs pick up from the URL parameter.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::rule::Rule;

/// A response-header directive at the head of slot content,
/// e.g. `HEADER: Content-Type: application/json`.
static HEADER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*HEADER:\s*(.+?)\s*:\s*(.*)").unwrap());

/// Adjust every rule in place.
///
/// Content that came from a file keeps its leading whitespace; inline
/// content is left-trimmed on its first line.
pub fn adjust(from_file: bool, rules: &mut [Rule]) {
    for rule in rules {
        for slot in &mut rule.slots {
            while let Some(first) = slot.chunks.first() {
                let Some(caps) = HEADER_LINE_RE.captures(first) else {
                    break;
                };
                slot.headers
                    .insert(caps[1].to_string(), caps[2].to_string());
                slot.chunks.remove(0);
            }

            if !from_file {
                if let Some(first) = slot.chunks.first_mut() {
                    *first = first.trim_start().to_string();
                }
            }
        }
    }
}
