// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Placeholder interpolation for spec text.
//!
//! `{name}` resolves from request parameters, `{header.Name}` from headers,
//! and `{json.a.b}` from the JSON body. Interpolation runs over the whole
//! spec before parsing, so file paths, patterns, and status tokens can all
//! be parameterized.
//!
//! A brace only opens a placeholder when it hugs word characters on both
//! sides. `{ "id": 4 }` is therefore plain text: the `{` is followed by a
//! space and the `}` preceded by one, so raw JSON literals pass through
//! without any escaping.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::domain::context::RequestContext;

/// A placeholder site: word characters (and dots) hugged by braces.
static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w[\w.]*\w|\w)\}").unwrap());

/// Substitute every placeholder in `text` from the request context.
///
/// Unresolvable placeholders become the empty string; everything that is
/// not a placeholder site survives unchanged.
#[must_use]
pub fn interpolate(ctx: &RequestContext, text: &str) -> String {
    PLACEHOLDER_RE
        .replace_all(text, |caps: &Captures<'_>| resolve(ctx, &caps[1]))
        .into_owned()
}

fn resolve(ctx: &RequestContext, token: &str) -> String {
    if token == "json" {
        return ctx.json_text("");
    }
    if let Some(path) = token.strip_prefix("json.") {
        return ctx.json_text(path);
    }
    if let Some(name) = token.strip_prefix("header.") {
        return ctx.header(name).unwrap_or_default().to_string();
    }
    ctx.param(token).unwrap_or_default().to_string()
}
