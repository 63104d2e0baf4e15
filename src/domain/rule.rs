// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Rule model produced by the response parser.
//!
//! A rule pairs an optional selector predicate with response metadata
//! (status, delay, `after` gate) and one or more variant slots of content.
//! Multiple slots implement sequenced (round-robin) responses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::context::RequestContext;
use crate::domain::pattern;

/// What part of the request a selector inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorKind {
    /// The request URL path.
    Path,
    /// A named request header.
    Header,
    /// A named query or path parameter.
    Param,
    /// A dotted path into the JSON request body.
    Json,
    /// The raw request body text.
    Body,
}

impl SelectorKind {
    /// Spec-language keyword for this selector, also used in counter keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Path => "PATH",
            Self::Header => "HEADER",
            Self::Param => "PARAM",
            Self::Json => "JSON",
            Self::Body => "BODY",
        }
    }
}

/// Predicate attached to a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    /// Which request attribute supplies the match text.
    pub kind: SelectorKind,
    /// Header/parameter name or JSON dotted path; empty for PATH and BODY.
    pub target: String,
    /// Pattern spec string, e.g. `!/blue/i`.
    pub pattern: String,
}

/// Whether a piece of content is inline text or a file reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocationKind {
    /// Inline text content.
    Text,
    /// Path of a file under the responses directory.
    File,
}

/// One entry in a rule's round-robin cycle.
///
/// `locations` describes the kind of each declared content location. Chunks
/// are line-granular: continuation lines append chunks without appending
/// locations, so the trailing text location owns every remaining chunk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSlot {
    /// Declared content locations, in order.
    pub locations: Vec<LocationKind>,
    /// Raw content pieces, parallel to `locations` plus continuations.
    pub chunks: Vec<String>,
    /// Response header overrides declared for this slot.
    pub headers: HashMap<String, String>,
}

impl VariantSlot {
    /// Slot seeded with a single location and its initial content.
    #[must_use]
    pub fn seeded(location: LocationKind, chunk: String) -> Self {
        Self {
            locations: vec![location],
            chunks: vec![chunk],
            headers: HashMap::new(),
        }
    }

    /// True when the slot holds any non-empty content.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.chunks.iter().all(String::is_empty)
    }
}

/// A parsed rule: optional selector, metadata, and variant slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Origin of the rule: empty for inline specs, else the file path.
    pub source: String,
    /// Optional predicate; `None` matches unconditionally.
    pub selector: Option<Selector>,
    /// HTTP status to respond with.
    pub status: u16,
    /// Milliseconds to sleep before responding.
    pub delay_ms: u64,
    /// Rule is inert until this many milliseconds have passed since reset.
    pub after_ms: u64,
    /// Variant slots; more than one means sequenced content.
    pub slots: Vec<VariantSlot>,
}

impl Rule {
    /// Identity key for the round-robin counter table.
    ///
    /// Two textually identical rules in different URLs or files cycle
    /// independently because the normalized path and source participate.
    #[must_use]
    pub fn counter_key(&self, normalized_path: &str) -> String {
        let (kind, target, pattern) = self.selector.as_ref().map_or(("", "", ""), |s| {
            (s.kind.as_str(), s.target.as_str(), s.pattern.as_str())
        });
        format!(
            "{normalized_path}:{}:{kind}:{target}:{pattern}:{}",
            self.source, self.after_ms
        )
    }

    /// The request attribute text this rule's selector matches against.
    #[must_use]
    pub fn match_text(&self, ctx: &RequestContext) -> Option<String> {
        let selector = self.selector.as_ref()?;
        let text = match selector.kind {
            SelectorKind::Path => ctx.path.clone(),
            SelectorKind::Header => ctx.header(&selector.target).unwrap_or_default().to_string(),
            SelectorKind::Param => ctx.param(&selector.target).unwrap_or_default().to_string(),
            SelectorKind::Json => ctx.json_text(&selector.target),
            SelectorKind::Body => ctx.body.clone(),
        };
        Some(text)
    }

    /// Whether the rule participates for this request.
    ///
    /// A rule is skipped while its `after` window has not elapsed since the
    /// last reset; otherwise a selectorless rule always applies and a
    /// selector rule applies when its pattern matches.
    #[must_use]
    pub fn applies(&self, ctx: &RequestContext, millis_since_reset: i64) -> bool {
        if millis_since_reset <= i64::try_from(self.after_ms).unwrap_or(i64::MAX) {
            return false;
        }
        match &self.selector {
            None => true,
            Some(selector) => {
                let text = self.match_text(ctx).unwrap_or_default();
                pattern::matches(&selector.pattern, &text)
            }
        }
    }
}
