// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Rule selection and recursive file inclusion.
//!
//! The resolver walks parsed rules in declaration order, advances the
//! round-robin counter for every rule whose predicate matches, and descends
//! into referenced `.echo` files with the call site's status/delay/after as
//! the file's inherited defaults.
//!
//! A referenced file that produces no matched content signals "skip me" and
//! evaluation continues with the next location or rule; only the top level
//! falls back to an empty body. This asymmetry is load-bearing: test specs
//! chain `file:` rules and expect unmatched files to be transparent.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::application::counters::MatchCounters;
use crate::domain::context::RequestContext;
use crate::domain::parser::{Defaults, ResponseParser};
use crate::domain::rule::LocationKind;
use crate::domain::store::ResponseStore;
use crate::domain::template;

/// Hard ceiling on `file:` nesting, so mutually referencing specs terminate.
const MAX_INCLUDE_DEPTH: usize = 16;

/// Fully resolved response, ready for the emitter.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// HTTP status to write.
    pub status: u16,
    /// Milliseconds to sleep before writing.
    pub delay_ms: u64,
    /// Header overrides from the selected variant.
    pub headers: HashMap<String, String>,
    /// Response body text.
    pub body: String,
}

/// Intermediate result while rules are being examined.
///
/// `content` stays `None` until some rule yields; inside an included file
/// that distinguishes "nothing matched, skip the file" from matched-but-empty
/// content.
struct Selection {
    status: u16,
    delay_ms: u64,
    headers: HashMap<String, String>,
    content: Option<String>,
}

impl Selection {
    fn inherited(defaults: Defaults) -> Self {
        Self {
            status: defaults.status,
            delay_ms: defaults.delay_ms,
            headers: HashMap::new(),
            content: None,
        }
    }
}

/// Evaluates a response spec against a request.
pub struct Resolver {
    store: Arc<dyn ResponseStore>,
    counters: Arc<MatchCounters>,
}

impl Resolver {
    /// Resolver backed by the given file store and counter registry.
    #[must_use]
    pub fn new(store: Arc<dyn ResponseStore>, counters: Arc<MatchCounters>) -> Self {
        Self { store, counters }
    }

    /// Resolve an inline spec from the `_echo_response` parameter.
    pub async fn resolve(&self, ctx: &RequestContext, spec: &str) -> Resolved {
        let selection = self
            .select_content(ctx, "", spec, Defaults::default(), 0)
            .await;
        Resolved {
            status: selection.status,
            delay_ms: selection.delay_ms,
            headers: selection.headers,
            body: selection.content.unwrap_or_default(),
        }
    }

    /// Interpolate, parse, and evaluate one spec text.
    ///
    /// Boxed because evaluation recurses through `resolve_file`.
    fn select_content<'a>(
        &'a self,
        ctx: &'a RequestContext,
        source: &'a str,
        text: &'a str,
        defaults: Defaults,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Selection> + Send + 'a>> {
        Box::pin(async move {
            let text = template::interpolate(ctx, text);
            let parsed = ResponseParser::new(source, defaults).parse(&text);

            let mut selection = Selection::inherited(Defaults {
                status: parsed.status,
                delay_ms: parsed.delay_ms,
                after_ms: defaults.after_ms,
            });

            if parsed.rules.is_empty() {
                if depth == 0 {
                    selection.content = Some(String::new());
                }
                return selection;
            }

            'rules: for rule in &parsed.rules {
                if !rule.applies(ctx, self.counters.millis_since_reset()) {
                    continue;
                }

                let key = rule.counter_key(&ctx.normalized_path);
                let count = self.counters.next(&key);
                let slots_len = rule.slots.len() as u64;
                let slot_index = usize::try_from(count % slots_len).unwrap_or(0);
                let slot = &rule.slots[slot_index];

                // Leading file locations consume one chunk each; the first
                // one that yields content wins.
                let mut location_index = 0;
                while location_index < slot.locations.len()
                    && slot.locations[location_index] == LocationKind::File
                {
                    let Some(chunk) = slot.chunks.get(location_index) else {
                        break;
                    };
                    let inherited = Defaults {
                        status: rule.status,
                        delay_ms: rule.delay_ms,
                        after_ms: rule.after_ms,
                    };
                    let nested = self
                        .resolve_file(ctx, chunk.trim(), inherited, depth + 1)
                        .await;
                    selection.status = nested.status;
                    selection.delay_ms = nested.delay_ms;
                    selection.headers = nested.headers;
                    if nested.content.is_some() {
                        selection.content = nested.content;
                        break 'rules;
                    }
                    location_index += 1;
                }

                // A trailing text location owns every remaining chunk.
                if location_index < slot.locations.len() && location_index < slot.chunks.len() {
                    selection.status = rule.status;
                    selection.delay_ms = rule.delay_ms;
                    selection.headers = slot.headers.clone();
                    selection.content = Some(slot.chunks[location_index..].concat());
                    break 'rules;
                }

                // Slot exhausted without content: keep trying later rules.
            }

            if selection.content.is_none() && depth == 0 {
                selection.content = Some(String::new());
            }
            selection
        })
    }

    /// Load and evaluate a referenced file.
    ///
    /// Non-`.echo` files are opaque and returned verbatim with the inherited
    /// status and delay. Unreadable files and over-deep nesting are treated
    /// as "no match".
    async fn resolve_file(
        &self,
        ctx: &RequestContext,
        path: &str,
        inherited: Defaults,
        depth: usize,
    ) -> Selection {
        let mut selection = Selection::inherited(inherited);

        if depth > MAX_INCLUDE_DEPTH {
            tracing::warn!(path, depth, "response file nesting too deep, skipping");
            return selection;
        }

        let text = match self.store.load(path).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(path, %err, "response file unreadable, skipping");
                return selection;
            }
        };

        if !std::path::Path::new(path)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("echo"))
        {
            selection.content = Some(text);
            return selection;
        }

        self.select_content(ctx, path, &text, inherited, depth)
            .await
    }
}
