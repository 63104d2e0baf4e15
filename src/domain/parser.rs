// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Parser for the response spec language.
//!
//! The parser walks the lexed lines with a small state machine, carrying
//! mutable defaults (status, delay, after) that rules inherit unless they
//! override them inline. Directive lines may pack trailing content, which is
//! pushed back onto the head of the line queue and re-examined, so a spec
//! like `201 text: created` works in a single line.

use std::collections::VecDeque;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::domain::adjuster;
use crate::domain::lexer;
use crate::domain::rule::{LocationKind, Rule, Selector, SelectorKind, VariantSlot};

/// Inherited defaults carried into a parse.
///
/// The top level starts from `(200, 0, 0)`; file inclusion passes the
/// including rule's resolved values instead.
#[derive(Debug, Clone, Copy)]
pub struct Defaults {
    /// Status applied to rules that do not declare one.
    pub status: u16,
    /// Delay applied to rules that do not declare one.
    pub delay_ms: u64,
    /// `after` gate applied to rules that do not declare one.
    pub after_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            status: 200,
            delay_ms: 0,
            after_ms: 0,
        }
    }
}

/// Product of a parse: effective defaults plus the ordered rule list.
#[derive(Debug, Clone)]
pub struct ParsedSpec {
    /// Default status after global directives were applied.
    pub status: u16,
    /// Default delay after global directives were applied.
    pub delay_ms: u64,
    /// Rules in declaration order.
    pub rules: Vec<Rule>,
}

static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*#").unwrap());

static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*(\d{3})\b\s*(.*)$").unwrap());

static DELAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*delay\s*=(\d+)ms\b\s*(.*)$").unwrap());

static AFTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*after\s*=(\d+)ms\b\s*(.*)$").unwrap());

static SEQUENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*--\[\s*\d*\s*\]--\s*(.*)$").unwrap());

/// Selector grammar for kinds that name a target (HEADER, PARAM, JSON).
fn targeted_rule_re(keyword: &str) -> Regex {
    Regex::new(&format!(
        r"(?s)^\s*{keyword}:\s*(?P<target>.+?)\s*(?P<pattern>!?/.*?/i?)\s*(?:(?P<status>\d{{3}})\b\s*)?(?:delay=(?P<delay>\d+)ms\s*)?(?:after=(?P<after>\d+)ms\s*)?(?:(?P<loc>text|file):)?\s*(?P<value>.*)$"
    ))
    .unwrap()
}

/// Selector grammar for kinds without a target (PATH, BODY).
fn untargeted_rule_re(keyword: &str) -> Regex {
    Regex::new(&format!(
        r"(?s)^\s*{keyword}:\s*(?P<pattern>!?/.*?/i?)\s*(?:(?P<status>\d{{3}})\b\s*)?(?:delay=(?P<delay>\d+)ms\s*)?(?:after=(?P<after>\d+)ms\s*)?(?:(?P<loc>text|file):)?\s*(?P<value>.*)$"
    ))
    .unwrap()
}

static HEADER_RULE_RE: LazyLock<Regex> = LazyLock::new(|| targeted_rule_re("HEADER"));
static PATH_RULE_RE: LazyLock<Regex> = LazyLock::new(|| untargeted_rule_re("PATH"));
static PARAM_RULE_RE: LazyLock<Regex> = LazyLock::new(|| targeted_rule_re("PARAM"));
static JSON_RULE_RE: LazyLock<Regex> = LazyLock::new(|| targeted_rule_re("JSON"));
static BODY_RULE_RE: LazyLock<Regex> = LazyLock::new(|| untargeted_rule_re("BODY"));

static EXPLICIT_RULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)^\s*(?:(?P<status>\d{3})\b\s*)?(?:delay=(?P<delay>\d+)ms\s*)?(?:after=(?P<after>\d+)ms\s*)?(?P<loc>text|file):\s*(?P<value>.*)$",
    )
    .unwrap()
});

static IMPLICIT_RULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)^(?:\s*(?P<status>\d{3})\b)?(?:\s*delay=(?P<delay>\d+)ms)?(?:\s*after=(?P<after>\d+)ms)?(?P<value>.*)$",
    )
    .unwrap()
});

/// Rule-line pieces shared by the selector, explicit, and implicit grammars.
struct RuleParts {
    status: Option<u16>,
    delay_ms: Option<u64>,
    after_ms: Option<u64>,
    location: LocationKind,
    value: String,
}

impl RuleParts {
    fn from_captures(caps: &Captures<'_>) -> Self {
        let location = match caps.name("loc").map(|m| m.as_str()) {
            Some("file") => LocationKind::File,
            _ => LocationKind::Text,
        };
        Self {
            status: caps.name("status").and_then(|m| m.as_str().parse().ok()),
            delay_ms: caps.name("delay").and_then(|m| m.as_str().parse().ok()),
            after_ms: caps.name("after").and_then(|m| m.as_str().parse().ok()),
            location,
            value: caps
                .name("value")
                .map_or_else(String::new, |m| m.as_str().to_string()),
        }
    }
}

/// Line-queue state machine that turns spec text into rules.
pub struct ResponseParser {
    source: String,
    status: u16,
    delay_ms: u64,
    after_ms: u64,
    lines: VecDeque<String>,
    sequenced: bool,
    global_scope: bool,
    rules: Vec<Rule>,
}

impl ResponseParser {
    /// Parser for a spec from `source` ("" = inline) with inherited defaults.
    #[must_use]
    pub fn new(source: &str, defaults: Defaults) -> Self {
        Self {
            source: source.to_string(),
            status: defaults.status,
            delay_ms: defaults.delay_ms,
            after_ms: defaults.after_ms,
            lines: VecDeque::new(),
            sequenced: false,
            global_scope: true,
            rules: Vec::new(),
        }
    }

    /// Parse the spec text into rules, consuming the parser.
    #[must_use]
    pub fn parse(mut self, text: &str) -> ParsedSpec {
        self.lines = lexer::lines(text).into();
        while let Some(line) = self.lines.pop_front() {
            self.parse_line(&line);
        }

        let from_file = !self.source.is_empty();
        adjuster::adjust(from_file, &mut self.rules);

        ParsedSpec {
            status: self.status,
            delay_ms: self.delay_ms,
            rules: self.rules,
        }
    }

    fn parse_line(&mut self, line: &str) {
        // Comments are ignored entirely, even inside sequenced content.
        if COMMENT_RE.is_match(line) {
        } else if self.global_scope && self.try_global_status(line) {
        } else if self.global_scope && self.try_global_delay(line) {
        } else if self.global_scope && self.try_global_after(line) {
        } else if self.try_separator(line) {
        } else if self.try_selector_rule(line) {
        } else if self.try_sequence_marker(line) {
        } else if self.try_explicit_location(line) {
        } else if self.try_continuation(line) {
        } else if line.trim().is_empty() {
            // Blank lines are ignored unless a text location absorbed them above.
        } else {
            self.add_implicit_text_rule(line);
        }

        if !self.rules.is_empty() {
            self.global_scope = false;
        }
    }

    /// Push the unconsumed remainder of a directive line back for re-parsing.
    fn requeue(&mut self, rest: Option<regex::Match<'_>>) {
        if let Some(rest) = rest {
            if !rest.as_str().is_empty() {
                self.lines.push_front(rest.as_str().to_string());
            }
        }
    }

    fn try_global_status(&mut self, line: &str) -> bool {
        let Some(caps) = STATUS_RE.captures(line) else {
            return false;
        };
        if let Ok(code) = caps[1].parse() {
            self.status = code;
        }
        self.requeue(caps.get(2));
        true
    }

    fn try_global_delay(&mut self, line: &str) -> bool {
        let Some(caps) = DELAY_RE.captures(line) else {
            return false;
        };
        if let Ok(millis) = caps[1].parse() {
            self.delay_ms = millis;
        }
        self.requeue(caps.get(2));
        true
    }

    fn try_global_after(&mut self, line: &str) -> bool {
        let Some(caps) = AFTER_RE.captures(line) else {
            return false;
        };
        if let Ok(millis) = caps[1].parse() {
            self.after_ms = millis;
        }
        self.requeue(caps.get(2));
        true
    }

    /// Two or more hyphens end the global-directive scope.
    ///
    /// A hyphen run directly followed by `[` is left for the sequence-marker
    /// grammar instead.
    fn try_separator(&mut self, line: &str) -> bool {
        let rest = line.trim_start();
        let stripped = rest.trim_start_matches('-');
        if rest.len() - stripped.len() < 2 || stripped.starts_with('[') {
            return false;
        }
        self.global_scope = false;
        let tail = stripped.trim_start();
        if !tail.is_empty() {
            self.lines.push_front(tail.to_string());
        }
        true
    }

    fn try_selector_rule(&mut self, line: &str) -> bool {
        let grammars: [(SelectorKind, &Regex); 5] = [
            (SelectorKind::Header, &*HEADER_RULE_RE),
            (SelectorKind::Path, &*PATH_RULE_RE),
            (SelectorKind::Param, &*PARAM_RULE_RE),
            (SelectorKind::Json, &*JSON_RULE_RE),
            (SelectorKind::Body, &*BODY_RULE_RE),
        ];
        for (kind, re) in grammars {
            let Some(caps) = re.captures(line) else {
                continue;
            };
            // A selector rule always ends sequenced content and opens a rule.
            self.sequenced = false;
            let selector = Selector {
                kind,
                target: caps
                    .name("target")
                    .map_or_else(String::new, |m| m.as_str().to_string()),
                pattern: caps["pattern"].to_string(),
            };
            let parts = RuleParts::from_captures(&caps);
            self.add_rule(Some(selector), &parts);
            return true;
        }
        false
    }

    fn try_sequence_marker(&mut self, line: &str) -> bool {
        let Some(caps) = SEQUENCE_RE.captures(line) else {
            return false;
        };

        if self.sequenced {
            if let Some(rule) = self.rules.last_mut() {
                rule.slots.push(VariantSlot::default());
            }
        } else {
            if self.rules.is_empty() {
                let parts = RuleParts {
                    status: None,
                    delay_ms: None,
                    after_ms: None,
                    location: LocationKind::Text,
                    value: String::new(),
                };
                self.add_rule(None, &parts);
            }
            if let Some(rule) = self.rules.last_mut() {
                if rule.slots.iter().any(VariantSlot::has_content) {
                    tracing::debug!(source = %self.source, "sequence marker discards content parsed before it");
                }
                rule.slots.clear();
                rule.slots.push(VariantSlot::default());
            }
            self.sequenced = true;
        }

        self.requeue(caps.get(1));
        true
    }

    fn try_explicit_location(&mut self, line: &str) -> bool {
        let Some(caps) = EXPLICIT_RULE_RE.captures(line) else {
            return false;
        };
        let parts = RuleParts::from_captures(&caps);
        self.append_or_add_rule(parts);
        true
    }

    /// Continuation lines extend the most recent text location verbatim.
    fn try_continuation(&mut self, line: &str) -> bool {
        if let Some(rule) = self.rules.last_mut() {
            if let Some(slot) = rule.slots.last_mut() {
                if slot.locations.last() == Some(&LocationKind::Text) {
                    slot.chunks.push(line.to_string());
                    return true;
                }
            }
        }
        false
    }

    /// Anything else becomes content with an implied text location.
    fn add_implicit_text_rule(&mut self, line: &str) {
        if let Some(caps) = IMPLICIT_RULE_RE.captures(line) {
            let parts = RuleParts::from_captures(&caps);
            self.append_or_add_rule(parts);
        }
    }

    /// In sequenced mode new locations join the current slot; otherwise a new
    /// selectorless rule is opened.
    fn append_or_add_rule(&mut self, parts: RuleParts) {
        if self.sequenced {
            if let Some(rule) = self.rules.last_mut() {
                if let Some(slot) = rule.slots.last_mut() {
                    slot.locations.push(parts.location);
                    slot.chunks.push(parts.value);
                }
                return;
            }
        }
        self.add_rule(None, &parts);
    }

    fn add_rule(&mut self, selector: Option<Selector>, parts: &RuleParts) {
        self.rules.push(Rule {
            source: self.source.clone(),
            selector,
            status: parts.status.unwrap_or(self.status),
            delay_ms: parts.delay_ms.unwrap_or(self.delay_ms),
            after_ms: parts.after_ms.unwrap_or(self.after_ms),
            slots: vec![VariantSlot::seeded(parts.location, parts.value.clone())],
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParsedSpec {
        ResponseParser::new("", Defaults::default()).parse(text)
    }

    fn slot_text(rule: &Rule, slot: usize) -> String {
        rule.slots[slot].chunks.concat()
    }

    #[test]
    fn test_bare_status_sets_default_with_no_rules() {
        let parsed = parse("622");
        assert_eq!(parsed.status, 622);
        assert!(parsed.rules.is_empty());
    }

    #[test]
    fn test_status_with_inline_content() {
        let parsed = parse(r#"201 { "id": 4 }"#);
        assert_eq!(parsed.status, 201);
        assert_eq!(parsed.rules.len(), 1);
        assert_eq!(parsed.rules[0].status, 201);
        assert_eq!(slot_text(&parsed.rules[0], 0), r#"{ "id": 4 }"#);
    }

    #[test]
    fn test_global_delay_and_after_inherited() {
        let parsed = parse("delay=100ms after=50ms text: slow");
        assert_eq!(parsed.delay_ms, 100);
        let rule = &parsed.rules[0];
        assert_eq!(rule.delay_ms, 100);
        assert_eq!(rule.after_ms, 50);
        assert_eq!(slot_text(rule, 0), "slow");
    }

    #[test]
    fn test_comments_ignored() {
        let parsed = parse("# nothing to see\n404\n# more comments");
        assert_eq!(parsed.status, 404);
        assert!(parsed.rules.is_empty());
    }

    #[test]
    fn test_param_rule_with_inline_tokens() {
        let parsed = parse("PARAM:color /blue/ 404 delay=10ms text: nope");
        let rule = &parsed.rules[0];
        let selector = rule.selector.as_ref().unwrap();
        assert_eq!(selector.kind, SelectorKind::Param);
        assert_eq!(selector.target, "color");
        assert_eq!(selector.pattern, "/blue/");
        assert_eq!(rule.status, 404);
        assert_eq!(rule.delay_ms, 10);
        assert_eq!(slot_text(rule, 0), "nope");
    }

    #[test]
    fn test_path_rule_has_no_target() {
        let parsed = parse("PATH: /labs/ ok");
        let selector = parsed.rules[0].selector.as_ref().unwrap();
        assert_eq!(selector.kind, SelectorKind::Path);
        assert_eq!(selector.target, "");
        assert_eq!(selector.pattern, "/labs/");
        assert_eq!(slot_text(&parsed.rules[0], 0), "ok");
    }

    #[test]
    fn test_negated_insensitive_pattern_kept_verbatim() {
        let parsed = parse("JSON: order.color !/Blue/i mismatch");
        let selector = parsed.rules[0].selector.as_ref().unwrap();
        assert_eq!(selector.target, "order.color");
        assert_eq!(selector.pattern, "!/Blue/i");
    }

    #[test]
    fn test_multiple_rules_in_declaration_order() {
        let parsed = parse("200\nPARAM:color /blue/ { \"c\":\"b\" }\nPARAM:color /green/ { \"c\":\"g\" }");
        assert_eq!(parsed.rules.len(), 2);
        assert_eq!(
            parsed.rules[0].selector.as_ref().unwrap().pattern,
            "/blue/"
        );
        assert_eq!(
            parsed.rules[1].selector.as_ref().unwrap().pattern,
            "/green/"
        );
        assert_eq!(slot_text(&parsed.rules[1], 0), "{ \"c\":\"g\" }");
    }

    #[test]
    fn test_file_location_rule() {
        let parsed = parse("file: nested/reply.echo");
        let rule = &parsed.rules[0];
        assert!(rule.selector.is_none());
        assert_eq!(rule.slots[0].locations, vec![LocationKind::File]);
        assert_eq!(slot_text(rule, 0), "nested/reply.echo");
    }

    #[test]
    fn test_continuation_lines_append_to_text() {
        let parsed = parse("text: first\nsecond\nthird");
        assert_eq!(slot_text(&parsed.rules[0], 0), "first\nsecond\nthird");
    }

    #[test]
    fn test_separator_closes_global_scope() {
        let parsed = parse("----\n404\nbody");
        assert_eq!(parsed.status, 200);
        let rule = &parsed.rules[0];
        assert_eq!(rule.status, 404);
        assert_eq!(slot_text(rule, 0), "body");
    }

    #[test]
    fn test_sequence_markers_build_variant_slots() {
        let parsed = parse("--[ 1 ]--\npeanuts\n--[ 2 ]--\ncashews");
        assert_eq!(parsed.rules.len(), 1);
        let rule = &parsed.rules[0];
        assert_eq!(rule.slots.len(), 2);
        assert_eq!(slot_text(rule, 0), "peanuts\n");
        assert_eq!(slot_text(rule, 1), "cashews");
    }

    #[test]
    fn test_sequenced_slots_attach_to_selector_rule() {
        let parsed = parse("PARAM:kind /nut/\n--[1]--\npeanuts\n--[2]--\ncashews");
        assert_eq!(parsed.rules.len(), 1);
        let rule = &parsed.rules[0];
        assert!(rule.selector.is_some());
        assert_eq!(rule.slots.len(), 2);
    }

    #[test]
    fn test_sequenced_explicit_locations_join_current_slot() {
        let parsed = parse("--[1]--\nfile: a.echo\ntext: inline\n--[2]--\ntext: other");
        let rule = &parsed.rules[0];
        assert_eq!(
            rule.slots[0].locations,
            vec![LocationKind::File, LocationKind::Text]
        );
        assert_eq!(rule.slots[1].locations, vec![LocationKind::Text]);
    }

    #[test]
    fn test_selector_rule_ends_sequenced_mode() {
        let parsed = parse("--[1]--\na\n--[2]--\nb\nPARAM:x /1/ c\ntext: later");
        assert_eq!(parsed.rules.len(), 3);
        assert_eq!(parsed.rules[0].slots.len(), 2);
        assert!(parsed.rules[1].selector.is_some());
        assert!(parsed.rules[2].selector.is_none());
    }

    #[test]
    fn test_inline_pipe_spec_parses_as_two_rules() {
        let parsed = parse("200 text: hello | text: world");
        assert_eq!(parsed.rules.len(), 2);
        assert_eq!(slot_text(&parsed.rules[0], 0), "hello \n");
        assert_eq!(slot_text(&parsed.rules[1], 0), "world");
    }

    #[test]
    fn test_blank_lines_between_rules_ignored() {
        let parsed = parse("# pick one\n\n\nPARAM:x /1/ one");
        assert_eq!(parsed.rules.len(), 1);
    }

    #[test]
    fn test_implicit_rule_with_leading_tokens() {
        let parsed = parse("----\n503 delay=25ms overloaded");
        let rule = &parsed.rules[0];
        assert_eq!(rule.status, 503);
        assert_eq!(rule.delay_ms, 25);
        assert_eq!(slot_text(rule, 0), "overloaded");
    }

    #[test]
    fn test_file_defaults_inherited_from_caller() {
        let defaults = Defaults {
            status: 418,
            delay_ms: 7,
            after_ms: 3,
        };
        let parsed = ResponseParser::new("choices.echo", defaults).parse("text: from file");
        let rule = &parsed.rules[0];
        assert_eq!(rule.source, "choices.echo");
        assert_eq!(rule.status, 418);
        assert_eq!(rule.delay_ms, 7);
        assert_eq!(rule.after_ms, 3);
    }
}
