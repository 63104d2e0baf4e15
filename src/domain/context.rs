// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

//! Read-only snapshot of an incoming request.
//!
//! Everything the rule engine may reference is captured up front: the path,
//! query parameters, headers, the decoded body, the parsed JSON body, and
//! named parameters embedded in path segments of the form `name:value`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

/// Matches a path segment carrying a named parameter, e.g. `id:73`.
static PATH_PARAM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*):(.*)$").unwrap());

/// Immutable per-request view consumed by selectors and templates.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Request URL path, percent-decoded, with leading slash.
    pub path: String,
    /// Path with `:value` fragments stripped from parameter segments.
    ///
    /// Used to key round-robin counters so `/samples/id:73` and
    /// `/samples/id:74` share one cycle.
    pub normalized_path: String,
    /// Parameters extracted from `name:value` path segments.
    pub path_params: HashMap<String, String>,
    /// Parameters from the query string.
    pub query_params: HashMap<String, String>,
    /// Request headers, names canonicalized to HTTP Title-Case.
    pub headers: HashMap<String, String>,
    /// Request body decoded as UTF-8 text.
    pub body: String,
    /// Parsed JSON body; an empty object when the body is not JSON.
    pub json: Value,
}

impl RequestContext {
    /// Build a context from the raw pieces of a request.
    ///
    /// Header names are canonicalized on the way in. A body that fails to
    /// parse as JSON yields an empty tree, never an error.
    #[must_use]
    pub fn new(
        path: &str,
        query_params: HashMap<String, String>,
        headers: HashMap<String, String>,
        body: String,
    ) -> Self {
        let mut path_params = HashMap::new();
        let mut normalized_segments = Vec::new();
        for segment in path.split('/') {
            if let Some(caps) = PATH_PARAM_RE.captures(segment) {
                path_params.insert(caps[1].to_string(), caps[2].to_string());
                normalized_segments.push(caps[1].to_string());
            } else {
                normalized_segments.push(segment.to_string());
            }
        }

        let headers = headers
            .into_iter()
            .map(|(name, value)| (canonical_header_name(&name), value))
            .collect();

        let json = serde_json::from_str(&body).unwrap_or_else(|_| Value::Object(Map::new()));

        Self {
            path: path.to_string(),
            normalized_path: normalized_segments.join("/"),
            path_params,
            query_params,
            headers,
            body,
            json,
        }
    }

    /// Look up a parameter by name; path parameters win over query parameters.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.path_params
            .get(name)
            .or_else(|| self.query_params.get(name))
            .map(String::as_str)
    }

    /// Look up a header; matching is case-insensitive and treats underscore
    /// and hyphen as interchangeable.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&canonical_header_name(name))
            .map(String::as_str)
    }

    /// String form of the JSON value at a dotted path, empty when missing.
    ///
    /// Numeric segments index into arrays. Strings render unquoted, null as
    /// the empty string, and containers as compact JSON.
    #[must_use]
    pub fn json_text(&self, path: &str) -> String {
        let mut current = &self.json;
        if !path.is_empty() {
            for segment in path.split('.') {
                let next = match current {
                    Value::Object(map) => map.get(segment),
                    Value::Array(items) => {
                        segment.parse::<usize>().ok().and_then(|i| items.get(i))
                    }
                    _ => None,
                };
                match next {
                    Some(value) => current = value,
                    None => return String::new(),
                }
            }
        }
        format_json_value(current)
    }
}

/// Canonicalize a header name to HTTP Title-Case, folding `_` to `-`.
#[must_use]
pub fn canonical_header_name(name: &str) -> String {
    name.replace('_', "-")
        .split('-')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// Render a JSON value the way it appears in response text.
fn format_json_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Object(_) | Value::Array(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
