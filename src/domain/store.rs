// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

// Response-store port - where `file:` locations are loaded from

use async_trait::async_trait;

/// Source of response files referenced by `file:` locations.
///
/// Files are loaded on every evaluation; implementations must not cache,
/// so test authors can edit response files between requests.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    /// Load the raw text of a response file by its spec-relative,
    /// forward-slash-separated path.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read; the resolver treats
    /// that as "no match" and moves on.
    async fn load(&self, path: &str) -> Result<String, String>;
}
