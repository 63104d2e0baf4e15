// Copyright (c) 2026 BaseState LLC
// SPDX-License-Identifier: MIT

// Disk-backed response store - default implementation of the store port

use std::path::PathBuf;

use async_trait::async_trait;

use crate::domain::store::ResponseStore;

/// Loads response files from a directory on disk.
///
/// Spec paths are forward-slash separated and resolved against the
/// configured root (`responses` next to the working directory by default).
/// Every lookup hits the filesystem so edits between requests are seen.
#[derive(Debug, Clone)]
pub struct DiskResponseStore {
    root: PathBuf,
}

impl DiskResponseStore {
    /// Store rooted at the given directory.
    #[must_use]
    pub const fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl ResponseStore for DiskResponseStore {
    async fn load(&self, path: &str) -> Result<String, String> {
        let full = self.root.join(path);
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|err| format!("read {}: {err}", full.display()))
    }
}
