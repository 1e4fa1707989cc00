// Copyright 2025 Lablup Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ephemeral auth key file management.
//!
//! Key material supplied as in-memory strings is written to freshly named
//! files under a configurable root so the transport can consume it through
//! the same file-based path as user-supplied key files. Every file is
//! tracked and removed by [`AuthKeyStore::cleanup`], which the session
//! manager calls on disconnect and on drop.

use std::io::Write;
use std::path::PathBuf;

use uuid::Uuid;

use crate::error::{Error, Result};

/// Writes and tracks temp files holding auth key material.
#[derive(Debug, Default)]
pub struct AuthKeyStore {
    root: Option<PathBuf>,
    created: Vec<PathBuf>,
}

impl AuthKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            created: Vec::new(),
        }
    }

    /// Set the root directory for materialized key files.
    pub fn set_root(&mut self, root: impl Into<PathBuf>) {
        self.root = Some(root.into());
    }

    /// The directory new key files are written to. Falls back to the
    /// platform temp directory when no root was configured.
    pub fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Write `content` to a freshly named file under the root and record it
    /// for cleanup. The file is created exclusively with owner-only
    /// permissions.
    pub fn materialize(&mut self, content: &str) -> Result<PathBuf> {
        let path = self.root().join(format!("sesh-auth-key-{}", Uuid::new_v4()));

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&path).map_err(|e| Error::KeyMaterialization {
            path: path.clone(),
            source: e,
        })?;

        file.write_all(content.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|e| Error::KeyMaterialization {
                path: path.clone(),
                source: e,
            })?;

        tracing::debug!("Materialized auth key file at {:?}", path);
        self.created.push(path.clone());
        Ok(path)
    }

    /// Number of files currently tracked for cleanup.
    pub fn tracked(&self) -> usize {
        self.created.len()
    }

    /// Delete every recorded file. Already-missing files are treated as
    /// success; other removal failures are reported but do not stop the
    /// sweep. Safe to call repeatedly, and with nothing materialized.
    pub fn cleanup(&mut self) -> Vec<String> {
        let mut issues = Vec::new();

        for path in self.created.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!("Removed auth key file {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!("Failed to remove auth key file {:?}: {}", path, e);
                    issues.push(format!("failed to remove {path:?}: {e}"));
                }
            }
        }

        issues
    }
}

impl Drop for AuthKeyStore {
    fn drop(&mut self) {
        self.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_materialize_writes_content() {
        let dir = TempDir::new().unwrap();
        let mut store = AuthKeyStore::with_root(dir.path());

        let path = store.materialize("-----BEGIN KEY-----").unwrap();
        assert!(path.starts_with(dir.path()));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "-----BEGIN KEY-----"
        );
        assert_eq!(store.tracked(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_materialize_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let mut store = AuthKeyStore::with_root(dir.path());

        let path = store.materialize("secret").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_cleanup_removes_files() {
        let dir = TempDir::new().unwrap();
        let mut store = AuthKeyStore::with_root(dir.path());

        let a = store.materialize("a").unwrap();
        let b = store.materialize("b").unwrap();

        let issues = store.cleanup();
        assert!(issues.is_empty());
        assert!(!a.exists());
        assert!(!b.exists());
        assert_eq!(store.tracked(), 0);
    }

    #[test]
    fn test_cleanup_tolerates_missing_files() {
        let dir = TempDir::new().unwrap();
        let mut store = AuthKeyStore::with_root(dir.path());

        let path = store.materialize("a").unwrap();
        std::fs::remove_file(&path).unwrap();

        assert!(store.cleanup().is_empty());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let mut store = AuthKeyStore::new();
        assert!(store.cleanup().is_empty());
        assert!(store.cleanup().is_empty());
    }

    #[test]
    fn test_materialize_unwritable_root() {
        let mut store = AuthKeyStore::with_root("/nonexistent/keystore/root");
        assert!(matches!(
            store.materialize("content"),
            Err(Error::KeyMaterialization { .. })
        ));
    }
}
