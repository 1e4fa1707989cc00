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

//! Single-file transfers between the local and remote filesystems.
//!
//! Transfers are whole-file and not resumable: a failure mid-transfer
//! leaves a partial destination file that the caller is responsible for
//! discarding. No internal retries.

use std::path::Path;

use russh_sftp::protocol::{FileAttributes, OpenFlags};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::session::SessionManager;

/// Parent directory of a remote path, when it has a non-root one.
fn remote_parent(path: &str) -> Option<&str> {
    match path.rsplit_once('/') {
        Some((parent, _)) if !parent.is_empty() => Some(parent),
        _ => None,
    }
}

#[cfg(unix)]
fn set_local_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_local_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

impl SessionManager {
    /// Copy one local file to the remote.
    ///
    /// With `create_parents`, the remote parent directory chain is created
    /// with `folder_mode` first. The remote file is created (or truncated)
    /// and chmodded to `file_mode`.
    pub async fn copy_local_to_remote_file(
        &mut self,
        local_path: &Path,
        remote_path: &str,
        create_parents: bool,
        file_mode: u32,
        folder_mode: u32,
    ) -> Result<()> {
        self.require_connected()?;

        tracing::debug!("Uploading {:?} -> {}", local_path, remote_path);

        let data = tokio::fs::read(local_path).await.map_err(|e| {
            Error::transfer(format!("failed to read local file {local_path:?}"), e)
        })?;

        if create_parents
            && let Some(parent) = remote_parent(remote_path)
        {
            let parent = parent.to_string();
            self.create_folder(&parent, folder_mode, true)
                .await
                .map_err(|e| {
                    Error::transfer(format!("failed to create remote parent '{parent}'"), e)
                })?;
        }

        let sftp = self.to_sftp().await?;
        let mut remote_file = sftp
            .open_with_flags(
                remote_path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| {
                Error::transfer(format!("failed to create remote file '{remote_path}'"), e)
            })?;

        remote_file
            .write_all(&data)
            .await
            .map_err(|e| Error::transfer(format!("failed to write '{remote_path}'"), e))?;
        remote_file
            .shutdown()
            .await
            .map_err(|e| Error::transfer(format!("failed to finalize '{remote_path}'"), e))?;

        let attrs = FileAttributes {
            permissions: Some(file_mode),
            ..Default::default()
        };
        sftp.set_metadata(remote_path, attrs).await.map_err(|e| {
            Error::transfer(format!("failed to set mode on '{remote_path}'"), e)
        })?;

        tracing::debug!("Upload of {} complete ({} bytes)", remote_path, data.len());
        Ok(())
    }

    /// Copy one remote file to the local filesystem.
    ///
    /// With `create_parents`, missing local parent directories are created;
    /// a parent this call itself creates gets `folder_mode`. The local file
    /// is written whole and chmodded to `file_mode`.
    pub async fn copy_remote_to_local_file(
        &mut self,
        remote_path: &str,
        local_path: &Path,
        create_parents: bool,
        file_mode: u32,
        folder_mode: u32,
    ) -> Result<()> {
        self.require_connected()?;

        tracing::debug!("Downloading {} -> {:?}", remote_path, local_path);

        if create_parents
            && let Some(parent) = local_path.parent()
            && !parent.as_os_str().is_empty()
        {
            let newly_created = !parent.exists();
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::transfer(format!("failed to create local parent {parent:?}"), e)
            })?;
            if newly_created {
                set_local_mode(parent, folder_mode).map_err(|e| {
                    Error::transfer(format!("failed to set mode on {parent:?}"), e)
                })?;
            }
        }

        let sftp = self.to_sftp().await?;
        let mut remote_file = sftp
            .open_with_flags(remote_path, OpenFlags::READ)
            .await
            .map_err(|e| {
                Error::transfer(format!("failed to open remote file '{remote_path}'"), e)
            })?;

        let mut data = Vec::new();
        remote_file
            .read_to_end(&mut data)
            .await
            .map_err(|e| Error::transfer(format!("failed to read '{remote_path}'"), e))?;

        tokio::fs::write(local_path, &data).await.map_err(|e| {
            Error::transfer(format!("failed to write local file {local_path:?}"), e)
        })?;
        set_local_mode(local_path, file_mode)
            .map_err(|e| Error::transfer(format!("failed to set mode on {local_path:?}"), e))?;

        tracing::debug!(
            "Download of {} complete ({} bytes)",
            remote_path,
            data.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_parent() {
        assert_eq!(remote_parent("/a/b/c.txt"), Some("/a/b"));
        assert_eq!(remote_parent("/c.txt"), None);
        assert_eq!(remote_parent("c.txt"), None);
    }
}
