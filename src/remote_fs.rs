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

//! Remote filesystem operations over the session's cached SFTP channel.
//!
//! Every operation requires a connected session and lazily obtains the
//! SFTP sub-resource. Operation failures never change session state; the
//! session stays connected and usable for subsequent calls.

use russh_sftp::client::SftpSession;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::protocol::{FileAttributes, Status, StatusCode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::session::SessionManager;

/// Kind of a remote filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    File,
    Dir,
    Symlink,
    Other,
}

/// Read-only snapshot of a remote file's metadata. Not linked back to the
/// remote filesystem after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    pub path: String,
    pub kind: FileKind,
    pub size: u64,
    pub permissions: Option<u32>,
    /// Modification time, seconds since the unix epoch.
    pub modified: Option<u64>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl RemoteFileInfo {
    fn from_attrs(path: String, attrs: &FileAttributes) -> Self {
        Self {
            path,
            kind: kind_of(attrs),
            size: attrs.size.unwrap_or(0),
            permissions: attrs.permissions,
            modified: attrs.mtime.map(u64::from),
            uid: attrs.uid,
            gid: attrs.gid,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}

fn kind_of(attrs: &FileAttributes) -> FileKind {
    let file_type = attrs.file_type();
    if file_type.is_dir() {
        FileKind::Dir
    } else if file_type.is_symlink() {
        FileKind::Symlink
    } else if file_type.is_file() {
        FileKind::File
    } else {
        FileKind::Other
    }
}

fn is_not_found(err: &SftpError) -> bool {
    matches!(
        err,
        SftpError::Status(Status {
            status_code: StatusCode::NoSuchFile,
            ..
        })
    )
}

/// Map an SFTP failure on `path` to the crate error taxonomy.
fn classify(path: &str, err: SftpError) -> Error {
    match &err {
        SftpError::Status(Status {
            status_code: StatusCode::NoSuchFile,
            ..
        }) => Error::RemoteFileNotFound(path.to_string()),
        SftpError::Status(Status {
            status_code: StatusCode::PermissionDenied,
            ..
        }) => Error::remote_file(path, "permission denied"),
        _ => Error::remote_file(path, err.to_string()),
    }
}

async fn chmod(sftp: &SftpSession, path: &str, mode: u32) -> Result<()> {
    let attrs = FileAttributes {
        permissions: Some(mode),
        ..Default::default()
    };
    sftp.set_metadata(path, attrs)
        .await
        .map_err(|e| classify(path, e))
}

/// Path of `name` next to `path`, replacing its final component.
fn sibling_path(path: &str, name: &str) -> String {
    match path.rsplit_once('/') {
        Some((parent, _)) => format!("{parent}/{name}"),
        None => name.to_string(),
    }
}

/// Every ancestor of `path` from the top down, ending with `path` itself.
fn path_prefixes(path: &str) -> Vec<String> {
    let trimmed = path.trim_end_matches('/');
    let mut prefixes = Vec::new();
    let mut current = String::new();

    for segment in trimmed.split('/').filter(|s| !s.is_empty()) {
        if current.is_empty() && !trimmed.starts_with('/') {
            current.push_str(segment);
        } else {
            current.push('/');
            current.push_str(segment);
        }
        prefixes.push(current.clone());
    }

    prefixes
}

fn join_remote(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

impl SessionManager {
    /// Whether `path` exists on the remote. Never fails for a missing
    /// path; only transport-level failures surface as errors.
    pub async fn exists(&mut self, path: &str) -> Result<bool> {
        let sftp = self.to_sftp().await?;
        match sftp.metadata(path).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(classify(path, e)),
        }
    }

    /// Metadata snapshot of `path`.
    pub async fn file_info(&mut self, path: &str) -> Result<RemoteFileInfo> {
        let sftp = self.to_sftp().await?;
        let attrs = sftp.metadata(path).await.map_err(|e| classify(path, e))?;
        Ok(RemoteFileInfo::from_attrs(path.to_string(), &attrs))
    }

    /// Rename the entry at `path` to `new_name` within its directory.
    pub async fn rename(&mut self, path: &str, new_name: &str) -> Result<()> {
        let new_path = sibling_path(path, new_name);
        tracing::debug!("Renaming {} -> {}", path, new_path);

        let sftp = self.to_sftp().await?;
        sftp.rename(path, &new_path)
            .await
            .map_err(|e| classify(path, e))
    }

    /// Move an entry to a new path.
    pub async fn move_file(&mut self, src_path: &str, dst_path: &str) -> Result<()> {
        tracing::debug!("Moving {} -> {}", src_path, dst_path);

        let sftp = self.to_sftp().await?;
        sftp.rename(src_path, dst_path)
            .await
            .map_err(|e| classify(src_path, e))
    }

    /// Remove the entry at `path`. Fails with `RemoteFileNotFound` when it
    /// does not exist.
    pub async fn remove(&mut self, path: &str) -> Result<()> {
        let sftp = self.to_sftp().await?;
        let attrs = sftp.metadata(path).await.map_err(|e| classify(path, e))?;

        if attrs.file_type().is_dir() {
            sftp.remove_dir(path).await.map_err(|e| classify(path, e))
        } else {
            sftp.remove_file(path).await.map_err(|e| classify(path, e))
        }
    }

    /// Create a directory with the given permission mode.
    ///
    /// With `create_parents`, walks the path from the top creating each
    /// missing segment with `mode`; segments that already exist as
    /// directories are tolerated, a segment existing as anything else is
    /// an error.
    pub async fn create_folder(
        &mut self,
        path: &str,
        mode: u32,
        create_parents: bool,
    ) -> Result<()> {
        if !create_parents {
            let sftp = self.to_sftp().await?;
            sftp.create_dir(path).await.map_err(|e| classify(path, e))?;
            return chmod(sftp, path, mode).await;
        }

        for prefix in path_prefixes(path) {
            let sftp = self.to_sftp().await?;
            match sftp.metadata(&prefix).await {
                Ok(attrs) if attrs.file_type().is_dir() => continue,
                Ok(_) => {
                    return Err(Error::remote_file(
                        &prefix,
                        "exists and is not a directory",
                    ));
                }
                Err(e) if is_not_found(&e) => {
                    sftp.create_dir(&prefix)
                        .await
                        .map_err(|e| classify(&prefix, e))?;
                    chmod(sftp, &prefix, mode).await?;
                    tracing::debug!("Created remote directory {}", prefix);
                }
                Err(e) => return Err(classify(&prefix, e)),
            }
        }

        Ok(())
    }

    /// Whether `path` exists and is a directory.
    pub async fn is_dir(&mut self, path: &str) -> Result<bool> {
        let sftp = self.to_sftp().await?;
        match sftp.metadata(path).await {
            Ok(attrs) => Ok(attrs.file_type().is_dir()),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(classify(path, e)),
        }
    }

    /// List the entries of a remote directory, excluding `.` and `..`.
    ///
    /// The result is fully materialized and carries whatever order the
    /// remote listing produced; callers must not assume one.
    pub async fn scan_dir(&mut self, path: &str) -> Result<Vec<RemoteFileInfo>> {
        let sftp = self.to_sftp().await?;
        let entries = sftp.read_dir(path).await.map_err(|e| classify(path, e))?;

        let mut infos = Vec::new();
        for entry in entries {
            let name = entry.file_name();
            if name == "." || name == ".." {
                continue;
            }
            let attrs = entry.metadata();
            infos.push(RemoteFileInfo::from_attrs(join_remote(path, &name), &attrs));
        }

        tracing::debug!("Scanned {} with {} entries", path, infos.len());
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_path() {
        assert_eq!(sibling_path("/a/b/old", "new"), "/a/b/new");
        assert_eq!(sibling_path("/old", "new"), "/new");
        assert_eq!(sibling_path("old", "new"), "new");
    }

    #[test]
    fn test_path_prefixes_absolute() {
        assert_eq!(
            path_prefixes("/a/b/c"),
            vec!["/a".to_string(), "/a/b".to_string(), "/a/b/c".to_string()]
        );
    }

    #[test]
    fn test_path_prefixes_relative() {
        assert_eq!(
            path_prefixes("a/b"),
            vec!["a".to_string(), "a/b".to_string()]
        );
    }

    #[test]
    fn test_path_prefixes_trailing_slash() {
        assert_eq!(path_prefixes("/a/"), vec!["/a".to_string()]);
    }

    #[test]
    fn test_join_remote() {
        assert_eq!(join_remote("/data", "f.txt"), "/data/f.txt");
        assert_eq!(join_remote("/data/", "f.txt"), "/data/f.txt");
    }
}
