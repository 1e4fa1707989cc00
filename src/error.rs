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

//! Error types for session setup, sub-resource derivation, and remote
//! operations.
//!
//! Setup-phase errors (`Connection`, `FingerprintMismatch`, `AuthConfig`,
//! `KeyMaterialization`, `Authentication`) abort `connect()` and leave the
//! session in the `Failed` state. Per-operation errors (`RemoteFile*`,
//! `CommandExecution`, `Transfer`) never change session state; the session
//! stays connected and usable.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for all session manager operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not be established or failed mid-protocol.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The remote host presented a key whose fingerprint does not match the
    /// pinned one.
    #[error("host fingerprint mismatch: expected '{expected}', got '{actual}'")]
    FingerprintMismatch { expected: String, actual: String },

    /// No usable credential variant in the settings, or the populated
    /// variant is unusable (missing key file, multiple variants at once).
    #[error("authentication configuration error: {0}")]
    AuthConfig(String),

    /// Writing in-memory key material to a temp file failed.
    #[error("failed to materialize auth key file at {path:?}")]
    KeyMaterialization {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The remote rejected the resolved credentials.
    #[error("authentication rejected for user '{username}'")]
    Authentication { username: String },

    /// An operation that requires a live session was attempted while the
    /// session was not in the Connected state, or the sub-resource it ran
    /// on has been closed.
    #[error("session is not connected")]
    NotConnected,

    /// The remote path does not exist.
    #[error("remote path not found: {0}")]
    RemoteFileNotFound(String),

    /// Permission denial or any other remote filesystem failure.
    #[error("remote file operation failed on '{path}': {message}")]
    RemoteFile { path: String, message: String },

    /// Transport-level I/O failure while running a remote command. A
    /// nonzero remote exit status is data, never this error.
    #[error("command execution failed: {0}")]
    CommandExecution(String),

    /// Local or remote I/O failure during a file transfer.
    #[error("transfer failed: {context}")]
    Transfer {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A settings file could not be read or parsed.
    #[error("invalid settings: {0}")]
    Config(String),
}

impl From<russh::Error> for Error {
    fn from(e: russh::Error) -> Self {
        Error::Connection(e.to_string())
    }
}

impl Error {
    pub(crate) fn remote_file(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RemoteFile {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn transfer(
        context: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        Error::Transfer {
            context: context.into(),
            source: source.into(),
        }
    }
}

/// Result type for all session manager operations.
pub type Result<T> = std::result::Result<T, Error>;
