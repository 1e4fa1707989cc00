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

//! Unified SSH session manager built on russh.
//!
//! One authenticated transport per [`SessionManager`], multiplexed into
//! typed sub-resources: one-shot command execution, interactive shells,
//! direct-tcpip tunnels, and an SFTP channel serving remote filesystem
//! operations and file transfers. Every derived resource requires a live,
//! verified session; `disconnect()` is idempotent and releases everything
//! the session created, including materialized auth key files.
//!
//! # Example
//!
//! ```no_run
//! use sesh::{ConnectionSettings, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> sesh::Result<()> {
//!     let settings = ConnectionSettings::new("shell.example.com", "test")
//!         .with_password("secret")
//!         .with_fingerprint("SHA256:nThbg6kXUpJWGl7E1IGOCspRomTxdCARLviKw6E5SY8");
//!
//!     let mut session = SessionManager::new();
//!     session.connect(&settings).await?;
//!
//!     let result = session.exec("uname -a").await?;
//!     println!("{}", result.stdout);
//!
//!     for entry in session.scan_dir("/tmp").await? {
//!         println!("{} ({:?})", entry.path, entry.kind);
//!     }
//!
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod exec;
pub mod remote_fs;
pub mod session;
pub mod transfer;

pub use auth::AuthKeyStore;
pub use config::{ConnectionSettings, Credential};
pub use error::{Error, Result};
pub use exec::ExecOutput;
pub use remote_fs::{FileKind, RemoteFileInfo};
pub use session::{SessionManager, SessionState, ShellStream, TermUnit, TunnelStream};
