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

//! One-shot remote command execution over an exec channel.

use russh::ChannelMsg;

use crate::error::{Error, Result};
use crate::session::SessionManager;

/// Result of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit status reported by the remote, when it reported one. Some
    /// transports never deliver a status; that is `None` ("unknown"), not
    /// zero.
    pub exit_status: Option<u32>,
}

impl ExecOutput {
    /// Whether the command reported a zero exit status.
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

impl SessionManager {
    /// Run `command` on the remote and collect its output.
    ///
    /// Every invocation is a fresh shell context. A nonzero exit status is
    /// data in the result, never an error; `CommandExecution` is raised
    /// only for transport-level failures.
    pub async fn exec(&self, command: &str) -> Result<ExecOutput> {
        let handle = self.require_connected()?;

        tracing::debug!("Executing command: {}", command);

        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandExecution(format!("failed to open exec channel: {e}")))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandExecution(format!("failed to send command: {e}")))?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        // The exit status can arrive before trailing data, and the channel
        // may close without an Eof. Drain until the channel ends.
        while let Some(msg) = channel.wait().await {
            match msg {
                ChannelMsg::Data { ref data } => stdout.extend_from_slice(data),
                ChannelMsg::ExtendedData { ref data, ext: 1 } => stderr.extend_from_slice(data),
                ChannelMsg::ExitStatus {
                    exit_status: status,
                } => exit_status = Some(status),
                _ => {}
            }
        }

        tracing::debug!(
            "Command finished (exit status: {:?}, {} bytes stdout, {} bytes stderr)",
            exit_status,
            stdout.len(),
            stderr.len()
        );

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_reported_zero() {
        let output = ExecOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_status: Some(0),
        };
        assert!(output.success());

        let nonzero = ExecOutput {
            exit_status: Some(1),
            ..output.clone()
        };
        assert!(!nonzero.success());

        // An unreported status is unknown, not success.
        let unknown = ExecOutput {
            exit_status: None,
            ..output
        };
        assert!(!unknown.success());
    }
}
