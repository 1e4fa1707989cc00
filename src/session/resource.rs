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

//! Owned sub-resource handles and the session's resource registry.
//!
//! Each long-lived sub-resource (shell, tunnel) is a logical channel
//! multiplexed over the session's one transport. Handles are registered
//! with the session so `disconnect()` can close them deterministically:
//! every handle carries a cancellation token; cancelling it makes any
//! in-flight or later call on the handle fail with a closed-resource error
//! instead of hanging on a dead transport.

use std::sync::{Arc, Mutex};

use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Unit for interactive shell dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermUnit {
    /// Width and height are columns and rows.
    Chars,
    /// Width and height are pixels.
    Pixels,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ResourceKind {
    Shell,
    Tunnel,
}

/// Tracks cancellation tokens for every derived long-lived sub-resource.
#[derive(Debug, Clone, Default)]
pub(crate) struct ResourceRegistry {
    entries: Arc<Mutex<Vec<(ResourceKind, CancellationToken)>>>,
}

impl ResourceRegistry {
    /// Register a new sub-resource and return its cancellation token.
    pub(crate) fn register(&self, kind: ResourceKind) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((kind, token.clone()));
        }
        token
    }

    /// Cancel every registered sub-resource. Returns how many were signaled.
    pub(crate) fn close_all(&self) -> usize {
        let Ok(mut entries) = self.entries.lock() else {
            return 0;
        };
        let count = entries.len();
        for (kind, token) in entries.drain(..) {
            tracing::debug!("Closing {:?} sub-resource", kind);
            token.cancel();
        }
        count
    }
}

/// Shared read/write plumbing over one logical channel.
struct ChannelHandle {
    channel: Channel<Msg>,
    closed: CancellationToken,
}

impl ChannelHandle {
    fn new(channel: Channel<Msg>, closed: CancellationToken) -> Self {
        Self { channel, closed }
    }

    /// Read the next chunk of data. `Ok(None)` means the remote side ended
    /// the stream; a cancelled handle reports the closed-resource error.
    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        loop {
            tokio::select! {
                _ = self.closed.cancelled() => return Err(Error::NotConnected),
                msg = self.channel.wait() => match msg {
                    Some(ChannelMsg::Data { ref data }) => return Ok(Some(data.to_vec())),
                    Some(ChannelMsg::ExtendedData { ref data, .. }) => {
                        return Ok(Some(data.to_vec()))
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => return Ok(None),
                    Some(_) => {}
                },
            }
        }
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        if self.closed.is_cancelled() {
            return Err(Error::NotConnected);
        }
        self.channel
            .data(data)
            .await
            .map_err(|e| Error::Connection(format!("channel write failed: {e}")))
    }

    async fn close(mut self) {
        if let Err(e) = self.channel.eof().await {
            tracing::debug!("Failed to send EOF on channel close: {}", e);
        }
        if let Err(e) = self.channel.close().await {
            tracing::debug!("Failed to close channel: {}", e);
        }
    }
}

/// Bidirectional byte stream of an interactive shell with a PTY.
pub struct ShellStream {
    inner: ChannelHandle,
}

impl ShellStream {
    pub(crate) fn new(channel: Channel<Msg>, closed: CancellationToken) -> Self {
        Self {
            inner: ChannelHandle::new(channel, closed),
        }
    }

    /// Read the next chunk of shell output; `Ok(None)` when the shell ends.
    pub async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        self.inner.read().await
    }

    /// Send input to the shell.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write(data).await
    }

    /// Propagate a local terminal resize to the remote PTY.
    pub async fn window_change(&mut self, width: u32, height: u32) -> Result<()> {
        if self.inner.closed.is_cancelled() {
            return Err(Error::NotConnected);
        }
        self.inner
            .channel
            .window_change(width, height, 0, 0)
            .await
            .map_err(|e| Error::Connection(format!("window change failed: {e}")))
    }

    /// Close this shell. The session and its other sub-resources are
    /// unaffected.
    pub async fn close(self) {
        self.inner.close().await;
    }
}

/// Bidirectional byte stream of a direct-tcpip forward to a third host,
/// routed through the established transport.
pub struct TunnelStream {
    inner: ChannelHandle,
}

impl TunnelStream {
    pub(crate) fn new(channel: Channel<Msg>, closed: CancellationToken) -> Self {
        Self {
            inner: ChannelHandle::new(channel, closed),
        }
    }

    /// Read the next chunk from the forwarded connection; `Ok(None)` when
    /// the remote end closes.
    pub async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        self.inner.read().await
    }

    /// Write to the forwarded connection.
    pub async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write(data).await
    }

    /// Close this tunnel. The session and its other sub-resources are
    /// unaffected.
    pub async fn close(self) {
        self.inner.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_close_all_cancels_tokens() {
        let registry = ResourceRegistry::default();
        let shell = registry.register(ResourceKind::Shell);
        let tunnel = registry.register(ResourceKind::Tunnel);

        assert!(!shell.is_cancelled());
        assert!(!tunnel.is_cancelled());

        assert_eq!(registry.close_all(), 2);
        assert!(shell.is_cancelled());
        assert!(tunnel.is_cancelled());
    }

    #[test]
    fn test_registry_close_all_is_idempotent() {
        let registry = ResourceRegistry::default();
        registry.register(ResourceKind::Shell);

        assert_eq!(registry.close_all(), 1);
        assert_eq!(registry.close_all(), 0);
    }
}
