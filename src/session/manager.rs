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

//! Session lifecycle and the resource factory.
//!
//! A [`SessionManager`] owns exactly one transport handle. `connect()`
//! drives transport establishment (which performs host key verification),
//! credential resolution, and authentication; on success every derived
//! operation (shell, tunnel, SFTP, exec, file ops, transfers) multiplexes
//! over that single authenticated transport. `disconnect()` is callable
//! from any state, never fails, and always releases temp key material.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use russh::Disconnect;
use russh::client::{self, Handle};
use russh_sftp::client::SftpSession;

use super::handler::SessionHandler;
use super::resource::{ResourceKind, ResourceRegistry, ShellStream, TermUnit, TunnelStream};
use crate::auth::keystore::AuthKeyStore;
use crate::auth::resolver::{ResolvedCredentials, resolve};
use crate::config::{ConnectionSettings, Credential};
use crate::error::{Error, Result};

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Manages one SSH session: its transport, state, derived sub-resources,
/// and ephemeral key material.
pub struct SessionManager {
    state: SessionState,
    handle: Option<Handle<SessionHandler>>,
    host_fingerprint: Option<String>,
    sftp: Option<SftpSession>,
    keystore: AuthKeyStore,
    registry: ResourceRegistry,
    teardown: Vec<String>,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            state: SessionState::Disconnected,
            handle: None,
            host_fingerprint: None,
            sftp: None,
            keystore: AuthKeyStore::new(),
            registry: ResourceRegistry::default(),
            teardown: Vec::new(),
        }
    }

    /// Create a manager whose materialized key files live under `dir`.
    pub fn with_auth_key_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            keystore: AuthKeyStore::with_root(dir),
            ..Self::new()
        }
    }

    /// Set the root directory for materialized auth key files.
    pub fn set_auth_key_dir(&mut self, dir: impl Into<PathBuf>) {
        self.keystore.set_root(dir);
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session is currently connected.
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// SHA256 fingerprint of the host key negotiated by the last transport
    /// establishment, when one was observed.
    pub fn host_fingerprint(&self) -> Option<&str> {
        self.host_fingerprint.as_deref()
    }

    /// Errors suppressed by the last `disconnect()`. Teardown is
    /// best-effort by contract; this list is the only place those failures
    /// surface.
    pub fn take_teardown_diagnostics(&mut self) -> Vec<String> {
        std::mem::take(&mut self.teardown)
    }

    /// Write auth key material to a tracked temp file.
    ///
    /// The file lives in the configured auth key directory (platform temp
    /// directory when unset) and is removed on `disconnect()` or when the
    /// manager is dropped.
    pub fn create_auth_key_file(&mut self, content: &str) -> Result<PathBuf> {
        self.keystore.materialize(content)
    }

    /// Establish the session.
    ///
    /// On an already-connected session this is a no-op returning `true`.
    /// Otherwise: open the transport (host key verification runs inside
    /// transport establishment), resolve credentials, authenticate. Any
    /// failure closes the transport, leaves the session in the `Failed`
    /// state, and surfaces the typed error.
    pub async fn connect(&mut self, settings: &ConnectionSettings) -> Result<bool> {
        if self.state == SessionState::Connected {
            tracing::debug!(
                "connect() called on an already-connected session; keeping existing transport"
            );
            return Ok(true);
        }

        self.state = SessionState::Connecting;

        if let Some(dir) = &settings.auth_key_dir {
            self.keystore.set_root(dir);
        }

        // The credential union is constructed once, here at the boundary;
        // ambiguous settings fail before anything is dialed.
        let credential = match Credential::from_settings(settings) {
            Ok(credential) => credential,
            Err(e) => return self.fail(e),
        };

        if settings.fingerprint.is_none() {
            tracing::warn!(
                "No host fingerprint pinned for {}:{}; accepting the host key on first use",
                settings.host,
                settings.port
            );
        }

        let observed = Arc::new(Mutex::new(None));
        let handler = SessionHandler::new(
            settings.host.clone(),
            settings.port,
            settings.fingerprint.clone(),
            Arc::clone(&observed),
        );

        tracing::debug!("Connecting to {}:{}", settings.host, settings.port);

        let config = Arc::new(client::Config::default());
        let connect_res = client::connect(
            config,
            (settings.host.as_str(), settings.port),
            handler,
        )
        .await;

        self.host_fingerprint = observed.lock().ok().and_then(|slot| (*slot).clone());

        let mut handle = match connect_res {
            Ok(handle) => handle,
            Err(e) => return self.fail(e),
        };

        let resolved = match resolve(&credential, &mut self.keystore) {
            Ok(resolved) => resolved,
            Err(e) => {
                let _ = handle
                    .disconnect(Disconnect::ByApplication, "credential resolution failed", "en")
                    .await;
                return self.fail(e);
            }
        };

        if let Err(e) = authenticate(&mut handle, &settings.username, resolved).await {
            let _ = handle
                .disconnect(Disconnect::ByApplication, "authentication failed", "en")
                .await;
            return self.fail(e);
        }

        tracing::info!(
            "Connected to {}@{}:{}",
            settings.username,
            settings.host,
            settings.port
        );

        self.handle = Some(handle);
        self.state = SessionState::Connected;
        Ok(true)
    }

    /// Tear the session down.
    ///
    /// Callable from any state and never fails: registered sub-resources
    /// are signaled closed, the cached SFTP channel and the transport are
    /// closed best-effort, temp key files are removed, and the session ends
    /// in `Disconnected`. Suppressed close errors are collected for
    /// [`Self::take_teardown_diagnostics`].
    pub async fn disconnect(&mut self) {
        self.teardown.clear();

        let closed = self.registry.close_all();
        if closed > 0 {
            tracing::debug!("Signaled {} sub-resource(s) to close", closed);
        }

        if let Some(sftp) = self.sftp.take()
            && let Err(e) = sftp.close().await
        {
            self.teardown.push(format!("sftp close failed: {e}"));
        }

        if let Some(handle) = self.handle.take()
            && let Err(e) = handle
                .disconnect(Disconnect::ByApplication, "session closed", "en")
                .await
        {
            self.teardown.push(format!("transport close failed: {e}"));
        }

        self.teardown.extend(self.keystore.cleanup());

        self.host_fingerprint = None;
        self.state = SessionState::Disconnected;
        tracing::debug!("Session disconnected");
    }

    /// The raw transport handle, for callers composing their own channel
    /// use on top of the session.
    pub fn connection(&self) -> Result<&Handle<SessionHandler>> {
        self.require_connected()
    }

    /// The session's SFTP sub-resource, opened on first use and cached for
    /// the life of the session.
    pub async fn to_sftp(&mut self) -> Result<&SftpSession> {
        self.require_connected()?;

        if self.sftp.is_none() {
            let handle = self.require_connected()?;
            let channel = handle.channel_open_session().await?;
            channel.request_subsystem(true, "sftp").await?;
            let sftp = SftpSession::new(channel.into_stream())
                .await
                .map_err(|e| {
                    Error::Connection(format!("failed to start SFTP subsystem: {e}"))
                })?;
            tracing::debug!("SFTP sub-resource initialized");
            self.sftp = Some(sftp);
        }

        self.sftp.as_ref().ok_or(Error::NotConnected)
    }

    /// Open an interactive shell with a PTY of the given dimensions.
    pub async fn to_shell(
        &mut self,
        term_type: &str,
        env: Option<&HashMap<String, String>>,
        width: u32,
        height: u32,
        unit: TermUnit,
    ) -> Result<ShellStream> {
        let handle = self.require_connected()?;
        let channel = handle.channel_open_session().await?;

        let (cols, rows, pix_width, pix_height) = match unit {
            TermUnit::Chars => (width, height, 0, 0),
            TermUnit::Pixels => (0, 0, width, height),
        };

        channel
            .request_pty(false, term_type, cols, rows, pix_width, pix_height, &[])
            .await?;

        if let Some(env) = env {
            for (name, value) in env {
                channel.set_env(false, name.as_str(), value.as_str()).await?;
            }
        }

        channel.request_shell(false).await?;

        tracing::debug!("Shell sub-resource opened (term={})", term_type);
        let closed = self.registry.register(ResourceKind::Shell);
        Ok(ShellStream::new(channel, closed))
    }

    /// Open a direct-tcpip forward to `host:port` through the established
    /// transport. No new transport connection is made; the tunnel is a
    /// logical channel multiplexed over the existing session.
    pub async fn to_tunnel(&mut self, host: &str, port: u16) -> Result<TunnelStream> {
        let handle = self.require_connected()?;
        let channel = handle
            .channel_open_direct_tcpip(host, u32::from(port), "127.0.0.1", 0)
            .await?;

        tracing::debug!("Tunnel sub-resource opened to {}:{}", host, port);
        let closed = self.registry.register(ResourceKind::Tunnel);
        Ok(TunnelStream::new(channel, closed))
    }

    pub(crate) fn require_connected(&self) -> Result<&Handle<SessionHandler>> {
        match (self.state, &self.handle) {
            (SessionState::Connected, Some(handle)) => Ok(handle),
            _ => Err(Error::NotConnected),
        }
    }

    fn fail<T>(&mut self, err: Error) -> Result<T> {
        self.state = SessionState::Failed;
        Err(err)
    }
}

/// Authenticate over an established transport with resolved credentials.
async fn authenticate(
    handle: &mut Handle<SessionHandler>,
    username: &str,
    credentials: ResolvedCredentials,
) -> Result<()> {
    match credentials {
        ResolvedCredentials::Password(password) => {
            let result = handle
                .authenticate_password(username, password.as_str())
                .await?;
            if !result.success() {
                tracing::warn!("Password authentication rejected for '{}'", username);
                return Err(Error::Authentication {
                    username: username.to_string(),
                });
            }
        }
        ResolvedCredentials::KeyPair {
            priv_path,
            passphrase,
            ..
        } => {
            let key = russh::keys::load_secret_key(
                &priv_path,
                passphrase.as_deref().map(|p| p.as_str()),
            )
            .map_err(|e| {
                Error::AuthConfig(format!("unusable private key {priv_path:?}: {e}"))
            })?;

            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            let result = handle
                .authenticate_publickey(
                    username,
                    russh::keys::PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await?;
            if !result.success() {
                tracing::warn!("Key authentication rejected for '{}'", username);
                return Err(Error::Authentication {
                    username: username.to_string(),
                });
            }
        }
    }

    Ok(())
}
