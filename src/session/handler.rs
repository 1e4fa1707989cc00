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

use std::sync::{Arc, Mutex};

use russh::client;
use russh::keys::{HashAlg, PublicKey};

use crate::auth::fingerprint;
use crate::error::Error;

/// russh client handler for the session.
///
/// Host key verification runs here, during transport establishment: the
/// server key's SHA256 fingerprint is recorded for the session and checked
/// against the pinned fingerprint when one is configured.
pub struct SessionHandler {
    host: String,
    port: u16,
    expected_fingerprint: Option<String>,
    observed_fingerprint: Arc<Mutex<Option<String>>>,
}

impl SessionHandler {
    pub(crate) fn new(
        host: String,
        port: u16,
        expected_fingerprint: Option<String>,
        observed_fingerprint: Arc<Mutex<Option<String>>>,
    ) -> Self {
        Self {
            host,
            port,
            expected_fingerprint,
            observed_fingerprint,
        }
    }
}

impl client::Handler for SessionHandler {
    type Error = Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        let actual = server_public_key.fingerprint(HashAlg::Sha256).to_string();

        if let Ok(mut slot) = self.observed_fingerprint.lock() {
            *slot = Some(actual.clone());
        }

        if fingerprint::verify(self.expected_fingerprint.as_deref(), &actual) {
            tracing::debug!(
                "Host key for {}:{} accepted ({})",
                self.host,
                self.port,
                actual
            );
            Ok(true)
        } else {
            let expected = self.expected_fingerprint.clone().unwrap_or_default();
            tracing::warn!(
                "Host key for {}:{} rejected: expected '{}', got '{}'",
                self.host,
                self.port,
                expected,
                actual
            );
            Err(Error::FingerprintMismatch { expected, actual })
        }
    }
}
