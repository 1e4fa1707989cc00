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

//! Credential resolution.
//!
//! Turns the boundary-constructed [`Credential`] union into the single
//! shape the transport authenticates with. Key strings are materialized to
//! files first (public, then private) so both key variants come out
//! identical downstream.

use std::path::PathBuf;

use zeroize::Zeroizing;

use super::keystore::AuthKeyStore;
use crate::config::{Credential, expand_tilde};
use crate::error::{Error, Result};

/// Credentials in the normalized, transport-ready shape.
#[derive(Debug)]
pub enum ResolvedCredentials {
    Password(Zeroizing<String>),
    KeyPair {
        pub_path: PathBuf,
        priv_path: PathBuf,
        passphrase: Option<Zeroizing<String>>,
    },
}

/// Resolve a credential to its transport-ready shape.
///
/// Key-file paths are tilde-expanded and must exist. Key strings are
/// written to tracked temp files via the key store; those files live until
/// the owning session disconnects.
pub fn resolve(credential: &Credential, keystore: &mut AuthKeyStore) -> Result<ResolvedCredentials> {
    match credential {
        Credential::Password(password) => {
            tracing::debug!("Resolved password credentials");
            Ok(ResolvedCredentials::Password(password.clone()))
        }
        Credential::KeyFiles {
            pub_path,
            priv_path,
            passphrase,
        } => {
            let pub_path = expand_tilde(pub_path);
            let priv_path = expand_tilde(priv_path);

            for path in [&pub_path, &priv_path] {
                if !path.exists() {
                    return Err(Error::AuthConfig(format!(
                        "auth key file does not exist: {path:?}"
                    )));
                }
            }

            tracing::debug!("Resolved key-file credentials: {:?}", priv_path);
            Ok(ResolvedCredentials::KeyPair {
                pub_path,
                priv_path,
                passphrase: passphrase.clone(),
            })
        }
        Credential::KeyStrings {
            pub_content,
            priv_content,
            passphrase,
        } => {
            let pub_path = keystore.materialize(pub_content)?;
            let priv_path = keystore.materialize(priv_content)?;

            tracing::debug!("Resolved key-string credentials into {:?}", priv_path);
            Ok(ResolvedCredentials::KeyPair {
                pub_path,
                priv_path,
                passphrase: passphrase.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_password() {
        let mut keystore = AuthKeyStore::new();
        let credential = Credential::Password(Zeroizing::new("secret".to_string()));

        match resolve(&credential, &mut keystore).unwrap() {
            ResolvedCredentials::Password(p) => assert_eq!(p.as_str(), "secret"),
            other => panic!("expected Password, got {other:?}"),
        }
        assert_eq!(keystore.tracked(), 0);
    }

    #[test]
    fn test_resolve_key_files_must_exist() {
        let mut keystore = AuthKeyStore::new();
        let credential = Credential::KeyFiles {
            pub_path: PathBuf::from("/no/such/key.pub"),
            priv_path: PathBuf::from("/no/such/key"),
            passphrase: None,
        };

        assert!(matches!(
            resolve(&credential, &mut keystore),
            Err(Error::AuthConfig(_))
        ));
    }

    #[test]
    fn test_resolve_key_files() {
        let dir = TempDir::new().unwrap();
        let pub_path = dir.path().join("id.pub");
        let priv_path = dir.path().join("id");
        std::fs::write(&pub_path, "pub").unwrap();
        std::fs::write(&priv_path, "priv").unwrap();

        let mut keystore = AuthKeyStore::new();
        let credential = Credential::KeyFiles {
            pub_path: pub_path.clone(),
            priv_path: priv_path.clone(),
            passphrase: Some(Zeroizing::new("pp".to_string())),
        };

        match resolve(&credential, &mut keystore).unwrap() {
            ResolvedCredentials::KeyPair {
                pub_path: p,
                priv_path: k,
                passphrase,
            } => {
                assert_eq!(p, pub_path);
                assert_eq!(k, priv_path);
                assert_eq!(passphrase.unwrap().as_str(), "pp");
            }
            other => panic!("expected KeyPair, got {other:?}"),
        }
        // Caller-owned files are never tracked for cleanup.
        assert_eq!(keystore.tracked(), 0);
    }

    #[test]
    fn test_resolve_key_strings_materializes_both() {
        let dir = TempDir::new().unwrap();
        let mut keystore = AuthKeyStore::with_root(dir.path());
        let credential = Credential::KeyStrings {
            pub_content: Zeroizing::new("PUBLIC".to_string()),
            priv_content: Zeroizing::new("PRIVATE".to_string()),
            passphrase: None,
        };

        match resolve(&credential, &mut keystore).unwrap() {
            ResolvedCredentials::KeyPair {
                pub_path,
                priv_path,
                ..
            } => {
                assert_eq!(std::fs::read_to_string(pub_path).unwrap(), "PUBLIC");
                assert_eq!(std::fs::read_to_string(priv_path).unwrap(), "PRIVATE");
            }
            other => panic!("expected KeyPair, got {other:?}"),
        }
        assert_eq!(keystore.tracked(), 2);
    }
}
