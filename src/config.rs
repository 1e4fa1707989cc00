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

//! Connection settings and the credential union.
//!
//! `ConnectionSettings` carries the recognized configuration keys in their
//! flat, field-per-key form. [`Credential::from_settings`] folds the
//! credential fields into an explicit tagged union exactly once, at the
//! boundary; populating more than one variant is a configuration error, not
//! an implicit precedence choice.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

fn default_port() -> u16 {
    22
}

/// Settings for one SSH connection.
///
/// Exactly one credential variant must be populated:
/// `password`, or `ssh_auth_pub_file` + `ssh_auth_priv_file`, or
/// `ssh_auth_pub_string` + `ssh_auth_priv_string`. The passphrase field
/// applies to whichever key variant is in use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub username: String,

    /// Expected host key digest. When absent, host key verification
    /// trivially passes (trust on first use).
    #[serde(default)]
    pub fingerprint: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub ssh_auth_pub_file: Option<PathBuf>,

    #[serde(default)]
    pub ssh_auth_priv_file: Option<PathBuf>,

    #[serde(default)]
    pub ssh_auth_pub_string: Option<String>,

    #[serde(default)]
    pub ssh_auth_priv_string: Option<String>,

    #[serde(default)]
    pub ssh_auth_passphrase: Option<String>,

    /// Root directory for materialized auth key files. Falls back to the
    /// platform temp directory when unset.
    #[serde(default)]
    pub auth_key_dir: Option<PathBuf>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_port(),
            username: String::new(),
            fingerprint: None,
            password: None,
            ssh_auth_pub_file: None,
            ssh_auth_priv_file: None,
            ssh_auth_pub_string: None,
            ssh_auth_priv_string: None,
            ssh_auth_passphrase: None,
            auth_key_dir: None,
        }
    }
}

impl ConnectionSettings {
    /// Create settings for `username@host` on the default port.
    pub fn new(host: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            username: username.into(),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_key_files(
        mut self,
        pub_file: impl Into<PathBuf>,
        priv_file: impl Into<PathBuf>,
        passphrase: Option<String>,
    ) -> Self {
        self.ssh_auth_pub_file = Some(pub_file.into());
        self.ssh_auth_priv_file = Some(priv_file.into());
        self.ssh_auth_passphrase = passphrase;
        self
    }

    pub fn with_key_strings(
        mut self,
        pub_string: impl Into<String>,
        priv_string: impl Into<String>,
        passphrase: Option<String>,
    ) -> Self {
        self.ssh_auth_pub_string = Some(pub_string.into());
        self.ssh_auth_priv_string = Some(priv_string.into());
        self.ssh_auth_passphrase = passphrase;
        self
    }

    pub fn with_auth_key_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.auth_key_dir = Some(dir.into());
        self
    }

    /// Load settings from a YAML file.
    pub async fn load(path: &Path) -> Result<Self> {
        let expanded = expand_tilde(path);

        let content = tokio::fs::read_to_string(&expanded)
            .await
            .map_err(|e| Error::Config(format!("failed to read {expanded:?}: {e}")))?;

        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse {expanded:?}: {e}")))
    }
}

/// One credential, selected explicitly.
///
/// Built from [`ConnectionSettings`] once, at the boundary. The key-strings
/// variant is normalized to key files during resolution so everything
/// downstream handles a single file-based shape.
#[derive(Debug, Clone)]
pub enum Credential {
    Password(Zeroizing<String>),
    KeyFiles {
        pub_path: PathBuf,
        priv_path: PathBuf,
        passphrase: Option<Zeroizing<String>>,
    },
    KeyStrings {
        pub_content: Zeroizing<String>,
        priv_content: Zeroizing<String>,
        passphrase: Option<Zeroizing<String>>,
    },
}

impl Credential {
    /// Fold the flat settings fields into the tagged union.
    ///
    /// Fails when no variant is populated, when a key variant is only
    /// partially populated, or when more than one variant is populated at
    /// once.
    pub fn from_settings(settings: &ConnectionSettings) -> Result<Self> {
        let has_password = settings.password.is_some();
        let has_key_files =
            settings.ssh_auth_pub_file.is_some() || settings.ssh_auth_priv_file.is_some();
        let has_key_strings =
            settings.ssh_auth_pub_string.is_some() || settings.ssh_auth_priv_string.is_some();

        let populated = [has_password, has_key_files, has_key_strings]
            .iter()
            .filter(|v| **v)
            .count();

        if populated > 1 {
            return Err(Error::AuthConfig(
                "multiple credential variants populated; set exactly one of password, \
                 ssh_auth_*_file, or ssh_auth_*_string"
                    .to_string(),
            ));
        }

        let passphrase = settings
            .ssh_auth_passphrase
            .as_ref()
            .map(|p| Zeroizing::new(p.clone()));

        if let Some(password) = &settings.password {
            return Ok(Credential::Password(Zeroizing::new(password.clone())));
        }

        if has_key_files {
            let (Some(pub_path), Some(priv_path)) =
                (&settings.ssh_auth_pub_file, &settings.ssh_auth_priv_file)
            else {
                return Err(Error::AuthConfig(
                    "key-file authentication requires both ssh_auth_pub_file and \
                     ssh_auth_priv_file"
                        .to_string(),
                ));
            };
            return Ok(Credential::KeyFiles {
                pub_path: pub_path.clone(),
                priv_path: priv_path.clone(),
                passphrase,
            });
        }

        if has_key_strings {
            let (Some(pub_content), Some(priv_content)) = (
                &settings.ssh_auth_pub_string,
                &settings.ssh_auth_priv_string,
            ) else {
                return Err(Error::AuthConfig(
                    "key-string authentication requires both ssh_auth_pub_string and \
                     ssh_auth_priv_string"
                        .to_string(),
                ));
            };
            return Ok(Credential::KeyStrings {
                pub_content: Zeroizing::new(pub_content.clone()),
                priv_content: Zeroizing::new(priv_content.clone()),
                passphrase,
            });
        }

        Err(Error::AuthConfig(
            "no credential fields populated; set password, ssh_auth_*_file, or \
             ssh_auth_*_string"
                .to_string(),
        ))
    }
}

/// Expand a leading `~/` to the home directory.
pub(crate) fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str()
        && path_str.starts_with("~/")
        && let Ok(home) = std::env::var("HOME")
    {
        return PathBuf::from(path_str.replacen("~", &home, 1));
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_port() {
        let settings = ConnectionSettings::new("example.com", "alice");
        assert_eq!(settings.port, 22);
        assert_eq!(settings.host, "example.com");
        assert_eq!(settings.username, "alice");
    }

    #[test]
    fn test_password_variant() {
        let settings = ConnectionSettings::new("h", "u").with_password("secret");
        match Credential::from_settings(&settings).unwrap() {
            Credential::Password(p) => assert_eq!(p.as_str(), "secret"),
            other => panic!("expected Password, got {other:?}"),
        }
    }

    #[test]
    fn test_key_files_variant() {
        let settings = ConnectionSettings::new("h", "u").with_key_files(
            "/tmp/id.pub",
            "/tmp/id",
            Some("pp".to_string()),
        );
        match Credential::from_settings(&settings).unwrap() {
            Credential::KeyFiles {
                pub_path,
                priv_path,
                passphrase,
            } => {
                assert_eq!(pub_path, PathBuf::from("/tmp/id.pub"));
                assert_eq!(priv_path, PathBuf::from("/tmp/id"));
                assert_eq!(passphrase.unwrap().as_str(), "pp");
            }
            other => panic!("expected KeyFiles, got {other:?}"),
        }
    }

    #[test]
    fn test_key_strings_variant() {
        let settings =
            ConnectionSettings::new("h", "u").with_key_strings("PUB", "PRIV", None);
        match Credential::from_settings(&settings).unwrap() {
            Credential::KeyStrings {
                pub_content,
                priv_content,
                passphrase,
            } => {
                assert_eq!(pub_content.as_str(), "PUB");
                assert_eq!(priv_content.as_str(), "PRIV");
                assert!(passphrase.is_none());
            }
            other => panic!("expected KeyStrings, got {other:?}"),
        }
    }

    #[test]
    fn test_no_credentials_is_error() {
        let settings = ConnectionSettings::new("h", "u");
        assert!(matches!(
            Credential::from_settings(&settings),
            Err(Error::AuthConfig(_))
        ));
    }

    #[test]
    fn test_multiple_variants_is_error() {
        let settings = ConnectionSettings::new("h", "u")
            .with_password("secret")
            .with_key_strings("PUB", "PRIV", None);
        assert!(matches!(
            Credential::from_settings(&settings),
            Err(Error::AuthConfig(_))
        ));
    }

    #[test]
    fn test_partial_key_files_is_error() {
        let mut settings = ConnectionSettings::new("h", "u");
        settings.ssh_auth_priv_file = Some(PathBuf::from("/tmp/id"));
        assert!(matches!(
            Credential::from_settings(&settings),
            Err(Error::AuthConfig(_))
        ));
    }

    #[test]
    fn test_settings_yaml_roundtrip() {
        let yaml = "host: shell.example.com\nusername: test\npassword: p\n";
        let settings: ConnectionSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.host, "shell.example.com");
        assert_eq!(settings.port, 22);
        assert_eq!(settings.password.as_deref(), Some("p"));
    }

    #[test]
    fn test_expand_tilde_absolute_path_unchanged() {
        let absolute = expand_tilde(Path::new("/etc/ssh/key"));
        assert_eq!(absolute, PathBuf::from("/etc/ssh/key"));
    }
}
