//! Secret lookup through the 1Password CLI.
//!
//! Credentials never live in files or the environment of a local run; they are
//! referenced by vault location (`op://<vault>/<item>/<field>`) and read on demand
//! with `op read`. In CI, `OP_SERVICE_ACCOUNT_TOKEN` lets the same CLI authenticate
//! non-interactively.

use async_trait::async_trait;
use secrecy::SecretString;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const SCHEME: &str = "op://";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Invalid secret reference {0:?}: expected op://<vault>/<item>/<field>")]
    InvalidReference(String),

    #[error("Failed to run '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'op read {reference}' exited with {code:?}: {stderr}")]
    CommandFailed {
        reference: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Secret at {0} is not valid UTF-8")]
    InvalidUtf8(String),

    #[error("Secret at {0} is empty")]
    Empty(String),
}

/// Location of a single field in the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    pub vault: String,
    pub item: String,
    pub field: String,
}

impl SecretReference {
    pub fn new(vault: impl Into<String>, item: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            vault: vault.into(),
            item: item.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}/{}", self.vault, self.item, self.field)
    }
}

impl FromStr for SecretReference {
    type Err = SecretError;

    /// Parses `op://vault/item/field`. Anything after the second slash belongs to the
    /// field, which keeps `section/field` references intact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SecretError::InvalidReference(s.to_string());
        let rest = s.trim().strip_prefix(SCHEME).ok_or_else(invalid)?;

        let mut parts = rest.splitn(3, '/');
        let (Some(vault), Some(item), Some(field)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        if vault.is_empty() || item.is_empty() || field.is_empty() {
            return Err(invalid());
        }

        Ok(Self::new(vault, item, field))
    }
}

/// Anything that can turn a reference into a plaintext secret.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn read(&self, reference: &SecretReference) -> Result<SecretString, SecretError>;
}

/// Reads secrets by shelling out to `op read <reference>`.
#[derive(Debug, Clone)]
pub struct OpCli {
    binary: String,
}

impl OpCli {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for OpCli {
    fn default() -> Self {
        Self::new("op")
    }
}

#[async_trait]
impl SecretStore for OpCli {
    async fn read(&self, reference: &SecretReference) -> Result<SecretString, SecretError> {
        let reference_str = reference.to_string();
        tracing::debug!(reference = %reference_str, "Reading secret");

        let output = tokio::process::Command::new(&self.binary)
            .arg("read")
            .arg(&reference_str)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SecretError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SecretError::CommandFailed {
                reference: reference_str,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let value = String::from_utf8(output.stdout)
            .map_err(|_| SecretError::InvalidUtf8(reference_str.clone()))?;
        let value = value.trim();
        if value.is_empty() {
            return Err(SecretError::Empty(reference_str));
        }

        Ok(SecretString::from(value.to_string()))
    }
}
