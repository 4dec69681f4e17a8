//! Persisted display identity
//!
//! The nickname a student plays games under is stored in the codelab
//! configuration directory so it survives restarts. It is not part of the
//! session state machine.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Identity file name inside the config directory
const IDENTITY_FILENAME: &str = "identity.toml";

/// A user-chosen display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayIdentity {
    nickname: String,
}

impl DisplayIdentity {
    /// Create an identity, trimming surrounding whitespace
    pub fn new(nickname: &str) -> Result<Self, IdentityError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(IdentityError::EmptyNickname);
        }
        Ok(Self {
            nickname: nickname.to_string(),
        })
    }

    /// The display name
    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    /// Load the identity stored at `path`
    ///
    /// Returns `Ok(None)` when nothing has been saved yet.
    pub fn load(path: &Path) -> Result<Option<Self>, IdentityError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let stored: DisplayIdentity = toml::from_str(&content)?;
        // File may have been edited by hand
        Self::new(&stored.nickname).map(Some)
    }

    /// Persist the identity at `path`
    pub fn save(&self, path: &Path) -> Result<(), IdentityError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "Saved display identity");
        Ok(())
    }
}

/// Get the default path of the identity file
pub fn default_identity_path() -> PathBuf {
    crate::config::default_config_dir().join(IDENTITY_FILENAME)
}
