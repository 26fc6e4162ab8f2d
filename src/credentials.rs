//! API credential handling
//!
//! The credential is a single opaque string. It is persisted in
//! `~/.config/parley/credential` so it survives between runs, and can be
//! overridden with `OPENAI_API_KEY`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};

use crate::Result;

/// Environment variable that overrides the stored credential
pub const CREDENTIAL_ENV: &str = "OPENAI_API_KEY";

/// Opaque API credential
#[derive(Clone)]
pub struct Credential(Arc<SecretString>);

impl Credential {
    /// Wrap a raw key, trimming surrounding whitespace
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(Arc::new(SecretString::from(raw.as_ref().trim().to_string())))
    }

    /// Whether the key is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.expose_secret().is_empty()
    }

    /// Raw key for request headers
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// `Authorization` header value
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.expose())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential([REDACTED])")
    }
}

/// File-backed store for the single credential string
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store at an explicit path
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the default location, `~/.config/parley/credential`
    #[must_use]
    pub fn default_location() -> Self {
        let path = directories::BaseDirs::new().map_or_else(
            || PathBuf::from(".config/parley/credential"),
            |d| d.config_dir().join("parley").join("credential"),
        );
        Self::new(path)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored credential
    ///
    /// Returns `None` if nothing is stored or the stored value is blank
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read
    pub fn read(&self) -> Result<Option<Credential>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let credential = Credential::new(content);
                Ok((!credential.is_empty()).then_some(credential))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve the credential: environment first, then the stored value
    ///
    /// # Errors
    ///
    /// Returns error if the stored file cannot be read
    pub fn resolve(&self) -> Result<Option<Credential>> {
        if let Some(credential) = std::env::var(CREDENTIAL_ENV)
            .ok()
            .map(Credential::new)
            .filter(|c| !c.is_empty())
        {
            tracing::debug!(source = CREDENTIAL_ENV, "using credential from environment");
            return Ok(Some(credential));
        }
        self.read()
    }

    /// Persist a credential, replacing any previous value
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&self, raw: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, raw.trim())?;
        restrict_permissions(&self.path)?;
        tracing::info!(path = %self.path.display(), "credential saved");
        Ok(())
    }

    /// Remove the stored credential
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be removed
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "credential removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
const fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
