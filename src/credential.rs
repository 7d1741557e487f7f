//! Session credential for the image service.
//!
//! A credential comes from one of three places, in order of precedence:
//! a host-provided key selector, a manually entered key, or an environment
//! default. It lives in memory for the session only.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CredentialError;

/// A manually entered key must be longer than this many characters.
pub const MIN_MANUAL_KEY_LEN: usize = 10;

/// Environment variables checked for a default key, first non-empty wins.
pub const ENV_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "API_KEY", "GOOGLE_API_KEY"];

/// Where the active credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialOrigin {
    /// Supplied by the host's key selector.
    HostProvided,
    /// Typed in by the user.
    ManualEntry,
    /// Preconfigured in the environment.
    EnvironmentDefault,
}

impl fmt::Display for CredentialOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostProvided => write!(f, "host-provided"),
            Self::ManualEntry => write!(f, "manual-entry"),
            Self::EnvironmentDefault => write!(f, "environment-default"),
        }
    }
}

/// An API key together with its origin. `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    value: String,
    origin: CredentialOrigin,
}

impl Credential {
    /// Creates a credential.
    pub fn new(value: impl Into<String>, origin: CredentialOrigin) -> Self {
        Self {
            value: value.into(),
            origin,
        }
    }

    /// Returns the secret value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Returns where this credential came from.
    pub fn origin(&self) -> CredentialOrigin {
        self.origin
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"<redacted>")
            .field("origin", &self.origin)
            .finish()
    }
}

/// Key-selection capability offered by an embedding host.
#[async_trait]
pub trait HostKeySelector: Send + Sync {
    /// Returns true if the user already picked a key in this host session.
    async fn has_selected_api_key(&self) -> bool;

    /// Returns the selected key, prompting the user first if none is selected.
    async fn open_select_key(&self) -> Result<String, CredentialError>;
}

/// How credentials are sourced, decided once at construction.
#[derive(Clone)]
enum KeySource {
    HostProvided(Arc<dyn HostKeySelector>),
    Local { environment_default: Option<String> },
}

/// Holds the active credential for the session.
#[derive(Clone)]
pub struct CredentialHolder {
    source: KeySource,
    active: Option<Credential>,
    rejected: Option<String>,
}

impl fmt::Debug for CredentialHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            KeySource::HostProvided(_) => "host-provided",
            KeySource::Local { .. } => "local",
        };
        f.debug_struct("CredentialHolder")
            .field("source", &source)
            .field("active", &self.active)
            .field("has_rejected", &self.rejected.is_some())
            .finish()
    }
}

impl CredentialHolder {
    /// Creates a holder that sources keys from manual entry and the given default.
    pub fn new(environment_default: Option<String>) -> Self {
        let environment_default = environment_default.filter(|v| !v.trim().is_empty());
        Self {
            source: KeySource::Local {
                environment_default,
            },
            active: None,
            rejected: None,
        }
    }

    /// Creates a holder whose default comes from [`ENV_KEY_VARS`].
    pub fn from_env() -> Self {
        let default = ENV_KEY_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty());
        Self::new(default)
    }

    /// Creates a holder that delegates to a host key selector.
    pub fn with_host_selector(selector: Arc<dyn HostKeySelector>) -> Self {
        Self {
            source: KeySource::HostProvided(selector),
            active: None,
            rejected: None,
        }
    }

    /// Returns true if a credential is active.
    pub fn has_credential(&self) -> bool {
        self.active.is_some()
    }

    /// Returns the active credential, if any.
    pub fn active(&self) -> Option<&Credential> {
        self.active.as_ref()
    }

    /// Re-checks credential state without user interaction.
    ///
    /// Adopts a key the host already selected, or the environment default.
    /// Leaves an existing active credential alone, and never re-adopts a key
    /// the service rejected; only [`acquire`](Self::acquire) can do that.
    pub async fn refresh(&mut self) -> Option<&Credential> {
        if self.active.is_none() {
            let found = match &self.source {
                KeySource::HostProvided(selector) => {
                    if selector.has_selected_api_key().await {
                        match selector.open_select_key().await {
                            Ok(key) => Some(Credential::new(key, CredentialOrigin::HostProvided)),
                            Err(e) => {
                                tracing::warn!("host key selection failed: {e}");
                                None
                            }
                        }
                    } else {
                        None
                    }
                }
                KeySource::Local {
                    environment_default,
                } => environment_default
                    .clone()
                    .map(|key| Credential::new(key, CredentialOrigin::EnvironmentDefault)),
            };
            let found = found.filter(|c| self.rejected.as_deref() != Some(c.value()));
            if let Some(ref credential) = found {
                tracing::debug!(origin = %credential.origin(), "adopted credential");
            }
            self.active = found;
        }
        self.active.as_ref()
    }

    /// Acquires a credential, replacing any active one.
    pub async fn acquire(&mut self, manual: Option<&str>) -> Result<Credential, CredentialError> {
        let credential = match &self.source {
            KeySource::HostProvided(selector) => {
                let key = selector.open_select_key().await?;
                Credential::new(key, CredentialOrigin::HostProvided)
            }
            KeySource::Local {
                environment_default,
            } => match manual.map(str::trim) {
                Some(key) => {
                    if key.chars().count() <= MIN_MANUAL_KEY_LEN {
                        return Err(CredentialError::TooShort {
                            min: MIN_MANUAL_KEY_LEN,
                        });
                    }
                    Credential::new(key, CredentialOrigin::ManualEntry)
                }
                None => match environment_default {
                    Some(key) => Credential::new(key.clone(), CredentialOrigin::EnvironmentDefault),
                    None => return Err(CredentialError::Missing),
                },
            },
        };

        tracing::info!(origin = %credential.origin(), "credential acquired");
        self.rejected = None;
        self.active = Some(credential.clone());
        Ok(credential)
    }

    /// Discards the active credential.
    pub fn clear(&mut self) {
        if self.active.take().is_some() {
            tracing::debug!("credential cleared");
        }
    }

    /// Discards the active credential after the service refused it.
    ///
    /// The refused key is remembered so [`refresh`](Self::refresh) does not
    /// silently adopt it again.
    pub fn reject(&mut self) {
        if let Some(credential) = self.active.take() {
            tracing::debug!(origin = %credential.origin(), "credential rejected");
            self.rejected = Some(credential.value);
        }
    }
}
