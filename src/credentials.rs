//! API key sources and the key-selection gate.
//!
//! Keys are resolved on every request so a key rotated by the host takes
//! effect on the next call without rebuilding the provider.

use crate::error::{LuminiaError, Result};
use async_trait::async_trait;

/// Primary environment variable holding the Gemini API key.
pub const GOOGLE_API_KEY_VAR: &str = "GOOGLE_API_KEY";
/// Fallback environment variable holding the Gemini API key.
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Shown when the host reports the selected key or session no longer exists.
pub const SESSION_EXPIRED_MESSAGE: &str =
    "Session expired or invalid. Please try selecting the key again.";
/// Shown for every other key-selection failure.
pub const SELECTION_FAILED_MESSAGE: &str = "Failed to select API key. Please try again.";

const ENTITY_NOT_FOUND: &str = "Requested entity was not found";

/// Supplies the API key at call time.
pub trait KeySource: Send + Sync {
    /// Returns the current key.
    fn api_key(&self) -> Result<String>;
}

/// Reads the key from environment variables on every call.
#[derive(Debug, Clone)]
pub struct EnvKey {
    vars: Vec<String>,
}

impl EnvKey {
    /// Reads a single named variable.
    pub fn new(var: impl Into<String>) -> Self {
        Self {
            vars: vec![var.into()],
        }
    }

    /// Names of the variables consulted, in order.
    pub fn vars(&self) -> &[String] {
        &self.vars
    }
}

impl Default for EnvKey {
    /// `GOOGLE_API_KEY`, then `GEMINI_API_KEY`.
    fn default() -> Self {
        Self {
            vars: vec![GOOGLE_API_KEY_VAR.into(), GEMINI_API_KEY_VAR.into()],
        }
    }
}

impl KeySource for EnvKey {
    fn api_key(&self) -> Result<String> {
        self.vars
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .find(|key| !key.trim().is_empty())
            .ok_or_else(|| LuminiaError::Auth(format!("{} not set", self.vars.join(" or "))))
    }
}

/// A fixed key, for callers that manage rotation themselves.
#[derive(Clone)]
pub struct StaticKey(String);

impl StaticKey {
    /// Wraps the given key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Debug for StaticKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticKey(<redacted>)")
    }
}

impl KeySource for StaticKey {
    fn api_key(&self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(LuminiaError::Auth("API key is empty".into()));
        }
        Ok(self.0.clone())
    }
}

impl<F> KeySource for F
where
    F: Fn() -> Option<String> + Send + Sync,
{
    fn api_key(&self) -> Result<String> {
        self()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LuminiaError::Auth("no API key available".into()))
    }
}

/// A host-provided flow that lets the user pick an API key.
#[async_trait]
pub trait KeySelector: Send + Sync {
    /// Opens the selection flow. `Err` carries the host's fault text.
    async fn open_select_key(&self) -> std::result::Result<(), String>;
}

/// Runs the key-selection flow, calling `on_selected` once a key is chosen.
///
/// Failures are mapped to one of two user-facing messages; the raw fault is
/// logged.
pub async fn select_api_key<S, F>(selector: &S, on_selected: F) -> Result<()>
where
    S: KeySelector + ?Sized,
    F: FnOnce(),
{
    match selector.open_select_key().await {
        Ok(()) => {
            on_selected();
            Ok(())
        }
        Err(fault) => {
            tracing::error!(fault = %fault, "key selection failed");
            let message = if fault.contains(ENTITY_NOT_FOUND) {
                SESSION_EXPIRED_MESSAGE
            } else {
                SELECTION_FAILED_MESSAGE
            };
            Err(LuminiaError::KeySelection(message.into()))
        }
    }
}

/// Terminal host selector: succeeds once the environment holds a key.
#[derive(Debug, Clone, Default)]
pub struct EnvKeySelector {
    source: EnvKey,
}

impl EnvKeySelector {
    /// Checks the given source instead of the default variables.
    pub fn new(source: EnvKey) -> Self {
        Self { source }
    }
}

#[async_trait]
impl KeySelector for EnvKeySelector {
    async fn open_select_key(&self) -> std::result::Result<(), String> {
        self.source.api_key().map(|_| ()).map_err(|e| e.to_string())
    }
}
