//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (e.g. `"RBK_ACCESS_SECRET"`).
//! - Binaries call [`resolve_secrets`] once at startup and pass the result to
//!   constructors; nothing else reads these variables.
//! - `Debug` redacts values; errors name the variable, never its value.

use anyhow::{bail, Result};
use serde_json::Value;

const DEFAULT_ACCESS_VAR: &str = "RBK_ACCESS_SECRET";
const DEFAULT_REFRESH_VAR: &str = "RBK_REFRESH_SECRET";

/// Token signing keys. Values are redacted in `Debug` output.
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// HMAC key for access tokens.
    pub access_secret: String,
    /// HMAC key for refresh tokens.
    pub refresh_secret: String,
}

impl ResolvedSecrets {
    pub fn new(access_secret: impl Into<String>, refresh_secret: impl Into<String>) -> Self {
        Self {
            access_secret: access_secret.into(),
            refresh_secret: refresh_secret.into(),
        }
    }
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("access_secret", &"<REDACTED>")
            .field("refresh_secret", &"<REDACTED>")
            .finish()
    }
}

/// Read a non-empty string value at `pointer`.
fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `None` if the variable is unset or blank.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve both signing keys from the environment.
///
/// Variable names come from `/auth/secrets_env/{access,refresh}` with
/// `RBK_ACCESS_SECRET` / `RBK_REFRESH_SECRET` as fallbacks. Both are
/// required and must differ, so a refresh token can never verify as an
/// access token.
pub fn resolve_secrets(config_json: &Value) -> Result<ResolvedSecrets> {
    let access_var = read_str_at(config_json, "/auth/secrets_env/access")
        .unwrap_or_else(|| DEFAULT_ACCESS_VAR.to_string());
    let refresh_var = read_str_at(config_json, "/auth/secrets_env/refresh")
        .unwrap_or_else(|| DEFAULT_REFRESH_VAR.to_string());

    let Some(access_secret) = resolve_env(&access_var) else {
        bail!("SECRETS_MISSING: required env var '{access_var}' (access token key) is not set or empty");
    };
    let Some(refresh_secret) = resolve_env(&refresh_var) else {
        bail!("SECRETS_MISSING: required env var '{refresh_var}' (refresh token key) is not set or empty");
    };
    if access_secret == refresh_secret {
        bail!("SECRETS_REUSED: '{access_var}' and '{refresh_var}' must hold different keys");
    }

    Ok(ResolvedSecrets {
        access_secret,
        refresh_secret,
    })
}
