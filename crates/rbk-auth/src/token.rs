//! HS256 access / refresh tokens.
//!
//! Access and refresh tokens are signed with different keys and carry a
//! `kind` claim; either check alone rejects a token presented in the wrong
//! place.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rbk_config::{AuthConfig, ResolvedSecrets};
use rbk_schemas::{Caller, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AuthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: user id.
    pub sub: Uuid,
    pub role: Role,
    pub kind: TokenKind,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

fn secret_for(kind: TokenKind, secrets: &ResolvedSecrets) -> &[u8] {
    match kind {
        TokenKind::Access => secrets.access_secret.as_bytes(),
        TokenKind::Refresh => secrets.refresh_secret.as_bytes(),
    }
}

fn issue(
    caller: &Caller,
    kind: TokenKind,
    secrets: &ResolvedSecrets,
    cfg: &AuthConfig,
) -> Result<String, AuthError> {
    let now = Utc::now().timestamp();
    let ttl = match kind {
        TokenKind::Access => cfg.access_ttl_secs,
        TokenKind::Refresh => cfg.refresh_ttl_secs,
    };
    let claims = TokenClaims {
        sub: caller.user_id,
        role: caller.role,
        kind,
        iss: cfg.issuer.clone(),
        iat: now,
        exp: now + ttl,
        jti: Uuid::new_v4(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret_for(kind, secrets)),
    )
    .map_err(|e| AuthError::Crypto(format!("JWT encode: {e}")))
}

fn decode(
    token: &str,
    kind: TokenKind,
    secrets: &ResolvedSecrets,
    cfg: &AuthConfig,
) -> Result<TokenClaims, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&cfg.issuer]);
    validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);

    let claims = jsonwebtoken::decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret_for(kind, secrets)),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::TokenInvalid(e.to_string()),
    })?;

    if claims.kind != kind {
        return Err(AuthError::WrongTokenKind);
    }
    Ok(claims)
}

pub fn issue_access_token(
    caller: &Caller,
    secrets: &ResolvedSecrets,
    cfg: &AuthConfig,
) -> Result<String, AuthError> {
    issue(caller, TokenKind::Access, secrets, cfg)
}

pub fn issue_token_pair(
    caller: &Caller,
    secrets: &ResolvedSecrets,
    cfg: &AuthConfig,
) -> Result<TokenPair, AuthError> {
    Ok(TokenPair {
        access: issue(caller, TokenKind::Access, secrets, cfg)?,
        refresh: issue(caller, TokenKind::Refresh, secrets, cfg)?,
    })
}

/// Verify an access token and return the identity it carries.
pub fn verify_access(
    token: &str,
    secrets: &ResolvedSecrets,
    cfg: &AuthConfig,
) -> Result<Caller, AuthError> {
    let claims = decode(token, TokenKind::Access, secrets, cfg)?;
    Ok(Caller {
        user_id: claims.sub,
        role: claims.role,
    })
}

/// Verify a refresh token. The role inside is informational only; callers
/// re-read the user before issuing a new access token.
pub fn verify_refresh(
    token: &str,
    secrets: &ResolvedSecrets,
    cfg: &AuthConfig,
) -> Result<TokenClaims, AuthError> {
    decode(token, TokenKind::Refresh, secrets, cfg)
}

/// Extract the token from an `Authorization` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let raw = header.ok_or(AuthError::MissingToken)?.trim();
    let token = raw
        .strip_prefix("Bearer ")
        .or_else(|| raw.strip_prefix("bearer "))
        .ok_or(AuthError::MissingToken)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}
