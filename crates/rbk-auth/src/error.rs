/// Authentication failures. None of these carry secret material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization: Bearer ...` header.
    MissingToken,
    TokenExpired,
    TokenInvalid(String),
    /// A refresh token presented where an access token is required, or the
    /// reverse.
    WrongTokenKind,
    InvalidCredentials,
    Crypto(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingToken => write!(f, "no bearer token found"),
            AuthError::TokenExpired => write!(f, "token has expired"),
            AuthError::TokenInvalid(msg) => write!(f, "invalid token: {msg}"),
            AuthError::WrongTokenKind => write!(f, "wrong token kind"),
            AuthError::InvalidCredentials => write!(f, "invalid credentials"),
            AuthError::Crypto(msg) => write!(f, "cryptography error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}
