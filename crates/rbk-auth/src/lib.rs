//! rbk-auth
//!
//! Credential hashing and token handling as plain functions. Verifying a
//! bearer token yields a typed [`rbk_schemas::Caller`]; nothing here touches
//! the store or the HTTP layer.

mod error;
mod password;
mod token;

pub use error::AuthError;
pub use password::{hash_password, verify_password, verify_password_or_dummy};
pub use token::{
    bearer_token, issue_access_token, issue_token_pair, verify_access, verify_refresh, TokenClaims,
    TokenKind, TokenPair,
};
