//! Identity-provider client.
//!
//! Speaks the identity provider's JSON protocol directly: password sign-in,
//! refresh-token sign-in, password reset, and global sign-out. The token
//! triple and its expiry are persisted in the [`SecureStore`]; nothing is
//! cached in memory.
//!
//! [`SecureStore`]: fmauth_secure_store::SecureStore

mod client;
mod error;
mod jwt;
mod models;

pub use client::CognitoClient;
pub use error::{IdentityError, Result};
pub use jwt::{UserAttributes, decode_claims};
pub use models::{AuthenticationResult, secret_hash};

/// `X-Amz-Target` prefix of every identity-provider operation.
pub const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
