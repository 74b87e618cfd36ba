//! fmauth Login - sign-in orchestration for the legacy-backed apps.
//!
//! Signing in takes two layers that must agree:
//! - the hosted identity provider verifies the password and issues tokens
//! - the legacy user directory must hold a record for the verified email
//!
//! [`AuthOrchestrator`] runs that sequence, signs the identity session out
//! again when the second layer fails, and turns failures into user-facing
//! text. [`AuthStack`] builds the whole credential chain from an
//! [`AuthConfig`](fmauth_common::AuthConfig).

mod error;
mod orchestrator;
mod provider;
mod stack;
mod user;

pub use error::{SignInError, identity_message, legacy_message};
pub use orchestrator::{AuthOrchestrator, SessionPhase};
pub use provider::{IdentityProvider, SessionCache, UserDirectory};
pub use stack::AuthStack;
pub use user::User;
