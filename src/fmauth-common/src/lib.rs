//! Shared building blocks for the fmauth credential chain.
//!
//! - [`config`]: tenant configuration loaded from TOML and the environment
//! - [`clock`]: injectable time source used for every expiry computation
//! - [`http`]: the one HTTP client factory all components share
//! - [`error`]: transport-level error taxonomy
//! - [`lenient`]: tolerant decoding of loosely-typed legacy fields
//! - [`logging`]: tracing subscriber bootstrap for application shells

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod lenient;
pub mod logging;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::{
    AuthConfig, ConfigError, Endpoints, HttpConfig, LoginTimeConfig, StorageConfig, StoreMode,
    TtlConfig, UserLookupConfig,
};
pub use error::TransportError;
