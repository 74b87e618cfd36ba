//! Legacy Data API client.
//!
//! [`FileMakerSession`] owns the short-lived session token: it resolves the
//! token from memory, then secure storage, then a new session created with
//! the connection secret from [`fmauth_cloud::SecretsClient`]. Record, script
//! and user-lookup calls all go through the same authenticated path, which
//! clears the session on HTTP 401 and slides the token expiry on success.

mod error;
mod models;
mod records;
mod session;
mod user;

pub use error::{LegacyApiError, Result};
pub use models::{
    DataInfo, DataResponse, FindRequest, Message, NO_RECORDS_CODE, Record, RecordsResponse,
    ScriptResult, SortField, SortOrder, envelope_message,
};
pub use session::FileMakerSession;
pub use user::{DEFAULT_USER_TYPE, LegacyUser};
