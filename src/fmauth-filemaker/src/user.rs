//! Lookup of the signed-in user's legacy record.

use chrono::SecondsFormat;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use fmauth_common::UserLookupConfig;
use fmauth_common::lenient::{PLACEHOLDER, field_string};

use crate::error::{LegacyApiError, Result};
use crate::models::{FindRequest, Record};
use crate::session::FileMakerSession;

/// Role assigned when the record leaves the type field blank.
pub const DEFAULT_USER_TYPE: &str = "Usuario";

/// A user as stored in the legacy system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyUser {
    /// Stable account identifier, or the record id when the account field is blank.
    pub id: String,
    /// Internal record id, needed to patch the record.
    pub record_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub company_id: String,
    pub user_type: String,
    pub username: String,
}

impl LegacyUser {
    /// Map a raw record through the configured field names.
    pub fn from_record(record: &Record<Value>, fields: &UserLookupConfig) -> Self {
        let data = &record.field_data;
        let read = |field: &str| {
            let value = field_string(data, field).trim().to_string();
            if value == PLACEHOLDER {
                String::new()
            } else {
                value
            }
        };

        let account = read(&fields.account_field);
        let full_name = read(&fields.name_field);
        let mut words = full_name.split_whitespace();
        let first_name = words.next().unwrap_or_default().to_string();
        let last_name = words.collect::<Vec<_>>().join(" ");
        let user_type = read(&fields.type_field);

        Self {
            id: if account.is_empty() {
                record.record_id.clone()
            } else {
                account
            },
            record_id: record.record_id.clone(),
            first_name,
            last_name,
            email: read(&fields.email_field),
            company_id: read(&fields.company_field),
            user_type: if user_type.is_empty() {
                DEFAULT_USER_TYPE.to_string()
            } else {
                user_type
            },
            username: read(&fields.username_field),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

impl FileMakerSession {
    /// Find the user record whose email field matches `email` exactly.
    pub async fn find_user_by_email(&self, email: &str) -> Result<LegacyUser> {
        let fields = &self.user_lookup;
        let request = FindRequest::new().exact(&fields.email_field, email);
        let records = self
            .find_records::<Value>(&fields.layout, &request)
            .await?;

        let record = records.first().ok_or(LegacyApiError::RecordNotFound)?;
        if records.len() > 1 {
            debug!(count = records.len(), "Several user records matched, using the first");
        }
        let user = LegacyUser::from_record(record, fields);
        info!(user_id = %user.id, company_id = %user.company_id, "Resolved legacy user");
        Ok(user)
    }

    /// Stamp the user's last-login time. Failures are logged, never returned.
    pub async fn update_login_time(&self, record_id: &str) {
        let Some(target) = &self.login_time else {
            debug!("Login time update not configured");
            return;
        };

        let stamp = self.now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let mut fields = serde_json::Map::new();
        fields.insert(target.field.clone(), json!(stamp));

        match self
            .update_record(&target.layout, record_id, Value::Object(fields))
            .await
        {
            Ok(()) => debug!(record_id, "Updated last login time"),
            Err(e) => warn!(record_id, error = %e, "Failed to update last login time"),
        }
    }
}
