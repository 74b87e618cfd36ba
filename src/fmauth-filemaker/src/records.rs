//! Authenticated record operations.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use fmauth_common::TransportError;

use crate::error::{LegacyApiError, Result};
use crate::models::{
    CreateResponse, FindRequest, NO_RECORDS_CODE, Record, RecordsResponse, ScriptResponse,
    ScriptResult, envelope_message, field_data_body,
};
use crate::session::FileMakerSession;

/// `scriptError` value reported by a script that ran cleanly.
const SCRIPT_OK: &str = "0";

impl FileMakerSession {
    /// Run a `_find` on `layout`.
    ///
    /// A "no records match" envelope (code `"401"`, usually with HTTP 400)
    /// yields an empty list. HTTP 401 means the token was rejected.
    pub async fn find_records<T: DeserializeOwned>(
        &self,
        layout: &str,
        request: &FindRequest,
    ) -> Result<Vec<Record<T>>> {
        if request.query.iter().all(|group| group.is_empty()) {
            return Err(LegacyApiError::Validation(
                "find request has no criteria".to_string(),
            ));
        }

        let body = serde_json::to_value(request).map_err(TransportError::from)?;
        let (status, text) = self
            .execute(Method::POST, &["layouts", layout, "_find"], &[], Some(&body))
            .await?;

        if !status.is_success() {
            return match envelope_message(&text) {
                Some(message) if message.code == NO_RECORDS_CODE => {
                    debug!(layout, "No records matched");
                    Ok(Vec::new())
                }
                _ => {
                    warn!(layout, status = status.as_u16(), "Find request failed");
                    Err(TransportError::from_status(status.as_u16(), &text).into())
                }
            };
        }

        let parsed: RecordsResponse<T> = serde_json::from_str(&text)
            .map_err(|e| LegacyApiError::InvalidResponse(e.to_string()))?;
        debug!(layout, count = parsed.response.data.len(), "Find returned records");
        Ok(parsed.response.data)
    }

    /// Create a record and return its id.
    pub async fn create_record(&self, layout: &str, field_data: Value) -> Result<String> {
        if field_data.as_object().is_none_or(|fields| fields.is_empty()) {
            return Err(LegacyApiError::Validation(
                "record has no field data".to_string(),
            ));
        }

        let body = field_data_body(field_data);
        let (status, text) = self
            .execute(Method::POST, &["layouts", layout, "records"], &[], Some(&body))
            .await?;

        if !status.is_success() {
            warn!(layout, status = status.as_u16(), "Record creation rejected");
            return Err(LegacyApiError::SubmissionFailed);
        }

        let created: CreateResponse = serde_json::from_str(&text)
            .map_err(|e| LegacyApiError::InvalidResponse(e.to_string()))?;
        Ok(created.response.record_id)
    }

    /// Patch fields of an existing record.
    pub async fn update_record(
        &self,
        layout: &str,
        record_id: &str,
        field_data: Value,
    ) -> Result<()> {
        let body = field_data_body(field_data);
        let (status, text) = self
            .execute(
                Method::PATCH,
                &["layouts", layout, "records", record_id],
                &[],
                Some(&body),
            )
            .await?;

        if !status.is_success() {
            return Err(TransportError::from_status(status.as_u16(), &text).into());
        }
        Ok(())
    }

    /// Run a server-side script in the context of `layout`.
    pub async fn run_script(
        &self,
        layout: &str,
        script: &str,
        param: Option<&str>,
    ) -> Result<ScriptResult> {
        let query: Vec<(&str, &str)> = param.map(|p| ("script.param", p)).into_iter().collect();
        let (status, text) = self
            .execute(Method::GET, &["layouts", layout, "script", script], &query, None)
            .await?;

        if !status.is_success() {
            let detail = envelope_message(&text)
                .map(|m| format!("{} ({})", m.message, m.code))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            warn!(script, status = status.as_u16(), "Script call failed");
            return Err(LegacyApiError::Script(detail));
        }

        let parsed: ScriptResponse = serde_json::from_str(&text)
            .map_err(|e| LegacyApiError::InvalidResponse(e.to_string()))?;
        let result = parsed.response;
        if !result.script_error.is_empty() && result.script_error != SCRIPT_OK {
            return Err(LegacyApiError::Script(format!(
                "script {script} returned error {}",
                result.script_error
            )));
        }
        Ok(result)
    }
}
