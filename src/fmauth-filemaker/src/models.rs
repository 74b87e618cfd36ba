//! Data API request and response envelopes.

use fmauth_common::lenient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Envelope code the Data API uses for "no records match the request".
pub const NO_RECORDS_CODE: &str = "401";

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascend,
    Descend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortField {
    pub field_name: String,
    pub sort_order: SortOrder,
}

/// Body of a `_find` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FindRequest {
    pub query: Vec<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortField>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl FindRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact-match criterion (`==value`) added to the first query group.
    pub fn exact(self, field: impl Into<String>, value: impl AsRef<str>) -> Self {
        self.criterion(field, format!("=={}", value.as_ref()))
    }

    /// Raw criterion added to the first query group.
    pub fn criterion(mut self, field: impl Into<String>, expression: impl Into<String>) -> Self {
        if self.query.is_empty() {
            self.query.push(BTreeMap::new());
        }
        self.query[0].insert(field.into(), expression.into());
        self
    }

    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.get_or_insert_with(Vec::new).push(SortField {
            field_name: field.into(),
            sort_order: order,
        });
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Status entry attached to every Data API response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "lenient::deserialize_string")]
    pub code: String,
    #[serde(default, deserialize_with = "lenient::deserialize_string")]
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DataInfo {
    pub database: Option<String>,
    pub layout: Option<String>,
    pub table: Option<String>,
    pub total_record_count: Option<i64>,
    pub found_count: Option<i64>,
    pub returned_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound = "T: DeserializeOwned")]
pub struct Record<T> {
    pub field_data: T,
    #[serde(deserialize_with = "lenient::deserialize_string")]
    pub record_id: String,
    #[serde(default, deserialize_with = "lenient::deserialize_string")]
    pub mod_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound = "T: DeserializeOwned")]
pub struct DataResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<Record<T>>,
    pub data_info: Option<DataInfo>,
}

/// Response of `_find` and record listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound = "T: DeserializeOwned")]
pub struct RecordsResponse<T> {
    pub response: DataResponse<T>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenData {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub response: TokenData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct CreateData {
    #[serde(deserialize_with = "lenient::deserialize_string")]
    pub record_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateResponse {
    #[serde(default)]
    pub response: CreateData,
}

/// Outcome of a server-side script.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptResult {
    #[serde(deserialize_with = "lenient::deserialize_string")]
    pub script_error: String,
    pub script_result: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScriptResponse {
    #[serde(default)]
    pub response: ScriptResult,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    messages: Vec<Message>,
}

/// First envelope message of an error body, if it has the Data API shape.
pub fn envelope_message(body: &str) -> Option<Message> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()?
        .messages
        .into_iter()
        .next()
}

/// Wrap field data for create and update requests.
pub(crate) fn field_data_body(field_data: Value) -> Value {
    serde_json::json!({ "fieldData": field_data })
}
