//! Wire types for the Dify app API.
//!
//! Field names follow the backend's JSON exactly (`conversation_id`,
//! `user_input_form`, `text-input`, ...). Anything the backend may omit is
//! `#[serde(default)]` so a sparse payload still decodes.

use std::collections::{BTreeMap, HashMap};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Event tag that marks the logical end of a streamed answer.
pub const MESSAGE_END_EVENT: &str = "message_end";
/// Event tag the backend uses to report a failure inside an open stream.
pub const ERROR_EVENT: &str = "error";

/// How the backend should deliver the answer.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// Server-sent events, one record per answer fragment (default)
    #[default]
    Streaming,
    /// One JSON document once the answer is complete
    Blocking,
}

impl ResponseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseMode::Streaming => "streaming",
            ResponseMode::Blocking => "blocking",
        }
    }
}

/// Body of `POST /chat-messages`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SendMessageRequest {
    pub inputs: BTreeMap<String, String>,
    pub query: String,
    pub response_mode: ResponseMode,
    pub user: String,
    /// Omitted while the conversation only has a client-side placeholder id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// Always empty; uploads are not supported.
    pub files: Vec<serde_json::Value>,
}

/// Decoded payload of one streamed record.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ChunkRecord {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Human-readable failure text on `error` events.
    #[serde(default)]
    pub message: Option<String>,
}

/// Body returned by `POST /chat-messages` in blocking mode.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct BlockingAnswer {
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub conversation_id: String,
}

/// One question/answer turn from `GET /messages`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct HistoryRecord {
    pub id: String,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub inputs: HashMap<String, serde_json::Value>,
    /// Unix seconds.
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl HistoryRecord {
    /// The turn's inputs flattened to strings. Non-string JSON values keep
    /// their JSON rendering, nulls are dropped.
    pub fn string_inputs(&self) -> BTreeMap<String, String> {
        self.inputs
            .iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some((k.clone(), s.clone())),
                other => Some((k.clone(), other.to_string())),
            })
            .collect()
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct HistoryResponse {
    #[serde(default)]
    pub data: Vec<HistoryRecord>,
    #[serde(default)]
    pub has_more: bool,
}

/// `GET /info`
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct AppInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// `GET /parameters`
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct AppParameters {
    #[serde(default)]
    pub opening_statement: Option<String>,
    #[serde(default)]
    pub user_input_form: Vec<UserInputFormItem>,
}

/// One entry of `user_input_form`. The backend wraps each control in an
/// object keyed by its kind; kinds we don't render stay `None`.
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct UserInputFormItem {
    #[serde(rename = "text-input", default, skip_serializing_if = "Option::is_none")]
    pub text_input: Option<FormControl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paragraph: Option<FormControl>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<FormControl>,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
pub struct FormControl {
    #[serde(default)]
    pub label: String,
    pub variable: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub max_length: Option<usize>,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Error body the backend returns with non-2xx statuses.
#[derive(Deserialize, Debug, Default)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
