//! # Session State
//!
//! Everything one chat session knows, in one struct. No UI types live here;
//! presentation state belongs to the `tui` module.
//!
//! ```text
//! App
//! ├── backend: Arc<dyn ChatBackend>     // Dify API
//! ├── user / response_mode              // sent with every request
//! ├── app_info / app_parameters         // fetched once at startup
//! ├── conversation: Option<ConversationId>
//! ├── messages: MessageLog              // history + live bubbles
//! ├── target / inputs                   // request inputs from form or history
//! ├── entry_form: EntryForm             // gating form for new conversations
//! ├── chat_initialized: bool            // form passed / history loaded
//! ├── active_request: Option<u64>       // in-flight send, if any
//! ├── history_loading: bool
//! ├── status_message: String
//! └── error: Option<String>             // inline notice
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::{AppInfo, AppParameters, ChatBackend, ResponseMode, SendMessageRequest};
use crate::core::config::ResolvedConfig;
use crate::core::conversation::ConversationId;
use crate::core::form::{EntryForm, TARGET_VARIABLE};
use crate::core::message::MessageLog;

/// Which screen the session should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Entry form gating a new conversation.
    EntryForm,
    /// Message list and input.
    Chat,
    /// No conversation selected; app name, description and tags.
    EmptyState,
    /// Nothing known yet.
    Blank,
}

/// A send the adapter should start: request body plus the id the reducer
/// checks promotion against.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub id: u64,
    pub body: SendMessageRequest,
    pub conversation: ConversationId,
}

pub struct App {
    pub backend: Arc<dyn ChatBackend>,
    pub user: String,
    pub response_mode: ResponseMode,
    pub app_info: Option<AppInfo>,
    pub app_parameters: Option<AppParameters>,
    /// False until the metadata fetch has reported, successfully or not.
    pub metadata_loaded: bool,
    pub conversation: Option<ConversationId>,
    pub messages: MessageLog,
    pub target: String,
    pub inputs: BTreeMap<String, String>,
    pub entry_form: EntryForm,
    pub chat_initialized: bool,
    pub active_request: Option<u64>,
    next_request_id: u64,
    /// Lowest request id sent under the current conversation.
    conversation_first_request: u64,
    pub history_loading: bool,
    pub status_message: String,
    pub error: Option<String>,
}

impl App {
    pub fn new(backend: Arc<dyn ChatBackend>, user: String, response_mode: ResponseMode) -> Self {
        Self {
            backend,
            user,
            response_mode,
            app_info: None,
            app_parameters: None,
            metadata_loaded: false,
            conversation: None,
            messages: MessageLog::new(),
            target: String::new(),
            inputs: BTreeMap::new(),
            entry_form: EntryForm::default(),
            chat_initialized: false,
            active_request: None,
            next_request_id: 0,
            conversation_first_request: 1,
            history_loading: false,
            status_message: String::from("Connecting..."),
            error: None,
        }
    }

    pub fn from_config(backend: Arc<dyn ChatBackend>, config: &ResolvedConfig) -> Self {
        Self::new(backend, config.user.clone(), config.response_mode)
    }

    pub fn is_loading(&self) -> bool {
        self.active_request.is_some()
    }

    pub fn view(&self) -> View {
        if !self.chat_initialized && !self.entry_form.is_empty() {
            View::EntryForm
        } else if self.conversation.is_some() {
            View::Chat
        } else if self.app_info.is_some() {
            View::EmptyState
        } else {
            View::Blank
        }
    }

    /// Title shown in the header: the app's name once known.
    pub fn title(&self) -> &str {
        self.app_info
            .as_ref()
            .map(|i| i.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("Dify Chat")
    }

    /// Starts a new request generation: requests issued before this call no
    /// longer belong to the current conversation.
    pub(crate) fn mark_conversation_start(&mut self) {
        self.conversation_first_request = self.next_request_id + 1;
    }

    /// True when `request` was sent under the current conversation, whether
    /// or not it is still active.
    pub(crate) fn sent_in_current_conversation(&self, request: u64) -> bool {
        (self.conversation_first_request..=self.next_request_id).contains(&request)
    }

    /// Allocates a request id and builds the body for `query`. The target
    /// parameter always rides along in `inputs` when set.
    pub(crate) fn begin_request(
        &mut self,
        query: String,
        conversation: ConversationId,
    ) -> PendingRequest {
        self.next_request_id += 1;
        let id = self.next_request_id;
        self.active_request = Some(id);

        let mut inputs = self.inputs.clone();
        if !self.target.is_empty() {
            inputs.insert(TARGET_VARIABLE.to_string(), self.target.clone());
        }

        PendingRequest {
            id,
            body: SendMessageRequest {
                inputs,
                query,
                response_mode: self.response_mode,
                user: self.user.clone(),
                conversation_id: conversation.server_id().map(str::to_string),
                files: Vec::new(),
            },
            conversation,
        }
    }
}
