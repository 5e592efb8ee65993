//! # Actions
//!
//! Everything that can happen in a chat session becomes an `Action`.
//! User presses Enter? That's `Action::Submit(text)`.
//! A fragment streams in? That's `Action::Stream { request, event }`.
//!
//! `update()` applies an action to the state and returns the `Effect` the
//! adapter must perform. No I/O here; the adapter spawns requests and feeds
//! their results back in as further actions.
//!
//! ```text
//! State + Action  →  update()  →  State' + Effect
//! ```
//!
//! Stream actions carry the id of the request that produced them. Anything
//! from a request that is no longer active (cancelled, superseded by a
//! conversation switch) is dropped.

use log::{debug, info, warn};

use crate::api::{AppInfo, AppParameters, HistoryRecord};
use crate::core::conversation::ConversationId;
use crate::core::form::{EntryForm, TARGET_VARIABLE};
use crate::core::message::{MessageStatus, history_to_messages};
use crate::core::state::{App, PendingRequest, View};
use crate::core::stream::{StreamEvent, StreamOutcome};

#[derive(Debug)]
pub enum Action {
    /// Switch to a conversation (`None` = no conversation selected).
    OpenConversation(Option<ConversationId>),
    /// Start a fresh conversation with a placeholder id.
    NewConversation,
    /// Startup metadata fetch finished; either half may have failed.
    AppMetadataLoaded {
        info: Option<AppInfo>,
        parameters: Option<AppParameters>,
    },
    HistoryLoaded {
        conversation_id: String,
        records: Vec<HistoryRecord>,
    },
    HistoryFailed {
        conversation_id: String,
        message: String,
    },
    SubmitEntryForm,
    Submit(String),
    Stream {
        request: u64,
        event: StreamEvent,
    },
    StreamEnded {
        request: u64,
        outcome: StreamOutcome,
    },
    /// The send itself failed (HTTP error, network, channel closed).
    RequestFailed {
        request: u64,
        message: String,
    },
    CancelGeneration,
    Quit,
}

#[derive(Debug, PartialEq)]
pub enum Effect {
    None,
    SpawnRequest(PendingRequest),
    FetchHistory(String),
    Quit,
}

pub fn update(app: &mut App, action: Action) -> Effect {
    match action {
        Action::OpenConversation(id) => open_conversation(app, id),
        Action::NewConversation => open_conversation(app, Some(ConversationId::temporary())),
        Action::AppMetadataLoaded { info, parameters } => {
            app.app_info = info;
            app.app_parameters = parameters;
            app.metadata_loaded = true;
            let assigned = matches!(app.conversation, Some(ConversationId::Assigned(_)));
            if !app.chat_initialized && !assigned {
                reset_entry_form(app);
            }
            if app.status_message == "Connecting..." {
                app.status_message = String::from("Ready");
            }
            Effect::None
        }
        Action::HistoryLoaded {
            conversation_id,
            records,
        } => {
            if current_server_id(app) != Some(conversation_id.as_str()) {
                debug!("Stale history for {} ignored", conversation_id);
                return Effect::None;
            }
            if let Some(first) = records.first() {
                app.inputs = first.string_inputs();
                app.target = app.inputs.get(TARGET_VARIABLE).cloned().unwrap_or_default();
            }
            app.messages.replace_history(history_to_messages(&records));
            app.history_loading = false;
            app.chat_initialized = true;
            app.status_message = format!("Loaded {} turns", records.len());
            Effect::None
        }
        Action::HistoryFailed {
            conversation_id,
            message,
        } => {
            if current_server_id(app) != Some(conversation_id.as_str()) {
                return Effect::None;
            }
            warn!("History fetch failed for {}: {}", conversation_id, message);
            app.history_loading = false;
            // The conversation stays usable; only its past turns are missing.
            app.chat_initialized = true;
            app.error = Some(format!("Failed to load history: {message}"));
            Effect::None
        }
        Action::SubmitEntryForm => {
            match app.entry_form.validate() {
                Ok(values) => {
                    app.target = values.get(TARGET_VARIABLE).cloned().unwrap_or_default();
                    app.inputs = values;
                    app.chat_initialized = true;
                    if app.conversation.is_none() {
                        app.conversation = Some(ConversationId::temporary());
                    }
                    app.status_message = String::from("Conversation started");
                    info!("Entry form accepted: {} inputs", app.inputs.len());
                }
                Err(errors) => {
                    app.status_message = format!("Please fix {} field(s)", errors.len());
                }
            }
            Effect::None
        }
        Action::Submit(text) => {
            let text = text.trim().to_string();
            if text.is_empty() {
                return Effect::None;
            }
            if app.is_loading() {
                app.status_message = String::from("Still answering...");
                return Effect::None;
            }
            if app.view() == View::EntryForm || !app.chat_initialized {
                app.status_message = String::from("Not ready to chat yet");
                return Effect::None;
            }
            let conversation = app
                .conversation
                .get_or_insert_with(ConversationId::temporary)
                .clone();

            app.error = None;
            app.messages.push_exchange(text.clone());
            let pending = app.begin_request(text, conversation);
            app.status_message = String::from("Thinking...");
            info!("Submit: request {} spawned", pending.id);
            Effect::SpawnRequest(pending)
        }
        Action::Stream { request, event } => {
            if app.active_request == Some(request) {
                apply_stream_event(app, event);
            } else if let StreamEvent::ConversationAssigned(server_id) = &event
                && app.sent_in_current_conversation(request)
            {
                // The backend created the conversation even if the answer was abandoned
                promote_conversation(app, server_id);
            } else {
                debug!("Event from inactive request {} dropped", request);
            }
            Effect::None
        }
        Action::StreamEnded { request, outcome } => {
            if app.active_request != Some(request) {
                return Effect::None;
            }
            app.active_request = None;
            if outcome == StreamOutcome::Incomplete {
                // The bubble keeps its non-final status.
                app.status_message = String::from("Answer ended early");
            }
            Effect::None
        }
        Action::RequestFailed { request, message } => {
            if app.active_request != Some(request) {
                return Effect::None;
            }
            app.active_request = None;
            fail_in_flight(app, message);
            Effect::None
        }
        Action::CancelGeneration => {
            if app.active_request.take().is_some() {
                if let Some(msg) = app.messages.in_flight_mut() {
                    msg.status = MessageStatus::Error;
                }
                app.status_message = String::from("Cancelled");
            }
            Effect::None
        }
        Action::Quit => Effect::Quit,
    }
}

fn current_server_id(app: &App) -> Option<&str> {
    app.conversation.as_ref().and_then(ConversationId::server_id)
}

/// Conversation bootstrap: assigned ids load history, anything else goes
/// through the entry form (when the app declares one).
fn open_conversation(app: &mut App, id: Option<ConversationId>) -> Effect {
    info!("Opening conversation {:?}", id.as_ref().map(ConversationId::as_str));
    app.active_request = None;
    app.mark_conversation_start();
    app.chat_initialized = false;
    app.history_loading = false;
    app.error = None;
    app.messages.clear();
    app.target.clear();
    app.inputs.clear();
    app.conversation = id;

    match app.conversation.as_ref().and_then(ConversationId::server_id) {
        Some(server_id) => {
            let server_id = server_id.to_string();
            app.entry_form = EntryForm::default();
            app.history_loading = true;
            app.status_message = String::from("Loading history...");
            Effect::FetchHistory(server_id)
        }
        None => {
            reset_entry_form(app);
            Effect::None
        }
    }
}

/// Rebuilds the form from the app parameters. Until metadata has arrived the
/// chat stays uninitialized; afterwards an app with no inputs starts straight away.
fn reset_entry_form(app: &mut App) {
    app.entry_form = app
        .app_parameters
        .as_ref()
        .map(EntryForm::from_parameters)
        .unwrap_or_default();
    app.chat_initialized = app.metadata_loaded && app.entry_form.is_empty();
}

fn apply_stream_event(app: &mut App, event: StreamEvent) {
    match event {
        StreamEvent::Update(answer) => {
            if let Some(msg) = app.messages.in_flight_mut() {
                msg.content = answer;
                msg.status = MessageStatus::Streaming;
            }
        }
        StreamEvent::ConversationAssigned(server_id) => promote_conversation(app, &server_id),
        StreamEvent::Success(answer) => {
            if let Some(msg) = app.messages.in_flight_mut() {
                msg.content = answer;
                msg.status = MessageStatus::Success;
            }
            app.active_request = None;
            app.status_message = String::from("Ready");
        }
        StreamEvent::Failed(message) => {
            app.active_request = None;
            fail_in_flight(app, message);
        }
    }
}

fn promote_conversation(app: &mut App, server_id: &str) {
    let promoted = app
        .conversation
        .as_mut()
        .is_some_and(|conversation| conversation.promote(server_id));
    if promoted {
        info!("Conversation promoted to {}", server_id);
    } else {
        debug!("Repeated conversation assignment {} ignored", server_id);
    }
}

fn fail_in_flight(app: &mut App, message: String) {
    if let Some(msg) = app.messages.in_flight_mut() {
        msg.status = MessageStatus::Error;
    }
    app.status_message = String::from("Request failed");
    app.error = Some(message);
}
