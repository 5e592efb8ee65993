//! Chat messages as the renderer sees them.
//!
//! History turns are loaded once and never change; live messages are pushed
//! on submit and then rewritten in place while their answer streams in.

use chrono::{DateTime, Utc};

use crate::api::HistoryRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    /// Request sent, nothing received yet.
    Pending,
    /// At least one fragment received.
    Streaming,
    Success,
    Error,
}

impl MessageStatus {
    pub fn is_final(self) -> bool {
        matches!(self, MessageStatus::Success | MessageStatus::Error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub content: String,
    pub role: Role,
    pub status: MessageStatus,
    pub is_history: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn user(id: String, content: String) -> Self {
        Self {
            id,
            content,
            role: Role::User,
            status: MessageStatus::Success,
            is_history: false,
            created_at: Some(Utc::now()),
        }
    }

    /// Empty assistant bubble waiting for the first fragment.
    pub fn assistant_placeholder(id: String) -> Self {
        Self {
            id,
            content: String::new(),
            role: Role::Assistant,
            status: MessageStatus::Pending,
            is_history: false,
            created_at: Some(Utc::now()),
        }
    }
}

/// Expands history turns into bubbles: each turn becomes its query followed
/// by its answer, ids suffixed `-query` / `-answer`.
pub fn history_to_messages(records: &[HistoryRecord]) -> Vec<Message> {
    records
        .iter()
        .flat_map(|record| {
            let created_at = record
                .created_at
                .and_then(|secs| DateTime::from_timestamp(secs, 0));
            [
                Message {
                    id: format!("{}-query", record.id),
                    content: record.query.clone(),
                    role: Role::User,
                    status: MessageStatus::Success,
                    is_history: true,
                    created_at,
                },
                Message {
                    id: format!("{}-answer", record.id),
                    content: record.answer.clone(),
                    role: Role::Assistant,
                    status: MessageStatus::Success,
                    is_history: true,
                    created_at,
                },
            ]
        })
        .collect()
}

/// History followed by live messages.
#[derive(Debug, Default, Clone)]
pub struct MessageLog {
    history: Vec<Message>,
    live: Vec<Message>,
    /// Monotonic counter for live message ids.
    next_seq: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops everything, history included.
    pub fn clear(&mut self) {
        self.history.clear();
        self.live.clear();
    }

    /// Swaps in a freshly loaded history and drops live messages.
    pub fn replace_history(&mut self, history: Vec<Message>) {
        self.history = history;
        self.live.clear();
    }

    /// Appends the user's message and an assistant placeholder for its answer.
    pub fn push_exchange(&mut self, query: String) {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.live.push(Message::user(format!("live-{seq}-query"), query));
        self.live
            .push(Message::assistant_placeholder(format!("live-{seq}-answer")));
    }

    /// The assistant message currently being answered, if it is not final yet.
    pub fn in_flight_mut(&mut self) -> Option<&mut Message> {
        self.live
            .last_mut()
            .filter(|m| m.role == Role::Assistant && !m.status.is_final())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.history.iter().chain(self.live.iter())
    }

    pub fn len(&self) -> usize {
        self.history.len() + self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last(&self) -> Option<&Message> {
        self.live.last().or_else(|| self.history.last())
    }
}
