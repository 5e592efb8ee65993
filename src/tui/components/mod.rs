//! # TUI Components
//!
//! Each file holds one component: its state types, event types, rendering
//! and tests.
//!
//! ### Stateless (props only)
//! - `TitleBar`: app name, conversation, status
//! - `MessageBubble`: one chat message
//! - `EmptyState`: app info when no conversation is open
//! - `EntryFormView`: the entry form (state lives on the core `EntryForm`)
//!
//! ### Stateful (event-driven)
//! - `InputBox`: message editor
//! - `MessageList`: scrollable conversation with layout caching
//!
//! Components receive data as props rather than reading `App` directly:
//!
//! ```rust,ignore
//! TitleBar::new(app.title(), app.conversation.as_ref(), &app.status_message, false)
//!     .render(frame, area);
//! ```

pub mod empty_state;
pub mod entry_form;
pub mod input_box;
pub mod message;
pub mod message_list;
pub mod title_bar;

pub use empty_state::EmptyState;
pub use entry_form::{EntryFormView, FormEvent};
pub use input_box::{InputBox, InputEvent};
pub use message_list::{MessageList, MessageListState};
pub use title_bar::TitleBar;
