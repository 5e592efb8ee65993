//! # Core Chat Logic
//!
//! Session state and the reducer that drives it. Knows nothing about the
//! terminal; the only I/O-shaped piece is [`stream::drive`], which turns a
//! response body into events and is fed by whatever adapter owns the runtime.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │                         │
//!                    │  • State (App)          │
//!                    │  • Action / update()    │
//!                    │  • Stream reducer       │
//!                    │  • Conversation ids     │
//!                    │  • Entry form           │
//!                    └───────────┬─────────────┘
//!                                │
//!                ┌───────────────┴───────────────┐
//!                ▼                               ▼
//!         ┌────────────┐                  ┌────────────┐
//!         │    TUI     │                  │    API     │
//!         │  Adapter   │                  │  (reqwest) │
//!         │ (ratatui)  │                  │            │
//!         └────────────┘                  └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`state`]: The `App` struct, all session state in one place
//! - [`action`]: The `Action` enum and `update()`
//! - [`stream`]: SSE decoding and answer accumulation
//! - [`conversation`]: Temporary vs server-assigned conversation ids
//! - [`message`]: Chat bubbles and the history/live message log
//! - [`form`]: The entry form gating new conversations
//! - [`config`]: Layered settings

pub mod action;
pub mod config;
pub mod conversation;
pub mod form;
pub mod message;
pub mod state;
pub mod stream;
