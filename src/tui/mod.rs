//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! translates keyboard events into `core::Action` values, and runs the
//! effects the reducer asks for as tokio tasks.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Background work
//!
//! Tasks never touch `App`. They report back through an `mpsc` channel of
//! `Action`s that the loop drains between frames:
//!
//! ```text
//! startup ──► fetch info + parameters ──► AppMetadataLoaded
//! FetchHistory(id) ──► conversation_history ──► HistoryLoaded / HistoryFailed
//! SpawnRequest ──► stream_answer ──► Stream* ──► StreamEnded / RequestFailed
//! ```
//!
//! Each send gets a `CancellationToken`. Esc, starting another conversation
//! and quitting all cancel it, which stops reading the response body.
//!
//! ## Redraw Strategy
//!
//! - **Animating** (answer in flight): draws every ~80ms so the bubble pulses.
//! - **Idle**: sleeps up to 500ms, only redraws on events or background actions.
//!
//! A `SteadyBlock` cursor style is used instead of a blinking cursor because
//! ratatui's `set_cursor_position` resets the terminal's blink timer on every
//! `draw()` call, making blinking cursors appear erratic during continuous redraws.

mod component;
mod components;
mod event;
pub mod markdown;
mod ui;

use log::{debug, info, warn};
use std::io::stdout;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use tokio_util::sync::CancellationToken;

use crate::api::ChatBackend;
use crate::core::action::{Action, Effect, update};
use crate::core::config::ResolvedConfig;
use crate::core::conversation::ConversationId;
use crate::core::state::{App, PendingRequest, View};
use crate::core::stream::{StreamEvent, stream_answer};
use crate::tui::component::EventHandler;
use crate::tui::components::{FormEvent, InputBox, InputEvent, MessageListState};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    // Persistent component states
    pub message_list: MessageListState,
    pub input_box: InputBox,
    // Animation state
    pub pulse_value: f32,
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            message_list: MessageListState::new(),
            input_box: InputBox::new(),
            pulse_value: 0.0,
        }
    }

    /// Pushes App state into the input box props.
    fn sync_props(&mut self, app: &App) {
        self.input_box.dimmed = app.is_loading();
        self.input_box.title = if app.is_loading() {
            String::from("Message (Esc to stop)")
        } else if app.history_loading {
            String::from("Message (loading history)")
        } else {
            String::from("Message (Enter to send, Ctrl+J newline)")
        };
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // Kitty keyboard protocol allows Shift+Enter detection; terminals
        // without it ignore the sequence
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            Hide
        );
    }
}

/// Event-loop side of the effect runner: owns the action sender and the
/// token of the send in flight.
struct Runtime {
    backend: Arc<dyn ChatBackend>,
    tx: mpsc::Sender<Action>,
    active_cancel: Option<CancellationToken>,
}

impl Runtime {
    /// Cancels the in-flight send, if any.
    fn cancel_active(&mut self) {
        if let Some(token) = self.active_cancel.take() {
            debug!("Cancelling active request");
            token.cancel();
        }
    }

    /// Runs `action` through the reducer and carries out its effect.
    /// Returns true when the app should quit.
    fn dispatch(&mut self, app: &mut App, tui: &mut TuiState, action: Action) -> bool {
        let resets_list = matches!(
            action,
            Action::OpenConversation(_) | Action::NewConversation | Action::HistoryLoaded { .. }
        );
        if matches!(action, Action::OpenConversation(_) | Action::NewConversation) {
            self.cancel_active();
        }

        let effect = update(app, action);
        if resets_list {
            tui.message_list = MessageListState::new();
        }
        if !app.is_loading() {
            self.active_cancel = None;
        }

        match effect {
            Effect::None => false,
            Effect::Quit => true,
            Effect::SpawnRequest(pending) => {
                self.cancel_active();
                self.active_cancel = Some(spawn_request(
                    pending,
                    self.backend.clone(),
                    self.tx.clone(),
                ));
                false
            }
            Effect::FetchHistory(conversation_id) => {
                spawn_history_fetch(conversation_id, self.backend.clone(), self.tx.clone());
                false
            }
        }
    }
}

pub fn run(
    backend: Arc<dyn ChatBackend>,
    config: &ResolvedConfig,
    initial_conversation: Option<ConversationId>,
) -> std::io::Result<()> {
    let mut app = App::from_config(backend.clone(), config);
    let mut tui = TuiState::new();

    let (tx, rx) = mpsc::channel();
    let mut runtime = Runtime {
        backend,
        tx,
        active_cancel: None,
    };

    spawn_metadata_fetch(runtime.backend.clone(), runtime.tx.clone());
    runtime.dispatch(&mut app, &mut tui, Action::OpenConversation(initial_conversation));

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    let start_time = Instant::now();
    let mut needs_redraw = true;

    'main: loop {
        tui.sync_props(&app);

        let animating = app.is_loading();
        if animating {
            needs_redraw = true;
        }

        if needs_redraw {
            let elapsed = start_time.elapsed().as_secs_f32();
            tui.pulse_value = (elapsed * 5.0).sin() * 0.5 + 0.5;
            terminal.draw(|f| ui::draw_ui(f, &app, &mut tui))?;
            needs_redraw = false;
        }

        let timeout = if animating {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(500)
        };
        let first_event = poll_event_timeout(timeout);
        if first_event.is_some() {
            needs_redraw = true;
        }

        // Drain all pending input before the next draw
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if handle_input(&mut app, &mut tui, &mut runtime, event) {
                break 'main;
            }
        }

        while let Ok(action) = rx.try_recv() {
            needs_redraw = true;
            debug!("Event loop received: {:?}", action);
            if runtime.dispatch(&mut app, &mut tui, action) {
                break 'main;
            }
        }
    }

    runtime.cancel_active();
    ratatui::restore();
    info!("Shut down cleanly");
    Ok(())
}

/// Routes one terminal event. Returns true when the app should quit.
fn handle_input(
    app: &mut App,
    tui: &mut TuiState,
    runtime: &mut Runtime,
    event: TuiEvent,
) -> bool {
    match event {
        TuiEvent::Resize => false,
        TuiEvent::Quit => {
            runtime.cancel_active();
            runtime.dispatch(app, tui, Action::Quit)
        }
        TuiEvent::NewConversation => runtime.dispatch(app, tui, Action::NewConversation),
        TuiEvent::Escape => {
            if app.is_loading() {
                runtime.cancel_active();
                runtime.dispatch(app, tui, Action::CancelGeneration)
            } else {
                false
            }
        }
        TuiEvent::ScrollUp
        | TuiEvent::ScrollDown
        | TuiEvent::ScrollPageUp
        | TuiEvent::ScrollPageDown
        | TuiEvent::ScrollToBottom => {
            tui.message_list.handle_event(&event);
            false
        }
        _ => match app.view() {
            View::EntryForm => match app.entry_form.handle_event(&event) {
                Some(FormEvent::Submit) => runtime.dispatch(app, tui, Action::SubmitEntryForm),
                _ => false,
            },
            View::Chat | View::EmptyState => match tui.input_box.handle_event(&event) {
                Some(InputEvent::Submit(text)) => {
                    // Sending always jumps back to the newest message
                    tui.message_list.handle_event(&TuiEvent::ScrollToBottom);
                    runtime.dispatch(app, tui, Action::Submit(text))
                }
                _ => false,
            },
            View::Blank => false,
        },
    }
}

fn spawn_metadata_fetch(backend: Arc<dyn ChatBackend>, tx: mpsc::Sender<Action>) {
    info!("Fetching app info and parameters");
    tokio::spawn(async move {
        let (info, parameters) = tokio::join!(backend.app_info(), backend.app_parameters());
        let info = info
            .inspect_err(|e| warn!("App info fetch failed: {}", e))
            .ok();
        let parameters = parameters
            .inspect_err(|e| warn!("App parameters fetch failed: {}", e))
            .ok();
        if tx
            .send(Action::AppMetadataLoaded { info, parameters })
            .is_err()
        {
            warn!("Failed to send AppMetadataLoaded: receiver dropped");
        }
    });
}

fn spawn_history_fetch(
    conversation_id: String,
    backend: Arc<dyn ChatBackend>,
    tx: mpsc::Sender<Action>,
) {
    info!("Fetching history for {}", conversation_id);
    tokio::spawn(async move {
        let action = match backend.conversation_history(&conversation_id).await {
            Ok(records) => Action::HistoryLoaded {
                conversation_id,
                records,
            },
            Err(e) => Action::HistoryFailed {
                conversation_id,
                message: e.to_string(),
            },
        };
        if tx.send(action).is_err() {
            warn!("Failed to send history result: receiver dropped");
        }
    });
}

/// Starts a send on the runtime. The returned token stops it.
fn spawn_request(
    pending: PendingRequest,
    backend: Arc<dyn ChatBackend>,
    tx: mpsc::Sender<Action>,
) -> CancellationToken {
    let request = pending.id;
    info!(
        "Spawning request {} ({} query bytes, conversation={})",
        request,
        pending.body.query.len(),
        pending.conversation.as_str()
    );

    let cancel = CancellationToken::new();
    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<StreamEvent>(100);

    // Forward reducer events to the Action channel in arrival order
    let forward_tx = tx.clone();
    let forward = tokio::spawn(async move {
        let mut forwarded = 0usize;
        while let Some(event) = event_rx.recv().await {
            forwarded += 1;
            if forward_tx.send(Action::Stream { request, event }).is_err() {
                warn!("Failed to forward stream event: receiver dropped");
                return;
            }
        }
        debug!("Request {}: forwarded {} events", request, forwarded);
    });

    let task_cancel = cancel.clone();
    tokio::spawn(async move {
        let result = stream_answer(
            backend.as_ref(),
            &pending.body,
            pending.conversation,
            event_tx,
            task_cancel,
        )
        .await;

        // Every event must reach the loop before the end marker
        if let Err(e) = forward.await {
            warn!("Forward task for request {} failed: {}", request, e);
        }

        let action = match result {
            Ok(outcome) => Action::StreamEnded { request, outcome },
            Err(e) => {
                warn!("Request {} failed: {}", request, e);
                Action::RequestFailed {
                    request,
                    message: e.to_string(),
                }
            }
        };
        if tx.send(action).is_err() {
            warn!("Failed to send end of request {}: receiver dropped", request);
        }
    });

    cancel
}
