//! # MessageList Component
//!
//! Scrollable view of the conversation: history turns followed by live
//! bubbles.
//!
//! `MessageList` is created each frame around a `&mut MessageListState`
//! (persistent scroll position and layout cache) and the `MessageLog` (props).
//! Heights are measured once per message and reused until the width changes,
//! except for the in-flight answer which grows with every fragment.

use ratatui::Frame;
use ratatui::layout::{Position, Rect, Size};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::message::{Message, MessageLog};
use crate::tui::component::{Component, EventHandler};
use crate::tui::components::message::MessageBubble;
use crate::tui::event::TuiEvent;

/// Scroll and layout state; lives in `TuiState` across frames.
pub struct MessageListState {
    pub scroll_state: ScrollViewState,
    pub layout: LayoutCache,
    /// When true, auto-scroll to bottom on new content
    pub stick_to_bottom: bool,
    /// Last known viewport height (for scroll clamping between frames)
    pub viewport_height: u16,
}

impl Default for MessageListState {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageListState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            layout: LayoutCache::default(),
            stick_to_bottom: true,
            viewport_height: 0,
        }
    }

    fn max_offset(&self) -> u16 {
        self.layout.total_height().saturating_sub(self.viewport_height)
    }

    /// Keeps the offset inside the content so scrolling up never starts from
    /// an overscrolled position.
    pub fn clamp_scroll(&mut self) {
        let max_y = self.max_offset();
        let current = self.scroll_state.offset();
        if current.y > max_y {
            self.scroll_state.set_offset(Position { x: current.x, y: max_y });
        }
    }

    /// Re-engages auto-scroll once the user has scrolled back to the end.
    pub fn repin_if_at_bottom(&mut self) {
        let max_y = self.max_offset();
        let current = self.scroll_state.offset();
        if current.y >= max_y {
            self.stick_to_bottom = true;
            self.scroll_state.set_offset(Position { x: current.x, y: max_y });
        }
    }

    /// True when content continues below the viewport.
    pub fn has_unseen_content(&self) -> bool {
        !self.stick_to_bottom && self.scroll_state.offset().y < self.max_offset()
    }
}

pub struct MessageList<'a> {
    pub state: &'a mut MessageListState,
    pub messages: &'a MessageLog,
    pub is_loading: bool,
    pub pulse_value: f32,
}

impl<'a> MessageList<'a> {
    pub fn new(
        state: &'a mut MessageListState,
        messages: &'a MessageLog,
        is_loading: bool,
        pulse_value: f32,
    ) -> Self {
        Self {
            state,
            messages,
            is_loading,
            pulse_value,
        }
    }
}

impl Component for MessageList<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let content_width = area.width.saturating_sub(1); // -1 for scrollbar safe area
        let items: Vec<&Message> = self.messages.iter().collect();

        // 1. Refresh layout cache
        let layout = &mut self.state.layout;
        let reusable = layout.reusable_count(&items, content_width);
        layout.heights.truncate(reusable);
        for message in items.iter().skip(layout.heights.len()) {
            layout
                .heights
                .push(MessageBubble::calculate_height(message, content_width));
        }
        layout.rebuild_prefix_heights();
        layout.update_metadata(items.len(), content_width);

        let total_height = layout.total_height();

        // 2. Clamp, then render the visible slice
        self.state.viewport_height = area.height;
        if !self.state.stick_to_bottom {
            self.state.clamp_scroll();
        }

        let scroll_offset = self.state.scroll_state.offset().y;
        let visible = self.state.layout.visible_range(scroll_offset, area.height);

        let mut scroll_view = ScrollView::new(Size::new(content_width, total_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Automatic)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let last = items.len().saturating_sub(1);
        for i in visible {
            let height = self.state.layout.heights[i];
            let top = self.state.layout.top_of(i);
            let message = items[i];
            let streaming = i == last && self.is_loading && !message.status.is_final();
            let pulse = if streaming { self.pulse_value } else { 0.0 };
            scroll_view.render_widget(
                MessageBubble::new(message, pulse),
                Rect::new(0, top, content_width, height),
            );
        }

        if self.state.stick_to_bottom {
            self.state.scroll_state.scroll_to_bottom();
        }

        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);
    }
}

/// Implemented on the state rather than `MessageList` because the list is
/// rebuilt every frame while scroll position must persist.
impl EventHandler for MessageListState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollToBottom => {
                self.stick_to_bottom = true;
                self.scroll_state.scroll_to_bottom();
            }
            _ => {}
        }
        None
    }
}

/// Per-message heights at a given width.
#[derive(Debug, Default)]
pub struct LayoutCache {
    pub heights: Vec<u16>,
    /// Running sums of `heights`: entry `i` is the bottom edge of message `i`.
    pub prefix_heights: Vec<u16>,
    message_count: usize,
    content_width: u16,
}

impl LayoutCache {
    /// How many cached heights are still valid for `items` at `content_width`.
    ///
    /// Invalidated wholesale on a width change or when messages disappeared
    /// (conversation switch). A last message that is not final may have grown
    /// since it was measured, so it is always re-measured.
    pub fn reusable_count(&self, items: &[&Message], content_width: u16) -> usize {
        if self.content_width != content_width || items.len() < self.message_count {
            return 0;
        }
        let cached = self.heights.len().min(items.len());
        match items.last() {
            Some(last) if !last.status.is_final() => cached.min(items.len() - 1),
            // The answer may have finished between two frames.
            Some(_) if self.message_count == items.len() => cached.min(items.len() - 1),
            _ => cached,
        }
    }

    pub fn update_metadata(&mut self, message_count: usize, content_width: u16) {
        self.message_count = message_count;
        self.content_width = content_width;
    }

    pub fn rebuild_prefix_heights(&mut self) {
        self.prefix_heights = self
            .heights
            .iter()
            .scan(0u16, |acc, &h| {
                *acc = acc.saturating_add(h);
                Some(*acc)
            })
            .collect();
    }

    pub fn total_height(&self) -> u16 {
        self.prefix_heights.last().copied().unwrap_or(0)
    }

    pub fn top_of(&self, index: usize) -> u16 {
        if index == 0 {
            0
        } else {
            self.prefix_heights[index - 1]
        }
    }

    /// Messages intersecting the viewport plus half a screen either side.
    pub fn visible_range(
        &self,
        scroll_offset: u16,
        viewport_height: u16,
    ) -> std::ops::Range<usize> {
        let buffer = viewport_height / 2;
        let from = scroll_offset.saturating_sub(buffer);
        let to = scroll_offset
            .saturating_add(viewport_height)
            .saturating_add(buffer);

        let start = self.prefix_heights.partition_point(|&end| end <= from);
        let end = self
            .prefix_heights
            .partition_point(|&end| end < to)
            .saturating_add(1)
            .min(self.prefix_heights.len());
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::{MessageStatus, Role};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn msg(role: Role, status: MessageStatus, content: &str) -> Message {
        Message {
            id: content.to_string(),
            content: content.to_string(),
            role,
            status,
            is_history: false,
            created_at: None,
        }
    }

    #[test]
    fn test_layout_cache_reuse_rules() {
        let done = msg(Role::User, MessageStatus::Success, "a");
        let answer = msg(Role::Assistant, MessageStatus::Success, "b");
        let streaming = msg(Role::Assistant, MessageStatus::Streaming, "c");

        let mut cache = LayoutCache::default();
        cache.heights = vec![3, 3];
        cache.update_metadata(2, 80);

        // Same messages: the last one is re-measured once in case it just finished
        assert_eq!(cache.reusable_count(&[&done, &answer], 80), 1);
        // A new message arrived: everything cached is fine
        assert_eq!(cache.reusable_count(&[&done, &answer, &done], 80), 2);
        // Width change
        assert_eq!(cache.reusable_count(&[&done, &answer], 40), 0);
        // Conversation switched to a shorter one
        assert_eq!(cache.reusable_count(&[&done], 80), 0);
        // Streaming last message is never reused
        assert_eq!(cache.reusable_count(&[&done, &streaming], 80), 1);
    }

    #[test]
    fn test_streaming_answer_height_refreshes() {
        let width = 30;
        let user = msg(Role::User, MessageStatus::Success, "hi");
        let mut answer = msg(Role::Assistant, MessageStatus::Streaming, "short");

        let mut cache = LayoutCache::default();
        for m in [&user, &answer] {
            cache.heights.push(MessageBubble::calculate_height(m, width));
        }
        cache.update_metadata(2, width);
        let stale = cache.heights[1];

        answer.content = "this answer is long enough to wrap across several lines".to_string();
        answer.status = MessageStatus::Success;
        let reusable = cache.reusable_count(&[&user, &answer], width);
        assert_eq!(reusable, 1);
        cache.heights.truncate(reusable);
        cache.heights.push(MessageBubble::calculate_height(&answer, width));

        assert!(cache.heights[1] > stale);
    }

    #[test]
    fn test_visible_range() {
        let mut cache = LayoutCache::default();
        cache.heights = vec![10; 10];
        cache.rebuild_prefix_heights();
        assert_eq!(cache.total_height(), 100);
        assert_eq!(cache.top_of(3), 30);

        // viewport 20 at offset 40, buffer 10 → rows 30..70
        assert_eq!(cache.visible_range(40, 20), 3..7);
        assert_eq!(cache.visible_range(0, 20), 0..3);
        assert_eq!(LayoutCache::default().visible_range(0, 20), 0..0);
    }

    #[test]
    fn test_scroll_up_unpins_and_scroll_to_bottom_repins() {
        let mut state = MessageListState::new();
        state.handle_event(&TuiEvent::ScrollUp);
        assert!(!state.stick_to_bottom);
        state.handle_event(&TuiEvent::ScrollToBottom);
        assert!(state.stick_to_bottom);
    }

    #[test]
    fn test_render_shows_messages() {
        let mut log = MessageLog::new();
        log.push_exchange("hello there".to_string());
        let mut state = MessageListState::new();

        let mut terminal = Terminal::new(TestBackend::new(60, 12)).unwrap();
        terminal
            .draw(|f| {
                MessageList::new(&mut state, &log, true, 0.0).render(f, f.area());
            })
            .unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("hello there"));
        assert!(text.contains("assistant · thinking"));
        assert_eq!(state.layout.heights.len(), 2);
    }
}
