use ratatui::Frame;
use ratatui::layout::Rect;

/// A piece of the screen.
///
/// Components receive their data as struct fields ("props") and may hold a
/// `&mut` to persistent presentation state, which is why `render` takes
/// `&mut self`: layout caches and scroll offsets are updated during the
/// render pass, the same way ratatui's `StatefulWidget` works.
pub trait Component {
    fn render(&mut self, frame: &mut Frame, area: Rect);
}

/// A component that consumes terminal events.
pub trait EventHandler {
    /// What the component reports back to the event loop.
    type Event;

    /// Handle a low-level `TuiEvent` and optionally return a high-level event.
    fn handle_event(&mut self, event: &super::event::TuiEvent) -> Option<Self::Event>;
}
