//! # InputBox Component
//!
//! Multi-line message editor at the bottom of the chat view.
//!
//! The buffer wraps by display width, one character at a time, so the cursor
//! row and column follow directly from the text before it. Up to
//! `MAX_VISIBLE_LINES` rows are shown; beyond that the box scrolls to keep the
//! cursor in view.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph};
use unicode_width::UnicodeWidthChar;

use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// Border (2) + padding (2) consumed horizontally
const HORIZONTAL_OVERHEAD: u16 = 4;
/// Top + bottom borders
const VERTICAL_OVERHEAD: u16 = 2;
/// Content rows shown before the box starts scrolling
const MAX_VISIBLE_LINES: u16 = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Enter pressed with non-blank text; the buffer has been cleared.
    Submit(String),
    ContentChanged,
}

pub struct InputBox {
    pub buffer: String,
    /// Byte offset of the cursor (always on a char boundary).
    cursor: usize,
    /// First visible row when the content is taller than the box.
    scroll_offset: u16,
    /// Border title (prop), e.g. a hint about the current state.
    pub title: String,
    /// Dimmed while a reply is in flight (prop).
    pub dimmed: bool,
}

impl Default for InputBox {
    fn default() -> Self {
        Self::new()
    }
}

impl InputBox {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            scroll_offset: 0,
            title: String::from("Message"),
            dimmed: false,
        }
    }

    /// Box height for `area_width`, borders included, clamped to the visible maximum.
    pub fn calculate_height(&self, area_width: u16) -> u16 {
        let width = area_width.saturating_sub(HORIZONTAL_OVERHEAD);
        let rows = total_rows(&self.buffer, self.cursor, width);
        rows.min(MAX_VISIBLE_LINES) + VERTICAL_OVERHEAD
    }

    fn clear(&mut self) -> String {
        self.cursor = 0;
        self.scroll_offset = 0;
        std::mem::take(&mut self.buffer)
    }

    fn insert_str(&mut self, text: &str) {
        self.buffer.insert_str(self.cursor, text);
        self.cursor += text.len();
    }

    fn prev_boundary(&self) -> usize {
        self.buffer[..self.cursor]
            .char_indices()
            .next_back()
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    fn next_boundary(&self) -> usize {
        self.buffer[self.cursor..]
            .chars()
            .next()
            .map(|c| self.cursor + c.len_utf8())
            .unwrap_or(self.buffer.len())
    }

    /// Moves the cursor to `target`, reporting whether it moved.
    fn move_to(&mut self, target: usize) -> Option<InputEvent> {
        (target != self.cursor).then(|| {
            self.cursor = target;
            InputEvent::ContentChanged
        })
    }
}

/// Splits `text` into display rows of at most `width` columns. Explicit
/// newlines always start a new row. Never returns an empty list.
fn wrap_rows(text: &str, width: u16) -> Vec<String> {
    let width = usize::from(width.max(1));
    let mut rows = vec![String::new()];
    let mut row_width = 0;
    for c in text.chars() {
        if c == '\n' {
            rows.push(String::new());
            row_width = 0;
            continue;
        }
        let w = c.width().unwrap_or(0);
        if row_width + w > width {
            rows.push(String::new());
            row_width = 0;
        }
        if let Some(row) = rows.last_mut() {
            row.push(c);
        }
        row_width += w;
    }
    rows
}

/// (row, column) of the cursor at byte offset `cursor`.
fn cursor_position(text: &str, cursor: usize, width: u16) -> (u16, u16) {
    let rows = wrap_rows(&text[..cursor], width);
    let row = rows.len().saturating_sub(1) as u16;
    let col: usize = rows
        .last()
        .map(|r| r.chars().map(|c| c.width().unwrap_or(0)).sum())
        .unwrap_or(0);
    // A full row pushes the cursor onto the next one
    if col >= usize::from(width.max(1)) {
        (row + 1, 0)
    } else {
        (row, col as u16)
    }
}

fn total_rows(text: &str, cursor: usize, width: u16) -> u16 {
    let rows = wrap_rows(text, width).len() as u16;
    let (cursor_row, _) = cursor_position(text, cursor, width);
    rows.max(cursor_row + 1)
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let width = area.width.saturating_sub(HORIZONTAL_OVERHEAD);
        let (cursor_row, cursor_col) = cursor_position(&self.buffer, self.cursor, width);

        // Keep the cursor row inside the visible window
        if cursor_row < self.scroll_offset {
            self.scroll_offset = cursor_row;
        } else if cursor_row >= self.scroll_offset + MAX_VISIBLE_LINES {
            self.scroll_offset = cursor_row + 1 - MAX_VISIBLE_LINES;
        }

        let visible: Vec<String> = wrap_rows(&self.buffer, width)
            .into_iter()
            .skip(usize::from(self.scroll_offset))
            .take(usize::from(MAX_VISIBLE_LINES))
            .collect();

        let mut style = Style::default().fg(Color::Green);
        if self.dimmed {
            style = style.add_modifier(Modifier::DIM);
        }

        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(self.title.as_str())
            .padding(Padding::horizontal(1));
        frame.render_widget(
            Paragraph::new(visible.join("\n")).block(block).style(style),
            area,
        );

        // Border (1) + padding (1) offset into the box
        let x = area.x + 2 + cursor_col;
        let y = area.y + 1 + cursor_row.saturating_sub(self.scroll_offset);
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), y));
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::InputChar(c) => {
                let mut buf = [0u8; 4];
                self.insert_str(c.encode_utf8(&mut buf));
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Paste(text) => {
                // Terminals deliver pasted newlines as CR
                self.insert_str(&text.replace("\r\n", "\n").replace('\r', "\n"));
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Backspace if self.cursor > 0 => {
                let prev = self.prev_boundary();
                self.buffer.drain(prev..self.cursor);
                self.cursor = prev;
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Delete if self.cursor < self.buffer.len() => {
                let next = self.next_boundary();
                self.buffer.drain(self.cursor..next);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorLeft => self.move_to(self.prev_boundary()),
            TuiEvent::CursorRight => self.move_to(self.next_boundary()),
            TuiEvent::CursorHome => {
                let line_start = self.buffer[..self.cursor]
                    .rfind('\n')
                    .map(|i| i + 1)
                    .unwrap_or(0);
                self.move_to(line_start)
            }
            TuiEvent::CursorEnd => {
                let line_end = self.buffer[self.cursor..]
                    .find('\n')
                    .map(|i| self.cursor + i)
                    .unwrap_or(self.buffer.len());
                self.move_to(line_end)
            }
            TuiEvent::Submit if !self.buffer.trim().is_empty() => {
                Some(InputEvent::Submit(self.clear()))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn typed(text: &str) -> InputBox {
        let mut input = InputBox::new();
        for c in text.chars() {
            input.handle_event(&TuiEvent::InputChar(c));
        }
        input
    }

    #[test]
    fn test_typing_and_backspace() {
        let mut input = typed("ab");
        assert_eq!(input.buffer, "ab");
        assert_eq!(
            input.handle_event(&TuiEvent::Backspace),
            Some(InputEvent::ContentChanged)
        );
        assert_eq!(input.buffer, "a");
    }

    #[test]
    fn test_backspace_at_start_is_noop() {
        let mut input = InputBox::new();
        assert_eq!(input.handle_event(&TuiEvent::Backspace), None);
    }

    #[test]
    fn test_edit_in_middle_with_multibyte_chars() {
        let mut input = typed("héllo");
        input.handle_event(&TuiEvent::CursorHome);
        input.handle_event(&TuiEvent::CursorRight);
        input.handle_event(&TuiEvent::CursorRight);
        input.handle_event(&TuiEvent::Backspace);
        assert_eq!(input.buffer, "hllo");
        input.handle_event(&TuiEvent::Delete);
        assert_eq!(input.buffer, "hlo");
    }

    #[test]
    fn test_submit_clears_and_ignores_blank() {
        let mut input = typed("   ");
        assert_eq!(input.handle_event(&TuiEvent::Submit), None);

        let mut input = typed("hello");
        assert_eq!(
            input.handle_event(&TuiEvent::Submit),
            Some(InputEvent::Submit("hello".to_string()))
        );
        assert!(input.buffer.is_empty());
        assert_eq!(input.handle_event(&TuiEvent::CursorLeft), None);
    }

    #[test]
    fn test_paste_normalizes_carriage_returns() {
        let mut input = InputBox::new();
        input.handle_event(&TuiEvent::Paste("a\r\nb\rc".to_string()));
        assert_eq!(input.buffer, "a\nb\nc");
    }

    #[test]
    fn test_wrap_rows_by_display_width() {
        assert_eq!(wrap_rows("abcdef", 4), vec!["abcd", "ef"]);
        assert_eq!(wrap_rows("ab\ncd", 10), vec!["ab", "cd"]);
        // Wide characters take two columns
        assert_eq!(wrap_rows("日本語", 4), vec!["日本", "語"]);
        assert_eq!(wrap_rows("", 4), vec![""]);
    }

    #[test]
    fn test_cursor_position_wraps_at_full_row() {
        assert_eq!(cursor_position("abcd", 4, 4), (1, 0));
        assert_eq!(cursor_position("abcde", 5, 4), (1, 1));
        assert_eq!(cursor_position("ab\n", 3, 10), (1, 0));
    }

    #[test]
    fn test_height_is_clamped() {
        let input = typed("1\n2\n3\n4\n5\n6\n7");
        assert_eq!(input.calculate_height(40), MAX_VISIBLE_LINES + VERTICAL_OVERHEAD);
        assert_eq!(InputBox::new().calculate_height(40), 1 + VERTICAL_OVERHEAD);
    }

    #[test]
    fn test_render_shows_title_and_text() {
        let mut terminal = Terminal::new(TestBackend::new(40, 3)).unwrap();
        let mut input = typed("hi");
        input.title = "Message (Enter to send)".to_string();

        terminal.draw(|f| input.render(f, f.area())).unwrap();

        let text: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect();
        assert!(text.contains("Message (Enter to send)"));
        assert!(text.contains("hi"));
    }
}
