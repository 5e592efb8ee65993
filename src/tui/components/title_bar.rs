//! # TitleBar Component
//!
//! One-line header: app name, current conversation, status message, and a
//! "↓ New" marker when the message list has content below the viewport.
//!
//! Purely presentational. All fields are props; the conversation label is
//! shortened so the status stays visible on narrow terminals.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::core::conversation::ConversationId;
use crate::tui::component::Component;

/// Characters of a server id shown in the header.
const ID_PREFIX_LEN: usize = 8;

pub struct TitleBar<'a> {
    pub title: &'a str,
    pub conversation: Option<&'a ConversationId>,
    pub status_message: &'a str,
    pub has_unseen_content: bool,
}

impl<'a> TitleBar<'a> {
    pub fn new(
        title: &'a str,
        conversation: Option<&'a ConversationId>,
        status_message: &'a str,
        has_unseen_content: bool,
    ) -> Self {
        Self {
            title,
            conversation,
            status_message,
            has_unseen_content,
        }
    }

    fn conversation_label(&self) -> Option<String> {
        match self.conversation? {
            ConversationId::Temporary(_) => Some("new conversation".to_string()),
            ConversationId::Assigned(id) => {
                let short: String = id.chars().take(ID_PREFIX_LEN).collect();
                Some(format!("#{short}"))
            }
        }
    }
}

impl Component for TitleBar<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let dim = Style::default().fg(Color::DarkGray);
        let mut spans = vec![Span::styled(
            self.title.to_string(),
            Style::default().fg(Color::Yellow),
        )];
        if let Some(label) = self.conversation_label() {
            spans.push(Span::styled(" | ", dim));
            spans.push(Span::raw(label));
        }
        if !self.status_message.is_empty() {
            spans.push(Span::styled(" | ", dim));
            spans.push(Span::raw(self.status_message.to_string()));
        }
        if self.has_unseen_content {
            spans.push(Span::styled(" | ", dim));
            spans.push(Span::styled("↓ New", Style::default().fg(Color::Cyan)));
        }
        frame.render_widget(Line::from(spans), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn draw(bar: &mut TitleBar<'_>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 1)).unwrap();
        terminal.draw(|f| bar.render(f, f.area())).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_title_with_assigned_conversation_and_status() {
        let id = ConversationId::Assigned("0123456789abcdef".to_string());
        let text = draw(&mut TitleBar::new("Helper", Some(&id), "Thinking...", false));
        assert!(text.contains("Helper"));
        assert!(text.contains("#01234567"));
        assert!(!text.contains("89abcdef"));
        assert!(text.contains("Thinking..."));
        assert!(!text.contains("↓ New"));
    }

    #[test]
    fn test_temporary_conversation_and_unseen_marker() {
        let id = ConversationId::Temporary("temp-1".to_string());
        let text = draw(&mut TitleBar::new("Helper", Some(&id), "", true));
        assert!(text.contains("new conversation"));
        assert!(!text.contains("temp-1"));
        assert!(text.contains("↓ New"));
    }

    #[test]
    fn test_no_conversation_no_separators() {
        let text = draw(&mut TitleBar::new("Dify Chat", None, "", false));
        assert!(text.contains("Dify Chat"));
        assert!(!text.contains('|'));
    }
}
