use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Text;
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Widget, Wrap};

use crate::core::message::{Message, MessageStatus, Role};
use crate::tui::component::Component;
use crate::tui::markdown;

/// Horizontal padding (per side) between the border and text content.
const CONTENT_PAD_H: u16 = 1;
/// Total horizontal space consumed by borders (1 left + 1 right) and padding.
const HORIZONTAL_OVERHEAD: u16 = 2 + CONTENT_PAD_H * 2;
/// Total vertical space consumed by borders (1 top + 1 bottom).
const VERTICAL_OVERHEAD: u16 = 2;

/// Pulse intensity above which the border of a streaming bubble turns BOLD.
const PULSE_BOLD_THRESHOLD: f32 = 0.6;

/// One chat bubble, created fresh each frame.
///
/// User messages render as plain text; assistant answers go through the
/// markdown renderer. The border title carries the role plus the status of
/// answers that are not done yet (or failed).
#[derive(Clone, Copy)]
pub struct MessageBubble<'a> {
    pub message: &'a Message,
    /// 0.0 to 1.0 while the answer is streaming, 0.0 otherwise.
    pub pulse_intensity: f32,
}

impl<'a> MessageBubble<'a> {
    pub fn new(message: &'a Message, pulse_intensity: f32) -> Self {
        Self {
            message,
            pulse_intensity,
        }
    }

    /// Rendered height at `width`, borders included.
    ///
    /// Uses the same `Paragraph` the widget renders, so measured and drawn
    /// heights cannot drift apart.
    pub fn calculate_height(message: &Message, width: u16) -> u16 {
        let content_width = width.saturating_sub(HORIZONTAL_OVERHEAD);
        if content_width == 0 {
            return 1;
        }
        let lines = body_paragraph(message).line_count(content_width) as u16;
        lines.max(1) + VERTICAL_OVERHEAD
    }
}

fn role_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Green),
        Role::Assistant => Style::default().fg(Color::Blue),
    }
}

fn title(message: &Message) -> String {
    let role = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut title = match (message.status, message.role) {
        (MessageStatus::Pending, Role::Assistant) => format!("{role} · thinking"),
        (MessageStatus::Streaming, _) => format!("{role} · typing"),
        (MessageStatus::Error, _) => format!("{role} · failed"),
        _ => role.to_string(),
    };
    if let Some(at) = message.created_at.filter(|_| message.is_history) {
        title.push_str(&at.format(" · %Y-%m-%d %H:%M").to_string());
    }
    title
}

fn body_paragraph(message: &Message) -> Paragraph<'static> {
    let style = role_style(message.role);
    let content = message.content.trim();
    let text = match message.role {
        Role::User => Text::styled(content.to_string(), style),
        Role::Assistant if content.is_empty() && !message.status.is_final() => {
            Text::styled("…", style.add_modifier(Modifier::DIM))
        }
        Role::Assistant => markdown::render(content, Color::Blue),
    };
    Paragraph::new(text).wrap(Wrap { trim: false })
}

impl Widget for MessageBubble<'_> {
    fn render(self, area: Rect, buf: &mut ratatui::buffer::Buffer) {
        let style = role_style(self.message.role);

        let mut border_style = match self.message.status {
            MessageStatus::Error => Style::default().fg(Color::Red),
            _ => style.add_modifier(Modifier::DIM),
        };
        if self.pulse_intensity > PULSE_BOLD_THRESHOLD {
            border_style = border_style
                .remove_modifier(Modifier::DIM)
                .add_modifier(Modifier::BOLD);
        }

        let block = Block::bordered()
            .title(title(self.message))
            .border_type(BorderType::Rounded)
            .border_style(border_style)
            .title_style(border_style)
            .padding(Padding::horizontal(CONTENT_PAD_H));

        let inner_area = block.inner(area);
        block.render(area, buf);
        body_paragraph(self.message).render(inner_area, buf);
    }
}

impl Component for MessageBubble<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        frame.render_widget(*self, area);
    }
}
