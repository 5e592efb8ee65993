//! # Empty State Component
//!
//! Shown when no conversation is selected: the app's name, description and
//! tags, plus a hint on how to start.

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Flex, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Wrap};

use crate::api::AppInfo;
use crate::tui::component::Component;

pub struct EmptyState<'a> {
    pub info: &'a AppInfo,
}

impl<'a> EmptyState<'a> {
    pub fn new(info: &'a AppInfo) -> Self {
        Self { info }
    }

    fn lines(&self) -> Vec<Line<'static>> {
        let mut lines = vec![Line::from(Span::styled(
            self.info.name.clone(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))];

        if !self.info.description.trim().is_empty() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                self.info.description.trim().to_string(),
                Style::default().fg(Color::Gray),
            )));
        }

        if !self.info.tags.is_empty() {
            lines.push(Line::default());
            let tags: Vec<Span<'static>> = self
                .info
                .tags
                .iter()
                .flat_map(|tag| {
                    [
                        Span::styled(format!("#{tag}"), Style::default().fg(Color::Cyan)),
                        Span::raw(" "),
                    ]
                })
                .collect();
            lines.push(Line::from(tags));
        }

        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            "Type a message to start a conversation",
            Style::default().fg(Color::DarkGray),
        )));
        lines
    }
}

impl Component for EmptyState<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let paragraph = Paragraph::new(self.lines())
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });
        let height = (paragraph.line_count(area.width) as u16).min(area.height);

        let [centered] = Layout::vertical([Constraint::Length(height)])
            .flex(Flex::Center)
            .areas(area);
        frame.render_widget(paragraph, centered);
    }
}
