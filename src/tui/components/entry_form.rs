//! # Entry Form Component
//!
//! Renders the app's declared inputs before a new conversation starts and
//! edits them in place. Field values live on the core `EntryForm`; this
//! module only draws them and maps keys to edits.
//!
//! Keys: Tab / Shift+Tab move between fields, ←/→ (or Space) pick a select
//! option, Ctrl+J adds a line to a paragraph field, Enter submits.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Wrap};

use crate::core::form::{EntryForm, FieldKind, FormField};
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// Rows of a paragraph field shown before its text is cut off.
const PARAGRAPH_ROWS: u16 = 3;
const FORM_WIDTH: u16 = 72;

#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
    Submit,
    Changed,
}

impl EventHandler for EntryForm {
    type Event = FormEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::NextField => {
                self.focus_next();
                Some(FormEvent::Changed)
            }
            TuiEvent::PrevField => {
                self.focus_prev();
                Some(FormEvent::Changed)
            }
            TuiEvent::Submit => Some(FormEvent::Submit),
            _ => {
                let field = self.focused_field_mut()?;
                let variable = field.variable.clone();
                let changed = edit_field(field, event);
                if changed {
                    self.errors.remove(&variable);
                }
                changed.then_some(FormEvent::Changed)
            }
        }
    }
}

fn edit_field(field: &mut FormField, event: &TuiEvent) -> bool {
    if matches!(field.kind, FieldKind::Select(_)) {
        return match event {
            TuiEvent::CursorRight | TuiEvent::InputChar(' ') => {
                field.cycle_option(true);
                true
            }
            TuiEvent::CursorLeft => {
                field.cycle_option(false);
                true
            }
            _ => false,
        };
    }

    let multiline = field.kind == FieldKind::Paragraph;
    match event {
        TuiEvent::InputChar('\n') if !multiline => false,
        TuiEvent::InputChar(c) => push_limited(field, &c.to_string()),
        TuiEvent::Paste(text) => {
            let text = if multiline {
                text.replace('\r', "")
            } else {
                text.replace(['\r', '\n'], " ")
            };
            push_limited(field, &text)
        }
        TuiEvent::Backspace => field.value.pop().is_some(),
        _ => false,
    }
}

/// Appends `text`, truncated so the value stays within `max_length` chars.
fn push_limited(field: &mut FormField, text: &str) -> bool {
    let room = match field.max_length {
        Some(max) => max.saturating_sub(field.value.chars().count()),
        None => usize::MAX,
    };
    let before = field.value.len();
    field.value.extend(text.chars().take(room));
    field.value.len() != before
}

/// Transient render wrapper, created each frame.
pub struct EntryFormView<'a> {
    pub form: &'a EntryForm,
    pub app_name: &'a str,
    pub opening_statement: Option<&'a str>,
}

impl<'a> EntryFormView<'a> {
    pub fn new(form: &'a EntryForm, app_name: &'a str, opening_statement: Option<&'a str>) -> Self {
        Self {
            form,
            app_name,
            opening_statement,
        }
    }

    fn field_height(&self, field: &FormField) -> u16 {
        let box_rows = match field.kind {
            FieldKind::Paragraph => PARAGRAPH_ROWS,
            _ => 1,
        };
        let error_row = u16::from(self.form.errors.contains_key(&field.variable));
        1 + box_rows + 2 + error_row
    }

    fn render_field(&self, frame: &mut Frame, area: Rect, field: &FormField, focused: bool) {
        let [label_area, box_area, error_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(u16::from(self.form.errors.contains_key(&field.variable))),
        ])
        .areas(area);

        let mut label = vec![Span::styled(
            field.label.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )];
        if field.required {
            label.push(Span::styled(" *", Style::default().fg(Color::Red)));
        }
        if let Some(max) = field.max_length {
            label.push(Span::styled(
                format!("  {}/{}", field.value.chars().count(), max),
                Style::default().fg(Color::DarkGray),
            ));
        }
        frame.render_widget(Line::from(label), label_area);

        let value = match &field.kind {
            FieldKind::Select(options) if field.value.is_empty() => {
                format!("‹ choose one of {} ›", options.len())
            }
            FieldKind::Select(_) => format!("‹ {} ›", field.value),
            _ => field.value.clone(),
        };
        let border_style = if focused {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let value_box = Paragraph::new(value)
            .wrap(Wrap { trim: false })
            .block(
                Block::bordered()
                    .border_type(BorderType::Rounded)
                    .border_style(border_style)
                    .padding(Padding::horizontal(1)),
            );
        frame.render_widget(value_box, box_area);

        if let Some(error) = self.form.errors.get(&field.variable) {
            frame.render_widget(
                Span::styled(error.clone(), Style::default().fg(Color::Red)),
                error_area,
            );
        }
    }
}

impl Component for EntryFormView<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let width = area.width.min(FORM_WIDTH);
        let area = Rect::new(area.x + (area.width - width) / 2, area.y, width, area.height);

        let header_rows = 2 + u16::from(self.opening_statement.is_some());
        let mut constraints = vec![Constraint::Length(header_rows)];
        constraints.extend(
            self.form
                .fields
                .iter()
                .map(|f| Constraint::Length(self.field_height(f))),
        );
        constraints.push(Constraint::Min(0));
        constraints.push(Constraint::Length(1));
        let areas = Layout::vertical(constraints).split(area);

        let mut header = vec![Line::from(Span::styled(
            self.app_name.to_string(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ))];
        if let Some(statement) = self.opening_statement {
            header.push(Line::from(Span::styled(
                statement.to_string(),
                Style::default().fg(Color::Gray),
            )));
        }
        frame.render_widget(Paragraph::new(header), areas[0]);

        for (i, field) in self.form.fields.iter().enumerate() {
            self.render_field(frame, areas[i + 1], field, i == self.form.focused);
        }

        let help = " Tab next  ←/→ choose  Enter start ";
        frame.render_widget(
            Line::from(Span::styled(help, Style::default().fg(Color::DarkGray))).centered(),
            areas[areas.len() - 1],
        );
    }
}
