use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::core::state::{App, View};
use crate::tui::TuiState;
use crate::tui::component::Component;
use crate::tui::components::{EmptyState, EntryFormView, MessageList, TitleBar};

pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState) {
    use Constraint::{Length, Min};

    let view = app.view();
    let shows_input = matches!(view, View::Chat | View::EmptyState);
    let input_height = if shows_input {
        tui.input_box.calculate_height(frame.area().width)
    } else {
        0
    };
    let error_height = u16::from(app.error.is_some());

    let [title_area, main_area, error_area, input_area] = Layout::vertical([
        Length(1),
        Min(0),
        Length(error_height),
        Length(input_height),
    ])
    .areas(frame.area());

    match view {
        View::EntryForm => {
            let opening = app
                .app_parameters
                .as_ref()
                .and_then(|p| p.opening_statement.as_deref())
                .filter(|s| !s.is_empty());
            EntryFormView::new(&app.entry_form, app.title(), opening).render(frame, main_area);
        }
        View::Chat => {
            MessageList::new(
                &mut tui.message_list,
                &app.messages,
                app.is_loading(),
                tui.pulse_value,
            )
            .render(frame, main_area);
        }
        View::EmptyState => {
            if let Some(info) = &app.app_info {
                EmptyState::new(info).render(frame, main_area);
            }
        }
        View::Blank => draw_blank(frame, main_area, &app.status_message),
    }

    let has_unseen = view == View::Chat && tui.message_list.has_unseen_content();
    TitleBar::new(
        app.title(),
        app.conversation.as_ref(),
        &app.status_message,
        has_unseen,
    )
    .render(frame, title_area);

    if let Some(error) = &app.error {
        frame.render_widget(
            Line::from(Span::styled(
                format!(" ⚠ {error}"),
                Style::default().fg(Color::Red),
            )),
            error_area,
        );
    }

    if shows_input {
        tui.input_box.render(frame, input_area);
    }
}

fn draw_blank(frame: &mut Frame, area: Rect, status: &str) {
    let [_, middle, _] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(1),
        Constraint::Fill(1),
    ])
    .areas(area);
    frame.render_widget(
        Paragraph::new(Span::styled(
            status.to_string(),
            Style::default().fg(Color::DarkGray),
        ))
        .centered(),
        middle,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{AppInfo, AppParameters, FormControl, UserInputFormItem};
    use crate::core::action::{Action, update};
    use crate::test_support::test_app;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn draw(app: &App, tui: &mut TuiState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| draw_ui(f, app, tui)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    fn info() -> AppInfo {
        AppInfo {
            name: "Helper".to_string(),
            description: "Answers questions".to_string(),
            tags: vec![],
        }
    }

    #[test]
    fn test_blank_view_shows_status() {
        let app = test_app();
        let text = draw(&app, &mut TuiState::new());
        assert!(text.contains("Dify Chat"));
        assert!(text.contains("Connecting..."));
        assert!(!text.contains("Message"));
    }

    #[test]
    fn test_empty_state_with_input() {
        let mut app = test_app();
        update(
            &mut app,
            Action::AppMetadataLoaded {
                info: Some(info()),
                parameters: None,
            },
        );
        let text = draw(&app, &mut TuiState::new());
        assert!(text.contains("Answers questions"));
        assert!(text.contains("Message"));
    }

    #[test]
    fn test_entry_form_hides_input() {
        let mut app = test_app();
        let parameters = AppParameters {
            opening_statement: Some("Welcome aboard".to_string()),
            user_input_form: vec![UserInputFormItem {
                text_input: Some(FormControl {
                    label: "Target".to_string(),
                    variable: "target".to_string(),
                    required: true,
                    ..Default::default()
                }),
                ..Default::default()
            }],
        };
        update(
            &mut app,
            Action::AppMetadataLoaded {
                info: Some(info()),
                parameters: Some(parameters),
            },
        );
        assert_eq!(app.view(), View::EntryForm);

        let text = draw(&app, &mut TuiState::new());
        assert!(text.contains("Welcome aboard"));
        assert!(text.contains("Target"));
        assert!(!text.contains("Message"));
    }

    #[test]
    fn test_chat_view_with_error_notice() {
        let mut app = test_app();
        update(
            &mut app,
            Action::AppMetadataLoaded {
                info: Some(info()),
                parameters: None,
            },
        );
        update(&mut app, Action::NewConversation);
        update(&mut app, Action::Submit("hello there".to_string()));
        app.error = Some("connection reset".to_string());

        let text = draw(&app, &mut TuiState::new());
        assert!(text.contains("hello there"));
        assert!(text.contains("connection reset"));
        assert!(text.contains("new conversation"));
    }
}
