//! Markdown → ratatui `Text` for assistant answers.
//!
//! Walks `pulldown_cmark` events and emits styled lines. Covers what chat
//! answers actually use: paragraphs, headings, emphasis, inline and fenced
//! code, lists, blockquotes, links and rules. Everything else is dropped.

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

const CODE_FG: Color = Color::White;
const MUTED: Color = Color::DarkGray;

/// Renders `content` with `base_fg` as the body color.
///
/// Answers are re-rendered on every streamed fragment, so half-finished
/// markdown (an unclosed fence, a dangling `**`) must still produce output.
pub fn render(content: &str, base_fg: Color) -> Text<'static> {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_STRIKETHROUGH);

    let mut renderer = Renderer::new(base_fg);
    for event in Parser::new_ext(content, opts) {
        renderer.event(event);
    }
    renderer.text
}

struct Renderer {
    text: Text<'static>,
    base_fg: Color,
    /// Nested inline styles; each entry is already patched onto its parent.
    styles: Vec<Style>,
    /// Spans repeated at the start of each new line (quote bars, code gutter).
    gutters: Vec<Span<'static>>,
    /// One entry per open list: `None` bullets, `Some(n)` the next number.
    lists: Vec<Option<u64>>,
    in_code_block: bool,
    pending_link: Option<String>,
    /// A block ended; the next block starts after a blank line.
    gap: bool,
}

impl Renderer {
    fn new(base_fg: Color) -> Self {
        Self {
            text: Text::default(),
            base_fg,
            styles: Vec::new(),
            gutters: Vec::new(),
            lists: Vec::new(),
            in_code_block: false,
            pending_link: None,
            gap: false,
        }
    }

    fn current_style(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| Style::default().fg(self.base_fg))
    }

    fn enter_style(&mut self, overlay: Style) {
        let style = self.current_style().patch(overlay);
        self.styles.push(style);
    }

    fn leave_style(&mut self) {
        self.styles.pop();
    }

    fn new_line(&mut self, mut line: Line<'static>) {
        for gutter in self.gutters.iter().rev() {
            line.spans.insert(0, gutter.clone());
        }
        self.text.lines.push(line);
    }

    fn append(&mut self, span: Span<'static>) {
        match self.text.lines.last_mut() {
            Some(line) => line.push_span(span),
            None => self.new_line(Line::from(span)),
        }
    }

    fn start_block(&mut self) {
        if self.gap {
            self.new_line(Line::default());
            self.gap = false;
        }
    }

    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(tag) => self.close(tag),
            Event::Text(t) => self.body_text(&t),
            Event::Code(c) => {
                let style = Style::default().fg(CODE_FG).bg(MUTED);
                self.append(Span::styled(c.to_string(), style));
            }
            Event::SoftBreak => self.append(Span::raw(" ")),
            Event::HardBreak => self.new_line(Line::default()),
            Event::Rule => {
                self.start_block();
                self.new_line(Line::from(Span::styled(
                    "─".repeat(32),
                    Style::default().fg(MUTED),
                )));
                self.gap = true;
            }
            _ => {}
        }
    }

    fn open(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                self.start_block();
                self.new_line(Line::default());
            }
            Tag::Heading { level, .. } => {
                self.start_block();
                let style = heading_style(self.base_fg, level);
                self.new_line(Line::from(Span::styled(
                    format!("{} ", "#".repeat(level as usize)),
                    style,
                )));
                self.enter_style(style);
            }
            Tag::BlockQuote(_) => {
                self.start_block();
                self.gutters
                    .push(Span::styled("▎ ", Style::default().fg(MUTED)));
                self.enter_style(Style::default().add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => {
                self.start_block();
                let label = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => lang.to_string(),
                    _ => String::from("code"),
                };
                self.new_line(Line::from(Span::styled(
                    format!("┌ {label}"),
                    Style::default().fg(MUTED),
                )));
                self.gutters.push(Span::styled("│ ", Style::default().fg(MUTED)));
                self.in_code_block = true;
            }
            Tag::List(first) => {
                if self.lists.is_empty() {
                    self.start_block();
                }
                self.lists.push(first);
            }
            Tag::Item => {
                self.new_line(Line::default());
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{indent}{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => format!("{indent}• "),
                };
                self.append(Span::styled(marker, Style::default().fg(MUTED)));
            }
            Tag::Emphasis => self.enter_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.enter_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.enter_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::Link { dest_url, .. } => {
                self.pending_link = Some(dest_url.to_string());
                self.enter_style(
                    Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::UNDERLINED),
                );
            }
            _ => {}
        }
    }

    fn close(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => self.gap = true,
            TagEnd::Heading(_) => {
                self.leave_style();
                self.gap = true;
            }
            TagEnd::BlockQuote(_) => {
                self.gutters.pop();
                self.leave_style();
                self.gap = true;
            }
            TagEnd::CodeBlock => {
                self.gutters.pop();
                self.in_code_block = false;
                self.new_line(Line::from(Span::styled("└", Style::default().fg(MUTED))));
                self.gap = true;
            }
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.gap = true;
                }
            }
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.leave_style(),
            TagEnd::Link => {
                self.leave_style();
                if let Some(url) = self.pending_link.take() {
                    self.append(Span::styled(format!(" <{url}>"), Style::default().fg(MUTED)));
                }
            }
            _ => {}
        }
    }

    fn body_text(&mut self, raw: &str) {
        // ratatui renders '\t' as zero width
        let expanded = raw.replace('\t', "    ");

        if self.in_code_block {
            let style = Style::default().fg(CODE_FG);
            for line in expanded.lines() {
                self.new_line(Line::from(Span::styled(line.to_string(), style)));
            }
            return;
        }

        let style = self.current_style();
        self.append(Span::styled(expanded, style));
    }
}

fn heading_style(base_fg: Color, level: HeadingLevel) -> Style {
    let style = Style::default().fg(base_fg).add_modifier(Modifier::BOLD);
    match level {
        HeadingLevel::H1 => style.add_modifier(Modifier::UNDERLINED),
        HeadingLevel::H2 => style,
        _ => style.add_modifier(Modifier::ITALIC),
    }
}
