//! Answer text to ratatui text conversion.
//!
//! Answers arrive as Markdown. Inline citation markers such as `[1]` refer to
//! the numbered citation list and are highlighted so they stand out while the
//! answer is still streaming.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use ragdesk_core::Citation;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// Style for `[n]` citation markers.
const CITATION_STYLE: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);

/// Convert an answer to styled ratatui lines.
///
/// Code lines longer than `available_width` are truncated instead of wrapped.
pub fn render_answer(text: &str, available_width: usize) -> Vec<Line<'static>> {
    AnswerRenderer::new(available_width).render(text)
}

/// One-line plain-text description of a citation, numbered from 1.
pub fn citation_label(rank: usize, citation: &Citation) -> String {
    let span = match (citation.start_char, citation.end_char) {
        (Some(start), Some(end)) => format!(" chars {start}-{end}"),
        _ => String::new(),
    };
    format!(
        "[{rank}] {} (chunk {}{span})",
        citation.filename, citation.chunk_index
    )
}

/// Split text into plain runs and `[n]` citation markers.
///
/// Returns `(segment, is_marker)` pairs in order.
pub fn split_citations(text: &str) -> Vec<(&str, bool)> {
    let mut parts = Vec::new();
    let mut plain_start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'[' {
            let digits = bytes[i + 1..]
                .iter()
                .take_while(|b| b.is_ascii_digit())
                .count();
            let close = i + 1 + digits;
            if digits > 0 && bytes.get(close) == Some(&b']') {
                if plain_start < i {
                    parts.push((&text[plain_start..i], false));
                }
                parts.push((&text[i..=close], true));
                i = close + 1;
                plain_start = i;
                continue;
            }
        }
        i += 1;
    }

    if plain_start < text.len() {
        parts.push((&text[plain_start..], false));
    }
    parts
}

/// Markdown renderer state.
struct AnswerRenderer {
    lines: Vec<Line<'static>>,
    current_spans: Vec<Span<'static>>,
    style_stack: Vec<Style>,
    in_code_block: bool,
    code_block_content: String,
    list_depth: usize,
    ordered_list_index: Option<u64>,
    available_width: usize,
}

impl AnswerRenderer {
    fn new(available_width: usize) -> Self {
        Self {
            lines: Vec::new(),
            current_spans: Vec::new(),
            style_stack: vec![Style::default()],
            in_code_block: false,
            code_block_content: String::new(),
            list_depth: 0,
            ordered_list_index: None,
            available_width,
        }
    }

    fn current_style(&self) -> Style {
        self.style_stack.last().copied().unwrap_or_default()
    }

    fn push_style(&mut self, style: Style) {
        let new_style = self.current_style().patch(style);
        self.style_stack.push(new_style);
    }

    fn pop_style(&mut self) {
        if self.style_stack.len() > 1 {
            self.style_stack.pop();
        }
    }

    fn flush_line(&mut self) {
        if !self.current_spans.is_empty() {
            let spans = std::mem::take(&mut self.current_spans);
            self.lines.push(Line::from(spans));
        }
    }

    fn add_blank_line(&mut self) {
        self.flush_line();
        self.lines.push(Line::from(""));
    }

    fn add_text(&mut self, text: &str) {
        if self.in_code_block {
            self.code_block_content.push_str(text);
            return;
        }

        let style = self.current_style();
        for (i, part) in text.split('\n').enumerate() {
            if i > 0 {
                self.flush_line();
            }
            for (segment, is_marker) in split_citations(part) {
                let segment_style = if is_marker {
                    style.patch(CITATION_STYLE)
                } else {
                    style
                };
                self.current_spans
                    .push(Span::styled(segment.to_string(), segment_style));
            }
        }
    }

    fn render_code_block(&mut self) {
        let content = std::mem::take(&mut self.code_block_content);
        self.flush_line();

        let gutter = Style::default().fg(Color::DarkGray);
        let code = Style::default().fg(Color::Yellow);
        let max_width = self.available_width.saturating_sub(4);

        for line in content.lines() {
            let shown: String = if line.chars().count() > max_width {
                let mut cut: String = line.chars().take(max_width.saturating_sub(1)).collect();
                cut.push('…');
                cut
            } else {
                line.to_string()
            };
            self.lines.push(Line::from(vec![
                Span::styled("│ ", gutter),
                Span::styled(shown, code),
            ]));
        }
        self.lines.push(Line::from(""));
    }

    fn render(mut self, text: &str) -> Vec<Line<'static>> {
        let parser = Parser::new_ext(text, Options::ENABLE_STRIKETHROUGH);

        for event in parser {
            match event {
                Event::Start(tag) => self.handle_start_tag(&tag),
                Event::End(tag) => self.handle_end_tag(tag),
                Event::Text(text) => self.add_text(&text),
                Event::Code(code) => {
                    self.current_spans.push(Span::styled(
                        format!("`{code}`"),
                        Style::default().fg(Color::Yellow).bg(Color::Rgb(40, 40, 40)),
                    ));
                }
                Event::SoftBreak | Event::HardBreak => self.flush_line(),
                Event::Rule => {
                    self.flush_line();
                    self.lines.push(Line::from(Span::styled(
                        "─".repeat(self.available_width.min(60)),
                        Style::default().fg(Color::DarkGray),
                    )));
                }
                _ => {}
            }
        }

        self.flush_line();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }

    fn handle_start_tag(&mut self, tag: &Tag) {
        match tag {
            Tag::Heading { .. } => {
                if !self.lines.is_empty() || !self.current_spans.is_empty() {
                    self.add_blank_line();
                }
                self.push_style(Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD));
            }
            Tag::BlockQuote(_) => {
                self.flush_line();
                self.current_spans
                    .push(Span::styled("│ ", Style::default().fg(Color::Blue)));
                self.push_style(Style::default().fg(Color::Blue));
            }
            Tag::CodeBlock(_) => {
                self.in_code_block = true;
                self.code_block_content.clear();
            }
            Tag::List(first_item) => {
                self.list_depth += 1;
                self.ordered_list_index = *first_item;
                self.flush_line();
            }
            Tag::Item => {
                let indent = "  ".repeat(self.list_depth.saturating_sub(1));
                let bullet = match self.ordered_list_index.as_mut() {
                    Some(idx) => {
                        let bullet = format!("{indent}{idx}. ");
                        *idx += 1;
                        bullet
                    }
                    None => format!("{indent}• "),
                };
                self.current_spans
                    .push(Span::styled(bullet, Style::default().fg(Color::Cyan)));
            }
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT));
            }
            _ => {}
        }
    }

    fn handle_end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) | TagEnd::BlockQuote(_) => {
                self.pop_style();
                self.flush_line();
            }
            TagEnd::Paragraph => self.add_blank_line(),
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.render_code_block();
            }
            TagEnd::List(_) => {
                self.flush_line();
                self.list_depth = self.list_depth.saturating_sub(1);
                if self.list_depth == 0 {
                    self.ordered_list_index = None;
                    self.add_blank_line();
                }
            }
            TagEnd::Item => self.flush_line(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => self.pop_style(),
            _ => {}
        }
    }
}
