//! UI rendering with ratatui.
//!
//! Layout: a header bar, a left column with the document list above the
//! search panel, the chat panel on the right, and a one-line status bar that
//! is the only place errors are shown.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{
    Block, Borders, Clear, List, ListItem, ListState, Paragraph, Scrollbar, ScrollbarOrientation,
    ScrollbarState, Wrap,
};
use ratatui::Frame;
use ragdesk_session::SessionState;

use crate::app::{App, Focus, InputMode, TextInput};
use crate::markdown::{citation_label, render_answer};

/// Horizontal padding for chat content.
const CHAT_PADDING: u16 = 1;

/// Render the UI.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header bar
            Constraint::Min(5),    // Panels
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    render_header_bar(frame, app, main_layout[0]);

    let content_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(38), Constraint::Percentage(62)])
        .split(main_layout[1]);

    let left_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(content_layout[0]);

    render_documents_panel(frame, app, left_layout[0]);
    render_search_panel(frame, app, left_layout[1]);
    render_chat_panel(frame, app, content_layout[1]);
    render_status_bar(frame, app, main_layout[2]);

    if app.input_mode == InputMode::Uploading {
        render_upload_dialog(frame, app, area);
    }
}

/// Truncate a string in the middle with an ellipsis if it is too long.
fn truncate_middle(s: &str, max_len: usize) -> String {
    let len = s.chars().count();
    if len <= max_len {
        return s.to_string();
    }
    if max_len < 5 {
        return s.chars().take(max_len).collect();
    }
    let keep = (max_len - 3) / 2;
    let start: String = s.chars().take(keep).collect();
    let end: String = s.chars().skip(len - keep).collect();
    format!("{start}...{end}")
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::Gray)
    }
}

/// Render the header bar with the product name and backend status.
fn render_header_bar(frame: &mut Frame, app: &App, area: Rect) {
    let (status_text, status_style) = if app.refresh_error.is_some() {
        ("unreachable", Style::default().fg(Color::Red))
    } else {
        ("connected", Style::default().fg(Color::Green))
    };

    let title = "RAGDESK";
    let max_url_width = (area.width as usize / 2).saturating_sub(15);
    let display_url = truncate_middle(app.api_url(), max_url_width);
    let right_width = display_url.chars().count() + status_text.len() + 3;
    let padding = (area.width as usize).saturating_sub(title.len() + right_width);

    let line = Line::from(vec![
        Span::styled(title, Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(padding)),
        Span::raw(display_url),
        Span::raw(" ["),
        Span::styled(status_text, status_style),
        Span::raw("]"),
    ]);

    let header = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

/// Render the document list.
fn render_documents_panel(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Documents;

    let block = Block::default()
        .title(format!(" Documents ({}) ", app.documents.len()))
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));

    let items: Vec<ListItem> = app
        .documents
        .iter()
        .map(|document| {
            ListItem::new(Line::from(vec![
                Span::raw(document.filename.as_str()),
                Span::styled(
                    format!(" {}", document.created_at.format("%Y-%m-%d %H:%M")),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.selected_document);
    frame.render_stateful_widget(list, area, &mut state);

    if is_focused && app.input_mode == InputMode::Normal {
        let help_area = Rect::new(
            area.x + 1,
            area.y + area.height.saturating_sub(2),
            area.width.saturating_sub(2),
            1,
        );

        if area.height > 4 {
            let help = Paragraph::new(Line::from(vec![
                Span::styled("[u]", Style::default().fg(Color::Yellow)),
                Span::raw("pload "),
                Span::styled("[i]", Style::default().fg(Color::Yellow)),
                Span::raw("ndex "),
                Span::styled("[r]", Style::default().fg(Color::Yellow)),
                Span::raw("efresh"),
            ]))
            .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(help, help_area);
        }
    }
}

/// Render the search query and ranked hits.
fn render_search_panel(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Search;

    let block = Block::default()
        .title(" Search ")
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Query
            Constraint::Length(1), // Separator
            Constraint::Min(1),    // Hits
        ])
        .split(inner);

    render_input_line(frame, app, &app.search_input, layout[0], is_focused);
    let separator = Paragraph::new("─".repeat(layout[1].width as usize))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(separator, layout[1]);

    let Some(results) = &app.search_results else {
        let help = Paragraph::new("Type a query and press Enter")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(help, layout[2]);
        return;
    };

    let mut lines: Vec<Line> = Vec::new();
    for hit in &results.hits {
        lines.push(Line::from(vec![
            Span::styled(format!("{:.3}", hit.score), Style::default().fg(Color::Green)),
            Span::raw(" "),
            Span::styled(hit.filename.as_str(), Style::default().add_modifier(Modifier::BOLD)),
            Span::styled(
                format!(" #{}", hit.chunk_index),
                Style::default().fg(Color::DarkGray),
            ),
        ]));
        lines.push(Line::from(Span::styled(
            hit.text.replace('\n', " "),
            Style::default().fg(Color::Gray),
        )));
        lines.push(Line::from(""));
    }

    let paragraph = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: true });
    frame.render_widget(paragraph, layout[2]);
}

/// Render the chat panel: question, streamed answer and citations.
fn render_chat_panel(frame: &mut Frame, app: &App, area: Rect) {
    let is_focused = app.focus == Focus::Chat;
    let view = app.answer_view();

    let title = match (view.session_id, view.state) {
        (Some(id), SessionState::Open | SessionState::Streaming) => {
            format!(" Answer {} {} ", id.short(), app.spinner_char())
        }
        (Some(id), state) => format!(" Answer {} [{state}] ", id.short()),
        (None, _) => " Answer ".to_string(),
    };

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style(is_focused));
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let inner_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Answer
            Constraint::Length(1), // Separator
            Constraint::Length(1), // Question input
        ])
        .split(inner_area);

    let answer_area_full = inner_layout[0];
    let answer_area = Rect::new(
        answer_area_full.x + CHAT_PADDING,
        answer_area_full.y,
        answer_area_full.width.saturating_sub(CHAT_PADDING * 2 + 1),
        answer_area_full.height,
    );

    let separator = Paragraph::new("─".repeat(inner_layout[1].width as usize))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(separator, inner_layout[1]);
    render_input_line(frame, app, &app.question_input, inner_layout[2], is_focused);

    if view.session_id.is_none() {
        let help = Paragraph::new("Ask a question about your documents and press Enter")
            .style(Style::default().fg(Color::DarkGray))
            .wrap(Wrap { trim: true });
        frame.render_widget(help, answer_area);
        return;
    }

    let content_width = answer_area.width as usize;
    let mut lines: Vec<Line> = vec![
        Line::from(vec![
            Span::styled("Q: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled(view.question.clone(), Style::default().fg(Color::White)),
        ]),
        Line::from(""),
    ];

    if view.answer.is_empty() && view.state == SessionState::Open {
        lines.push(Line::from(vec![
            Span::styled(app.spinner_char(), Style::default().fg(Color::Yellow)),
            Span::styled(" retrieving...", Style::default().fg(Color::DarkGray)),
        ]));
    } else {
        lines.extend(render_answer(&view.answer, content_width));
    }

    match view.state {
        SessionState::Streaming => lines.push(Line::from(Span::styled(
            app.spinner_char(),
            Style::default().fg(Color::Yellow),
        ))),
        SessionState::Cancelled => lines.push(Line::from(Span::styled(
            "(cancelled)",
            Style::default().fg(Color::DarkGray).italic(),
        ))),
        SessionState::Failed => lines.push(Line::from(Span::styled(
            "(answer incomplete)",
            Style::default().fg(Color::Red).italic(),
        ))),
        _ => {}
    }

    if let Some(meta) = &view.meta {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("{} · {} ms", meta.model_label(), meta.latency_ms),
            Style::default().fg(Color::DarkGray),
        )));
        if !meta.citations.is_empty() {
            lines.push(Line::from(Span::styled(
                "Sources",
                Style::default().fg(Color::Magenta).add_modifier(Modifier::BOLD),
            )));
            for (i, citation) in meta.citations.iter().enumerate() {
                lines.push(Line::from(Span::styled(
                    citation_label(i + 1, citation),
                    Style::default().fg(Color::Yellow),
                )));
            }
        }
    }

    let text = Text::from(lines);
    let visible_lines = answer_area.height as usize;
    let total_wrapped_lines = calculate_wrapped_line_count(&text, content_width);
    let max_scroll = total_wrapped_lines.saturating_sub(visible_lines);

    // answer_scroll counts lines up from the bottom.
    let effective_scroll = app.answer_scroll.min(max_scroll);
    let scroll_offset = max_scroll.saturating_sub(effective_scroll);

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .scroll((u16::try_from(scroll_offset).unwrap_or(u16::MAX), 0));
    frame.render_widget(paragraph, answer_area);

    if total_wrapped_lines > visible_lines {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut scrollbar_state = ScrollbarState::new(total_wrapped_lines)
            .position(scroll_offset)
            .viewport_content_length(visible_lines);
        frame.render_stateful_widget(scrollbar, answer_area_full, &mut scrollbar_state);
    }
}

/// Render a one-line input with a prompt and, when focused, the cursor.
fn render_input_line(frame: &mut Frame, app: &App, input: &TextInput, area: Rect, focused: bool) {
    let prompt = if focused { "> " } else { "│ " };
    let line = Line::from(vec![
        Span::styled(
            prompt,
            Style::default().fg(if focused { Color::Cyan } else { Color::DarkGray }),
        ),
        Span::styled(input.value(), Style::default().fg(Color::White)),
    ]);
    frame.render_widget(Paragraph::new(line), area);

    if focused && app.input_mode == InputMode::Normal {
        let x = area.x + prompt.chars().count() as u16 + input.cursor() as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
    }
}

/// Render the status bar.
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let mode_indicator = match app.focus {
        Focus::Documents => {
            Span::styled(" DOCS ", Style::default().fg(Color::Black).bg(Color::Magenta))
        }
        Focus::Search => {
            Span::styled(" SEARCH ", Style::default().fg(Color::Black).bg(Color::Blue))
        }
        Focus::Chat => Span::styled(" ASK ", Style::default().fg(Color::Black).bg(Color::Green)),
    };

    let status = if let Some(ref error) = app.error_message {
        Line::from(vec![
            mode_indicator,
            Span::styled(" ERROR: ", Style::default().fg(Color::Red).bold()),
            Span::styled(error.as_str(), Style::default().fg(Color::Red)),
        ])
    } else if let Some(ref refresh_error) = app.refresh_error {
        Line::from(vec![
            mode_indicator,
            Span::styled(" ⚠ ", Style::default().fg(Color::Yellow).bold()),
            Span::styled(refresh_error.as_str(), Style::default().fg(Color::Yellow)),
        ])
    } else if let Some(ref status) = app.status_message {
        Line::from(vec![
            mode_indicator,
            Span::styled(format!(" {status}"), Style::default().fg(Color::Green)),
        ])
    } else {
        Line::from(vec![
            mode_indicator,
            Span::raw(" "),
            Span::styled("Enter", Style::default().fg(Color::Yellow)),
            Span::raw(":submit "),
            Span::styled("Esc", Style::default().fg(Color::Yellow)),
            Span::raw(":cancel "),
            Span::styled("Tab", Style::default().fg(Color::Yellow)),
            Span::raw(":switch "),
            Span::styled("Ctrl-C", Style::default().fg(Color::Yellow)),
            Span::raw(":quit"),
        ])
    };

    let status_bar = Paragraph::new(status).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

/// Render the upload dialog.
fn render_upload_dialog(frame: &mut Frame, app: &App, area: Rect) {
    let dialog_area = centered_rect(60, 30, area);
    frame.render_widget(Clear, dialog_area);

    let block = Block::default()
        .title(" Upload Document ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(dialog_area);
    frame.render_widget(block, dialog_area);

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Label
            Constraint::Length(3), // Input box
            Constraint::Length(1), // Help text
        ])
        .split(inner);

    let label = Paragraph::new("Path to a file:").style(Style::default().fg(Color::White));
    frame.render_widget(label, layout[0]);

    let input = Paragraph::new(app.upload_input.value())
        .style(Style::default().fg(Color::Yellow))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    frame.render_widget(input, layout[1]);

    let help = Paragraph::new("Press Enter to upload, Esc to cancel")
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, layout[2]);

    frame.set_cursor_position((
        layout[1].x + app.upload_input.cursor() as u16 + 1,
        layout[1].y + 1,
    ));
}

/// Number of visual lines after wrapping.
fn calculate_wrapped_line_count(text: &Text, available_width: usize) -> usize {
    if available_width == 0 {
        return text.lines.len();
    }

    text.lines
        .iter()
        .map(|line| match line.width() {
            0 => 1,
            width => width.div_ceil(available_width),
        })
        .sum()
}

/// Create a centered rectangle.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
