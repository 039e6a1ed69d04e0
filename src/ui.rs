use std::time::Instant;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Paragraph, Wrap},
};
use crate::app::{App, CopyIndicator};
use crate::state::{AnalysisMode, Message, Role, Sentiment};

const MAX_INPUT_LINES: u16 = 5;

fn sentiment_style(sentiment: &Sentiment) -> Style {
    let base = Style::default().add_modifier(Modifier::BOLD);
    match sentiment {
        Sentiment::Positive => base.bg(Color::Green).fg(Color::Black),
        Sentiment::Negative => base.bg(Color::Red).fg(Color::White),
        Sentiment::Neutral | Sentiment::Other(_) => base.bg(Color::Gray).fg(Color::Black),
    }
}

fn role_header(message: &Message) -> Line<'static> {
    let (label, color) = match message.role() {
        Role::User => ("You:", Color::Cyan),
        Role::Assistant => ("AI:", Color::Yellow),
        Role::System => ("Info:", Color::Blue),
    };
    Line::from(vec![
        Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(
            format!(" {}", message.timestamp().format("%H:%M")),
            Style::default().fg(Color::DarkGray),
        ),
    ])
}

fn push_message(lines: &mut Vec<Line<'static>>, message: &Message, copied: &CopyIndicator, now: Instant) {
    lines.push(role_header(message));

    let content_style = match message.role() {
        Role::System => Style::default().fg(Color::Blue),
        _ => Style::default(),
    };
    for line in message.content().lines() {
        lines.push(Line::from(Span::styled(line.to_string(), content_style)));
    }

    if let Some(sentiment) = message.sentiment() {
        lines.push(Line::from(Span::styled(
            format!(" {} ", sentiment),
            sentiment_style(sentiment),
        )));
    } else if message.is_copyable() {
        let affordance = if copied.is_active(message.id(), now) {
            Span::styled("✓ Copied", Style::default().fg(Color::Green))
        } else {
            Span::styled("[Ctrl+Y copy]", Style::default().fg(Color::DarkGray))
        };
        lines.push(Line::from(affordance));
    }

    lines.push(Line::default());
}

/// Project the conversation onto transcript lines.
///
/// `pending` is the staged user message of a request in flight; it is drawn
/// after the stored messages, followed by an animated progress line.
pub fn transcript_lines(
    messages: &[Message],
    pending: Option<&Message>,
    animation_frame: u8,
    copied: &CopyIndicator,
    now: Instant,
) -> Vec<Line<'static>> {
    let mut lines: Vec<Line<'static>> = Vec::new();

    if messages.is_empty() && pending.is_none() {
        lines.push(Line::default());
        lines.push(Line::from("AI Sentiment Analyzer".bold()).alignment(Alignment::Center));
        lines.push(
            Line::from(Span::styled(
                "Analyze Vietnamese text or upload a CSV file to get started",
                Style::default().fg(Color::DarkGray),
            ))
            .alignment(Alignment::Center),
        );
        return lines;
    }

    for message in messages {
        push_message(&mut lines, message, copied, now);
    }

    if let Some(message) = pending {
        push_message(&mut lines, message, copied, now);
        lines.push(Line::from(Span::styled(
            "AI:",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Analyzing{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    lines
}

/// Number of terminal rows a wrapped paragraph takes at `width`, as ratatui
/// lays it out. The paragraph must not carry a block.
pub fn wrapped_height(paragraph: &Paragraph, width: u16) -> u16 {
    paragraph.line_count(width).min(u16::MAX as usize) as u16
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let input_height = input_height(app);

    let [header_area, body_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(input_height),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_transcript(app, frame, body_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

fn input_height(app: &App) -> u16 {
    let lines = match app.controller.mode() {
        AnalysisMode::Text => app.controller.input().split('\n').count() as u16,
        AnalysisMode::Csv => 1,
    };
    lines.clamp(1, MAX_INPUT_LINES) + 2
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" AI Sentiment Analyzer ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} ", app.controller.mode().label()),
            Style::default().bg(Color::Indexed(61)).fg(Color::White),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ];

    if let Some(path) = app.controller.last_download() {
        spans.push(Span::styled(
            format!("  last download: {}", path.display()),
            Style::default().fg(Color::Gray),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_transcript(app: &mut App, frame: &mut Frame, area: Rect) {
    // Store inner dimensions for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let lines = transcript_lines(
        app.controller.messages(),
        app.controller.pending_message(),
        app.animation_frame,
        &app.copied,
        Instant::now(),
    );

    let transcript = Paragraph::new(Text::from(lines)).wrap(Wrap { trim: false });

    app.transcript_rows = wrapped_height(&transcript, app.chat_width);
    let max_scroll = app.transcript_rows.saturating_sub(app.chat_height);
    if app.follow_transcript {
        app.transcript_scroll = max_scroll;
    } else {
        app.transcript_scroll = app.transcript_scroll.min(max_scroll);
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Conversation ");

    let transcript = transcript.block(block).scroll((app.transcript_scroll, 0));

    frame.render_widget(transcript, area);
}

/// Screen row and column of a char-indexed cursor in multi-line text.
/// The column is a display width, so wide glyphs and combining marks count
/// as they are drawn.
fn cursor_row_col(text: &str, cursor: usize) -> (u16, u16) {
    let before: String = text.chars().take(cursor).collect();
    let row = before.matches('\n').count();
    let col = before
        .rsplit('\n')
        .next()
        .map(|l| Span::raw(l).width())
        .unwrap_or(0);
    (row as u16, col as u16)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let controller = &app.controller;
    let busy = controller.is_busy();

    let (title, text, cursor, placeholder) = match controller.mode() {
        AnalysisMode::Text => (
            " Text Analysis: Enter to analyze, Shift+Enter for new line ",
            controller.input(),
            controller.cursor(),
            "Enter Vietnamese text to analyze sentiment...",
        ),
        AnalysisMode::Csv => (
            " CSV Analysis: Enter to upload ",
            controller.file_path(),
            controller.file_cursor(),
            "Path to a CSV file with a \"comment\" column",
        ),
    };

    let border_color = if busy { Color::DarkGray } else { Color::Yellow };
    let title = if busy {
        format!("{}(analyzing...) ", title)
    } else {
        title.to_string()
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2);
    let inner_height = area.height.saturating_sub(2);
    let (row, col) = cursor_row_col(text, cursor);

    // Keep the cursor visible in both directions
    let row_offset = (row + 1).saturating_sub(inner_height);
    let col_offset = (col + 1).saturating_sub(inner_width);

    let paragraph = if text.is_empty() {
        Paragraph::new(Span::styled(placeholder, Style::default().fg(Color::DarkGray)))
    } else {
        let lines: Vec<Line> = text.split('\n').map(Line::from).collect();
        let style = if busy {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Cyan)
        };
        Paragraph::new(lines).style(style).scroll((row_offset, col_offset))
    };

    frame.render_widget(paragraph.block(block), area);

    if !busy && inner_width > 0 && inner_height > 0 {
        frame.set_cursor_position((
            area.x + 1 + col - col_offset,
            area.y + 1 + row - row_offset,
        ));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = match app.controller.mode() {
        AnalysisMode::Text => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" analyze ", label_style),
            Span::styled(" Shift+Enter ", key_style),
            Span::styled(" newline ", label_style),
        ],
        AnalysisMode::Csv => vec![
            Span::styled(" Enter ", key_style),
            Span::styled(" upload ", label_style),
        ],
    };

    hints.extend(vec![
        Span::styled(" Tab ", key_style),
        Span::styled(" mode ", label_style),
        Span::styled(" ^N ", key_style),
        Span::styled(" new chat ", label_style),
        Span::styled(" ^Y ", key_style),
        Span::styled(" copy ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
        Span::styled(" Esc ", key_style),
        Span::styled(" quit ", label_style),
    ]);

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}
