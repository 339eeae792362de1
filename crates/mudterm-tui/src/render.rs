//! Pure view functions: read state, draw to a frame, never mutate.

use mudterm_core::core::{Category, Transcript};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use unicode_width::UnicodeWidthChar;

use crate::state::AppState;

const INPUT_HEIGHT: u16 = 3;
const STATUS_HEIGHT: u16 = 1;
const PROMPT: &str = "> ";

/// What the renderer needs from the game session.
#[derive(Debug, Clone, Copy)]
pub struct SessionView<'a> {
    pub transcript: &'a Transcript,
    pub player_id: Option<&'a str>,
    pub room_channel: Option<&'a str>,
    pub relay_running: bool,
}

pub fn category_style(category: Category) -> Style {
    let color = match category {
        Category::System => Color::Green,
        Category::Private => Color::Cyan,
        Category::Room => Color::Yellow,
        Category::Error => Color::Red,
    };
    Style::default().fg(color)
}

/// Splits the frame into transcript, input and status areas.
pub fn layout(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(INPUT_HEIGHT),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2]]
}

/// Rows available for transcript text inside its border.
pub fn transcript_height(area: Rect) -> u16 {
    layout(area)[0].height.saturating_sub(2)
}

pub fn render(app: &AppState, session: &SessionView<'_>, frame: &mut Frame) {
    let [transcript_area, input_area, status_area] = layout(frame.area());
    render_transcript(app, session.transcript, frame, transcript_area);
    render_input(app, frame, input_area);
    render_status(app, session, frame, status_area);
}

/// Hard-wraps `text` into rows of at most `width` display columns.
pub fn wrap_line(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut row = String::new();
    let mut row_width = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if row_width + w > width && !row.is_empty() {
            rows.push(std::mem::take(&mut row));
            row_width = 0;
        }
        row.push(c);
        row_width += w;
    }
    rows.push(row);
    rows
}

fn transcript_lines(transcript: &Transcript, width: usize) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for entry in transcript.read_all() {
        let style = category_style(entry.category());
        let stamp = format!("[{}] ", entry.timestamp());
        for (idx, text_line) in entry.text().lines().enumerate() {
            let full = if idx == 0 {
                format!("{stamp}{text_line}")
            } else {
                text_line.to_string()
            };
            for (row_idx, row) in wrap_line(&full, width).into_iter().enumerate() {
                if idx == 0 && row_idx == 0 && row.starts_with(&stamp) {
                    let rest = row[stamp.len()..].to_string();
                    lines.push(Line::from(vec![
                        Span::styled(stamp.clone(), Style::default().fg(Color::DarkGray)),
                        Span::styled(rest, style),
                    ]));
                } else {
                    lines.push(Line::from(Span::styled(row, style)));
                }
            }
        }
    }
    lines
}

fn render_transcript(app: &AppState, transcript: &Transcript, frame: &mut Frame, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" mudterm ");
    let inner = block.inner(area);
    let lines = transcript_lines(transcript, usize::from(inner.width));

    let total = u16::try_from(lines.len()).unwrap_or(u16::MAX);
    let max_scroll = total.saturating_sub(inner.height);
    let top = max_scroll.saturating_sub(app.scroll.min(max_scroll));

    let paragraph = Paragraph::new(lines).block(block).scroll((top, 0));
    frame.render_widget(paragraph, area);
}

fn render_input(app: &AppState, frame: &mut Frame, area: Rect) {
    let block = Block::default().borders(Borders::ALL);
    let inner = block.inner(area);
    let available = usize::from(inner.width).saturating_sub(PROMPT.len()).max(1);

    let chars: Vec<char> = app.input.text().chars().collect();
    let cursor = app.input.cursor().min(chars.len());
    // Drop leading chars until the cursor fits.
    let mut start = 0;
    while start < cursor
        && chars[start..cursor]
            .iter()
            .map(|c| c.width().unwrap_or(0))
            .sum::<usize>()
            >= available
    {
        start += 1;
    }
    let visible: String = chars[start..].iter().collect();
    let cursor_col: usize = chars[start..cursor]
        .iter()
        .map(|c| c.width().unwrap_or(0))
        .sum();

    let line = Line::from(vec![
        Span::styled(PROMPT, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(visible),
    ]);
    frame.render_widget(Paragraph::new(line).block(block), area);

    let x = inner.x + u16::try_from(PROMPT.len() + cursor_col).unwrap_or(inner.width);
    frame.set_cursor_position((x.min(inner.right().saturating_sub(1)), inner.y));
}

/// Status text, e.g. `player:7 | room:Engine_Room | relay: live`.
pub fn status_text(app: &AppState, session: &SessionView<'_>) -> String {
    let player = session
        .player_id
        .map_or_else(|| "not joined".to_string(), |id| format!("player:{id}"));
    let room = session.room_channel.unwrap_or("no room");
    let tail = match &app.notice {
        Some(notice) => notice.clone(),
        None if session.relay_running => "relay: live".to_string(),
        None => "relay: stopped".to_string(),
    };
    let mut text = format!("{player} | {room} | {tail}");
    if app.scroll > 0 {
        text.push_str(&format!(" | scrolled {}", app.scroll));
    }
    text
}

fn render_status(app: &AppState, session: &SessionView<'_>, frame: &mut Frame, area: Rect) {
    let style = if session.relay_running {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Yellow)
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(status_text(app, session), style))),
        area,
    );
}
