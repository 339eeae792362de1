//! Reducer: the only place UI state changes.
//!
//! The runtime feeds events in and executes the returned effects; sending a
//! command and draining the relay are effects because they touch the session.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::state::AppState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Refresh interval elapsed.
    Tick,
    /// Transcript rows available on this frame.
    Frame { transcript_height: u16 },
    Terminal(Event),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEffect {
    SendCommand(String),
    PollRelay,
    Quit,
}

pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Tick => vec![UiEffect::PollRelay],
        UiEvent::Frame { transcript_height } => {
            app.viewport_height = transcript_height;
            vec![]
        }
        UiEvent::Terminal(Event::Key(key)) if key.kind != KeyEventKind::Release => {
            handle_key(app, key)
        }
        UiEvent::Terminal(Event::Paste(text)) => {
            for c in text.chars().filter(|c| !c.is_control()) {
                app.input.insert(c);
            }
            vec![]
        }
        UiEvent::Terminal(_) => vec![],
    }
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => quit(app),
        KeyCode::Char('c' | 'd') if ctrl => quit(app),
        KeyCode::Char('u') if ctrl => {
            app.input.move_home();
            while !app.input.text().is_empty() {
                app.input.delete();
            }
            vec![]
        }
        KeyCode::Char(c) if !ctrl => {
            app.input.insert(c);
            vec![]
        }
        KeyCode::Enter => match app.input.submit() {
            Some(command) => {
                app.scroll = 0;
                app.notice = None;
                vec![UiEffect::SendCommand(command)]
            }
            None => vec![],
        },
        KeyCode::Backspace => {
            app.input.backspace();
            vec![]
        }
        KeyCode::Delete => {
            app.input.delete();
            vec![]
        }
        KeyCode::Left => {
            app.input.move_left();
            vec![]
        }
        KeyCode::Right => {
            app.input.move_right();
            vec![]
        }
        KeyCode::Home => {
            app.input.move_home();
            vec![]
        }
        KeyCode::End => {
            app.input.move_end();
            vec![]
        }
        KeyCode::Up => {
            app.input.history_up();
            vec![]
        }
        KeyCode::Down => {
            app.input.history_down();
            vec![]
        }
        KeyCode::PageUp => {
            app.scroll = app.scroll.saturating_add(app.page_size());
            vec![]
        }
        KeyCode::PageDown => {
            app.scroll = app.scroll.saturating_sub(app.page_size());
            vec![]
        }
        _ => vec![],
    }
}

fn quit(app: &mut AppState) -> Vec<UiEffect> {
    app.should_quit = true;
    vec![UiEffect::Quit]
}
