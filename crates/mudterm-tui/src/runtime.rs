//! TUI runtime: owns the terminal and the game session, runs the event loop
//! and executes effects.
//!
//! Terminal input is polled with a timeout that ends on the next refresh
//! tick, so relay messages are drained at the configured cadence even when
//! nobody is typing.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event;
use mudterm_core::bus::Bus;
use mudterm_core::core::{GameSession, interrupt};
use ratatui::layout::Rect;

use crate::render::{self, SessionView};
use crate::state::AppState;
use crate::terminal::{self, GameTerminal};
use crate::update::{self, UiEffect, UiEvent};

const SENDING_NOTICE: &str = "Sending...";

pub struct TuiRuntime<B: Bus> {
    terminal: GameTerminal,
    state: AppState,
    session: GameSession<B>,
    refresh_interval: Duration,
    last_tick: Instant,
}

impl<B: Bus> TuiRuntime<B> {
    /// Takes over the terminal.
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be switched to raw mode.
    pub fn new(session: GameSession<B>, refresh_interval: Duration) -> Result<Self> {
        terminal::install_panic_hook();
        interrupt::set_restore_hook(|| {
            let _ = terminal::restore_terminal();
        });
        interrupt::reset();

        let terminal = terminal::setup_terminal().context("Failed to setup terminal")?;
        let now = Instant::now();
        Ok(Self {
            terminal,
            state: AppState::new(),
            session,
            refresh_interval,
            last_tick: now.checked_sub(refresh_interval).unwrap_or(now),
        })
    }

    /// Joins as `player_id` and shows the result before the loop starts.
    pub async fn join(&mut self, player_id: &str, user_id: &str) -> Result<()> {
        self.state.notice = Some("Joining...".to_string());
        self.draw()?;
        if let Err(err) = self.session.join(player_id, user_id).await {
            tracing::warn!(%err, "join failed");
        }
        self.state.notice = None;
        Ok(())
    }

    /// Runs until the player quits, then leaves the game.
    pub async fn run(&mut self) -> Result<()> {
        let result = self.event_loop().await;
        self.session.leave().await;
        result
    }

    async fn event_loop(&mut self) -> Result<()> {
        while !self.state.should_quit {
            if interrupt::is_interrupted() {
                self.state.should_quit = true;
                break;
            }

            let size = self.terminal.size()?;
            let area = Rect::new(0, 0, size.width, size.height);
            let mut events = vec![UiEvent::Frame {
                transcript_height: render::transcript_height(area),
            }];
            self.collect_events(&mut events)?;

            for event in events {
                for effect in update::update(&mut self.state, event) {
                    self.execute_effect(effect).await?;
                }
            }
            self.draw()?;
        }
        Ok(())
    }

    fn collect_events(&mut self, events: &mut Vec<UiEvent>) -> Result<()> {
        let until_tick = self
            .refresh_interval
            .saturating_sub(self.last_tick.elapsed());
        if event::poll(until_tick)? {
            events.push(UiEvent::Terminal(event::read()?));
            while event::poll(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event::read()?));
            }
        }
        if self.last_tick.elapsed() >= self.refresh_interval {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }
        Ok(())
    }

    async fn execute_effect(&mut self, effect: UiEffect) -> Result<()> {
        match effect {
            UiEffect::PollRelay => {
                self.session.poll_relay();
            }
            UiEffect::SendCommand(command) => {
                self.state.notice = Some(SENDING_NOTICE.to_string());
                self.draw()?;
                self.state.notice = match self.session.send(&command).await {
                    Ok(_) => None,
                    Err(err) => Some(err.to_string()),
                };
                self.session.poll_relay();
            }
            UiEffect::Quit => {}
        }
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let channels = self.session.gateway().channels();
        let view = SessionView {
            transcript: self.session.transcript(),
            player_id: channels.player_id(),
            room_channel: channels.subscription_set().and_then(|set| set.room_channel()),
            relay_running: channels.relay_running(),
        };
        let state = &self.state;
        self.terminal
            .draw(|frame| render::render(state, &view, frame))
            .context("Failed to draw")?;
        Ok(())
    }
}

impl<B: Bus> Drop for TuiRuntime<B> {
    fn drop(&mut self) {
        let _ = terminal::restore_terminal();
    }
}
