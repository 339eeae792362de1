//! UI state.
//!
//! ```text
//! AppState
//! ├── input: InputState   (command line, history)
//! ├── scroll: u16         (lines scrolled up from the bottom)
//! └── notice: Option<..>  (one-line status override)
//! ```
//!
//! The transcript itself lives in the game session; this is only what the
//! terminal adds on top of it.

/// Command line with history navigation.
#[derive(Debug, Default)]
pub struct InputState {
    text: String,
    /// Cursor position in chars.
    cursor: usize,
    history: Vec<String>,
    /// Current position in history (None = not navigating).
    history_index: Option<usize>,
    /// Text typed before history navigation started.
    draft: String,
}

impl InputState {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    fn byte_index(&self) -> usize {
        self.text
            .char_indices()
            .nth(self.cursor)
            .map_or(self.text.len(), |(idx, _)| idx)
    }

    pub fn insert(&mut self, c: char) {
        let idx = self.byte_index();
        self.text.insert(idx, c);
        self.cursor += 1;
        self.history_index = None;
    }

    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let idx = self.byte_index();
        self.text.remove(idx);
    }

    pub fn delete(&mut self) {
        if self.cursor < self.text.chars().count() {
            let idx = self.byte_index();
            self.text.remove(idx);
        }
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.text.chars().count());
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    fn set_text(&mut self, text: String) {
        self.cursor = text.chars().count();
        self.text = text;
    }

    /// Takes the trimmed command and records it in history.
    ///
    /// Returns `None` for blank input, which is left untouched.
    pub fn submit(&mut self) -> Option<String> {
        let command = self.text.trim().to_string();
        if command.is_empty() {
            return None;
        }
        if self.history.last() != Some(&command) {
            self.history.push(command.clone());
        }
        self.text.clear();
        self.cursor = 0;
        self.history_index = None;
        self.draft.clear();
        Some(command)
    }

    pub fn history_up(&mut self) {
        if self.history.is_empty() {
            return;
        }
        let idx = match self.history_index {
            None => {
                self.draft = self.text.clone();
                self.history.len() - 1
            }
            Some(idx) => idx.saturating_sub(1),
        };
        self.history_index = Some(idx);
        if let Some(entry) = self.history.get(idx).cloned() {
            self.set_text(entry);
        }
    }

    pub fn history_down(&mut self) {
        let Some(idx) = self.history_index else {
            return;
        };
        if idx + 1 < self.history.len() {
            self.history_index = Some(idx + 1);
            if let Some(entry) = self.history.get(idx + 1).cloned() {
                self.set_text(entry);
            }
        } else {
            self.history_index = None;
            let draft = std::mem::take(&mut self.draft);
            self.set_text(draft);
        }
    }
}

#[derive(Debug, Default)]
pub struct AppState {
    pub should_quit: bool,
    pub input: InputState,
    /// Lines scrolled up from the newest entry.
    pub scroll: u16,
    /// Shown in the status line instead of the relay state until the next
    /// command.
    pub notice: Option<String>,
    /// Transcript rows visible on the last frame, used as the page size.
    pub viewport_height: u16,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_size(&self) -> u16 {
        self.viewport_height.saturating_sub(1).max(1)
    }
}
