//! In-memory state of one haiku session

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use log::debug;
use thiserror::Error;
use uuid::Uuid;

use super::generator::HaikuGenerator;
use crate::utils::haiku_types::{HaikuLines, HAIKU_LINES};
use crate::utils::haiku_utils::timestamp_utc;

/// Most recent poems kept in history.
pub const HISTORY_LIMIT: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Please enter a theme first")]
    EmptyTheme,

    #[error("A haiku is already being generated")]
    Busy,

    #[error("There is no haiku to edit")]
    NothingToEdit,

    #[error("No edit in progress")]
    NotEditing,

    #[error("Line {0} does not exist, a haiku has lines 1 to 3")]
    LineOutOfRange(usize),

    #[error("History entry {0} does not exist")]
    HistoryOutOfRange(usize),

    #[error("Generation failed: {0}")]
    Generation(String),
}

/// A poem owned by the session.  Only `lines` ever changes, through an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Haiku {
    pub id: Uuid,
    pub lines: HaikuLines,
    pub theme: String,
    pub timestamp: DateTime<Utc>,
}

impl Haiku {
    pub fn new(lines: HaikuLines, theme: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            lines,
            theme: theme.to_string(),
            timestamp: timestamp_utc(),
        }
    }
}

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Generating,
    Displaying,
    Editing,
}

/// Theme input, current poem, edit buffer and bounded history.
#[derive(Debug, Default)]
pub struct HaikuSession {
    theme: String,
    current: Option<Haiku>,
    history: VecDeque<Haiku>,
    pending_theme: Option<String>,
    editing: Option<Haiku>,
}

impl HaikuSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        if self.pending_theme.is_some() {
            SessionState::Generating
        } else if self.editing.is_some() {
            SessionState::Editing
        } else if self.current.is_some() {
            SessionState::Displaying
        } else {
            SessionState::Idle
        }
    }

    pub fn theme(&self) -> &str {
        &self.theme
    }

    pub fn set_theme(&mut self, theme: impl Into<String>) {
        self.theme = theme.into();
    }

    pub fn current(&self) -> Option<&Haiku> {
        self.current.as_ref()
    }

    /// Newest first
    pub fn history(&self) -> impl Iterator<Item = &Haiku> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn is_generating(&self) -> bool {
        self.pending_theme.is_some()
    }

    #[cfg(test)]
    pub fn edit_buffer(&self) -> Option<&Haiku> {
        self.editing.as_ref()
    }

    // ---------------------------------------------------------------------------
    // Generation
    // ---------------------------------------------------------------------------

    /// Mark the session busy and return the trimmed theme to generate for.
    /// Blank themes and re-entrant calls are rejected without changing state.
    pub fn begin_generation(&mut self) -> Result<String, SessionError> {
        if self.is_generating() {
            return Err(SessionError::Busy);
        }
        let theme = self.theme.trim();
        if theme.is_empty() {
            return Err(SessionError::EmptyTheme);
        }
        let theme = theme.to_string();
        debug!("begin_generation: theme={}", theme);
        self.pending_theme = Some(theme.clone());
        Ok(theme)
    }

    /// Record the generated lines as a new current poem at the head of history.
    pub fn complete_generation(&mut self, lines: HaikuLines) -> Result<&Haiku, SessionError> {
        let theme = self.pending_theme.take().ok_or_else(|| {
            SessionError::Generation("no generation in progress".to_string())
        })?;
        let haiku = Haiku::new(lines, &theme);
        debug!("complete_generation: id={} theme={}", haiku.id, haiku.theme);

        self.history.push_front(haiku.clone());
        self.history.truncate(HISTORY_LIMIT);
        Ok(&*self.current.insert(haiku))
    }

    /// Clear the busy flag after a failed generation.
    pub fn abort_generation(&mut self) {
        self.pending_theme = None;
    }

    /// Run a whole generation through the given generator.
    pub async fn generate(&mut self, generator: &dyn HaikuGenerator) -> Result<&Haiku, SessionError> {
        let theme = self.begin_generation()?;
        match generator.generate(&theme).await {
            Ok(lines) => self.complete_generation(lines),
            Err(e) => {
                self.abort_generation();
                Err(e)
            }
        }
    }

    // ---------------------------------------------------------------------------
    // Editing
    // ---------------------------------------------------------------------------

    /// Open an editable copy of the current poem.
    pub fn start_edit(&mut self) -> Result<&Haiku, SessionError> {
        let current = self.current.clone().ok_or(SessionError::NothingToEdit)?;
        Ok(&*self.editing.insert(current))
    }

    /// Replace one line (1-based) of the edit buffer.
    pub fn edit_line(&mut self, line: usize, text: &str) -> Result<(), SessionError> {
        let buffer = self.editing.as_mut().ok_or(SessionError::NotEditing)?;
        if line == 0 || line > HAIKU_LINES {
            return Err(SessionError::LineOutOfRange(line));
        }
        buffer.lines[line - 1] = text.to_string();
        Ok(())
    }

    /// Commit the edit buffer to the current slot and the history entry with
    /// the same id.
    pub fn save_edit(&mut self) -> Result<&Haiku, SessionError> {
        let edited = self.editing.take().ok_or(SessionError::NotEditing)?;
        if let Some(entry) = self.history.iter_mut().find(|h| h.id == edited.id) {
            entry.lines = edited.lines.clone();
        }
        Ok(&*self.current.insert(edited))
    }

    /// Drop the edit buffer, leaving everything else untouched.
    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    // ---------------------------------------------------------------------------
    // History
    // ---------------------------------------------------------------------------

    /// Make a history entry (0 is newest) current and restore its theme.
    pub fn select_from_history(&mut self, index: usize) -> Result<&Haiku, SessionError> {
        let haiku = self.history.get(index).cloned().ok_or(SessionError::HistoryOutOfRange(index + 1))?;
        self.theme = haiku.theme.clone();
        Ok(&*self.current.insert(haiku))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn lines(tag: &str) -> HaikuLines {
        [format!("{}一", tag), format!("{}二", tag), format!("{}三", tag)]
    }

    fn generate(session: &mut HaikuSession, theme: &str) {
        session.set_theme(theme);
        let t = session.begin_generation().unwrap();
        session.complete_generation(lines(&t)).unwrap();
    }

    struct FailingGenerator;

    #[async_trait]
    impl HaikuGenerator for FailingGenerator {
        async fn generate(&self, _theme: &str) -> Result<HaikuLines, SessionError> {
            Err(SessionError::Generation("offline".to_string()))
        }

        fn describe(&self) -> String {
            "failing".to_string()
        }
    }

    struct EchoGenerator;

    #[async_trait]
    impl HaikuGenerator for EchoGenerator {
        async fn generate(&self, theme: &str) -> Result<HaikuLines, SessionError> {
            Ok(lines(theme))
        }

        fn describe(&self) -> String {
            "echo".to_string()
        }
    }

    #[test]
    fn starts_idle() {
        let session = HaikuSession::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.current().is_none());
        assert_eq!(session.history_len(), 0);
    }

    #[test]
    fn blank_theme_rejected() {
        let mut session = HaikuSession::new();
        assert_eq!(session.begin_generation(), Err(SessionError::EmptyTheme));
        session.set_theme("   \t");
        assert_eq!(session.begin_generation(), Err(SessionError::EmptyTheme));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_generating());
    }

    #[test]
    fn busy_flag_blocks_reentry() {
        let mut session = HaikuSession::new();
        session.set_theme(" 月亮 ");
        assert_eq!(session.begin_generation().unwrap(), "月亮");
        assert_eq!(session.state(), SessionState::Generating);
        assert_eq!(session.begin_generation(), Err(SessionError::Busy));

        let h = session.complete_generation(lines("a")).unwrap().clone();
        assert_eq!(h.theme, "月亮");
        assert_eq!(session.state(), SessionState::Displaying);
        assert_eq!(session.current(), Some(&h));
    }

    #[test]
    fn history_keeps_ten_newest_first() {
        let mut session = HaikuSession::new();
        let themes: Vec<String> = (1..=11).map(|i| format!("主题{}", i)).collect();
        for t in &themes {
            generate(&mut session, t);
        }
        let history: Vec<&str> = session.history().map(|h| h.theme.as_str()).collect();
        let expected: Vec<&str> = themes.iter().rev().take(10).map(String::as_str).collect();
        assert_eq!(history, expected);
        assert_eq!(session.current().unwrap().theme, "主题11");
    }

    #[test]
    fn edit_save_updates_current_and_history() {
        let mut session = HaikuSession::new();
        generate(&mut session, "雨");
        generate(&mut session, "风");
        let id = session.current().unwrap().id;

        session.start_edit().unwrap();
        assert_eq!(session.state(), SessionState::Editing);
        session.edit_line(2, "改过的第二行").unwrap();
        assert_eq!(session.edit_line(4, "x"), Err(SessionError::LineOutOfRange(4)));
        assert_eq!(session.edit_line(0, "x"), Err(SessionError::LineOutOfRange(0)));
        // The current poem is untouched until save.
        assert_eq!(session.current().unwrap().lines[1], "风二");

        let saved = session.save_edit().unwrap().clone();
        assert_eq!(saved.id, id);
        assert_eq!(saved.lines[1], "改过的第二行");
        assert_eq!(session.current(), Some(&saved));
        let entry = session.history().find(|h| h.id == id).unwrap();
        assert_eq!(entry.lines[1], "改过的第二行");
        // Other entries unchanged.
        assert_eq!(session.history().nth(1).unwrap().lines[1], "雨二");
        assert_eq!(session.state(), SessionState::Displaying);
        assert_eq!(session.history_len(), 2);
    }

    #[test]
    fn edit_cancel_changes_nothing() {
        let mut session = HaikuSession::new();
        generate(&mut session, "花");
        let before_current = session.current().cloned();
        let before_history: Vec<Haiku> = session.history().cloned().collect();

        session.start_edit().unwrap();
        session.edit_line(1, "不保存").unwrap();
        session.cancel_edit();

        assert_eq!(session.current().cloned(), before_current);
        assert_eq!(session.history().cloned().collect::<Vec<_>>(), before_history);
        assert!(session.edit_buffer().is_none());
        assert_eq!(session.save_edit(), Err(SessionError::NotEditing));
    }

    #[test]
    fn edit_requires_current() {
        let mut session = HaikuSession::new();
        assert_eq!(session.start_edit(), Err(SessionError::NothingToEdit));
        assert_eq!(session.edit_line(1, "x"), Err(SessionError::NotEditing));
    }

    #[test]
    fn select_restores_theme() {
        let mut session = HaikuSession::new();
        generate(&mut session, "茶");
        generate(&mut session, "雪");
        let picked = session.select_from_history(1).unwrap().clone();
        assert_eq!(picked.theme, "茶");
        assert_eq!(session.theme(), "茶");
        assert_eq!(session.current(), Some(&picked));
        assert_eq!(session.state(), SessionState::Displaying);
        assert_eq!(session.history_len(), 2);
        assert_eq!(session.select_from_history(5), Err(SessionError::HistoryOutOfRange(6)));
    }

    #[tokio::test]
    async fn generate_through_generator() {
        let mut session = HaikuSession::new();
        session.set_theme("山水");
        let h = session.generate(&EchoGenerator).await.unwrap();
        assert_eq!(h.lines[0], "山水一");
        assert!(!session.is_generating());
    }

    #[tokio::test]
    async fn failed_generation_clears_busy() {
        let mut session = HaikuSession::new();
        session.set_theme("山水");
        let err = session.generate(&FailingGenerator).await.unwrap_err();
        assert_eq!(err, SessionError::Generation("offline".to_string()));
        assert!(!session.is_generating());
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.history_len(), 0);
    }
}
