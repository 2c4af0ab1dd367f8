#![forbid(unsafe_code)]

use poem_openapi::{Enum, Object};
use serde::{Deserialize, Serialize};

use crate::utils::fallback::DEFAULT_THEME;

// Every poem is exactly three lines.
pub const HAIKU_LINES: usize = 3;

/// The three lines of a poem.
pub type HaikuLines = [String; HAIKU_LINES];

// The poem returned when the handler itself fails.
pub const ERROR_FALLBACK_LINES: [&str; HAIKU_LINES] = ["静夜思绪飞", "月光洒满窗台上", "诗意自心来"];

// ---------------------------------------------------------------------------
// HaikuSource:
// ---------------------------------------------------------------------------
/// Provenance of a generated poem.
#[derive(Enum, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[oai(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HaikuSource {
    Ai,
    Fallback,
    ErrorFallback,
}

impl HaikuSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HaikuSource::Ai => "ai",
            HaikuSource::Fallback => "fallback",
            HaikuSource::ErrorFallback => "error_fallback",
        }
    }
}

// ---------------------------------------------------------------------------
// GeneratedHaiku:
// ---------------------------------------------------------------------------
/// The result of one generation request, also the 200 response body.
#[derive(Object, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GeneratedHaiku {
    pub lines: Vec<String>,
    pub theme: String,
    pub source: HaikuSource,
}

impl GeneratedHaiku {
    pub fn new(lines: HaikuLines, theme: &str, source: HaikuSource) -> Self {
        Self {lines: lines.to_vec(), theme: theme.to_string(), source}
    }

    /// The hard-coded last resort poem.
    pub fn error_fallback() -> Self {
        Self::new(ERROR_FALLBACK_LINES.map(String::from), DEFAULT_THEME, HaikuSource::ErrorFallback)
    }

    /// Convert the wire representation back into exactly three lines.
    pub fn to_lines(&self) -> Option<HaikuLines> {
        let lines: [String; HAIKU_LINES] = self.lines.clone().try_into().ok()?;
        if lines.iter().any(|l| l.trim().is_empty()) {
            return None;
        }
        Some(lines)
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_tags_are_snake_case() {
        let s = serde_json::to_string(&HaikuSource::ErrorFallback).unwrap();
        assert_eq!(s, "\"error_fallback\"");
        assert_eq!(HaikuSource::Ai.as_str(), "ai");
        let parsed: HaikuSource = serde_json::from_str("\"fallback\"").unwrap();
        assert_eq!(parsed, HaikuSource::Fallback);
    }

    #[test]
    fn error_fallback_uses_default_theme() {
        let h = GeneratedHaiku::error_fallback();
        assert_eq!(h.theme, "默认");
        assert_eq!(h.source, HaikuSource::ErrorFallback);
        assert_eq!(h.lines, vec!["静夜思绪飞", "月光洒满窗台上", "诗意自心来"]);
    }

    #[test]
    fn to_lines_rejects_wrong_shape() {
        let mut h = GeneratedHaiku::error_fallback();
        assert!(h.to_lines().is_some());
        h.lines.pop();
        assert!(h.to_lines().is_none());
        h.lines.push("  ".to_string());
        assert!(h.to_lines().is_none());
    }
}
