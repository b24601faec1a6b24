//! Colouring for command output.
//!
//! Colour is decided once per process from stdout's capabilities, so piped
//! output (`reqcat list APP > ledger.txt`) stays plain.

use std::sync::OnceLock;

use owo_colors::{OwoColorize, colors::css};

/// How a line of output should read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// A completed change: an item added, a document created.
    Success,
    /// Identifiers and previews.
    Info,
    /// Secondary detail such as uids, catalog ids and links.
    Muted,
}

fn color_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| supports_color::on(supports_color::Stream::Stdout).is_some())
}

/// Renders `text` in `tone`, or leaves it plain when colour is off.
fn paint(text: &str, tone: Tone, enabled: bool) -> String {
    if !enabled {
        return text.to_string();
    }
    match tone {
        Tone::Success => text.fg::<css::Green>().to_string(),
        Tone::Info => text.fg::<css::LightBlue>().to_string(),
        Tone::Muted => text.dimmed().to_string(),
    }
}

/// Extension trait for colouring anything string-like.
pub trait Colorize {
    /// Renders the text in `tone`.
    fn tone(&self, tone: Tone) -> String;

    /// Completed change (green)
    fn success(&self) -> String {
        self.tone(Tone::Success)
    }

    /// Identifier or preview (blue)
    fn info(&self) -> String {
        self.tone(Tone::Info)
    }

    /// Secondary detail (dimmed)
    fn dim(&self) -> String {
        self.tone(Tone::Muted)
    }
}

impl<T: AsRef<str> + ?Sized> Colorize for T {
    fn tone(&self, tone: Tone) -> String {
        paint(self.as_ref(), tone, color_enabled())
    }
}
