//! # Helpdoc
//!
//! Renders man-page style help (NAME, SYNOPSIS, flag tables, free-form
//! sections) from a minijinja template and a serializable page. Output is
//! styled when the terminal can show it and plain otherwise.
//!
//! A page template sees three filters:
//!
//! - `style(name)` paints the value with the theme entry `name`. A name the
//!   theme does not know is rendered with a `(!?)` marker so template typos
//!   show up in the output instead of silently losing the style.
//! - `wrap(width, indent)` word-wraps to `width` display columns and prefixes
//!   every line with `indent` spaces. Blank lines survive.
//! - `pad(width)` right-pads to `width` display columns.
//!
//! ```rust
//! use console::Style;
//! use helpdoc::{render_with_color, Theme};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct Block {
//!     title: String,
//!     body: String,
//! }
//!
//! let theme = Theme::new().add("heading", Style::new().bold());
//! let block = Block {
//!     title: "DESCRIPTION".into(),
//!     body: "Lists every command registered under the group.".into(),
//! };
//! let out = render_with_color(
//!     "{{ title | style(\"heading\") }}\n{{ body | wrap(20, 4) }}",
//!     &block,
//!     &theme,
//!     false,
//! )
//! .unwrap();
//! assert!(out.starts_with("DESCRIPTION\n    Lists every"));
//! ```

use console::{Style, Term};
use minijinja::{Environment, Error, Value};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use unicode_width::UnicodeWidthStr;

/// Marker put in front of text whose style name is not in the theme.
pub const UNKNOWN_STYLE_MARKER: &str = "(!?)";

/// Named styles for the `style` filter.
#[derive(Clone)]
pub struct Theme {
    entries: HashMap<String, Style>,
    unknown_marker: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            unknown_marker: UNKNOWN_STYLE_MARKER.to_string(),
        }
    }
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(mut self, name: &str, style: Style) -> Self {
        self.entries.insert(name.to_string(), style);
        self
    }

    /// Replaces the unknown-style marker; an empty marker passes text through.
    pub fn unknown_marker(mut self, marker: &str) -> Self {
        self.unknown_marker = marker.to_string();
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Applies the style called `name`. With `color` off only the unknown
    /// marker can change the text.
    pub fn paint(&self, name: &str, text: &str, color: bool) -> String {
        match self.entries.get(name) {
            Some(style) if color => style.apply_to(text).to_string(),
            Some(_) => text.to_string(),
            None if self.unknown_marker.is_empty() => text.to_string(),
            None => format!("{} {text}", self.unknown_marker),
        }
    }
}

pub fn stdout_supports_color() -> bool {
    Term::stdout().features().colors_supported()
}

/// Renders `template` with color when stdout supports it.
pub fn render<T: Serialize>(template: &str, data: &T, theme: &Theme) -> Result<String, Error> {
    render_with_color(template, data, theme, stdout_supports_color())
}

pub fn render_with_color<T: Serialize>(
    template: &str,
    data: &T,
    theme: &Theme,
    color: bool,
) -> Result<String, Error> {
    let mut env = Environment::new();
    let theme = Arc::new(theme.clone());
    env.add_filter("style", move |value: Value, name: String| {
        theme.paint(&name, &value.to_string(), color)
    });
    env.add_filter("wrap", |value: Value, width: usize, indent: Option<usize>| {
        wrap_text(&value.to_string(), width, indent.unwrap_or(0))
    });
    env.add_filter("pad", |value: Value, width: usize| {
        pad_to_width(&value.to_string(), width)
    });
    env.render_str(template, data)
}

/// Greedy word wrap. `width` counts display columns including the indent.
/// A word longer than the line is kept whole.
pub fn wrap_text(text: &str, width: usize, indent: usize) -> String {
    let prefix = " ".repeat(indent);
    let room = width.saturating_sub(indent).max(1);
    let mut out: Vec<String> = Vec::new();

    for line in text.lines() {
        let mut words = line.split_whitespace().peekable();
        if words.peek().is_none() {
            out.push(String::new());
            continue;
        }
        let mut row = prefix.clone();
        let mut used = 0;
        for word in words {
            let w = word.width();
            if used > 0 && used + 1 + w > room {
                out.push(std::mem::replace(&mut row, prefix.clone()));
                used = 0;
            }
            if used > 0 {
                row.push(' ');
                used += 1;
            }
            row.push_str(word);
            used += w;
        }
        out.push(row);
    }

    out.join("\n")
}

pub fn pad_to_width(text: &str, width: usize) -> String {
    let missing = width.saturating_sub(text.width());
    format!("{text}{}", " ".repeat(missing))
}

/// Nearest xterm-256 palette index for an RGB color, using the gray ramp
/// for neutral colors.
pub fn rgb_to_ansi256(rgb: (u8, u8, u8)) -> u8 {
    let (r, g, b) = (rgb.0 as u16, rgb.1 as u16, rgb.2 as u16);
    if r == g && g == b {
        return match r {
            0..=7 => 16,
            249..=255 => 231,
            gray => 232 + ((gray - 8) * 24 / 247) as u8,
        };
    }
    let cube = |c: u16| (c * 5 / 255) as u8;
    16 + 36 * cube(r) + 6 * cube(g) + cube(b)
}
