//! # Composer Component
//!
//! Single-line message input. Every edit is reported so the session can
//! drive the typing indicator; lines starting with `/` are commands and
//! are never reported as draft text.
//!
//! | Command        | Effect                          |
//! |----------------|---------------------------------|
//! | `/open <id>`   | Open another thread             |
//! | `/reply <id>`  | Reply to a message by id        |
//! | `/cancel`      | Clear the reply target          |
//! | `/quit`        | Exit                            |

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, BorderType, Paragraph};
use unicode_width::UnicodeWidthChar;

use crate::api::{DirectoryId, MessageId};
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(DirectoryId),
    Reply(MessageId),
    Cancel,
    Quit,
}

/// High-level events emitted by the Composer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposerEvent {
    /// Draft text changed (empty while a command is being typed).
    Changed(String),
    Submit,
    Command(Command),
    Blur,
}

/// Parses a `/command`. Returns `None` for ordinary text.
pub fn parse_command(input: &str) -> Option<Result<Command, String>> {
    let rest = input.trim().strip_prefix('/')?;
    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let arg = parts.next();

    let id = |arg: Option<&str>| -> Result<i64, String> {
        let arg = arg.ok_or_else(|| format!("/{name} needs an id"))?;
        arg.parse().map_err(|_| format!("'{arg}' is not an id"))
    };

    Some(match name {
        "open" => id(arg).map(Command::Open),
        "reply" => id(arg).map(Command::Reply),
        "cancel" => Ok(Command::Cancel),
        "quit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command /{other}")),
    })
}

pub struct Composer {
    buffer: String,
    /// Byte offset into `buffer`.
    cursor: usize,
    /// Message being replied to (Prop)
    pub reply_to: Option<MessageId>,
    /// False while no thread is open; only commands are accepted (Prop)
    pub enabled: bool,
    /// Last command error, cleared on the next edit.
    error: Option<String>,
}

impl Default for Composer {
    fn default() -> Self {
        Self::new()
    }
}

impl Composer {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            reply_to: None,
            enabled: true,
            error: None,
        }
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn is_command(&self) -> bool {
        self.buffer.trim_start().starts_with('/')
    }

    /// Text the session should treat as the draft.
    fn draft(&self) -> String {
        if self.is_command() {
            String::new()
        } else {
            self.buffer.clone()
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    fn edited(&mut self) -> Option<ComposerEvent> {
        self.error = None;
        Some(ComposerEvent::Changed(self.draft()))
    }

    fn prev_boundary(&self) -> usize {
        self.buffer[..self.cursor]
            .char_indices()
            .next_back()
            .map_or(0, |(i, _)| i)
    }

    fn next_boundary(&self) -> usize {
        self.buffer[self.cursor..]
            .chars()
            .next()
            .map_or(self.cursor, |c| self.cursor + c.len_utf8())
    }

    fn submit(&mut self) -> Option<ComposerEvent> {
        if let Some(parsed) = parse_command(&self.buffer) {
            self.clear();
            return match parsed {
                Ok(command) => Some(ComposerEvent::Command(command)),
                Err(e) => {
                    self.error = Some(e);
                    Some(ComposerEvent::Changed(String::new()))
                }
            };
        }
        if !self.enabled || self.buffer.trim().is_empty() {
            return None;
        }
        self.clear();
        Some(ComposerEvent::Submit)
    }

    /// Visible slice of the buffer and the cursor column within it, for an
    /// inner width of `width` columns.
    fn viewport(&self, width: usize) -> (&str, usize) {
        let before = &self.buffer[..self.cursor];
        // Measured per char, the same way the loop below subtracts.
        let mut column: usize = before.chars().map(|c| c.width().unwrap_or(0)).sum();
        let mut start = 0;
        for c in before.chars() {
            if column < width {
                break;
            }
            column = column.saturating_sub(c.width().unwrap_or(0));
            start += c.len_utf8();
        }
        (&self.buffer[start..], column)
    }

    fn title(&self) -> String {
        if let Some(error) = &self.error {
            return error.clone();
        }
        match (self.enabled, self.reply_to) {
            (false, _) => "Commands: /open <id>, /quit".to_string(),
            (true, Some(id)) => format!("Replying to #{id} (/cancel)"),
            (true, None) => "Message".to_string(),
        }
    }
}

impl Component for Composer {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let inner_width = area.width.saturating_sub(2) as usize;
        let (visible, column) = self.viewport(inner_width);

        let border = if self.error.is_some() {
            Style::default().fg(Color::Red)
        } else {
            Style::default()
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .border_style(border)
            .title(self.title());
        let style = if self.enabled {
            Style::default().fg(Color::Green)
        } else {
            Style::default().add_modifier(Modifier::DIM)
        };
        frame.render_widget(Paragraph::new(visible.to_string()).block(block).style(style), area);

        let x = area.x + 1 + column as u16;
        frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

impl EventHandler for Composer {
    type Event = ComposerEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::InputChar(c) => {
                self.buffer.insert(self.cursor, *c);
                self.cursor += c.len_utf8();
                self.edited()
            }
            TuiEvent::Paste(text) => {
                // Single line: pasted newlines become spaces.
                let text = text.replace(['\r', '\n'], " ");
                self.buffer.insert_str(self.cursor, &text);
                self.cursor += text.len();
                self.edited()
            }
            TuiEvent::Backspace if self.cursor > 0 => {
                let prev = self.prev_boundary();
                self.buffer.drain(prev..self.cursor);
                self.cursor = prev;
                self.edited()
            }
            TuiEvent::Delete if self.cursor < self.buffer.len() => {
                let next = self.next_boundary();
                self.buffer.drain(self.cursor..next);
                self.edited()
            }
            TuiEvent::CursorLeft => {
                self.cursor = self.prev_boundary();
                None
            }
            TuiEvent::CursorRight => {
                self.cursor = self.next_boundary();
                None
            }
            TuiEvent::Home => {
                self.cursor = 0;
                None
            }
            TuiEvent::End => {
                self.cursor = self.buffer.len();
                None
            }
            TuiEvent::Submit => self.submit(),
            TuiEvent::Escape => Some(ComposerEvent::Blur),
            _ => None,
        }
    }
}
