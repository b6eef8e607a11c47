//! # ThreadPane Component
//!
//! Renders the open thread as message groups, newest at the bottom.
//!
//! ```text
//! ann  09:14  ↳ #41
//!   #42 sounds good
//!   #43 see you there
//!
//! bo  09:20
//!   #44 on my way
//! ```
//!
//! The pane is pinned to the bottom: when the groups don't fit, the
//! oldest lines scroll off the top.

use chrono::Local;
use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;

use crate::api::Message;
use crate::core::session::{LoadState, ThreadView};
use crate::core::store::ThreadSnapshot;
use crate::tui::component::Component;

pub struct ThreadPane<'a> {
    pub view: &'a ThreadView,
    /// Our username, highlighted differently.
    pub username: &'a str,
}

impl<'a> ThreadPane<'a> {
    pub fn new(view: &'a ThreadView, username: &'a str) -> Self {
        Self { view, username }
    }
}

fn header(first: &Message, own: bool) -> Line<'static> {
    let author_style = if own {
        Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    };
    let time = first.created_at.with_timezone(&Local).format("%H:%M").to_string();

    let mut spans = vec![
        Span::styled(first.author.clone(), author_style),
        Span::styled(format!("  {time}"), Style::default().add_modifier(Modifier::DIM)),
    ];
    if let Some(parent) = first.parent_id {
        spans.push(Span::styled(
            format!("  ↳ #{parent}"),
            Style::default().fg(Color::Magenta),
        ));
    }
    Line::from(spans)
}

fn body(message: &Message) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("  #{} ", message.id),
            Style::default().add_modifier(Modifier::DIM),
        ),
        Span::raw(message.content.clone()),
    ])
}

/// One header per group, one line per message, blank line between groups.
pub fn group_lines(messages: &ThreadSnapshot, username: &str) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for group in messages.groups() {
        let Some(first) = group.first() else {
            continue;
        };
        if !lines.is_empty() {
            lines.push(Line::default());
        }
        lines.push(header(first, first.author == username));
        lines.extend(group.iter().map(|m| body(m)));
    }
    lines
}

fn placeholder(frame: &mut Frame, area: Rect, text: String) {
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::DIM));
    frame.render_widget(paragraph, area);
}

impl Component for ThreadPane<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        if self.view.thread_id.is_none() {
            placeholder(frame, area, "Open a thread with /open <id>".to_string());
            return;
        }

        match &self.view.load {
            LoadState::Loading => placeholder(frame, area, "Loading…".to_string()),
            LoadState::NotFound => placeholder(frame, area, "Thread not found".to_string()),
            LoadState::Failed(e) => placeholder(frame, area, format!("Could not load thread: {e}")),
            LoadState::Ready(messages) if messages.is_empty() => {
                placeholder(frame, area, "No messages yet".to_string());
            }
            LoadState::Ready(messages) => {
                let lines = group_lines(messages, self.username);
                let overflow = lines.len().saturating_sub(area.height as usize);
                let scroll = u16::try_from(overflow).unwrap_or(u16::MAX);
                frame.render_widget(Paragraph::new(lines).scroll((scroll, 0)), area);
            }
        }
    }
}
