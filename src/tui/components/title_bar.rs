//! # TitleBar Component
//!
//! Top status line: the open thread, connection state, and the latest
//! notice (server error, new message elsewhere, expired session).
//!
//! Stateless. All data arrives as props:
//!
//! ```rust,ignore
//! let mut title_bar = TitleBar::new(view.title.clone(), view.thread_id, connection, notice);
//! title_bar.render(frame, area);
//! ```

use crate::api::DirectoryId;
use crate::transport::ConnectionState;
use crate::tui::component::Component;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

pub struct TitleBar {
    pub thread_name: Option<String>,
    pub thread_id: Option<DirectoryId>,
    pub connection: ConnectionState,
    pub notice: Option<String>,
}

impl TitleBar {
    pub fn new(
        thread_name: Option<String>,
        thread_id: Option<DirectoryId>,
        connection: ConnectionState,
        notice: Option<String>,
    ) -> Self {
        Self {
            thread_name,
            thread_id,
            connection,
            notice,
        }
    }

    fn thread_label(&self) -> String {
        match (&self.thread_name, self.thread_id) {
            (Some(name), _) => format!("#{name}"),
            (None, Some(id)) => format!("#{id}"),
            (None, None) => "no thread (/open <id>)".to_string(),
        }
    }

    fn connection_style(&self) -> Style {
        match self.connection {
            ConnectionState::Connected => Style::default().fg(Color::Green),
            ConnectionState::Connecting => Style::default().fg(Color::Yellow),
            ConnectionState::Disconnected => Style::default().fg(Color::Red),
        }
    }
}

impl Component for TitleBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![
            Span::raw(format!("Murmur | {} | ", self.thread_label())),
            Span::styled(self.connection.label(), self.connection_style()),
        ];
        if let Some(notice) = &self.notice {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(notice.clone(), Style::default().fg(Color::Cyan)));
        }
        frame.render_widget(Line::from(spans), area);
    }
}
