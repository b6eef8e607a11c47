use ratatui::Frame;
use ratatui::layout::{Constraint, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::Span;

use crate::core::presence::typing_indicator;
use crate::core::session::ThreadView;
use crate::transport::ConnectionState;
use crate::tui::TuiState;
use crate::tui::component::Component;
use crate::tui::components::{ThreadPane, TitleBar};

/// Height of the bordered single-line composer.
const COMPOSER_HEIGHT: u16 = 3;

pub fn draw_ui(
    frame: &mut Frame,
    view: &ThreadView,
    connection: ConnectionState,
    tui: &mut TuiState,
) {
    use Constraint::{Length, Min};
    let layout = Layout::vertical([Length(1), Min(0), Length(1), Length(COMPOSER_HEIGHT)]);
    let [title_area, thread_area, typing_area, composer_area] = layout.areas(frame.area());

    let mut title_bar = TitleBar::new(
        view.title.clone(),
        view.thread_id,
        connection,
        view.notice.as_ref().map(ToString::to_string),
    );
    title_bar.render(frame, title_area);

    ThreadPane::new(view, &tui.username).render(frame, thread_area);

    let typing = Span::styled(
        typing_indicator(&view.typing),
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    );
    frame.render_widget(typing, typing_area);

    tui.composer.render(frame, composer_area);
}
