use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use std::time::Duration;

/// TUI-specific input events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TuiEvent {
    // Core actions (passed to core::update)
    Quit,
    Submit,

    // Composer editing
    InputChar(char),
    Paste(String),
    Backspace,
    Delete,
    CursorLeft,
    CursorRight,
    Home,
    End,
    /// Esc: composer loses focus, notice is dismissed.
    Escape,
    Resize,
}

/// Poll for an event without blocking (returns immediately)
pub fn poll_event_immediate() -> Option<TuiEvent> {
    poll_event_timeout(Duration::ZERO)
}

/// Poll for an event, blocking up to `timeout`.
pub fn poll_event_timeout(timeout: Duration) -> Option<TuiEvent> {
    if !matches!(event::poll(timeout), Ok(true)) {
        return None;
    }
    match event::read().ok()? {
        Event::Key(key_event) if key_event.kind != KeyEventKind::Release => {
            log::debug!("Key event: {:?} with modifiers {:?}", key_event.code, key_event.modifiers);
            map_key(key_event.modifiers, key_event.code)
        }
        Event::Paste(data) => Some(TuiEvent::Paste(data)),
        Event::Resize(_, _) => Some(TuiEvent::Resize),
        _ => None,
    }
}

fn map_key(modifiers: KeyModifiers, code: KeyCode) -> Option<TuiEvent> {
    match (modifiers, code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) => Some(TuiEvent::Quit),
        (_, KeyCode::Char(c)) => Some(TuiEvent::InputChar(c)),
        (_, KeyCode::Backspace) => Some(TuiEvent::Backspace),
        (_, KeyCode::Delete) => Some(TuiEvent::Delete),
        (_, KeyCode::Left) => Some(TuiEvent::CursorLeft),
        (_, KeyCode::Right) => Some(TuiEvent::CursorRight),
        (_, KeyCode::Home) => Some(TuiEvent::Home),
        (_, KeyCode::End) => Some(TuiEvent::End),
        (_, KeyCode::Enter) => Some(TuiEvent::Submit),
        (_, KeyCode::Esc) => Some(TuiEvent::Escape),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctrl_c_quits() {
        assert_eq!(map_key(KeyModifiers::CONTROL, KeyCode::Char('c')), Some(TuiEvent::Quit));
        assert_eq!(map_key(KeyModifiers::NONE, KeyCode::Char('c')), Some(TuiEvent::InputChar('c')));
        assert_eq!(map_key(KeyModifiers::SHIFT, KeyCode::Char('C')), Some(TuiEvent::InputChar('C')));
    }

    #[test]
    fn test_editing_keys() {
        assert_eq!(map_key(KeyModifiers::NONE, KeyCode::Enter), Some(TuiEvent::Submit));
        assert_eq!(map_key(KeyModifiers::NONE, KeyCode::Esc), Some(TuiEvent::Escape));
        assert_eq!(map_key(KeyModifiers::NONE, KeyCode::Backspace), Some(TuiEvent::Backspace));
        assert_eq!(map_key(KeyModifiers::NONE, KeyCode::F(1)), None);
    }
}
