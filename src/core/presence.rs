//! # Presence Tracker
//!
//! Two halves:
//!
//! - [`TypingSet`]: who else is typing in the open thread, fed by
//!   `user_typing` / `user_stopped_typing`. Set semantics, insertion order.
//! - [`OutgoingTyping`]: our own `idle ⇄ typing` state. It decides when to
//!   emit `typing` and `stop_typing` and owns the idle debounce.
//!
//! ```text
//!            non-empty input (emit Start)
//!    Idle ────────────────────────────────► Typing ──┐ input: re-arm timer
//!     ▲                                       │  ◄───┘
//!     └──── timer / send / blur / empty ──────┘ (emit Stop)
//! ```

use std::time::{Duration, Instant};

use crate::core::timer::Debounce;

/// How long after the last keystroke we announce that we stopped typing.
pub const TYPING_IDLE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Usernames currently typing in one thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypingSet {
    users: Vec<String>,
}

impl TypingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the user was already present.
    pub fn insert(&mut self, username: &str) -> bool {
        if self.users.iter().any(|u| u == username) {
            return false;
        }
        self.users.push(username.to_string());
        true
    }

    /// Returns false if the user wasn't present.
    pub fn remove(&mut self, username: &str) -> bool {
        let before = self.users.len();
        self.users.retain(|u| u != username);
        self.users.len() != before
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn indicator(&self) -> String {
        typing_indicator(&self.users)
    }
}

/// Human-readable typing line.
pub fn typing_indicator(users: &[String]) -> String {
    match users {
        [] => String::new(),
        [one] => format!("{one} is typing…"),
        [first, second] => format!("{first} and {second} are typing…"),
        [init @ .., last] if users.len() <= 4 => {
            format!("{}, and {last} are typing…", init.join(", "))
        }
        _ => "Several people are typing…".to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

/// Our own typing state for one compose session.
#[derive(Debug, Clone)]
pub struct OutgoingTyping {
    typing: bool,
    idle: Debounce,
}

impl Default for OutgoingTyping {
    fn default() -> Self {
        Self::new(TYPING_IDLE_TIMEOUT)
    }
}

impl OutgoingTyping {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            typing: false,
            idle: Debounce::new(idle_timeout),
        }
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.idle.deadline()
    }

    /// The composer content changed. Blank content counts as stopping.
    pub fn input_changed(&mut self, content: &str, now: Instant) -> Option<TypingSignal> {
        if content.trim().is_empty() {
            return self.stop();
        }

        self.idle.arm(now);
        if self.typing {
            None
        } else {
            self.typing = true;
            Some(TypingSignal::Start)
        }
    }

    /// Send, blur, or leaving the thread. Emits `Stop` only if we were typing.
    pub fn stop(&mut self) -> Option<TypingSignal> {
        self.idle.cancel();
        if self.typing {
            self.typing = false;
            Some(TypingSignal::Stop)
        } else {
            None
        }
    }

    /// Checks the idle timer.
    pub fn poll(&mut self, now: Instant) -> Option<TypingSignal> {
        if self.idle.fire_if_due(now) {
            self.stop()
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::timer::{Clock, ManualClock};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_indicator_text() {
        assert_eq!(typing_indicator(&[]), "");
        assert_eq!(typing_indicator(&names(&["Ann"])), "Ann is typing…");
        assert_eq!(
            typing_indicator(&names(&["Ann", "Bo"])),
            "Ann and Bo are typing…"
        );
        assert_eq!(
            typing_indicator(&names(&["Ann", "Bo", "Cy"])),
            "Ann, Bo, and Cy are typing…"
        );
        assert_eq!(
            typing_indicator(&names(&["Ann", "Bo", "Cy", "Di"])),
            "Ann, Bo, Cy, and Di are typing…"
        );
        assert_eq!(
            typing_indicator(&names(&["Ann", "Bo", "Cy", "Di", "Ed"])),
            "Several people are typing…"
        );
    }

    #[test]
    fn test_typing_set_is_a_set() {
        let mut set = TypingSet::new();
        assert!(set.insert("ann"));
        assert!(!set.insert("ann"));
        assert!(set.insert("bo"));
        assert_eq!(set.users(), &["ann".to_string(), "bo".to_string()]);

        // One stop clears the user even after repeated starts.
        assert!(set.remove("ann"));
        assert!(!set.remove("ann"));
        assert_eq!(set.indicator(), "bo is typing…");
    }

    #[test]
    fn test_first_keystroke_starts_once() {
        let clock = ManualClock::new();
        let mut typing = OutgoingTyping::default();
        assert_eq!(typing.input_changed("h", clock.now()), Some(TypingSignal::Start));
        assert_eq!(typing.input_changed("he", clock.now()), None);
        assert!(typing.is_typing());
    }

    #[test]
    fn test_whitespace_does_not_start() {
        let clock = ManualClock::new();
        let mut typing = OutgoingTyping::default();
        assert_eq!(typing.input_changed("   ", clock.now()), None);
        assert!(!typing.is_typing());
        assert_eq!(typing.deadline(), None);
    }

    #[test]
    fn test_clearing_input_stops() {
        let clock = ManualClock::new();
        let mut typing = OutgoingTyping::default();
        typing.input_changed("x", clock.now());
        assert_eq!(typing.input_changed("", clock.now()), Some(TypingSignal::Stop));
        assert_eq!(typing.deadline(), None);
    }

    #[test]
    fn test_idle_timeout_stops_after_last_keystroke() {
        let clock = ManualClock::new();
        let mut typing = OutgoingTyping::default();
        typing.input_changed("a", clock.now());

        clock.advance(Duration::from_millis(2000));
        typing.input_changed("ab", clock.now());

        clock.advance(Duration::from_millis(2000));
        assert_eq!(typing.poll(clock.now()), None);

        clock.advance(Duration::from_millis(1000));
        assert_eq!(typing.poll(clock.now()), Some(TypingSignal::Stop));
        assert_eq!(typing.poll(clock.now()), None);
    }

    #[test]
    fn test_stop_when_idle_is_silent() {
        let mut typing = OutgoingTyping::default();
        assert_eq!(typing.stop(), None);
        assert_eq!(typing.stop(), None);
    }

    #[test]
    fn test_stop_then_stop_emits_once() {
        let clock = ManualClock::new();
        let mut typing = OutgoingTyping::default();
        typing.input_changed("hey", clock.now());
        assert_eq!(typing.stop(), Some(TypingSignal::Stop));
        assert_eq!(typing.stop(), None);
        clock.advance(TYPING_IDLE_TIMEOUT * 2);
        assert_eq!(typing.poll(clock.now()), None);
    }
}
