//! # TUI Components
//!
//! ### Stateless Components (Props-Based Rendering)
//!
//! - `TitleBar`: thread name, connection state, latest notice
//! - `ThreadPane`: message groups of the open thread
//!
//! ### Stateful Components (Event-Driven)
//!
//! - `Composer`: single-line input and `/commands`
//!
//! Components receive external data as props, never by reaching into the
//! session. Each file holds the component's types, rendering, event
//! handling and tests.

mod composer;
mod thread_pane;
mod title_bar;

pub use composer::{Command, Composer, ComposerEvent};
pub use thread_pane::ThreadPane;
pub use title_bar::TitleBar;
