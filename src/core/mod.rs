//! # Core Application Logic
//!
//! The chat sync core. It knows nothing about any specific UI technology
//! and never touches the network directly: sends go through the
//! [`Transport`](crate::transport::Transport) seam and fetches come back in
//! as actions.
//!
//! ```text
//!                    ┌─────────────────────────────┐
//!                    │            CORE             │
//!                    │  (this module)              │
//!                    │                             │
//!                    │  • ThreadSession (state)    │
//!                    │  • Action (events)          │
//!                    │  • update() (reducer)       │
//!                    └──────────────┬──────────────┘
//!                                   │
//!            ┌──────────────────────┼──────────────────────┐
//!            ▼                      ▼                      ▼
//!     ┌────────────┐         ┌────────────┐         ┌────────────┐
//!     │    TUI     │         │ Transport  │         │    API     │
//!     │  Adapter   │         │ (WsChannel)│         │ (HttpApi)  │
//!     │ (ratatui)  │         │            │         │            │
//!     └────────────┘         └────────────┘         └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`session`]: `ThreadSession`, the controller for the open thread
//! - [`action`]: The `Action` enum and `update()`
//! - [`store`]: Per-thread messages and their grouping
//! - [`grouping`]: The rule deciding whether two messages share a group
//! - [`presence`]: Who is typing, and our own typing state
//! - [`cache`]: State of threads the viewer has left
//! - [`timer`]: Clocks and the idle debounce
//! - [`config`]: `~/.murmur/config.toml` and its override hierarchy
//! - [`storage`]: The last opened thread, persisted between runs

pub mod action;
pub mod cache;
pub mod config;
pub mod grouping;
pub mod presence;
pub mod session;
pub mod storage;
pub mod store;
pub mod timer;
