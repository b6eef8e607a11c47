//! # Grouping Policy
//!
//! Decides whether a message joins the group anchored by an earlier one.
//! Groups are always compared against their *first* message, so a slow
//! trickle of messages can't stretch a group past the window.

use chrono::TimeDelta;

use crate::api::Message;

/// How far after the anchor a message may be and still join its group.
pub const GROUP_WINDOW: TimeDelta = TimeDelta::milliseconds(60_000);

/// True if `candidate` belongs in the group whose first message is `anchor`.
///
/// All three must hold: same author, within [`GROUP_WINDOW`] of the anchor,
/// and no reply-parent break (a reply only joins a group anchored on a
/// reply to the same parent).
pub fn should_group(anchor: &Message, candidate: &Message) -> bool {
    if anchor.author != candidate.author {
        return false;
    }

    if candidate.created_at - anchor.created_at > GROUP_WINDOW {
        return false;
    }

    match candidate.parent_id {
        Some(parent) => anchor.parent_id == Some(parent),
        None => true,
    }
}
