use std::fmt::Write as _;

use client_core::{Delivery, FeedEntry};
use shared::domain::UserVote;

pub fn render_feed(view: &[FeedEntry]) -> String {
    if view.is_empty() {
        return "(no messages yet)\n".to_string();
    }
    let mut out = String::new();
    for (i, entry) in view.iter().enumerate() {
        let _ = writeln!(out, "{:>3}. {}", i + 1, render_entry(entry));
    }
    out
}

fn render_entry(entry: &FeedEntry) -> String {
    let message = &entry.message;
    let (up, down) = match message.user_vote {
        UserVote::Upvote => ("[+]", " - "),
        UserVote::Downvote => (" + ", "[-]"),
        UserVote::None => (" + ", " - "),
    };
    let mut line = format!(
        "{up}{:<3} {down}{:<3} {}: {}",
        message.upvotes, message.downvotes, message.author, message.content
    );
    if entry.pending_vote {
        line.push_str("  (vote pending)");
    }
    if entry.delivery == Delivery::Sending {
        line.push_str("  (sending)");
    }
    line
}
