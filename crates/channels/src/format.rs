//! Text shaping between the chat platform and the agent.

use chrono::{DateTime, Local, TimeZone};

/// Prefix placed before the reasoning trace.
pub const LOG_HEADER: &str = "**Logs:**\n";

/// Stamp a user message with the current time and a location tag.
///
/// `[2024/06/01 12:34@Kyoto] Hello bot!`
pub fn prepare<Tz>(content: &str, now: &DateTime<Tz>, location: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("[{}@{}] {}", now.format("%Y/%m/%d %H:%M"), location, content)
}

/// [`prepare`] using the host's local clock.
pub fn prepare_now(content: &str, location: &str) -> String {
    prepare(content, &Local::now(), location)
}

/// Split text into pieces of at most `limit` characters.
///
/// Pieces are contiguous; joining them gives back `text`.
pub fn chunk(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        if count == limit {
            pieces.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// The trace message body, or `None` when there is nothing to show.
pub fn format_log(log: &str) -> Option<String> {
    if log.is_empty() {
        None
    } else {
        Some(format!("{LOG_HEADER}{log}"))
    }
}
