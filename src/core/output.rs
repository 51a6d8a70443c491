//! Compact output rendering helpers for CLI surfaces and violation messages.
//!
//! Keeps rendered lists bounded and readable while preserving signal.

/// Whitespace runs collapsed to single spaces, cut at `max_chars` with `...`.
pub fn compact_line(input: &str, max_chars: usize) -> String {
    let words: Vec<&str> = input.split_whitespace().collect();
    let collapsed = words.join(" ");
    match collapsed.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &collapsed[..cut]),
        None => collapsed,
    }
}

/// Join the first `max_items` rendered entries with `sep`, then note how many
/// were left out.
fn join_bounded<F>(items: &[String], max_items: usize, sep: &str, render: F) -> String
where
    F: Fn(&str) -> String,
{
    let mut out = items
        .iter()
        .take(max_items)
        .map(|item| render(item))
        .collect::<Vec<_>>()
        .join(sep);
    let hidden = items.len().saturating_sub(max_items);
    if hidden > 0 {
        out.push_str(&format!(" (+{} more)", hidden));
    }
    out
}

/// Failure messages for a one-line terminal summary.
pub fn preview_messages(messages: &[String], max_items: usize, max_chars: usize) -> String {
    join_bounded(messages, max_items, " | ", |m| compact_line(m, max_chars))
}

/// Paths or ids inside a violation message.
pub fn bounded_list(items: &[String], max_items: usize) -> String {
    join_bounded(items, max_items, ", ", str::to_string)
}
