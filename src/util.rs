/// Keep at most `max_lines` lines, noting how many there were.
pub fn truncate_lines(s: &str, max_lines: usize) -> String {
    let total = s.lines().count();
    if total <= max_lines {
        return s.to_string();
    }
    let head: Vec<&str> = s.lines().take(max_lines).collect();
    format!(
        "{}\n... (Content has been truncated, total num of lines: {total})",
        head.join("\n")
    )
}

/// Keep at most `max_chars` characters, appending a marker if cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}... (Content has been truncated)")
    }
}

/// Line cap first, then character cap.
pub fn cap_excerpt(s: &str, max_lines: usize, max_chars: usize) -> String {
    truncate_chars(&truncate_lines(s, max_lines), max_chars)
}

/// Shorten for a one-line progress message.
pub fn preview(s: &str, max_chars: usize) -> String {
    let single = s.replace('\n', " ");
    if single.chars().count() <= max_chars {
        single
    } else {
        let head: String = single.chars().take(max_chars).collect();
        format!("{head}...")
    }
}
