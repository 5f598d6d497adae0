//! Display helpers shared by listings and the CLI surface.

/// Format a duration in seconds as `45s`, `2m`, or `1m 5s`.
pub fn format_duration(seconds: u32) -> String {
    let minutes = seconds / 60;
    let remaining = seconds % 60;
    if minutes == 0 {
        return format!("{seconds}s");
    }
    if remaining == 0 {
        return format!("{minutes}m");
    }
    format!("{minutes}m {remaining}s")
}

/// Truncate `text` to at most `max_chars` characters, appending an ellipsis
/// when anything was cut. Counts characters, not bytes, so multi-byte input
/// never splits mid-codepoint.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(60), "1m");
        assert_eq!(format_duration(65), "1m 5s");
        assert_eq!(format_duration(240), "4m");
    }

    #[test]
    fn truncation_preserves_short_text() {
        assert_eq!(truncate_text("short", 50), "short");
    }

    #[test]
    fn truncation_cuts_long_text() {
        assert_eq!(truncate_text("abcdefgh", 5), "abcde...");
    }

    #[test]
    fn truncation_is_char_safe() {
        assert_eq!(truncate_text("héllo wörld", 6), "héllo ...");
    }
}
