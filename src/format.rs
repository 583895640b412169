//! Text helpers for the dashboard and table output.

/// Cells in a [`progress_bar`].
pub const BAR_WIDTH: usize = 50;

/// Formats seconds as `HH:MM:SS`. Hours are not wrapped at 24.
///
/// Negative input yields an empty string.
pub fn elapsed_time(seconds: i64) -> String {
    if seconds < 0 {
        return String::new();
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Renders a fraction in `[0, 1]` as `0%|||||     | 42.0/100%`.
pub fn progress_bar(fraction: f32) -> String {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (fraction * BAR_WIDTH as f32).round() as usize;

    let bar: String = (0..BAR_WIDTH)
        .map(|i| if i < filled { '|' } else { ' ' })
        .collect();
    format!("0%{bar} {:>5.1}/100%", fraction * 100.0)
}

/// Truncates `s` to at most `width` characters.
pub fn truncate(s: &str, width: usize) -> &str {
    match s.char_indices().nth(width) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_time() {
        assert_eq!(elapsed_time(0), "00:00:00");
        assert_eq!(elapsed_time(59), "00:00:59");
        assert_eq!(elapsed_time(3661), "01:01:01");
        assert_eq!(elapsed_time(100 * 3600 + 5), "100:00:05");
        assert_eq!(elapsed_time(-1), "");
    }

    #[test]
    fn test_progress_bar() {
        let empty = progress_bar(0.0);
        assert!(empty.starts_with("0%"));
        assert!(!empty.contains('|'));
        assert!(empty.ends_with("  0.0/100%"));

        let half = progress_bar(0.5);
        assert_eq!(half.matches('|').count(), BAR_WIDTH / 2);
        assert!(half.ends_with(" 50.0/100%"));

        let full = progress_bar(1.0);
        assert_eq!(full.matches('|').count(), BAR_WIDTH);
        assert!(full.ends_with("100.0/100%"));
    }

    #[test]
    fn test_progress_bar_clamps() {
        assert_eq!(progress_bar(2.0), progress_bar(1.0));
        assert_eq!(progress_bar(-0.5), progress_bar(0.0));
        assert_eq!(progress_bar(f32::NAN), progress_bar(0.0));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("alice", 8), "alice");
        assert_eq!(truncate("systemd-network", 8), "systemd-");
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 0), "");
    }
}
