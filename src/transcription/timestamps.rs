//! `[hh:mm:ss to hh:mm:ss]` marker parsing, formatting and rebasing.

use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Bracketed range with two `hh:mm:ss`-shaped endpoints. Field ranges are
/// checked after matching so out-of-range markers can be passed through.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(\d{2}:\d{2}:\d{2}) to (\d{2}:\d{2}:\d{2})\]").expect("Invalid marker regex")
});

/// Parse `hh:mm:ss` (exactly two digits per field) into seconds.
///
/// Minutes and seconds must be below 60.
pub fn parse_hms(value: &str) -> Option<u64> {
    let mut fields = value.split(':');
    let hours = parse_field(fields.next()?)?;
    let minutes = parse_field(fields.next()?)?;
    let seconds = parse_field(fields.next()?)?;

    if fields.next().is_some() || minutes >= 60 || seconds >= 60 {
        return None;
    }

    Some(hours * 3600 + minutes * 60 + seconds)
}

fn parse_field(field: &str) -> Option<u64> {
    if field.len() != 2 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Format seconds as zero-padded `hh:mm:ss`. Hours grow past two digits if needed.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Shift every well-formed marker in `text` by `offset_seconds`.
///
/// Endpoints are rounded to the nearest whole second after shifting. Anything
/// that is not a well-formed marker, including markers with out-of-range fields,
/// is copied through unchanged.
pub fn rebase_markers(text: &str, offset_seconds: f64) -> String {
    MARKER_RE
        .replace_all(text, |caps: &Captures| {
            match (parse_hms(&caps[1]), parse_hms(&caps[2])) {
                (Some(start), Some(end)) => format!(
                    "[{} to {}]",
                    format_hms(shift(start, offset_seconds)),
                    format_hms(shift(end, offset_seconds))
                ),
                _ => caps[0].to_string(),
            }
        })
        .into_owned()
}

fn shift(seconds: u64, offset_seconds: f64) -> u64 {
    (seconds as f64 + offset_seconds).round().max(0.0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hms() {
        assert_eq!(parse_hms("00:00:00"), Some(0));
        assert_eq!(parse_hms("00:02:15"), Some(135));
        assert_eq!(parse_hms("01:01:05"), Some(3665));
        assert_eq!(parse_hms("00:60:00"), None);
        assert_eq!(parse_hms("00:00:60"), None);
        assert_eq!(parse_hms("0:00:10"), None);
        assert_eq!(parse_hms("00:00"), None);
        assert_eq!(parse_hms("00:00:10:00"), None);
        assert_eq!(parse_hms("aa:bb:cc"), None);
    }

    #[test]
    fn test_format_hms() {
        assert_eq!(format_hms(0), "00:00:00");
        assert_eq!(format_hms(135), "00:02:15");
        assert_eq!(format_hms(3665), "01:01:05");
        assert_eq!(format_hms(360_000), "100:00:00");
    }

    #[test]
    fn test_rebase_example() {
        assert_eq!(
            rebase_markers("[00:00:10 to 00:00:20] X", 125.0),
            "[00:02:15 to 00:02:25] X"
        );
    }

    #[test]
    fn test_rebase_multiple_lines() {
        let text = "[00:00:00 to 00:00:45] Intro to graphs\n[00:00:45 to 00:02:00] BFS on the whiteboard";
        let rebased = rebase_markers(text, 3600.0);
        assert_eq!(
            rebased,
            "[01:00:00 to 01:00:45] Intro to graphs\n[01:00:45 to 01:02:00] BFS on the whiteboard"
        );
    }

    #[test]
    fn test_rebase_rounds_fractional_offset() {
        assert_eq!(
            rebase_markers("[00:00:01 to 00:00:02] a", 119.6),
            "[00:02:01 to 00:02:02] a"
        );
    }

    #[test]
    fn test_text_without_markers_unchanged() {
        let text = "The lecturer erases the board. (No timestamps here.) [note]";
        assert_eq!(rebase_markers(text, 240.0), text);
    }

    #[test]
    fn test_malformed_markers_unchanged() {
        let cases = [
            "[00:00:10 00:00:20] missing separator",
            "[00:00:10 - 00:00:20] wrong separator",
            "[0:00:10 to 00:00:20] short field",
            "[00:00:75 to 00:01:20] seconds out of range",
            "[00:00:10 to 00:00:20 unterminated",
        ];
        for text in cases {
            assert_eq!(rebase_markers(text, 125.0), text, "changed: {}", text);
        }
    }

    #[test]
    fn test_mixed_well_formed_and_malformed() {
        let text = "[00:00:10 to 00:00:20] ok\n[00:00:20 00:00:30] bad\n[00:00:30 to 00:00:40] ok";
        assert_eq!(
            rebase_markers(text, 60.0),
            "[00:01:10 to 00:01:20] ok\n[00:00:20 00:00:30] bad\n[00:01:30 to 00:01:40] ok"
        );
    }

    #[test]
    fn test_zero_offset_is_identity() {
        let text = "[00:00:10 to 00:00:20] X";
        assert_eq!(rebase_markers(text, 0.0), text);
    }
}
