//! Duration parsing utilities.

use anyhow::Context;

/// Parse a timeout string like "1500", "1500ms", "2s" or "1m" into milliseconds.
/// Supports:
/// - Plain numbers (interpreted as milliseconds): "1500"
/// - Milliseconds suffix: "1500ms"
/// - Seconds suffix: "2s"
/// - Minutes suffix: "1m"
pub fn parse_duration_to_millis(s: &str) -> anyhow::Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        anyhow::bail!("Empty duration string");
    }

    // "ms" has to be checked before "m" and "s"
    if let Some(num_str) = s.strip_suffix("ms") {
        return num_str
            .trim()
            .parse()
            .with_context(|| format!("Invalid milliseconds value: {num_str}"));
    }
    if let Some(num_str) = s.strip_suffix('s') {
        let secs: u64 = num_str
            .trim()
            .parse()
            .with_context(|| format!("Invalid seconds value: {num_str}"))?;
        return secs
            .checked_mul(1000)
            .with_context(|| format!("Duration out of range: {s}"));
    }
    if let Some(num_str) = s.strip_suffix('m') {
        let minutes: u64 = num_str
            .trim()
            .parse()
            .with_context(|| format!("Invalid minutes value: {num_str}"))?;
        return minutes
            .checked_mul(60_000)
            .with_context(|| format!("Duration out of range: {s}"));
    }

    // No suffix - treat as milliseconds
    s.parse::<u64>()
        .with_context(|| format!("Invalid duration value: {s}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_number_is_millis() {
        assert_eq!(parse_duration_to_millis("1500").unwrap(), 1500);
        assert_eq!(parse_duration_to_millis(" 250 ").unwrap(), 250);
    }

    #[test]
    fn test_suffixes() {
        assert_eq!(parse_duration_to_millis("1500ms").unwrap(), 1500);
        assert_eq!(parse_duration_to_millis("2s").unwrap(), 2000);
        assert_eq!(parse_duration_to_millis("1m").unwrap(), 60_000);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_duration_to_millis("").is_err());
        assert!(parse_duration_to_millis("fast").is_err());
        assert!(parse_duration_to_millis("-1s").is_err());
        assert!(parse_duration_to_millis("2h").is_err());
    }
}
