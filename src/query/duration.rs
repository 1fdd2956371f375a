//! Free-text duration parsing ("10 minutes", "1h 30m", "2 days")

use std::sync::OnceLock;

use chrono::Duration;
use regex::Regex;

use crate::config::ConfigError;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| {
        Regex::new(r"(?i)(\d+)\s*([a-z]+)").expect("duration token regex is valid")
    })
}

/// Milliseconds per unit, or None for an unknown unit
fn unit_millis(unit: &str) -> Option<i64> {
    let ms = match unit.to_ascii_lowercase().as_str() {
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => 1,
        "s" | "sec" | "secs" | "second" | "seconds" => 1_000,
        "m" | "min" | "mins" | "minute" | "minutes" => 60_000,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3_600_000,
        "d" | "day" | "days" => 86_400_000,
        "w" | "week" | "weeks" => 604_800_000,
        _ => return None,
    };
    Some(ms)
}

/// Parse a human duration made of one or more `<count> <unit>` pairs.
///
/// Pairs may be separated by whitespace or commas. Anything else in the
/// input is rejected, as is an empty string.
pub fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDuration {
        value: text.to_string(),
        reason: reason.to_string(),
    };

    let mut total_ms: i64 = 0;
    let mut cursor = 0;
    let mut pairs = 0;

    for caps in token_regex().captures_iter(text) {
        let whole = caps.get(0).ok_or_else(|| invalid("unreadable token"))?;
        if !is_separator(&text[cursor..whole.start()]) {
            return Err(invalid("unexpected text"));
        }
        cursor = whole.end();

        let count: i64 = caps[1].parse().map_err(|_| invalid("count out of range"))?;
        let unit = unit_millis(&caps[2]).ok_or_else(|| invalid("unknown unit"))?;

        total_ms = count
            .checked_mul(unit)
            .and_then(|ms| total_ms.checked_add(ms))
            .ok_or_else(|| invalid("duration out of range"))?;
        pairs += 1;
    }

    if pairs == 0 {
        return Err(invalid("expected `<count> <unit>`"));
    }
    if !is_separator(&text[cursor..]) {
        return Err(invalid("unexpected text"));
    }

    Ok(Duration::milliseconds(total_ms))
}

fn is_separator(s: &str) -> bool {
    s.chars().all(|c| c.is_whitespace() || c == ',')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_unit() {
        assert_eq!(parse_duration("10 minutes").unwrap(), Duration::minutes(10));
        assert_eq!(parse_duration("1 hour").unwrap(), Duration::hours(1));
        assert_eq!(parse_duration("30s").unwrap(), Duration::seconds(30));
        assert_eq!(parse_duration("2 Days").unwrap(), Duration::days(2));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::milliseconds(250));
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(
            parse_duration("1h 30m").unwrap(),
            Duration::minutes(90)
        );
        assert_eq!(
            parse_duration("1 week, 1 day").unwrap(),
            Duration::days(8)
        );
    }

    #[test]
    fn test_parse_zero() {
        assert_eq!(parse_duration("0 seconds").unwrap(), Duration::zero());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "   ", "ten minutes", "5 fortnights", "10", "10 minutes ago", "-5 minutes"] {
            let err = parse_duration(bad).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidDuration { .. }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_overflow() {
        assert!(parse_duration("99999999999999999999 days").is_err());
        assert!(parse_duration("9999999999999 weeks").is_err());
    }
}
