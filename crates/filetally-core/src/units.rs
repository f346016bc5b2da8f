//! Human-friendly size and duration values for configuration.

use chrono::TimeDelta;
use serde::{Deserialize, Deserializer, Serializer};

/// Parse a signed size string (e.g., "1KB", "-500B", "1.5GiB").
///
/// `K`, `KB`, `M`, `MB`, ... are decimal multiples; `KiB`, `MiB`, ... are
/// binary. A leading `-` is kept on the result so callers can flip the
/// comparison direction.
pub fn parse_size(s: &str) -> Result<i64, String> {
    let s = s.trim();
    let (negative, body) = split_sign(s);
    let upper = body.to_uppercase();

    let digits_end = upper
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(upper.len());
    let (num, suffix) = upper.split_at(digits_end);
    let num: f64 = num
        .parse()
        .map_err(|_| format!("invalid size {s:?}: expected a number"))?;

    let multiplier: u64 = match suffix.trim() {
        "" | "B" => 1,
        "K" | "KB" => 1000,
        "M" | "MB" => 1000u64.pow(2),
        "G" | "GB" => 1000u64.pow(3),
        "T" | "TB" => 1000u64.pow(4),
        "KIB" => 1024,
        "MIB" => 1024u64.pow(2),
        "GIB" => 1024u64.pow(3),
        "TIB" => 1024u64.pow(4),
        other => return Err(format!("invalid size {s:?}: unknown unit {other:?}")),
    };

    let bytes = (num * multiplier as f64) as i64;
    Ok(if negative { -bytes } else { bytes })
}

/// Parse a signed duration string (e.g., "30s", "-7d", "1h30m").
///
/// Units: `ns`, `us`, `ms`, `s`, `m` (minutes), `h`, `d`, `w`, `y` (365 days).
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<TimeDelta, String> {
    let s = s.trim();
    let (negative, mut rest) = split_sign(s);
    if rest.is_empty() {
        return Err(format!("invalid duration {s:?}: empty"));
    }

    if let Ok(secs) = rest.parse::<f64>() {
        let delta = nanos_to_delta(secs * 1e9);
        return Ok(if negative { -delta } else { delta });
    }

    let mut total_nanos = 0f64;
    while !rest.is_empty() {
        let num_end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| format!("invalid duration {s:?}: missing unit"))?;
        let (num, tail) = rest.split_at(num_end);
        let num: f64 = num
            .parse()
            .map_err(|_| format!("invalid duration {s:?}: expected a number"))?;

        let unit_end = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, next) = tail.split_at(unit_end);
        let scale = match unit.to_lowercase().as_str() {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60.0 * 1e9,
            "h" => 60.0 * 60.0 * 1e9,
            "d" => 24.0 * 60.0 * 60.0 * 1e9,
            "w" => 7.0 * 24.0 * 60.0 * 60.0 * 1e9,
            "y" => 365.0 * 24.0 * 60.0 * 60.0 * 1e9,
            other => return Err(format!("invalid duration {s:?}: unknown unit {other:?}")),
        };
        total_nanos += num * scale;
        rest = next;
    }

    let delta = nanos_to_delta(total_nanos);
    Ok(if negative { -delta } else { delta })
}

/// Render a duration the way [`parse_duration`] reads it back.
pub fn format_duration(delta: TimeDelta) -> String {
    let secs = delta.num_seconds();
    if TimeDelta::seconds(secs) == delta {
        format!("{secs}s")
    } else {
        format!("{}ns", delta.num_nanoseconds().unwrap_or(i64::MAX))
    }
}

fn split_sign(s: &str) -> (bool, &str) {
    match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s.strip_prefix('+').unwrap_or(s).trim_start()),
    }
}

fn nanos_to_delta(nanos: f64) -> TimeDelta {
    TimeDelta::nanoseconds(nanos.clamp(i64::MIN as f64, i64::MAX as f64) as i64)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IntOrString {
    Int(i64),
    Str(String),
}

pub(crate) fn deserialize_size<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(n) => Ok(n),
        IntOrString::Str(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

pub(crate) fn deserialize_duration<'de, D>(deserializer: D) -> Result<TimeDelta, D::Error>
where
    D: Deserializer<'de>,
{
    match IntOrString::deserialize(deserializer)? {
        IntOrString::Int(n) => Ok(TimeDelta::seconds(n)),
        IntOrString::Str(s) => parse_duration(&s).map_err(serde::de::Error::custom),
    }
}

pub(crate) fn serialize_duration<S>(delta: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_duration(*delta))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("500").unwrap(), 500);
        assert_eq!(parse_size("-500B").unwrap(), -500);
        assert_eq!(parse_size("1KB").unwrap(), 1000);
        assert_eq!(parse_size("1KiB").unwrap(), 1024);
        assert_eq!(parse_size("1.5k").unwrap(), 1500);
        assert_eq!(parse_size("-1.5KiB").unwrap(), -1536);
        assert_eq!(parse_size("10MB").unwrap(), 10_000_000);
        assert_eq!(parse_size("2MiB").unwrap(), 2 * 1024 * 1024);
        assert!(parse_size("ten").is_err());
        assert!(parse_size("10XB").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s").unwrap(), TimeDelta::seconds(30));
        assert_eq!(parse_duration("-7d").unwrap(), -TimeDelta::days(7));
        assert_eq!(parse_duration("1h30m").unwrap(), TimeDelta::minutes(90));
        assert_eq!(parse_duration("250ms").unwrap(), TimeDelta::milliseconds(250));
        assert_eq!(parse_duration("90").unwrap(), TimeDelta::seconds(90));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5 fortnights").is_err());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::minutes(2)), "120s");
        assert_eq!(format_duration(-TimeDelta::seconds(5)), "-5s");
        assert_eq!(format_duration(TimeDelta::nanoseconds(1500)), "1500ns");
        let back = parse_duration(&format_duration(TimeDelta::milliseconds(1500))).unwrap();
        assert_eq!(back, TimeDelta::milliseconds(1500));
    }
}
