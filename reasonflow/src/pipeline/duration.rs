//! Go-style duration strings (`250ms`, `1.5s`, `1m30s`).

use crate::errors::PipelineValidationError;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

static FULL_RE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[-+]?(?:(?:\d+\.?\d*|\.\d+)(?:ns|us|µs|μs|ms|s|m|h))+$").ok()
});

static GROUP_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+\.?\d*|\.\d+)(ns|us|µs|μs|ms|s|m|h)").ok());

fn unit_nanos(unit: &str) -> f64 {
    match unit {
        "ns" => 1.0,
        "us" | "µs" | "μs" => 1e3,
        "ms" => 1e6,
        "s" => 1e9,
        "m" => 60e9,
        _ => 3600e9,
    }
}

/// Parses a step timeout.
///
/// A bare `0` is accepted by the grammar but rejected as non-positive, as
/// are negative values.
///
/// # Errors
///
/// Returns `invalid timeout format: <value>` for malformed strings and
/// `timeout must be positive: <value>` for zero or negative durations.
pub fn parse_duration(value: &str) -> Result<Duration, PipelineValidationError> {
    let trimmed = value.trim();
    if matches!(trimmed, "0" | "+0" | "-0") {
        return Err(PipelineValidationError::non_positive_timeout(value));
    }

    let (Some(full), Some(group)) = (FULL_RE.as_ref(), GROUP_RE.as_ref()) else {
        return Err(PipelineValidationError::invalid_timeout(value));
    };
    if !full.is_match(trimmed) {
        return Err(PipelineValidationError::invalid_timeout(value));
    }

    let mut nanos = 0.0_f64;
    for caps in group.captures_iter(trimmed) {
        let number: f64 = caps[1]
            .parse()
            .map_err(|_| PipelineValidationError::invalid_timeout(value))?;
        nanos += number * unit_nanos(&caps[2]);
    }

    if trimmed.starts_with('-') || nanos < 1.0 {
        return Err(PipelineValidationError::non_positive_timeout(value));
    }
    if !nanos.is_finite() || nanos > u64::MAX as f64 {
        return Err(PipelineValidationError::invalid_timeout(value));
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Ok(Duration::from_nanos(nanos.round() as u64))
}

/// Formats a duration the way [`parse_duration`] reads it.
#[must_use]
pub fn format_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if duration.subsec_nanos() % 1_000_000 != 0 {
        format!("{}ns", duration.as_nanos())
    } else if millis % 1000 != 0 {
        format!("{millis}ms")
    } else {
        format!("{}s", duration.as_secs())
    }
}

/// Serde adapter storing a [`Duration`] as a duration string.
///
/// Zero is accepted on input so that delays can be switched off.
pub mod serde_str {
    use super::{format_duration, parse_duration};
    use crate::errors::ValidationErrorKind;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    /// Serializes as e.g. `"100ms"`.
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_duration(*value))
    }

    /// Deserializes from e.g. `"100ms"` or `"0s"`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        match parse_duration(&text) {
            Ok(value) => Ok(value),
            Err(err)
                if err.kind == ValidationErrorKind::NonPositiveTimeout
                    && !text.trim().starts_with('-') =>
            {
                Ok(Duration::ZERO)
            }
            Err(err) => Err(D::Error::custom(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ValidationErrorKind;

    #[test]
    fn test_parse_simple_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("10us").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("10µs").unwrap(), Duration::from_micros(10));
        assert_eq!(parse_duration("5ns").unwrap(), Duration::from_nanos(5));
    }

    #[test]
    fn test_parse_compound_and_fractional() {
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5s").unwrap(), Duration::from_millis(1500));
        assert_eq!(parse_duration(".5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1h2m3s").unwrap(), Duration::from_secs(3723));
        assert_eq!(parse_duration("+2s").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn test_malformed_values() {
        for bad in ["", "abc", "30", "10 s", "s", "1.2.3s", "5d", "1m 30s"] {
            let err = parse_duration(bad).unwrap_err();
            assert_eq!(err.kind, ValidationErrorKind::InvalidTimeout, "{bad}");
            assert_eq!(err.message, format!("invalid timeout format: {bad}"));
        }
    }

    #[test]
    fn test_non_positive_values() {
        for bad in ["0", "0s", "-1s", "-500ms", "0.0ms"] {
            let err = parse_duration(bad).unwrap_err();
            assert_eq!(err.kind, ValidationErrorKind::NonPositiveTimeout, "{bad}");
            assert_eq!(err.message, format!("timeout must be positive: {bad}"));
        }
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(Duration::from_nanos(7)), "7ns");
        assert_eq!(parse_duration(&format_duration(Duration::from_millis(250))).unwrap(), Duration::from_millis(250));
        assert_eq!(format_duration(Duration::ZERO), "0s");
    }

    #[derive(Debug, serde::Serialize, serde::Deserialize)]
    struct Delay {
        #[serde(with = "serde_str")]
        delay: Duration,
    }

    #[test]
    fn test_serde_adapter() {
        let parsed: Delay = serde_json::from_str(r#"{"delay":"1.5s"}"#).unwrap();
        assert_eq!(parsed.delay, Duration::from_millis(1500));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"{"delay":"1500ms"}"#);

        let zero: Delay = serde_json::from_str(r#"{"delay":"0s"}"#).unwrap();
        assert_eq!(zero.delay, Duration::ZERO);

        assert!(serde_json::from_str::<Delay>(r#"{"delay":"-1s"}"#).is_err());
        assert!(serde_json::from_str::<Delay>(r#"{"delay":"soon"}"#).is_err());
    }
}
