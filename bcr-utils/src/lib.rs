//! Shared utility functions for BCR crates.

/// Date utility functions
pub mod dates {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

    /// Parse a raw field-sheet timestamp into a UTC instant.
    ///
    /// The first space separating date and time is replaced with `T`, then
    /// the text is read as one of:
    /// - RFC 3339 with an explicit offset or `Z` (converted to UTC)
    /// - `YYYY-MM-DDTHH:MM[:SS[.fff]]` without an offset (taken as UTC)
    /// - `YYYY-MM-DD` (UTC midnight)
    ///
    /// Returns `None` for blank or unrecognised text.
    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }
        let text = text.replacen(' ', "T", 1);

        if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
            return Some(dt.with_timezone(&Utc));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&text, fmt) {
                return Some(naive.and_utc());
            }
        }
        NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    }

    /// Format a UTC instant the way it is stored: RFC 3339 with a `Z` suffix,
    /// keeping whatever sub-second precision the instant has.
    pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    /// Parse a stored RFC 3339 timestamp back into a UTC instant.
    pub fn parse_stored_timestamp(s: &str) -> anyhow::Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use chrono::{Datelike, TimeZone, Timelike};

        #[test]
        fn test_parse_space_separated_as_utc() {
            let dt = parse_timestamp("2020-03-05 10:00:00").unwrap();
            assert_eq!(dt, Utc.with_ymd_and_hms(2020, 3, 5, 10, 0, 0).unwrap());
        }

        #[test]
        fn test_parse_with_fraction_and_without_seconds() {
            let dt = parse_timestamp("2021-07-01 08:15:30.250").unwrap();
            assert_eq!(dt.timestamp_subsec_millis(), 250);

            let dt = parse_timestamp("2021-07-01 08:15").unwrap();
            assert_eq!((dt.hour(), dt.minute(), dt.second()), (8, 15, 0));
        }

        #[test]
        fn test_parse_with_offset_converts_to_utc() {
            let dt = parse_timestamp("2021-01-01T02:00:00+05:30").unwrap();
            assert_eq!(dt.year(), 2020);
            assert_eq!((dt.hour(), dt.minute()), (20, 30));
        }

        #[test]
        fn test_parse_date_only() {
            let dt = parse_timestamp("2019-12-31").unwrap();
            assert_eq!(dt, Utc.with_ymd_and_hms(2019, 12, 31, 0, 0, 0).unwrap());
        }

        #[test]
        fn test_parse_rejects_garbage() {
            assert!(parse_timestamp("").is_none());
            assert!(parse_timestamp("   ").is_none());
            assert!(parse_timestamp("yesterday").is_none());
            assert!(parse_timestamp("2020-13-45 10:00:00").is_none());
        }

        #[test]
        fn test_format_and_parse_stored() {
            let dt = Utc.with_ymd_and_hms(2023, 6, 15, 12, 30, 0).unwrap();
            let formatted = format_timestamp(&dt);
            assert_eq!(formatted, "2023-06-15T12:30:00Z");
            assert_eq!(parse_stored_timestamp(&formatted).unwrap(), dt);

            let precise = parse_timestamp("2021-07-01 08:15:30.123456").unwrap();
            let stored = format_timestamp(&precise);
            assert_eq!(stored, "2021-07-01T08:15:30.123456Z");
            assert_eq!(parse_stored_timestamp(&stored).unwrap(), precise);
        }
    }
}

/// Number parsing and rendering helpers
pub mod numbers {
    /// Marker rendered in place of a value that could not be computed.
    pub const NO_DATA: &str = "n/a";

    /// Parse the longest leading decimal number in `s`, the way JavaScript's
    /// `parseFloat` does.
    ///
    /// Leading whitespace is skipped and trailing garbage ignored, so
    /// `"12.5kg"` yields `12.5`. Text with no numeric prefix yields NaN.
    pub fn parse_float_prefix(s: &str) -> f64 {
        let s = s.trim_start();
        let bytes = s.as_bytes();
        let len = bytes.len();
        let mut end = 0;

        if end < len && (bytes[end] == b'+' || bytes[end] == b'-') {
            end += 1;
        }
        if s[end..].starts_with("Infinity") {
            return if bytes[0] == b'-' {
                f64::NEG_INFINITY
            } else {
                f64::INFINITY
            };
        }

        let int_start = end;
        while end < len && bytes[end].is_ascii_digit() {
            end += 1;
        }
        let mut digits = end - int_start;

        if end < len && bytes[end] == b'.' {
            let mut j = end + 1;
            while j < len && bytes[j].is_ascii_digit() {
                j += 1;
            }
            digits += j - (end + 1);
            if digits > 0 {
                end = j;
            }
        }
        if digits == 0 {
            return f64::NAN;
        }

        if end < len && (bytes[end] == b'e' || bytes[end] == b'E') {
            let mut j = end + 1;
            if j < len && (bytes[j] == b'+' || bytes[j] == b'-') {
                j += 1;
            }
            let exp_start = j;
            while j < len && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j > exp_start {
                end = j;
            }
        }

        s[..end].parse::<f64>().unwrap_or(f64::NAN)
    }

    /// Keep only the ASCII decimal digits of `s`.
    pub fn digits_only(s: &str) -> String {
        s.chars().filter(|c| c.is_ascii_digit()).collect()
    }

    /// Render an optional value with a fixed number of decimals, or [`NO_DATA`].
    pub fn fixed(value: Option<f64>, precision: usize) -> String {
        match value {
            Some(v) => format!("{:.*}", precision, v),
            None => NO_DATA.to_string(),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_parse_float_prefix_plain() {
            assert_eq!(parse_float_prefix("3.25"), 3.25);
            assert_eq!(parse_float_prefix("  -7"), -7.0);
            assert_eq!(parse_float_prefix("+0.5"), 0.5);
            assert_eq!(parse_float_prefix(".5"), 0.5);
            assert_eq!(parse_float_prefix("5."), 5.0);
            assert_eq!(parse_float_prefix("1.5e3"), 1500.0);
        }

        #[test]
        fn test_parse_float_prefix_ignores_trailing_text() {
            assert_eq!(parse_float_prefix("12.5kg"), 12.5);
            assert_eq!(parse_float_prefix("4e"), 4.0);
            assert_eq!(parse_float_prefix("2.0e+x"), 2.0);
            assert_eq!(parse_float_prefix("90.944851,"), 90.944851);
        }

        #[test]
        fn test_parse_float_prefix_infinity() {
            assert_eq!(parse_float_prefix("Infinity"), f64::INFINITY);
            assert_eq!(parse_float_prefix("-Infinity"), f64::NEG_INFINITY);
        }

        #[test]
        fn test_parse_float_prefix_nan() {
            assert!(parse_float_prefix("").is_nan());
            assert!(parse_float_prefix("abc").is_nan());
            assert!(parse_float_prefix("-").is_nan());
            assert!(parse_float_prefix(".").is_nan());
            assert!(parse_float_prefix("NaN").is_nan());
        }

        #[test]
        fn test_digits_only() {
            assert_eq!(digits_only("2021(est)"), "2021");
            assert_eq!(digits_only(" FY-2019 "), "2019");
            assert_eq!(digits_only("unknown"), "");
        }

        #[test]
        fn test_fixed() {
            assert_eq!(fixed(Some(0.4), 2), "0.40");
            assert_eq!(fixed(Some(1234.56), 1), "1234.6");
            assert_eq!(fixed(None, 2), NO_DATA);
        }
    }
}
