use chrono::{DateTime, NaiveDate, NaiveDateTime};
use chrono_tz::Tz;
use serde_json::Value;
use tracing::warn;

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── TimestampParser ───────────────────────────────────────────────────────────

/// Turns raw JSON timestamp values into naive wall-clock times in one zone.
///
/// Bucketing is calendar-based, so every timestamp is brought into the same
/// local zone before its date is taken.
#[derive(Debug, Clone)]
pub struct TimestampParser {
    tz: Tz,
}

impl TimestampParser {
    /// Create a parser for the IANA zone `tz_name`.
    ///
    /// `"auto"` resolves to the system zone. Unknown names fall back to UTC
    /// with a warning.
    pub fn new(tz_name: &str) -> Self {
        let resolved = if tz_name.eq_ignore_ascii_case("auto") {
            get_system_timezone()
        } else {
            tz_name.to_string()
        };
        let tz = resolved.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimestampParser: unrecognised timezone \"{}\", falling back to UTC",
                resolved
            );
            Tz::UTC
        });
        Self { tz }
    }

    pub fn utc() -> Self {
        Self { tz: Tz::UTC }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Parse a JSON value.
    ///
    /// * string → RFC 3339 (converted into the zone), naive date-time, or
    ///   date-only (midnight)
    /// * number → Unix seconds (converted into the zone)
    /// * anything else → `None`
    pub fn parse(&self, value: &Value) -> Option<NaiveDateTime> {
        match value {
            Value::String(s) => self.parse_str(s),
            Value::Number(n) => {
                let dt = if let Some(secs) = n.as_i64() {
                    DateTime::from_timestamp(secs, 0)
                } else {
                    let f = n.as_f64()?;
                    let secs = f.trunc() as i64;
                    let nanos = (f.fract() * 1_000_000_000.0).round() as u32;
                    DateTime::from_timestamp(secs, nanos)
                }?;
                Some(dt.with_timezone(&self.tz).naive_local())
            }
            _ => None,
        }
    }

    /// Parse a timestamp string; see [`TimestampParser::parse`].
    pub fn parse_str(&self, s: &str) -> Option<NaiveDateTime> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }

        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&self.tz).naive_local());
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%d %H:%M",
        ];
        for fmt in FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(naive);
            }
        }

        const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y"];
        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
                return date.and_hms_opt(0, 0, 0);
            }
        }

        warn!("TimestampParser: could not parse timestamp \"{}\"", s);
        None
    }
}

impl Default for TimestampParser {
    fn default() -> Self {
        Self::utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ndt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_parse_rfc3339_z_suffix() {
        let p = TimestampParser::utc();
        assert_eq!(
            p.parse(&json!("2020-03-01T10:30:00Z")),
            Some(ndt(2020, 3, 1, 10, 30))
        );
    }

    #[test]
    fn test_parse_offset_converted_into_zone() {
        let p = TimestampParser::new("Europe/Madrid");
        // 23:30 UTC on Jan 31 is already Feb 1 in Madrid (UTC+1).
        assert_eq!(
            p.parse(&json!("2020-01-31T23:30:00+00:00")),
            Some(ndt(2020, 2, 1, 0, 30))
        );
    }

    #[test]
    fn test_parse_naive_is_taken_as_local() {
        let p = TimestampParser::new("America/New_York");
        assert_eq!(
            p.parse(&json!("2020-01-01 08:15:00")),
            Some(ndt(2020, 1, 1, 8, 15))
        );
    }

    #[test]
    fn test_parse_date_only() {
        let p = TimestampParser::utc();
        assert_eq!(p.parse(&json!("2020-02-01")), Some(ndt(2020, 2, 1, 0, 0)));
        assert_eq!(p.parse(&json!("2020/02/01")), Some(ndt(2020, 2, 1, 0, 0)));
    }

    #[test]
    fn test_parse_unix_seconds() {
        let p = TimestampParser::utc();
        // 2020-01-01T00:00:00Z
        assert_eq!(p.parse(&json!(1_577_836_800)), Some(ndt(2020, 1, 1, 0, 0)));
        assert_eq!(p.parse(&json!(1_577_836_800.0)), Some(ndt(2020, 1, 1, 0, 0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let p = TimestampParser::utc();
        assert_eq!(p.parse(&json!("not a date")), None);
        assert_eq!(p.parse(&json!("")), None);
        assert_eq!(p.parse(&json!(null)), None);
        assert_eq!(p.parse(&json!(true)), None);
    }

    #[test]
    fn test_unknown_timezone_falls_back_to_utc() {
        let p = TimestampParser::new("Mars/Olympus_Mons");
        assert_eq!(p.timezone(), Tz::UTC);
    }
}
