use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::{debug, warn};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Uses the `iana-time-zone` crate directly – no subprocess calls.
/// Falls back to `"UTC"` if detection fails.
pub fn get_system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── TimezoneHandler ───────────────────────────────────────────────────────────

/// Parses backend timestamps and renders them in the display timezone.
#[derive(Debug, Clone)]
pub struct TimezoneHandler {
    default_tz: Tz,
}

impl TimezoneHandler {
    /// Create a handler with the given IANA timezone name as the default.
    ///
    /// If `tz_name` is not a recognised IANA timezone, falls back to UTC
    /// and logs a warning.
    pub fn new(tz_name: &str) -> Self {
        let tz = tz_name.parse::<Tz>().unwrap_or_else(|_| {
            warn!(
                "TimezoneHandler: unrecognised timezone \"{}\", falling back to UTC",
                tz_name
            );
            Tz::UTC
        });
        Self { default_tz: tz }
    }

    /// Parse an ISO 8601 / RFC 3339 timestamp string into a UTC [`DateTime`].
    ///
    /// Naive datetimes (no offset) are read as wall-clock time in the
    /// configured timezone. A time repeated by a DST fall-back resolves to the
    /// earlier instant; a time skipped by a spring-forward gap is rejected.
    /// Returns `None` for empty strings or unrecognised formats.
    pub fn parse_timestamp(&self, s: &str) -> Option<DateTime<Utc>> {
        if s.is_empty() {
            return None;
        }

        let normalised = if let Some(stripped) = s.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            s.to_string()
        };

        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            return Some(dt.with_timezone(&Utc));
        }

        const FMTS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
        ];
        for fmt in FMTS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                match self.default_tz.from_local_datetime(&naive).earliest() {
                    Some(dt) => return Some(dt.with_timezone(&Utc)),
                    None => {
                        debug!("TimezoneHandler: \"{}\" falls in a DST gap", s);
                        return None;
                    }
                }
            }
        }

        debug!("TimezoneHandler: could not parse timestamp \"{}\"", s);
        None
    }

    /// Validate that `tz_name` is a recognised IANA timezone identifier.
    pub fn validate_timezone(tz_name: &str) -> bool {
        tz_name.parse::<Tz>().is_ok()
    }

    /// Convert a UTC [`DateTime`] to the display timezone.
    pub fn to_display(&self, dt: DateTime<Utc>) -> DateTime<Tz> {
        dt.with_timezone(&self.default_tz)
    }

    /// Render a raw backend timestamp as `YYYY-MM-DD HH:MM:SS` in the display
    /// timezone. Unparseable input is returned unchanged; `None` renders `-`.
    pub fn format_timestamp(&self, raw: Option<&str>) -> String {
        match raw {
            None => "-".to_string(),
            Some(s) => match self.parse_timestamp(s) {
                Some(dt) => self.to_display(dt).format("%Y-%m-%d %H:%M:%S").to_string(),
                None => s.to_string(),
            },
        }
    }

    /// Render a UTC [`DateTime`] as a wall-clock `HH:MM:SS` string.
    pub fn format_clock(&self, dt: DateTime<Utc>) -> String {
        self.to_display(dt).format("%H:%M:%S").to_string()
    }
}

impl Default for TimezoneHandler {
    fn default() -> Self {
        Self { default_tz: Tz::UTC }
    }
}

/// Elapsed time between two raw timestamps, in whole seconds.
///
/// Returns `None` when either side is missing or unparseable, or when the end
/// precedes the start.
pub fn duration_between(
    handler: &TimezoneHandler,
    start: Option<&str>,
    end: Option<&str>,
) -> Option<i64> {
    let start = handler.parse_timestamp(start?)?;
    let end = handler.parse_timestamp(end?)?;
    let secs = (end - start).num_seconds();
    (secs >= 0).then_some(secs)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
