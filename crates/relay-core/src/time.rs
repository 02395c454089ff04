use chrono::{DateTime, Utc};

/// Current time as RFC-3339, used for runtime-info prompts and log fields.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parses an RFC-3339 timestamp, surfacing a descriptive error on failure.
pub fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}
