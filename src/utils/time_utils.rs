use chrono::{SecondsFormat, TimeZone, Utc};

// Everything is stored as UTC Unix timestamps (seconds)
// in the database and rendered as RFC 3339 in JSON, which
// is what the old hosted database used to send back.

pub fn current_timestamp() -> i64 {
  Utc::now().timestamp()
}

pub fn current_timestamp_millis() -> i64 {
  Utc::now().timestamp_millis()
}

// Out of range timestamps should never happen since we
// write them ourselves, I just output an empty string.
pub fn timestamp_to_rfc3339(timestamp: i64) -> String {
  Utc.timestamp_opt(timestamp, 0)
    .single()
    .map(|d| d.to_rfc3339_opts(SecondsFormat::Secs, true))
    .unwrap_or_default()
}
