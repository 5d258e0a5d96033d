//! Shared prompt fragments.

use chrono::{DateTime, Utc};

pub const PERSONA: &str = "You are Elder, a knowledgeable assistant in a Discord server. \
Answer clearly and concisely. Use Discord markdown (bold, bullet points) where it helps readability.";

/// Date line injected into every system prompt so "today" and "this year" resolve correctly.
///
/// ```text
/// Current date/time: Saturday, October 17, 2026, 14:30 UTC (2026-10-17T14:30:15+00:00)
/// ```
pub fn datetime_context_at(now: DateTime<Utc>) -> String {
    format!(
        "Current date/time: {}, {} UTC ({})",
        now.format("%A, %B %-d, %Y"),
        now.format("%H:%M"),
        now.to_rfc3339_opts(chrono::SecondsFormat::Secs, false)
    )
}

pub fn datetime_context() -> String {
    datetime_context_at(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_datetime_context_format() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 14, 30, 15).unwrap();
        assert_eq!(
            datetime_context_at(now),
            "Current date/time: Saturday, October 17, 2026, 14:30 UTC (2026-10-17T14:30:15+00:00)"
        );
        assert!(datetime_context().starts_with("Current date/time:"));
    }
}
