use time::OffsetDateTime;

/// Milliseconds in one day.
pub const DAY_MS: i64 = 86_400_000;

/// Current wall-clock time in epoch milliseconds.
pub fn now_ms() -> i64 {
    to_ms(OffsetDateTime::now_utc())
}

pub fn to_ms(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn rfc3339(at: OffsetDateTime) -> String {
    at.format(&time::format_description::well_known::Rfc3339)
        .expect("RFC3339 formatting should not fail")
}

pub fn now_rfc3339() -> String {
    rfc3339(OffsetDateTime::now_utc())
}
