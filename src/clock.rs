use chrono::{DateTime, FixedOffset, Utc};

/// Offset of the rig's local time (America/Jamaica, UTC-05:00, no DST).
const TARGET_UTC_OFFSET_WEST_SECS: i32 = 5 * 3600;

/// The fixed timezone every server-assigned instant is rendered in.
pub fn target_tz() -> FixedOffset {
    FixedOffset::west_opt(TARGET_UTC_OFFSET_WEST_SECS).expect("UTC-05:00 is a valid offset")
}

/// Current instant. Stored as UTC; see [`in_target_tz`] for presentation.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn in_target_tz(at: DateTime<Utc>) -> DateTime<FixedOffset> {
    at.with_timezone(&target_tz())
}
