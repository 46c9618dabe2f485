//! Timestamp rendering for response payloads.

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Renders a timestamp as an RFC 3339 string; years outside the
/// representable range render empty rather than erroring.
pub fn rfc3339(ts: OffsetDateTime) -> String {
    ts.format(&Rfc3339).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    #[test]
    fn renders_utc_timestamps_with_z_suffix() {
        assert_eq!(
            rfc3339(datetime!(2024-01-01 00:00 UTC)),
            "2024-01-01T00:00:00Z"
        );
    }
}
