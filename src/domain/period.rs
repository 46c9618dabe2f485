//! Recency windows for partition reads.
//!
//! Calendar-based variants (daily, monthly, yearly, year-end) are evaluated
//! as wall-clock spans in the configured reporting timezone; an explicit
//! anchor date selects the calendar unit containing it, while anchorless
//! calls fall back to rolling spans ending now.

use chrono::{DateTime, Datelike, Duration as ChronoDuration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use time::{OffsetDateTime, UtcOffset};

use crate::domain::error::DomainError;
use crate::domain::types::Period;

/// Half-open publish-time window `[start, end)`. `None` on either side
/// means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedWindow {
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
}

impl PublishedWindow {
    pub const UNBOUNDED: PublishedWindow = PublishedWindow {
        start: None,
        end: None,
    };

    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        self.start.is_none_or(|start| ts >= start) && self.end.is_none_or(|end| ts < end)
    }
}

/// Parses a `YYYY-MM-DD` anchor date from a query parameter.
pub fn parse_anchor(value: &str) -> Result<NaiveDate, DomainError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| DomainError::validation(format!("invalid anchor date `{value}`")))
}

/// Computes the publish-time window for a period in the reporting timezone.
pub fn published_window(
    period: Period,
    anchor: Option<NaiveDate>,
    tz: Tz,
    now: OffsetDateTime,
) -> PublishedWindow {
    match (period, anchor) {
        (Period::All, _) => PublishedWindow::UNBOUNDED,
        (period, Some(anchor)) => anchored_window(period, anchor, tz),
        (period, None) => rolling_window(period, tz, now),
    }
}

fn anchored_window(period: Period, anchor: NaiveDate, tz: Tz) -> PublishedWindow {
    let (start_date, end_date) = match period {
        Period::Daily => (anchor, add_days(anchor, 1)),
        Period::Weekly => (anchor, add_days(anchor, 7)),
        Period::Monthly => (month_start(anchor.year(), anchor.month()), next_month(anchor)),
        Period::Yearly => (year_start(anchor.year()), year_start_or_max(anchor.year() + 1)),
        Period::YearEnd => (december_start(anchor.year()), year_start_or_max(anchor.year() + 1)),
        Period::All => unreachable!("handled by the caller"),
    };
    PublishedWindow {
        start: Some(local_midnight(start_date, tz)),
        end: Some(local_midnight(end_date, tz)),
    }
}

fn rolling_window(period: Period, tz: Tz, now: OffsetDateTime) -> PublishedWindow {
    let start = match period {
        Period::Daily => local_midnight(localized(now, tz).date_naive(), tz),
        Period::Weekly => now - time::Duration::days(7),
        Period::Monthly => now - time::Duration::days(30),
        Period::Yearly => now - time::Duration::days(365),
        Period::YearEnd => local_midnight(december_start(localized(now, tz).year()), tz),
        Period::All => unreachable!("handled by the caller"),
    };
    PublishedWindow {
        start: Some(start),
        end: None,
    }
}

fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date.checked_add_signed(ChronoDuration::days(days))
        .unwrap_or(NaiveDate::MAX)
}

fn month_start(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
}

fn next_month(anchor: NaiveDate) -> NaiveDate {
    if anchor.month() == 12 {
        year_start_or_max(anchor.year() + 1)
    } else {
        month_start(anchor.year(), anchor.month() + 1)
    }
}

fn year_start(year: i32) -> NaiveDate {
    month_start(year, 1)
}

fn year_start_or_max(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(NaiveDate::MAX)
}

fn december_start(year: i32) -> NaiveDate {
    month_start(year, 12)
}

/// Resolves a local calendar date to its first instant in `tz`. Ambiguous
/// wall times (DST fall-back) take the earlier instant; a midnight erased
/// by a DST gap resolves to the first instant one hour later.
fn local_midnight(date: NaiveDate, tz: Tz) -> OffsetDateTime {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .expect("00:00:00 is a valid wall-clock time");
    let local = match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earlier, _) => earlier,
        LocalResult::None => tz
            .from_local_datetime(&(naive + ChronoDuration::hours(1)))
            .earliest()
            .expect("wall time one hour past a DST gap resolves"),
    };
    to_instant(local)
}

fn localized(ts: OffsetDateTime, tz: Tz) -> DateTime<Tz> {
    let utc = ts.to_offset(UtcOffset::UTC);
    let seconds = utc.unix_timestamp();
    let nanos: u32 = utc.nanosecond();
    let datetime_utc = DateTime::<Utc>::from_timestamp(seconds, nanos).unwrap_or_else(|| {
        DateTime::<Utc>::from_timestamp(seconds, 0).expect("valid UTC timestamp")
    });
    tz.from_utc_datetime(&datetime_utc.naive_utc())
}

/// Instants past the representable calendar (a window edge in year 10000,
/// or `NaiveDate::MAX` from a saturated date computation) clamp to the
/// nearest edge instead of failing.
fn to_instant(local: DateTime<Tz>) -> OffsetDateTime {
    let seconds = local.timestamp();
    match OffsetDateTime::from_unix_timestamp(seconds) {
        Ok(instant) => instant,
        Err(_) if seconds > 0 => time::PrimitiveDateTime::MAX.assume_utc(),
        Err(_) => time::PrimitiveDateTime::MIN.assume_utc(),
    }
}

#[cfg(test)]
mod tests {
    use chrono_tz::Tz;
    use time::macros::datetime;

    use super::*;

    const UTC: Tz = chrono_tz::UTC;
    const SEOUL: Tz = chrono_tz::Asia::Seoul;

    fn anchor(s: &str) -> NaiveDate {
        parse_anchor(s).unwrap()
    }

    #[test]
    fn anchor_parsing_accepts_iso_dates_only() {
        assert!(parse_anchor("2024-01-31").is_ok());
        assert!(parse_anchor("01/31/2024").is_err());
        assert!(parse_anchor("2024-13-01").is_err());
    }

    #[test]
    fn anchored_daily_monthly_and_all_classify_the_canonical_items() {
        let items = [
            datetime!(2024-01-01 12:00 UTC),
            datetime!(2024-01-15 12:00 UTC),
            datetime!(2024-02-01 12:00 UTC),
        ];
        let now = datetime!(2024-06-01 00:00 UTC);
        let day = published_window(Period::Daily, Some(anchor("2024-01-01")), UTC, now);
        let month = published_window(Period::Monthly, Some(anchor("2024-01-01")), UTC, now);
        let all = published_window(Period::All, Some(anchor("2024-01-01")), UTC, now);

        let keep = |window: &PublishedWindow| {
            items
                .iter()
                .filter(|ts| window.contains(**ts))
                .count()
        };
        assert_eq!(keep(&day), 1);
        assert_eq!(keep(&month), 2);
        assert_eq!(keep(&all), 3);
    }

    #[test]
    fn anchored_weekly_is_half_open_at_seven_days() {
        let window = published_window(
            Period::Weekly,
            Some(anchor("2024-01-01")),
            UTC,
            datetime!(2024-06-01 00:00 UTC),
        );
        assert!(window.contains(datetime!(2024-01-01 00:00 UTC)));
        assert!(window.contains(datetime!(2024-01-07 23:59 UTC)));
        assert!(!window.contains(datetime!(2024-01-08 00:00 UTC)));
    }

    #[test]
    fn far_future_anchors_saturate_at_the_calendar_edge() {
        let now = datetime!(2024-06-01 00:00 UTC);

        // The yearly window for 9999 ends at year 10000, past what an
        // instant can represent; the edge clamps instead of failing.
        let yearly = published_window(Period::Yearly, Some(anchor("9999-06-15")), UTC, now);
        assert!(yearly.contains(datetime!(9999-07-01 00:00 UTC)));
        assert!(!yearly.contains(datetime!(9998-12-31 23:59 UTC)));

        let daily = published_window(Period::Daily, Some(anchor("9999-12-31")), UTC, now);
        assert!(daily.contains(datetime!(9999-12-31 12:00 UTC)));
        assert!(!daily.contains(datetime!(9999-12-30 12:00 UTC)));
    }

    #[test]
    fn anchored_monthly_uses_the_calendar_month_not_the_anchor_day() {
        let window = published_window(
            Period::Monthly,
            Some(anchor("2024-01-20")),
            UTC,
            datetime!(2024-06-01 00:00 UTC),
        );
        assert!(window.contains(datetime!(2024-01-02 00:00 UTC)));
        assert!(!window.contains(datetime!(2024-02-01 00:00 UTC)));
    }

    #[test]
    fn year_end_is_december_of_the_anchor_year() {
        let window = published_window(
            Period::YearEnd,
            Some(anchor("2024-03-15")),
            UTC,
            datetime!(2024-06-01 00:00 UTC),
        );
        assert!(!window.contains(datetime!(2024-11-30 23:59 UTC)));
        assert!(window.contains(datetime!(2024-12-15 00:00 UTC)));
        assert!(!window.contains(datetime!(2025-01-01 00:00 UTC)));
    }

    #[test]
    fn anchored_windows_respect_the_reporting_timezone() {
        // Midnight in Seoul is 15:00 UTC of the previous day.
        let window = published_window(
            Period::Daily,
            Some(anchor("2024-01-01")),
            SEOUL,
            datetime!(2024-06-01 00:00 UTC),
        );
        assert_eq!(window.start, Some(datetime!(2023-12-31 15:00 UTC)));
        assert_eq!(window.end, Some(datetime!(2024-01-01 15:00 UTC)));
    }

    #[test]
    fn rolling_windows_have_no_upper_bound() {
        let now = datetime!(2024-06-15 10:00 UTC);
        let weekly = published_window(Period::Weekly, None, UTC, now);
        assert_eq!(weekly.start, Some(now - time::Duration::days(7)));
        assert_eq!(weekly.end, None);
        assert!(weekly.contains(now + time::Duration::days(1)));

        let monthly = published_window(Period::Monthly, None, UTC, now);
        assert!(monthly.contains(now - time::Duration::days(29)));
        assert!(!monthly.contains(now - time::Duration::days(31)));
    }

    #[test]
    fn rolling_daily_starts_at_local_midnight() {
        // 2024-06-15 01:30 in Seoul; local midnight is 15:00 UTC on the 14th.
        let now = datetime!(2024-06-14 16:30 UTC);
        let window = published_window(Period::Daily, None, SEOUL, now);
        assert_eq!(window.start, Some(datetime!(2024-06-14 15:00 UTC)));
        assert_eq!(window.end, None);
    }

    #[test]
    fn rolling_year_end_uses_the_local_current_year() {
        let now = datetime!(2024-12-20 00:00 UTC);
        let window = published_window(Period::YearEnd, None, UTC, now);
        assert_eq!(window.start, Some(datetime!(2024-12-01 00:00 UTC)));
    }
}
