// Temporal Decomposer
//
// Converts civil date/time records into concrete chrono values. Fractional
// seconds are always split the same way: whole seconds are the floor of the
// value and the remainder is rounded half-up to nanoseconds.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{Error, Result};
use crate::native::{OffsetTime, TimeValue, TimestampValue};
use crate::value::{CivilDateTime, DateRecord, TimeOfDay, UtcInstant, ZoneOffsetRecord};

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const MAX_OFFSET_SECONDS: i32 = 18 * 3600;

/// Splits a fractional second count into whole seconds and nanoseconds.
///
/// An absent value is zero.
pub fn split_seconds(second: Option<Decimal>) -> Result<(u32, u32)> {
    let second = second.unwrap_or(Decimal::ZERO);
    let whole = second.floor();
    let nanos = ((second - whole) * Decimal::from(NANOS_PER_SECOND))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    let whole_secs = whole
        .to_u32()
        .filter(|s| *s < 60)
        .ok_or_else(|| Error::application(format!("Invalid second value: {}", second)))?;
    let nanos = nanos
        .to_u32()
        .filter(|n| (*n as i64) < NANOS_PER_SECOND)
        .ok_or_else(|| Error::application(format!("Invalid second value: {}", second)))?;
    Ok((whole_secs, nanos))
}

/// Builds a fixed offset; the seconds component is rounded half-up.
pub fn decompose_offset(offset: &ZoneOffsetRecord) -> Result<FixedOffset> {
    let seconds = offset
        .seconds
        .unwrap_or(Decimal::ZERO)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i32()
        .ok_or_else(|| Error::application(format!("Invalid zone offset: {:?}", offset)))?;

    let parts = [offset.hours, offset.minutes, seconds];
    let mixed_signs = parts.iter().any(|p| *p > 0) && parts.iter().any(|p| *p < 0);
    if mixed_signs || offset.minutes.abs() > 59 || seconds.abs() > 59 {
        return Err(Error::application(format!("Invalid zone offset: {:?}", offset)));
    }

    let total = offset.hours * 3600 + offset.minutes * 60 + seconds;
    if total.abs() > MAX_OFFSET_SECONDS {
        return Err(Error::application(format!(
            "Zone offset not in valid range: -18:00 to +18:00, found {:?}",
            offset
        )));
    }
    FixedOffset::east_opt(total)
        .ok_or_else(|| Error::application(format!("Invalid zone offset: {:?}", offset)))
}

pub fn decompose_date(date: &DateRecord) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year, date.month, date.day).ok_or_else(|| {
        Error::application(format!(
            "Invalid date value: {}-{}-{}",
            date.year, date.month, date.day
        ))
    })
}

fn naive_time(hour: u32, minute: u32, second: Option<Decimal>) -> Result<NaiveTime> {
    let (secs, nanos) = split_seconds(second)?;
    NaiveTime::from_hms_nano_opt(hour, minute, secs, nanos).ok_or_else(|| {
        Error::application(format!(
            "Invalid time value: {}:{}:{}.{:09}",
            hour, minute, secs, nanos
        ))
    })
}

/// Decomposes a time of day; offset presence selects the offset-aware value.
pub fn decompose_time(time: &TimeOfDay) -> Result<TimeValue> {
    let local = naive_time(time.hour, time.minute, time.second)?;
    match &time.utc_offset {
        Some(offset) => Ok(TimeValue::Offset(OffsetTime {
            time: local,
            offset: decompose_offset(offset)?,
        })),
        None => Ok(TimeValue::Naive(local)),
    }
}

/// Decomposes a civil date-time; offset presence selects the offset-aware value.
pub fn decompose_civil(civil: &CivilDateTime) -> Result<TimestampValue> {
    let date = decompose_date(&civil.date())?;
    let time = naive_time(civil.hour, civil.minute, civil.second)?;
    let local = NaiveDateTime::new(date, time);
    match &civil.utc_offset {
        Some(offset) => {
            let offset = decompose_offset(offset)?;
            offset
                .from_local_datetime(&local)
                .single()
                .map(TimestampValue::Offset)
                .ok_or_else(|| Error::application(format!("Invalid civil value: {:?}", civil)))
        }
        None => Ok(TimestampValue::Naive(local)),
    }
}

/// Converts a UTC instant to an absolute timestamp with millisecond precision.
pub fn utc_instant(instant: &UtcInstant) -> Result<DateTime<Utc>> {
    let millis = (instant.fraction * Decimal::from(1000))
        .floor()
        .to_u32()
        .filter(|m| *m < 1000)
        .ok_or_else(|| Error::application(format!("Invalid UTC fraction: {}", instant.fraction)))?;
    Utc.timestamp_opt(instant.seconds, millis * 1_000_000)
        .single()
        .ok_or_else(|| Error::application(format!("Invalid UTC value: {}", instant.seconds)))
}

pub fn parse_date_text(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| Error::application(format!("Invalid date string: '{}'", text)))
}

/// Parses an ISO local time: `HH:MM`, `HH:MM:SS` or `HH:MM:SS.fraction`.
pub fn parse_time_text(text: &str) -> Result<NaiveTime> {
    let text = text.trim();
    NaiveTime::parse_from_str(text, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
        .map_err(|_| Error::application(format!("Invalid time string: '{}'", text)))
}

/// Parses the `yyyy-MM-dd HH:mm:ss` timestamp pattern.
pub fn parse_timestamp_text(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), "%Y-%m-%d %H:%M:%S")
        .map_err(|_| Error::application(format!("Invalid timestamp string: '{}'", text)))
}

/// Element type name of a temporal array: any offset-bearing element switches
/// the whole array to the WITH TIMEZONE variant.
pub fn array_type_name(base: &'static str, any_offset: bool) -> &'static str {
    match (base, any_offset) {
        ("TIME", true) => "TIME WITH TIMEZONE",
        ("TIMESTAMP", true) => "TIMESTAMP WITH TIMEZONE",
        (base, _) => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_split_seconds() {
        assert_eq!(split_seconds(Some(dec("12.75"))).unwrap(), (12, 750_000_000));
        assert_eq!(split_seconds(Some(Decimal::ZERO)).unwrap(), (0, 0));
        assert_eq!(split_seconds(None).unwrap(), (0, 0));
        // half-up at the nanosecond boundary
        assert_eq!(split_seconds(Some(dec("1.0000000005"))).unwrap(), (1, 1));
        assert_eq!(split_seconds(Some(dec("1.0000000004"))).unwrap(), (1, 0));
    }

    #[test]
    fn test_split_seconds_rejects_out_of_range() {
        assert!(split_seconds(Some(dec("60"))).is_err());
        assert!(split_seconds(Some(dec("-1"))).is_err());
        // rounds up to a full second
        assert!(split_seconds(Some(dec("5.9999999999"))).is_err());
    }

    #[test]
    fn test_decompose_time_naive_and_offset() {
        let tod = TimeOfDay::new(10, 30, dec("12.75"));
        match decompose_time(&tod).unwrap() {
            TimeValue::Naive(t) => {
                assert_eq!((t.hour(), t.minute(), t.second()), (10, 30, 12));
                assert_eq!(t.nanosecond(), 750_000_000);
            }
            other => panic!("Expected naive time, got {:?}", other),
        }

        let tod = tod.with_offset(ZoneOffsetRecord::new(5, 30));
        match decompose_time(&tod).unwrap() {
            TimeValue::Offset(t) => assert_eq!(t.offset.local_minus_utc(), 5 * 3600 + 30 * 60),
            other => panic!("Expected offset time, got {:?}", other),
        }
    }

    #[test]
    fn test_decompose_offset_rounds_seconds_half_up() {
        let offset = ZoneOffsetRecord {
            hours: 1,
            minutes: 0,
            seconds: Some(dec("29.5")),
        };
        assert_eq!(decompose_offset(&offset).unwrap().local_minus_utc(), 3630);
    }

    #[test]
    fn test_decompose_offset_validation() {
        assert!(decompose_offset(&ZoneOffsetRecord::new(-5, 30)).is_err());
        assert!(decompose_offset(&ZoneOffsetRecord::new(19, 0)).is_err());
        assert_eq!(
            decompose_offset(&ZoneOffsetRecord::new(-5, -30)).unwrap().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
    }

    #[test]
    fn test_decompose_civil() {
        let civil = CivilDateTime::new(
            DateRecord { year: 2021, month: 12, day: 31 },
            TimeOfDay::new(23, 59, dec("59.5")),
        );
        match decompose_civil(&civil).unwrap() {
            TimestampValue::Naive(dt) => {
                assert_eq!(dt.year(), 2021);
                assert_eq!(dt.nanosecond(), 500_000_000);
            }
            other => panic!("Expected naive timestamp, got {:?}", other),
        }

        let mut with_tz = civil;
        with_tz.utc_offset = Some(ZoneOffsetRecord::new(-8, 0));
        match decompose_civil(&with_tz).unwrap() {
            TimestampValue::Offset(dt) => {
                assert_eq!(dt.offset().local_minus_utc(), -8 * 3600);
                assert_eq!(dt.naive_local().day(), 31);
            }
            other => panic!("Expected offset timestamp, got {:?}", other),
        }
    }

    #[test]
    fn test_decompose_date_invalid() {
        let err = decompose_date(&DateRecord { year: 2021, month: 13, day: 1 }).unwrap_err();
        assert!(err.to_string().contains("2021-13-1"));
    }

    #[test]
    fn test_utc_instant_truncates_to_millis() {
        let instant = UtcInstant {
            seconds: 1_700_000_000,
            fraction: dec("0.1239"),
        };
        let dt = utc_instant(&instant).unwrap();
        assert_eq!(dt.timestamp(), 1_700_000_000);
        assert_eq!(dt.timestamp_subsec_nanos(), 123_000_000);
    }

    #[test]
    fn test_text_parsing() {
        assert_eq!(parse_date_text("2020-01-05").unwrap().day(), 5);
        assert_eq!(parse_time_text("11:35:45.5").unwrap().nanosecond(), 500_000_000);
        assert_eq!(parse_time_text("11:35").unwrap().minute(), 35);
        assert!(parse_timestamp_text("2020-01-05T10:00:00").is_err());
        assert_eq!(parse_timestamp_text("2020-01-05 10:00:01").unwrap().second(), 1);
    }

    #[test]
    fn test_array_type_name() {
        assert_eq!(array_type_name("TIME", true), "TIME WITH TIMEZONE");
        assert_eq!(array_type_name("TIMESTAMP", false), "TIMESTAMP");
    }
}
