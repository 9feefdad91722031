//! Spreadsheet date serials: whole days since 1899-12-30, with the fractional part
//! holding the time of day.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

const MS_PER_DAY: f64 = 86_400_000.0;

fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Converts a serial to a timestamp, resolving the time of day to milliseconds.
/// Returns `None` for non-finite or out-of-range serials.
pub fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let days = serial.floor();
    let millis = ((serial - days) * MS_PER_DAY).round() as i64;
    epoch()
        .checked_add_signed(Duration::try_days(days as i64)?)?
        .checked_add_signed(Duration::try_milliseconds(millis)?)
}

pub fn datetime_to_serial(date: NaiveDateTime) -> f64 {
    let days = (date.date() - epoch().date()).num_days() as f64;
    let millis_of_day = date.num_seconds_from_midnight() as f64 * 1000.0
        + (date.nanosecond() / 1_000_000) as f64;
    days + millis_of_day / MS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn epoch_day_is_zero() {
        assert_eq!(datetime_to_serial(at(1899, 12, 30, 0, 0, 0)), 0.0);
        assert_eq!(serial_to_datetime(0.0), Some(at(1899, 12, 30, 0, 0, 0)));
    }

    #[test]
    fn known_serial_values() {
        assert_eq!(datetime_to_serial(at(1900, 1, 1, 0, 0, 0)), 2.0);
        assert_eq!(datetime_to_serial(at(2022, 1, 8, 12, 0, 0)), 44569.5);
    }

    #[test]
    fn leap_day_round_trips() {
        let leap = at(2024, 2, 29, 0, 0, 0);
        let serial = datetime_to_serial(leap);
        assert_eq!(serial.fract(), 0.0);
        assert_eq!(serial_to_datetime(serial), Some(leap));
    }

    #[test]
    fn time_of_day_round_trips() {
        for dt in [
            at(2022, 1, 8, 13, 16, 38),
            at(2021, 12, 31, 23, 59, 59),
            at(1999, 6, 15, 0, 0, 1),
        ] {
            assert_eq!(serial_to_datetime(datetime_to_serial(dt)), Some(dt));
        }
    }

    #[test]
    fn milliseconds_survive_round_trip() {
        let dt = at(2023, 3, 1, 8, 30, 0) + Duration::milliseconds(250);
        assert_eq!(serial_to_datetime(datetime_to_serial(dt)), Some(dt));
    }

    #[test]
    fn dates_before_epoch() {
        let dt = at(1899, 12, 29, 18, 0, 0);
        assert_eq!(datetime_to_serial(dt), -0.25);
        assert_eq!(serial_to_datetime(-0.25), Some(dt));
    }

    #[test]
    fn non_finite_serial_is_rejected() {
        assert_eq!(serial_to_datetime(f64::NAN), None);
        assert_eq!(serial_to_datetime(f64::INFINITY), None);
    }
}
