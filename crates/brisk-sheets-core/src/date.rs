//! Serial date conversion for the 1900 and 1904 date systems.
//!
//! The 1900 system keeps the historical fictitious 1900-02-29 (serial 60),
//! so serials before March 1900 are offset by one day.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

const MS_PER_DAY: f64 = 86_400_000.0;

fn epoch_1900() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or(NaiveDate::MIN)
}

fn epoch_1904() -> NaiveDate {
    NaiveDate::from_ymd_opt(1904, 1, 1).unwrap_or(NaiveDate::MIN)
}

fn march_1900() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 3, 1).unwrap_or(NaiveDate::MIN)
}

/// Convert a date-time to its serial number
pub fn datetime_to_serial(dt: NaiveDateTime, date1904: bool) -> f64 {
    let date = dt.date();
    let mut days = if date1904 {
        (date - epoch_1904()).num_days()
    } else {
        (date - epoch_1900()).num_days()
    };
    if !date1904 && date < march_1900() {
        days -= 1;
    }
    let time = dt.time();
    let ms = f64::from(time.num_seconds_from_midnight()) * 1000.0
        + f64::from(time.nanosecond() / 1_000_000);
    days as f64 + ms / MS_PER_DAY
}

/// Convert a serial number back to a date-time.
///
/// Returns `None` for negative serials, the fictitious 1900-02-29 and values
/// outside chrono's range.
pub fn serial_to_datetime(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let mut whole = serial.floor();
    let mut ms = ((serial - whole) * MS_PER_DAY).round() as i64;
    if ms >= MS_PER_DAY as i64 {
        whole += 1.0;
        ms = 0;
    }
    let whole = whole as i64;
    let date = if date1904 {
        epoch_1904().checked_add_signed(Duration::days(whole))?
    } else if whole == 60 {
        return None;
    } else if whole < 60 {
        epoch_1900().checked_add_signed(Duration::days(whole + 1))?
    } else {
        epoch_1900().checked_add_signed(Duration::days(whole))?
    };
    let time = NaiveTime::MIN.overflowing_add_signed(Duration::milliseconds(ms)).0;
    Some(date.and_time(time))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_known_serials() {
        assert_eq!(datetime_to_serial(ymd(1900, 1, 1), false), 1.0);
        assert_eq!(datetime_to_serial(ymd(1900, 2, 28), false), 59.0);
        assert_eq!(datetime_to_serial(ymd(1900, 3, 1), false), 61.0);
        assert_eq!(datetime_to_serial(ymd(2024, 1, 15), false), 45306.0);
        assert_eq!(datetime_to_serial(ymd(1904, 1, 2), true), 1.0);
    }

    #[test]
    fn test_time_fraction() {
        let dt = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        assert_eq!(datetime_to_serial(dt, false), 45306.5);
        assert_eq!(serial_to_datetime(45306.5, false), Some(dt));
    }

    #[test]
    fn test_reverse() {
        assert_eq!(serial_to_datetime(1.0, false), Some(ymd(1900, 1, 1)));
        assert_eq!(serial_to_datetime(61.0, false), Some(ymd(1900, 3, 1)));
        assert_eq!(serial_to_datetime(60.0, false), None);
        assert_eq!(serial_to_datetime(-1.0, false), None);
        assert_eq!(serial_to_datetime(0.0, true), Some(ymd(1904, 1, 1)));
    }
}
