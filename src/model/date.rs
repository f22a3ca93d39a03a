//! Conversion between calendar dates and spreadsheet date serials.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::Serialize;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Epoch used to interpret date serials, from `workbookPr/@date1904`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateSystem {
    /// Serial 1 is 1900-01-01, with the phantom 1900-02-29 at serial 60
    #[default]
    Excel1900,
    /// Serial 0 is 1904-01-01
    Excel1904,
}

impl DateSystem {
    fn epoch(self) -> Option<NaiveDateTime> {
        let date = match self {
            DateSystem::Excel1900 => NaiveDate::from_ymd_opt(1899, 12, 30)?,
            DateSystem::Excel1904 => NaiveDate::from_ymd_opt(1904, 1, 1)?,
        };
        date.and_hms_opt(0, 0, 0)
    }

    /// Date serial of a timestamp, at millisecond precision.
    pub fn to_serial(self, value: NaiveDateTime) -> Option<f64> {
        let millis = value.signed_duration_since(self.epoch()?).num_milliseconds();
        let serial = millis as f64 / MILLIS_PER_DAY;
        match self {
            // Serials before 1900-03-01 skip the phantom leap day.
            DateSystem::Excel1900 if serial < 61.0 => Some(serial - 1.0),
            _ => Some(serial),
        }
    }

    /// Timestamp of a date serial, rounded to the millisecond.
    pub fn from_serial(self, serial: f64) -> Option<NaiveDateTime> {
        if !serial.is_finite() || serial < 0.0 {
            return None;
        }
        let shifted = match self {
            DateSystem::Excel1900 if serial < 61.0 => serial + 1.0,
            _ => serial,
        };
        let millis = (shifted * MILLIS_PER_DAY).round();
        if millis > i64::MAX as f64 {
            return None;
        }
        self.epoch()?
            .checked_add_signed(TimeDelta::try_milliseconds(millis as i64)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datetime(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    #[test]
    fn test_known_serials() {
        let system = DateSystem::Excel1900;
        assert_eq!(system.to_serial(datetime(1900, 1, 1, 0, 0, 0)), Some(1.0));
        assert_eq!(system.to_serial(datetime(1900, 2, 28, 0, 0, 0)), Some(59.0));
        assert_eq!(system.to_serial(datetime(1900, 3, 1, 0, 0, 0)), Some(61.0));
        assert_eq!(system.to_serial(datetime(2021, 1, 1, 0, 0, 0)), Some(44197.0));
        assert_eq!(system.to_serial(datetime(2021, 1, 1, 12, 0, 0)), Some(44197.5));
    }

    #[test]
    fn test_serial_to_datetime() {
        let system = DateSystem::Excel1900;
        assert_eq!(system.from_serial(1.0), Some(datetime(1900, 1, 1, 0, 0, 0)));
        assert_eq!(system.from_serial(61.0), Some(datetime(1900, 3, 1, 0, 0, 0)));
        assert_eq!(system.from_serial(45658.0), Some(datetime(2025, 1, 1, 0, 0, 0)));
        assert_eq!(system.from_serial(-1.0), None);
        assert_eq!(system.from_serial(f64::NAN), None);
    }

    #[test]
    fn test_time_of_day_survives() {
        let value = datetime(2000, 1, 1, 3, 2, 1);
        for system in [DateSystem::Excel1900, DateSystem::Excel1904] {
            let serial = system.to_serial(value).unwrap();
            assert_eq!(system.from_serial(serial), Some(value));
        }
    }

    #[test]
    fn test_1904_epoch() {
        let system = DateSystem::Excel1904;
        assert_eq!(system.to_serial(datetime(1904, 1, 1, 0, 0, 0)), Some(0.0));
        // The two systems are 1462 days apart.
        assert_eq!(system.to_serial(datetime(2021, 1, 1, 0, 0, 0)), Some(44197.0 - 1462.0));
    }
}
