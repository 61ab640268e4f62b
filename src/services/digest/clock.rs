// src/services/digest/clock.rs

//! IANA-zone aware local date/hour arithmetic for the scheduler.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Wall-clock view of an instant in a user's zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalClock {
    pub date: NaiveDate,
    pub hour: u32,
}

pub fn parse_zone(name: &str) -> Option<Tz> {
    name.trim().parse::<Tz>().ok()
}

pub fn local_clock(now: DateTime<Utc>, zone: Tz) -> LocalClock {
    let local = now.with_timezone(&zone);
    LocalClock {
        date: local.date_naive(),
        hour: local.hour(),
    }
}

/// UTC bounds `[start, end)` of a local calendar day.
///
/// Days shortened or lengthened by a DST change keep their real length.
pub fn local_day_bounds(date: NaiveDate, zone: Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    (start_of_day(date, zone), start_of_day(next, zone))
}

fn start_of_day(date: NaiveDate, zone: Tz) -> DateTime<Utc> {
    // Midnight can fall into a DST gap (e.g. America/Havana); walk forward to
    // the first hour that exists.
    (0..=3)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .find_map(|time| zone.from_local_datetime(&date.and_time(time)).earliest())
        .map(|local| local.with_timezone(&Utc))
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn kyiv_summer_is_utc_plus_three() {
        let clock = local_clock(utc(2025, 7, 10, 17, 30), chrono_tz::Europe::Kyiv);
        assert_eq!(clock.hour, 20);
        assert_eq!(clock.date, NaiveDate::from_ymd_opt(2025, 7, 10).unwrap());
    }

    #[test]
    fn kyiv_winter_is_utc_plus_two() {
        let clock = local_clock(utc(2025, 1, 10, 18, 0), chrono_tz::Europe::Kyiv);
        assert_eq!(clock.hour, 20);
    }

    #[test]
    fn local_date_can_differ_from_utc_date() {
        let clock = local_clock(utc(2025, 7, 10, 22, 15), chrono_tz::Europe::Kyiv);
        assert_eq!(clock.date, NaiveDate::from_ymd_opt(2025, 7, 11).unwrap());
        assert_eq!(clock.hour, 1);
    }

    #[test]
    fn dst_spring_forward_day_is_23_hours() {
        // Europe/Kyiv moved to summer time on 2025-03-30.
        let date = NaiveDate::from_ymd_opt(2025, 3, 30).unwrap();
        let (start, end) = local_day_bounds(date, chrono_tz::Europe::Kyiv);
        assert_eq!(start, utc(2025, 3, 29, 22, 0));
        assert_eq!((end - start).num_hours(), 23);
    }

    #[test]
    fn unknown_zone_is_rejected() {
        assert!(parse_zone("Europe/Atlantis").is_none());
        assert!(parse_zone(" Europe/Kyiv ").is_some());
    }
}
