//! Business-day calendar and date resolution for TCMB bulletins.
//!
//! TCMB publishes one bulletin per business day. Weekends, the fixed
//! national holidays and the religious holidays (whose dates move every
//! year) have no bulletin, so a request for such a day is answered by the
//! closest earlier business day.

use crate::core::error::RateError;
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::{BTreeMap, HashMap};

/// First day a bulletin is available from the historical archive.
pub const EARLIEST_FEED_DATE: NaiveDate = match NaiveDate::from_ymd_opt(1996, 1, 2) {
    Some(date) => date,
    None => panic!("invalid earliest feed date"),
};

/// Longest run of non-business days the resolver walks through.
pub const MAX_RESOLUTION_STEPS: u32 = 10;

/// Longest range accepted by range queries, in days.
pub const MAX_RANGE_DAYS: i64 = 365;

const FIXED_HOLIDAYS: [((u32, u32), &str); 7] = [
    ((1, 1), "Yılbaşı"),
    ((4, 23), "Ulusal Egemenlik ve Çocuk Bayramı"),
    ((5, 1), "Emek ve Dayanışma Günü"),
    ((5, 19), "Atatürk'ü Anma, Gençlik ve Spor Bayramı"),
    ((7, 15), "Demokrasi ve Milli Birlik Günü"),
    ((8, 30), "Zafer Bayramı"),
    ((10, 29), "Cumhuriyet Bayramı"),
];

const RAMAZAN: &str = "Ramazan Bayramı";
const KURBAN: &str = "Kurban Bayramı";

const RELIGIOUS_HOLIDAYS: [((i32, u32, u32), &str); 21] = [
    ((2024, 4, 10), RAMAZAN),
    ((2024, 4, 11), RAMAZAN),
    ((2024, 4, 12), RAMAZAN),
    ((2024, 6, 16), KURBAN),
    ((2024, 6, 17), KURBAN),
    ((2024, 6, 18), KURBAN),
    ((2024, 6, 19), KURBAN),
    ((2025, 3, 30), RAMAZAN),
    ((2025, 3, 31), RAMAZAN),
    ((2025, 4, 1), RAMAZAN),
    ((2025, 6, 6), KURBAN),
    ((2025, 6, 7), KURBAN),
    ((2025, 6, 8), KURBAN),
    ((2025, 6, 9), KURBAN),
    ((2026, 3, 20), RAMAZAN),
    ((2026, 3, 21), RAMAZAN),
    ((2026, 3, 22), RAMAZAN),
    ((2026, 5, 27), KURBAN),
    ((2026, 5, 28), KURBAN),
    ((2026, 5, 29), KURBAN),
    ((2026, 5, 30), KURBAN),
];

#[derive(Debug, Clone)]
pub struct HolidayCalendar {
    fixed: HashMap<(u32, u32), &'static str>,
    movable: BTreeMap<NaiveDate, &'static str>,
}

impl HolidayCalendar {
    /// The Turkish official calendar used by TCMB.
    pub fn turkish() -> Self {
        let fixed = FIXED_HOLIDAYS.into_iter().collect();
        let movable = RELIGIOUS_HOLIDAYS
            .into_iter()
            .filter_map(|((y, m, d), name)| NaiveDate::from_ymd_opt(y, m, d).map(|date| (date, name)))
            .collect();
        Self { fixed, movable }
    }

    /// A calendar with only weekends and the given extra holidays.
    pub fn with_holidays(holidays: impl IntoIterator<Item = (NaiveDate, &'static str)>) -> Self {
        Self {
            fixed: HashMap::new(),
            movable: holidays.into_iter().collect(),
        }
    }

    pub fn is_weekend(&self, date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub fn holiday_name(&self, date: NaiveDate) -> Option<&'static str> {
        if self.is_weekend(date) {
            return Some(if date.weekday() == Weekday::Sat {
                "Cumartesi"
            } else {
                "Pazar"
            });
        }
        self.fixed
            .get(&(date.month(), date.day()))
            .or_else(|| self.movable.get(&date))
            .copied()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holiday_name(date).is_some()
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !self.is_holiday(date)
    }
}

impl Default for HolidayCalendar {
    fn default() -> Self {
        Self::turkish()
    }
}

/// Maps a requested date onto the business day whose bulletin answers it.
#[derive(Debug, Clone, Default)]
pub struct DateResolver {
    calendar: HolidayCalendar,
}

impl DateResolver {
    pub fn new(calendar: HolidayCalendar) -> Self {
        Self { calendar }
    }

    pub fn calendar(&self) -> &HolidayCalendar {
        &self.calendar
    }

    /// Returns the latest business day on or before `requested`.
    pub fn resolve(&self, requested: NaiveDate, today: NaiveDate) -> Result<NaiveDate, RateError> {
        if requested > today {
            return Err(RateError::InvalidDate(format!(
                "{requested} is in the future (today is {today})"
            )));
        }
        if requested < EARLIEST_FEED_DATE {
            return Err(RateError::UnsupportedDate {
                date: requested,
                earliest: EARLIEST_FEED_DATE,
            });
        }

        let mut current = requested;
        for _ in 0..MAX_RESOLUTION_STEPS {
            if self.calendar.is_business_day(current) {
                return Ok(current);
            }
            current -= Duration::days(1);
            if current < EARLIEST_FEED_DATE {
                return Err(RateError::UnsupportedDate {
                    date: requested,
                    earliest: EARLIEST_FEED_DATE,
                });
            }
        }

        Err(RateError::Resolution {
            date: requested,
            steps: MAX_RESOLUTION_STEPS,
        })
    }

    /// Business day strictly before `date`; used when a bulletin turns out
    /// to be missing although the calendar expected one.
    pub fn previous_business_day(&self, date: NaiveDate) -> Result<NaiveDate, RateError> {
        let yesterday = date - Duration::days(1);
        self.resolve(yesterday, yesterday)
    }

    /// All business days of the inclusive range, oldest first.
    pub fn business_days(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        start
            .iter_days()
            .take_while(|date| *date <= end)
            .filter(|date| self.calendar.is_business_day(*date))
            .collect()
    }
}

/// Checks a query range against the archive bounds and the maximum span.
pub fn validate_range(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<(), RateError> {
    if start < EARLIEST_FEED_DATE {
        return Err(RateError::InvalidRange(format!(
            "start date cannot be before {EARLIEST_FEED_DATE}"
        )));
    }
    if end > today {
        return Err(RateError::InvalidRange(format!(
            "end date {end} is after today ({today})"
        )));
    }
    if start > end {
        return Err(RateError::InvalidRange(format!(
            "start date {start} is after end date {end}"
        )));
    }
    let span = (end - start).num_days();
    if span > MAX_RANGE_DAYS {
        return Err(RateError::InvalidRange(format!(
            "range can span at most {MAX_RANGE_DAYS} days ({span} requested)"
        )));
    }
    Ok(())
}

/// Parses the date formats users type: ISO, Turkish dotted, slashed, and a
/// few keywords in English and Turkish.
pub fn parse_date(input: &str, today: NaiveDate) -> Result<NaiveDate, RateError> {
    let trimmed = input.trim();
    match trimmed.to_lowercase().as_str() {
        "today" | "bugün" | "bugun" => return Ok(today),
        "yesterday" | "dün" | "dun" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    ["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .ok_or_else(|| {
            RateError::InvalidDate(format!(
                "'{trimmed}' is not a recognised date, use YYYY-MM-DD or DD.MM.YYYY"
            ))
        })
}
