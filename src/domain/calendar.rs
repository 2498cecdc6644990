use chrono::{Datelike, Days, NaiveDate, Weekday};
use std::collections::BTreeSet;

/// Trading calendar: weekdays minus an explicit holiday set.
///
/// The engine never transitions signal state on a non-trading day, and every
/// trade date is derived through this calendar rather than naive date
/// arithmetic.
#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    holidays: BTreeSet<NaiveDate>,
}

impl TradingCalendar {
    pub fn new(holidays: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            holidays: holidays.into_iter().collect(),
        }
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.holidays.contains(&date)
    }

    /// The next trading session strictly after `date`.
    pub fn next_session(&self, date: NaiveDate) -> NaiveDate {
        let mut candidate = date;
        loop {
            // Days::new(1) cannot overflow for any realistic market date
            candidate = candidate.checked_add_days(Days::new(1)).unwrap_or(candidate);
            if self.is_trading_day(candidate) {
                return candidate;
            }
        }
    }

    /// Number of trading sessions in (start, end], zero when end <= start.
    pub fn sessions_between(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        let mut count = 0;
        let mut cursor = start;
        while cursor < end {
            cursor = cursor.checked_add_days(Days::new(1)).unwrap_or(cursor);
            if self.is_trading_day(cursor) {
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_weekends_are_not_trading_days() {
        let cal = TradingCalendar::default();
        assert!(cal.is_trading_day(date("2024-04-01"))); // Monday
        assert!(!cal.is_trading_day(date("2024-04-06"))); // Saturday
        assert!(!cal.is_trading_day(date("2024-04-07"))); // Sunday
    }

    #[test]
    fn test_next_session_skips_weekend_and_holiday() {
        let cal = TradingCalendar::new([date("2024-04-08")]);
        // Friday -> Monday is a holiday -> Tuesday
        assert_eq!(cal.next_session(date("2024-04-05")), date("2024-04-09"));
        // Midweek: plain next day
        assert_eq!(cal.next_session(date("2024-04-02")), date("2024-04-03"));
    }

    #[test]
    fn test_sessions_between_counts_trading_days_only() {
        let cal = TradingCalendar::default();
        // Mon 2024-04-01 .. Mon 2024-04-08 exclusive/inclusive: Tue-Fri + Mon = 5
        assert_eq!(cal.sessions_between(date("2024-04-01"), date("2024-04-08")), 5);
        assert_eq!(cal.sessions_between(date("2024-04-08"), date("2024-04-01")), 0);
        assert_eq!(cal.sessions_between(date("2024-04-01"), date("2024-04-01")), 0);
    }
}
