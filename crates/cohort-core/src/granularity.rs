//! Time bucketing for cohort rows and period columns.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Serialize, Serializer};

use crate::error::CohortError;

// ── Granularity ───────────────────────────────────────────────────────────────

/// Resolution at which timestamps are grouped into buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    Daily,
    /// ISO weeks, starting on Monday.
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Granularity {
    /// All granularities, finest first.
    pub const ALL: [Granularity; 5] = [
        Granularity::Daily,
        Granularity::Weekly,
        Granularity::Monthly,
        Granularity::Quarterly,
        Granularity::Yearly,
    ];

    /// Canonical lowercase name, e.g. `"monthly"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
            Granularity::Quarterly => "quarterly",
            Granularity::Yearly => "yearly",
        }
    }

    /// First day of the bucket containing `date`.
    pub fn period_start(self, date: NaiveDate) -> NaiveDate {
        match self {
            Granularity::Daily => date,
            Granularity::Weekly => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            Granularity::Monthly => date.with_day(1).unwrap_or(date),
            Granularity::Quarterly => {
                let first_month = date.month0() / 3 * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), first_month, 1).unwrap_or(date)
            }
            Granularity::Yearly => date.with_ordinal(1).unwrap_or(date),
        }
    }

    /// Monotone bucket index: consecutive buckets differ by exactly one.
    pub fn ordinal(self, date: NaiveDate) -> i64 {
        let year = i64::from(date.year());
        let month0 = i64::from(date.month0());
        match self {
            Granularity::Daily => i64::from(date.num_days_from_ce()),
            Granularity::Weekly => {
                // Every Monday shares the same residue, so the division is exact.
                i64::from(self.period_start(date).num_days_from_ce()).div_euclid(7)
            }
            Granularity::Monthly => year * 12 + month0,
            Granularity::Quarterly => year * 4 + month0 / 3,
            Granularity::Yearly => year,
        }
    }

    /// Number of whole buckets from `start` to `end`; negative when `end`
    /// falls in an earlier bucket.
    pub fn periods_between(self, start: NaiveDate, end: NaiveDate) -> i64 {
        self.ordinal(end) - self.ordinal(start)
    }

    /// Human-readable label for the bucket containing `date`.
    ///
    /// * daily → `"2020-01-31"`
    /// * weekly → `"2020-W05"` (ISO week-year)
    /// * monthly → `"2020-01"`
    /// * quarterly → `"2020-Q1"`
    /// * yearly → `"2020"`
    pub fn label(self, date: NaiveDate) -> String {
        let start = self.period_start(date);
        match self {
            Granularity::Daily => start.format("%Y-%m-%d").to_string(),
            Granularity::Weekly => start.format("%G-W%V").to_string(),
            Granularity::Monthly => start.format("%Y-%m").to_string(),
            Granularity::Quarterly => format!("{}-Q{}", start.year(), start.month0() / 3 + 1),
            Granularity::Yearly => start.year().to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = CohortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Granularity::Daily),
            "weekly" => Ok(Granularity::Weekly),
            "monthly" => Ok(Granularity::Monthly),
            "quarterly" => Ok(Granularity::Quarterly),
            "yearly" => Ok(Granularity::Yearly),
            _ => Err(CohortError::UnknownGranularity(s.to_string())),
        }
    }
}

impl Serialize for Granularity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ── GranularityPair ───────────────────────────────────────────────────────────

/// Row (cohort formation) and column (elapsed period) granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GranularityPair {
    pub row: Granularity,
    pub column: Granularity,
}

impl GranularityPair {
    pub fn new(row: Granularity, column: Granularity) -> Self {
        Self { row, column }
    }

    /// Parse both names, failing with [`CohortError::UnknownGranularity`].
    pub fn parse(row: &str, column: &str) -> Result<Self, CohortError> {
        Ok(Self::new(row.parse()?, column.parse()?))
    }
}

impl fmt::Display for GranularityPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.row, self.column)
    }
}

// ── CohortKey ─────────────────────────────────────────────────────────────────

/// A bucket: the period start of a date under a granularity.
///
/// Ordered chronologically; displayed and serialized as its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CohortKey {
    start: NaiveDate,
    granularity: Granularity,
}

impl CohortKey {
    /// Bucket containing `date`.
    pub fn new(granularity: Granularity, date: NaiveDate) -> Self {
        Self {
            start: granularity.period_start(date),
            granularity,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn label(&self) -> String {
        self.granularity.label(self.start)
    }
}

impl fmt::Display for CohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl Serialize for CohortKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // ── parsing ───────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_known_names() {
        for g in Granularity::ALL {
            assert_eq!(g.as_str().parse::<Granularity>().unwrap(), g);
        }
        assert_eq!(" Monthly ".parse::<Granularity>().unwrap(), Granularity::Monthly);
    }

    #[test]
    fn test_parse_unknown_name_is_config_error() {
        let err = "hourly".parse::<Granularity>().unwrap_err();
        assert!(err.is_config_error());
        assert!(matches!(err, CohortError::UnknownGranularity(ref s) if s == "hourly"));
    }

    #[test]
    fn test_pair_parse_rejects_either_side() {
        assert!(GranularityPair::parse("monthly", "weekly").is_ok());
        assert!(GranularityPair::parse("fortnightly", "weekly").is_err());
        assert!(GranularityPair::parse("monthly", "").is_err());
    }

    // ── period_start ──────────────────────────────────────────────────────────

    #[test]
    fn test_period_start_each_granularity() {
        let date = d(2020, 5, 14); // Thursday
        assert_eq!(Granularity::Daily.period_start(date), date);
        assert_eq!(Granularity::Weekly.period_start(date), d(2020, 5, 11));
        assert_eq!(Granularity::Monthly.period_start(date), d(2020, 5, 1));
        assert_eq!(Granularity::Quarterly.period_start(date), d(2020, 4, 1));
        assert_eq!(Granularity::Yearly.period_start(date), d(2020, 1, 1));
    }

    #[test]
    fn test_weekly_start_on_monday_is_identity() {
        let monday = d(2020, 5, 11);
        assert_eq!(Granularity::Weekly.period_start(monday), monday);
        // Sunday belongs to the week that started six days earlier.
        assert_eq!(Granularity::Weekly.period_start(d(2020, 5, 17)), monday);
    }

    // ── periods_between ───────────────────────────────────────────────────────

    #[test]
    fn test_monthly_periods_between_crosses_year() {
        assert_eq!(
            Granularity::Monthly.periods_between(d(2019, 11, 30), d(2020, 2, 1)),
            3
        );
        assert_eq!(
            Granularity::Monthly.periods_between(d(2020, 1, 31), d(2020, 1, 1)),
            0
        );
    }

    #[test]
    fn test_weekly_periods_between_counts_calendar_weeks() {
        // Sunday to the next Monday is one week boundary apart.
        assert_eq!(
            Granularity::Weekly.periods_between(d(2020, 5, 17), d(2020, 5, 18)),
            1
        );
        assert_eq!(
            Granularity::Weekly.periods_between(d(2020, 5, 11), d(2020, 5, 17)),
            0
        );
        assert_eq!(
            Granularity::Weekly.periods_between(d(2019, 12, 30), d(2020, 1, 27)),
            4
        );
    }

    #[test]
    fn test_daily_quarterly_yearly_periods_between() {
        assert_eq!(Granularity::Daily.periods_between(d(2020, 2, 28), d(2020, 3, 1)), 2);
        assert_eq!(
            Granularity::Quarterly.periods_between(d(2020, 3, 31), d(2020, 4, 1)),
            1
        );
        assert_eq!(
            Granularity::Quarterly.periods_between(d(2019, 12, 1), d(2021, 1, 1)),
            5
        );
        assert_eq!(Granularity::Yearly.periods_between(d(2020, 12, 31), d(2021, 1, 1)), 1);
    }

    #[test]
    fn test_negative_offset_when_end_precedes_start() {
        assert_eq!(
            Granularity::Monthly.periods_between(d(2020, 3, 1), d(2020, 1, 15)),
            -2
        );
    }

    // ── labels ────────────────────────────────────────────────────────────────

    #[test]
    fn test_labels() {
        let date = d(2020, 1, 31);
        assert_eq!(Granularity::Daily.label(date), "2020-01-31");
        assert_eq!(Granularity::Weekly.label(date), "2020-W05");
        assert_eq!(Granularity::Monthly.label(date), "2020-01");
        assert_eq!(Granularity::Quarterly.label(date), "2020-Q1");
        assert_eq!(Granularity::Yearly.label(date), "2020");
    }

    #[test]
    fn test_weekly_label_uses_iso_week_year() {
        // 2019-12-30 is the Monday of ISO week 1 of 2020.
        assert_eq!(Granularity::Weekly.label(d(2019, 12, 31)), "2020-W01");
    }

    // ── CohortKey ─────────────────────────────────────────────────────────────

    #[test]
    fn test_cohort_key_truncates_and_orders() {
        let a = CohortKey::new(Granularity::Monthly, d(2020, 1, 20));
        let b = CohortKey::new(Granularity::Monthly, d(2020, 1, 2));
        let c = CohortKey::new(Granularity::Monthly, d(2020, 2, 1));
        assert_eq!(a, b);
        assert!(a < c);
        assert_eq!(a.start(), d(2020, 1, 1));
        assert_eq!(a.to_string(), "2020-01");
    }

    #[test]
    fn test_cohort_key_serializes_as_label() {
        let key = CohortKey::new(Granularity::Quarterly, d(2021, 8, 9));
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2021-Q3\"");
    }
}
