//! Conversions, time-series statistics and comparison tables computed from
//! rate snapshots. Everything here is pure; fetching is the service's job.
use crate::core::calendar::MAX_RANGE_DAYS;
use crate::core::config::ConversionConfig;
use crate::core::error::RateError;
use crate::core::rates::{BASE_CURRENCY, RateKind, RateSnapshot};
use chrono::{Duration, NaiveDate};
use rust_decimal::{Decimal, MathematicalOps};
use serde::Serialize;
use tracing::debug;

/// Which rate kind each leg of a conversion reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversionPolicy {
    /// Source currency into TRY.
    pub source_leg: RateKind,
    /// TRY into the target currency.
    pub target_leg: RateKind,
}

impl Default for ConversionPolicy {
    fn default() -> Self {
        Self::from(&ConversionConfig::default())
    }
}

impl From<&ConversionConfig> for ConversionPolicy {
    fn from(config: &ConversionConfig) -> Self {
        Self {
            source_leg: config.source_leg,
            target_leg: config.target_leg,
        }
    }
}

impl ConversionPolicy {
    /// Both legs read the same kind.
    pub fn uniform(kind: RateKind) -> Self {
        Self {
            source_leg: kind,
            target_leg: kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub amount: Decimal,
    pub from: String,
    pub to: String,
    pub converted: Decimal,
    /// Units of `to` per unit of `from`.
    pub rate: Decimal,
    pub date: NaiveDate,
    pub source_leg: Option<RateKind>,
    pub target_leg: Option<RateKind>,
}

/// Converts `amount` of `from` into `to` using one snapshot.
///
/// Foreign to TRY multiplies by the source leg's unit rate, TRY to foreign
/// divides by the target leg's unit rate and foreign to foreign does both.
pub fn convert(
    snapshot: &RateSnapshot,
    amount: Decimal,
    from: &str,
    to: &str,
    policy: ConversionPolicy,
) -> Result<Conversion, RateError> {
    if amount <= Decimal::ZERO {
        return Err(RateError::InvalidAmount(format!(
            "{amount}, amount must be greater than zero"
        )));
    }
    let from = normalize_code(from);
    let to = normalize_code(to);

    let (source_rate, source_leg) = if from == BASE_CURRENCY {
        (None, None)
    } else {
        let record = snapshot.require(&from)?;
        (
            Some(record.require_unit_rate(policy.source_leg)?),
            Some(policy.source_leg),
        )
    };
    let (target_rate, target_leg) = if to == BASE_CURRENCY {
        (None, None)
    } else {
        let record = snapshot.require(&to)?;
        (
            Some(record.require_unit_rate(policy.target_leg)?),
            Some(policy.target_leg),
        )
    };

    let (converted, rate, source_leg, target_leg) = if from == to {
        (amount, Decimal::ONE, None, None)
    } else {
        let in_base = source_rate.map_or(amount, |rate| amount * rate);
        let converted = target_rate.map_or(in_base, |rate| in_base / rate);
        (converted, converted / amount, source_leg, target_leg)
    };

    debug!(
        "Converted {} {} to {} {} on {}",
        amount, from, converted, to, snapshot.date
    );

    Ok(Conversion {
        amount,
        from,
        to,
        converted: converted.round_dp(4).normalize(),
        rate: rate.round_dp(6).normalize(),
        date: snapshot.date,
        source_leg,
        target_leg,
    })
}

fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub rate: Decimal,
    pub buying: Option<Decimal>,
    pub selling: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub min: Decimal,
    pub max: Decimal,
    pub mean: Decimal,
    /// Percent change from the first point to the last.
    pub change_percent: Decimal,
    /// Sample standard deviation; zero for a single point.
    pub volatility: Decimal,
    pub points: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateHistory {
    pub currency: String,
    pub kind: RateKind,
    pub unit: u32,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub points: Vec<HistoryPoint>,
    pub stats: HistoryStats,
    /// Business days without a bulletin.
    pub gaps: Vec<NaiveDate>,
    /// Days whose bulletin lacks the currency or the requested rate.
    pub missing_currency: Vec<NaiveDate>,
}

/// Summary statistics of a series; `None` for an empty series.
pub fn summarize(values: &[Decimal]) -> Option<HistoryStats> {
    let first = *values.first()?;
    let last = *values.last()?;
    let count = Decimal::from(values.len());

    let min = values.iter().copied().min()?;
    let max = values.iter().copied().max()?;
    let mean = values.iter().copied().sum::<Decimal>() / count;

    let change_percent = if first.is_zero() {
        Decimal::ZERO
    } else {
        (last - first) / first * Decimal::ONE_HUNDRED
    };

    let volatility = if values.len() < 2 {
        Decimal::ZERO
    } else {
        let variance = values
            .iter()
            .map(|value| (*value - mean) * (*value - mean))
            .sum::<Decimal>()
            / (count - Decimal::ONE);
        variance.sqrt().unwrap_or(Decimal::ZERO)
    };

    Some(HistoryStats {
        min,
        max,
        mean: mean.round_dp(4),
        change_percent: change_percent.round_dp(2),
        volatility: volatility.round_dp(4),
        points: values.len(),
    })
}

/// Builds the series of `currency` over date-ordered `snapshots`.
///
/// Fails with `UnknownCurrency` when no snapshot yields a point.
pub fn build_history(
    currency: &str,
    kind: RateKind,
    start: NaiveDate,
    end: NaiveDate,
    snapshots: &[RateSnapshot],
    gaps: Vec<NaiveDate>,
) -> Result<RateHistory, RateError> {
    let currency = normalize_code(currency);
    let mut points = Vec::new();
    let mut missing_currency = Vec::new();
    let mut unit = 1;

    for snapshot in snapshots {
        match snapshot.get(&currency) {
            Some(record) => match record.rate(kind) {
                Some(rate) => {
                    unit = record.unit;
                    points.push(HistoryPoint {
                        date: snapshot.date,
                        rate,
                        buying: record.forex_buying,
                        selling: record.forex_selling,
                    });
                }
                None => missing_currency.push(snapshot.date),
            },
            None => missing_currency.push(snapshot.date),
        }
    }

    let values: Vec<Decimal> = points.iter().map(|point| point.rate).collect();
    let stats = summarize(&values).ok_or_else(|| RateError::UnknownCurrency(currency.clone()))?;

    Ok(RateHistory {
        currency,
        kind,
        unit,
        start,
        end,
        points,
        stats,
        gaps,
        missing_currency,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub code: String,
    pub name: String,
    pub unit: u32,
    /// Rate on the start date; only set for range comparisons.
    pub start_rate: Option<Decimal>,
    pub rate: Decimal,
    pub change_percent: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub kind: RateKind,
    pub start_date: Option<NaiveDate>,
    pub date: NaiveDate,
    pub rows: Vec<ComparisonRow>,
    /// Requested codes absent from the bulletin(s).
    pub missing: Vec<String>,
    /// Dates whose bulletin could not be fetched.
    pub gaps: Vec<NaiveDate>,
}

/// Period length used when a range comparison names no start date.
pub const DEFAULT_COMPARE_DAYS: i64 = 30;

/// What a comparison covers: one bulletin, or the change between two dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparePeriod {
    On(NaiveDate),
    Between { start: NaiveDate, end: NaiveDate },
}

impl ComparePeriod {
    /// `date` wins over a range. A missing `end` is today and a missing
    /// `start` lies `days` (default 30) before the end.
    pub fn from_args(
        date: Option<NaiveDate>,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        days: Option<i64>,
        today: NaiveDate,
    ) -> Result<Self, RateError> {
        if let Some(date) = date {
            return Ok(ComparePeriod::On(date));
        }
        let end = end.unwrap_or(today);
        let start = match start {
            Some(start) => start,
            None => {
                let days = days.unwrap_or(DEFAULT_COMPARE_DAYS);
                if !(1..=MAX_RANGE_DAYS).contains(&days) {
                    return Err(RateError::InvalidRange(format!(
                        "days must be between 1 and {MAX_RANGE_DAYS}, got {days}"
                    )));
                }
                end - Duration::days(days)
            }
        };
        Ok(ComparePeriod::Between { start, end })
    }
}

fn unique_codes(codes: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(codes.len());
    for code in codes.iter().map(|code| normalize_code(code)) {
        if !code.is_empty() && !unique.contains(&code) {
            unique.push(code);
        }
    }
    unique
}

/// Rates of several currencies from one bulletin.
pub fn compare_on(snapshot: &RateSnapshot, codes: &[String], kind: RateKind) -> Comparison {
    let mut rows = Vec::new();
    let mut missing = Vec::new();

    for code in unique_codes(codes) {
        match snapshot.get(&code).and_then(|record| Some((record, record.rate(kind)?))) {
            Some((record, rate)) => rows.push(ComparisonRow {
                code,
                name: record.name.clone(),
                unit: record.unit,
                start_rate: None,
                rate,
                change_percent: None,
            }),
            None => missing.push(code),
        }
    }

    Comparison {
        kind,
        start_date: None,
        date: snapshot.date,
        rows,
        missing,
        gaps: Vec::new(),
    }
}

/// Rates of several currencies at the end of a period with their change
/// since `start_date`.
///
/// Without a start bulletin the rows carry only end rates and `start_date`
/// is listed in `gaps`. A currency missing only at the start keeps its row
/// without a change.
pub fn compare_between(
    start_date: NaiveDate,
    start: Option<&RateSnapshot>,
    end: &RateSnapshot,
    codes: &[String],
    kind: RateKind,
) -> Comparison {
    let mut rows = Vec::new();
    let mut missing = Vec::new();

    for code in unique_codes(codes) {
        let Some((record, rate)) = end
            .get(&code)
            .and_then(|record| Some((record, record.rate(kind)?)))
        else {
            missing.push(code);
            continue;
        };
        let start_rate = start
            .and_then(|snapshot| snapshot.get(&code))
            .and_then(|record| record.rate(kind));
        let change_percent = start_rate
            .filter(|start_rate| !start_rate.is_zero())
            .map(|start_rate| {
                ((rate - start_rate) / start_rate * Decimal::ONE_HUNDRED).round_dp(2)
            });
        rows.push(ComparisonRow {
            code,
            name: record.name.clone(),
            unit: record.unit,
            start_rate,
            rate,
            change_percent,
        });
    }

    Comparison {
        kind,
        start_date: Some(start.map_or(start_date, |snapshot| snapshot.date)),
        date: end.date,
        rows,
        missing,
        gaps: if start.is_none() { vec![start_date] } else { Vec::new() },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::fixtures::{record, snapshot};
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    }

    fn market() -> RateSnapshot {
        let mut snap = snapshot(
            day(),
            &[
                ("USD", dec!(30.40), dec!(30.50)),
                ("EUR", dec!(33.00), dec!(33.20)),
            ],
        );
        let mut jpy = record("JPY", day(), dec!(20.00), dec!(20.80));
        jpy.unit = 100;
        snap.rates.insert("JPY".to_string(), jpy);
        snap
    }

    fn codes(list: &[&str]) -> Vec<String> {
        list.iter().map(|code| code.to_string()).collect()
    }

    #[test]
    fn test_foreign_to_try_uses_selling() {
        let result = convert(&market(), dec!(1000), "USD", "TRY", ConversionPolicy::default())
            .unwrap();
        assert_eq!(result.converted, dec!(30500));
        assert_eq!(result.rate, dec!(30.5));
        assert_eq!(result.source_leg, Some(RateKind::ForexSelling));
        assert_eq!(result.target_leg, None);
    }

    #[test]
    fn test_try_to_foreign_divides_by_buying() {
        let result = convert(&market(), dec!(3040), "try", "usd", ConversionPolicy::default())
            .unwrap();
        assert_eq!(result.from, "TRY");
        assert_eq!(result.to, "USD");
        assert_eq!(result.converted, dec!(100));
        assert_eq!(result.target_leg, Some(RateKind::ForexBuying));
    }

    #[test]
    fn test_cross_conversion_goes_through_try() {
        let result = convert(&market(), dec!(100), "EUR", "USD", ConversionPolicy::default())
            .unwrap();
        // 100 * 33.20 / 30.40
        assert_eq!(result.converted, dec!(109.2105));
    }

    #[test]
    fn test_round_trip_loses_at_most_the_spread() {
        let policy = ConversionPolicy::default();
        let there = convert(&market(), dec!(1000), "USD", "TRY", policy).unwrap();
        let back = convert(&market(), there.converted, "TRY", "USD", policy).unwrap();
        assert!(back.converted >= dec!(1000));
        assert!(back.converted <= dec!(1003.29));
    }

    #[test]
    fn test_uniform_policy_and_units() {
        let result = convert(
            &market(),
            dec!(1000),
            "JPY",
            "TRY",
            ConversionPolicy::uniform(RateKind::ForexBuying),
        )
        .unwrap();
        // 20.00 per 100 yen
        assert_eq!(result.converted, dec!(200));
    }

    #[test]
    fn test_same_currency_is_identity() {
        let result = convert(&market(), dec!(42.5), "USD", "USD", ConversionPolicy::default())
            .unwrap();
        assert_eq!(result.converted, dec!(42.5));
        assert_eq!(result.rate, Decimal::ONE);
    }

    #[test]
    fn test_conversion_errors() {
        let policy = ConversionPolicy::default();
        assert!(matches!(
            convert(&market(), Decimal::ZERO, "USD", "TRY", policy),
            Err(RateError::InvalidAmount(_))
        ));
        assert!(matches!(
            convert(&market(), dec!(-5), "USD", "TRY", policy),
            Err(RateError::InvalidAmount(_))
        ));
        assert!(matches!(
            convert(&market(), dec!(5), "XYZ", "TRY", policy),
            Err(RateError::UnknownCurrency(code)) if code == "XYZ"
        ));
        assert!(matches!(
            convert(
                &market(),
                dec!(5),
                "USD",
                "TRY",
                ConversionPolicy::uniform(RateKind::BanknoteSelling)
            ),
            Err(RateError::RateUnavailable { .. })
        ));
    }

    #[test]
    fn test_summarize_constant_series() {
        let stats = summarize(&[dec!(30.5); 5]).unwrap();
        assert_eq!(stats.min, dec!(30.5));
        assert_eq!(stats.max, dec!(30.5));
        assert_eq!(stats.mean, dec!(30.5));
        assert_eq!(stats.change_percent, Decimal::ZERO);
        assert_eq!(stats.volatility, Decimal::ZERO);
        assert_eq!(stats.points, 5);
    }

    #[test]
    fn test_summarize_series() {
        let stats = summarize(&[dec!(10), dec!(12), dec!(11)]).unwrap();
        assert_eq!(stats.min, dec!(10));
        assert_eq!(stats.max, dec!(12));
        assert_eq!(stats.mean, dec!(11));
        assert_eq!(stats.change_percent, dec!(10));
        assert_eq!(stats.volatility, dec!(1));

        let single = summarize(&[dec!(7)]).unwrap();
        assert_eq!(single.volatility, Decimal::ZERO);
        assert!(summarize(&[]).is_none());
    }

    #[test]
    fn test_build_history_tracks_gaps_and_missing_days() {
        let d1 = day();
        let d2 = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let d3 = NaiveDate::from_ymd_opt(2024, 1, 17).unwrap();
        let d4 = NaiveDate::from_ymd_opt(2024, 1, 18).unwrap();
        let snapshots = vec![
            snapshot(d1, &[("USD", dec!(30.00), dec!(30.10))]),
            snapshot(d2, &[("EUR", dec!(33.00), dec!(33.10))]),
            snapshot(d4, &[("USD", dec!(30.20), dec!(30.40))]),
        ];

        let history = build_history("usd", RateKind::ForexSelling, d1, d4, &snapshots, vec![d3])
            .unwrap();
        assert_eq!(history.currency, "USD");
        assert_eq!(history.points.len(), 2);
        assert_eq!(history.points[1].rate, dec!(30.40));
        assert_eq!(history.points[1].buying, Some(dec!(30.20)));
        assert_eq!(history.gaps, vec![d3]);
        assert_eq!(history.missing_currency, vec![d2]);
        assert_eq!(history.stats.change_percent, dec!(1.00));
    }

    #[test]
    fn test_build_history_without_points_fails() {
        let snapshots = vec![snapshot(day(), &[("USD", dec!(30.00), dec!(30.10))])];
        let err = build_history("GBP", RateKind::ForexSelling, day(), day(), &snapshots, vec![])
            .unwrap_err();
        assert_eq!(err.code(), "TCMB_CURRENCY_NOT_FOUND");
    }

    #[test]
    fn test_compare_reports_missing_currency() {
        let snap = snapshot(
            day(),
            &[
                ("USD", dec!(30.40), dec!(30.50)),
                ("GBP", dec!(38.60), dec!(38.80)),
            ],
        );
        let comparison = compare_on(&snap, &codes(&["USD", "EUR", "gbp", "USD"]), RateKind::ForexSelling);

        let rows: Vec<_> = comparison.rows.iter().map(|row| row.code.as_str()).collect();
        assert_eq!(rows, vec!["USD", "GBP"]);
        assert_eq!(comparison.rows[1].rate, dec!(38.80));
        assert_eq!(comparison.missing, vec!["EUR"]);
        assert_eq!(comparison.start_date, None);
    }

    #[test]
    fn test_compare_between_dates() {
        let later = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        let start = snapshot(
            day(),
            &[("USD", dec!(30.00), dec!(30.00)), ("GBP", dec!(38.00), dec!(38.00))],
        );
        let end = snapshot(
            later,
            &[("USD", dec!(31.00), dec!(31.50)), ("EUR", dec!(33.00), dec!(33.40))],
        );

        let comparison = compare_between(
            day(),
            Some(&start),
            &end,
            &codes(&["USD", "EUR", "GBP"]),
            RateKind::ForexSelling,
        );
        assert_eq!(comparison.start_date, Some(day()));
        assert_eq!(comparison.date, later);
        assert_eq!(comparison.rows.len(), 2);
        assert_eq!(comparison.rows[0].start_rate, Some(dec!(30.00)));
        assert_eq!(comparison.rows[0].change_percent, Some(dec!(5.00)));
        // EUR is quoted at the end only: the row stays, without a change.
        assert_eq!(comparison.rows[1].code, "EUR");
        assert_eq!(comparison.rows[1].rate, dec!(33.40));
        assert_eq!(comparison.rows[1].start_rate, None);
        assert_eq!(comparison.rows[1].change_percent, None);
        assert_eq!(comparison.missing, vec!["GBP"]);
        assert!(comparison.gaps.is_empty());
    }

    #[test]
    fn test_compare_between_without_start_bulletin() {
        let later = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
        let end = snapshot(later, &[("USD", dec!(31.00), dec!(31.50))]);

        let comparison =
            compare_between(day(), None, &end, &codes(&["USD"]), RateKind::ForexSelling);
        assert_eq!(comparison.rows.len(), 1);
        assert_eq!(comparison.rows[0].rate, dec!(31.50));
        assert_eq!(comparison.rows[0].change_percent, None);
        assert_eq!(comparison.start_date, Some(day()));
        assert_eq!(comparison.gaps, vec![day()]);
        assert!(comparison.missing.is_empty());
    }

    #[test]
    fn test_compare_period_defaults() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert_eq!(
            ComparePeriod::from_args(Some(day()), None, None, Some(7), today).unwrap(),
            ComparePeriod::On(day())
        );
        assert_eq!(
            ComparePeriod::from_args(None, None, None, None, today).unwrap(),
            ComparePeriod::Between {
                start: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
                end: today
            }
        );
        assert_eq!(
            ComparePeriod::from_args(None, Some(day()), None, Some(400), today).unwrap(),
            ComparePeriod::Between { start: day(), end: today }
        );
        let err = ComparePeriod::from_args(None, None, None, Some(0), today).unwrap_err();
        assert_eq!(err.code(), "TCMB_DATE_RANGE");
    }
}
