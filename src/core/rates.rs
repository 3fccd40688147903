//! Rate records and snapshots as published in one TCMB bulletin

use crate::core::error::RateError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

/// The local currency every published rate is quoted in.
pub const BASE_CURRENCY: &str = "TRY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateKind {
    ForexBuying,
    ForexSelling,
    BanknoteBuying,
    BanknoteSelling,
}

impl RateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateKind::ForexBuying => "forex_buying",
            RateKind::ForexSelling => "forex_selling",
            RateKind::BanknoteBuying => "banknote_buying",
            RateKind::BanknoteSelling => "banknote_selling",
        }
    }
}

impl Display for RateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RateKind {
    type Err = RateError;

    /// Accepts the four full names plus `buying`/`selling` for the forex pair.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buying" | "forex_buying" => Ok(RateKind::ForexBuying),
            "selling" | "forex_selling" => Ok(RateKind::ForexSelling),
            "banknote_buying" => Ok(RateKind::BanknoteBuying),
            "banknote_selling" => Ok(RateKind::BanknoteSelling),
            other => Err(RateError::InvalidRateType(format!(
                "'{other}', expected buying, selling, forex_buying, forex_selling, banknote_buying or banknote_selling"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateRecord {
    pub code: String,
    pub date: NaiveDate,
    pub name: String,
    pub name_tr: String,
    /// Number of foreign units the rates are quoted for (100 for JPY).
    pub unit: u32,
    pub forex_buying: Option<Decimal>,
    pub forex_selling: Option<Decimal>,
    pub banknote_buying: Option<Decimal>,
    pub banknote_selling: Option<Decimal>,
    pub cross_rate_usd: Option<Decimal>,
}

impl RateRecord {
    pub fn rate(&self, kind: RateKind) -> Option<Decimal> {
        match kind {
            RateKind::ForexBuying => self.forex_buying,
            RateKind::ForexSelling => self.forex_selling,
            RateKind::BanknoteBuying => self.banknote_buying,
            RateKind::BanknoteSelling => self.banknote_selling,
        }
    }

    /// Rate for a single foreign unit.
    pub fn unit_rate(&self, kind: RateKind) -> Option<Decimal> {
        let unit = Decimal::from(self.unit.max(1));
        self.rate(kind).map(|rate| rate / unit)
    }

    pub(crate) fn require_unit_rate(&self, kind: RateKind) -> Result<Decimal, RateError> {
        match self.unit_rate(kind) {
            Some(rate) if !rate.is_zero() => Ok(rate),
            _ => Err(RateError::RateUnavailable {
                currency: self.code.clone(),
                kind: kind.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub date: NaiveDate,
    pub bulletin_no: Option<String>,
    pub rates: BTreeMap<String, RateRecord>,
}

impl RateSnapshot {
    pub fn new(date: NaiveDate, bulletin_no: Option<String>, records: Vec<RateRecord>) -> Self {
        let rates = records
            .into_iter()
            .map(|record| (record.code.clone(), record))
            .collect();
        Self {
            date,
            bulletin_no,
            rates,
        }
    }

    /// Case-insensitive lookup by currency code.
    pub fn get(&self, code: &str) -> Option<&RateRecord> {
        self.rates.get(&code.trim().to_uppercase())
    }

    pub fn require(&self, code: &str) -> Result<&RateRecord, RateError> {
        self.get(code)
            .ok_or_else(|| RateError::UnknownCurrency(code.trim().to_uppercase()))
    }

    /// Keeps only the requested codes; an empty filter keeps everything.
    pub fn filtered(&self, codes: &[String]) -> Vec<RateRecord> {
        if codes.is_empty() {
            return self.rates.values().cloned().collect();
        }
        codes.iter().filter_map(|code| self.get(code).cloned()).collect()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn record(code: &str, date: NaiveDate, buying: Decimal, selling: Decimal) -> RateRecord {
        RateRecord {
            code: code.to_string(),
            date,
            name: code.to_string(),
            name_tr: code.to_string(),
            unit: 1,
            forex_buying: Some(buying),
            forex_selling: Some(selling),
            banknote_buying: None,
            banknote_selling: None,
            cross_rate_usd: None,
        }
    }

    pub fn snapshot(date: NaiveDate, rates: &[(&str, Decimal, Decimal)]) -> RateSnapshot {
        RateSnapshot::new(
            date,
            None,
            rates
                .iter()
                .map(|(code, buying, selling)| record(code, date, *buying, *selling))
                .collect(),
        )
    }
}
