//! Error taxonomy shared by the resolver, feed client, parser and analytics.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;

/// Whether a failed fetch is worth repeating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Network error, timeout, 5xx or throttling.
    Transient,
    /// 4xx: the document does not exist or the request is wrong.
    Permanent,
}

impl Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchErrorKind::Transient => write!(f, "transient"),
            FetchErrorKind::Permanent => write!(f, "permanent"),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum RateError {
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("No rates are published before {earliest}, requested {date}")]
    UnsupportedDate { date: NaiveDate, earliest: NaiveDate },

    #[error("Invalid date range: {0}")]
    InvalidRange(String),

    #[error("Could not find a business day within {steps} days before {date}")]
    Resolution { date: NaiveDate, steps: u32 },

    #[error("Fetching {url} failed ({kind}): {message}")]
    Fetch {
        url: String,
        kind: FetchErrorKind,
        status: Option<u16>,
        message: String,
    },

    #[error("Failed to parse rate document: {0}")]
    Parse(String),

    #[error("Currency not found: {0}")]
    UnknownCurrency(String),

    #[error("No {kind} rate published for {currency}")]
    RateUnavailable { currency: String, kind: String },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid rate type: {0}")]
    InvalidRateType(String),
}

impl RateError {
    /// Stable machine-readable code reported at the tool boundary.
    pub fn code(&self) -> &'static str {
        match self {
            RateError::InvalidDate(_) => "TCMB_INVALID_DATE",
            RateError::UnsupportedDate { .. } => "TCMB_UNSUPPORTED_DATE",
            RateError::InvalidRange(_) => "TCMB_DATE_RANGE",
            RateError::Resolution { .. } => "TCMB_RESOLUTION_ERROR",
            RateError::Fetch {
                kind: FetchErrorKind::Transient,
                ..
            } => "TCMB_CONNECTION_ERROR",
            RateError::Fetch {
                kind: FetchErrorKind::Permanent,
                ..
            } => "TCMB_API_ERROR",
            RateError::Parse(_) => "TCMB_PARSE_ERROR",
            RateError::UnknownCurrency(_) => "TCMB_CURRENCY_NOT_FOUND",
            RateError::RateUnavailable { .. } => "TCMB_RATE_UNAVAILABLE",
            RateError::InvalidAmount(_) => "TCMB_INVALID_AMOUNT",
            RateError::InvalidRateType(_) => "TCMB_INVALID_RATE_TYPE",
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RateError::Fetch {
                kind: FetchErrorKind::Transient,
                ..
            }
        )
    }

    /// True for a 404 on a feed document, i.e. no bulletin for that day.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RateError::Fetch {
                status: Some(404),
                ..
            }
        )
    }

    pub(crate) fn transient(url: &str, status: Option<u16>, message: impl Display) -> Self {
        RateError::Fetch {
            url: url.to_string(),
            kind: FetchErrorKind::Transient,
            status,
            message: message.to_string(),
        }
    }

    pub(crate) fn permanent(url: &str, status: Option<u16>, message: impl Display) -> Self {
        RateError::Fetch {
            url: url.to_string(),
            kind: FetchErrorKind::Permanent,
            status,
            message: message.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_codes_follow_kind() {
        let transient = RateError::transient("http://x", Some(503), "unavailable");
        let permanent = RateError::permanent("http://x", Some(404), "not found");

        assert_eq!(transient.code(), "TCMB_CONNECTION_ERROR");
        assert!(transient.is_transient());
        assert!(!transient.is_not_found());

        assert_eq!(permanent.code(), "TCMB_API_ERROR");
        assert!(!permanent.is_transient());
        assert!(permanent.is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = RateError::UnsupportedDate {
            date: NaiveDate::from_ymd_opt(1990, 5, 1).unwrap(),
            earliest: NaiveDate::from_ymd_opt(1996, 1, 2).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "No rates are published before 1996-01-02, requested 1990-05-01"
        );
        assert_eq!(
            RateError::UnknownCurrency("XYZ".to_string()).to_string(),
            "Currency not found: XYZ"
        );
    }
}
