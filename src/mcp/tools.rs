//! The six rate tools: schemas, argument parsing and result shaping.

use crate::core::analytics::{self, ComparePeriod, ConversionPolicy, DEFAULT_COMPARE_DAYS};
use crate::core::calendar::parse_date;
use crate::core::error::RateError;
use crate::core::rates::{BASE_CURRENCY, RateKind, RateRecord};
use crate::service::{RateService, ResolvedRates};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;

pub const CURRENT_RATES: &str = "tcmb_get_current_rates";
pub const HISTORICAL_RATES: &str = "tcmb_get_historical_rates";
pub const LIST_CURRENCIES: &str = "tcmb_list_currencies";
pub const CONVERT_CURRENCY: &str = "tcmb_convert_currency";
pub const RATE_HISTORY: &str = "tcmb_get_rate_history";
pub const COMPARE_CURRENCIES: &str = "tcmb_compare_currencies";

#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments that do not fit the tool's schema.
    #[error("Invalid arguments: {0}")]
    InvalidParams(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error(transparent)]
    Rate(#[from] RateError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// One code, a comma separated list, or an array of codes.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CodeList {
    One(String),
    Many(Vec<String>),
}

impl CodeList {
    fn into_codes(self) -> Vec<String> {
        let raw = match self {
            CodeList::One(text) => text.split(',').map(str::to_string).collect(),
            CodeList::Many(codes) => codes,
        };
        raw.into_iter()
            .map(|code| code.trim().to_uppercase())
            .filter(|code| !code.is_empty())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct CurrentRatesArgs {
    currencies: Option<CodeList>,
}

#[derive(Debug, Deserialize)]
struct HistoricalRatesArgs {
    date: String,
    currencies: Option<CodeList>,
}

#[derive(Debug, Deserialize)]
struct ListCurrenciesArgs {
    #[serde(default)]
    include_rates: bool,
}

#[derive(Debug, Deserialize)]
struct ConvertArgs {
    amount: Decimal,
    from_currency: String,
    to_currency: String,
    date: Option<String>,
    rate_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoryArgs {
    currency: String,
    start_date: String,
    end_date: String,
    rate_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompareArgs {
    currencies: CodeList,
    date: Option<String>,
    start_date: Option<String>,
    end_date: Option<String>,
    days: Option<i64>,
}

fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

/// Tool descriptors returned by `tools/list`.
pub fn tool_definitions() -> Vec<Value> {
    let currencies = json!({
        "type": "array",
        "items": {"type": "string"},
        "description": "ISO currency codes such as USD, EUR. Omit for all currencies."
    });
    let date = |description: &str| {
        json!({"type": "string", "description": description})
    };
    let rate_type = json!({
        "type": "string",
        "enum": ["buying", "selling", "forex_buying", "forex_selling", "banknote_buying", "banknote_selling"]
    });

    vec![
        json!({
            "name": CURRENT_RATES,
            "description": "Latest TCMB exchange rates against the Turkish lira.",
            "inputSchema": {
                "type": "object",
                "properties": {"currencies": currencies}
            }
        }),
        json!({
            "name": HISTORICAL_RATES,
            "description": "TCMB exchange rates for a past date. Weekends and holidays use the previous business day.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "date": date("YYYY-MM-DD, DD.MM.YYYY, today or yesterday"),
                    "currencies": currencies
                },
                "required": ["date"]
            }
        }),
        json!({
            "name": LIST_CURRENCIES,
            "description": "Currencies published by TCMB.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "include_rates": {"type": "boolean", "default": false}
                }
            }
        }),
        json!({
            "name": CONVERT_CURRENCY,
            "description": "Converts an amount between two currencies (TRY included) using TCMB rates.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "amount": {"type": "number", "exclusiveMinimum": 0},
                    "from_currency": {"type": "string"},
                    "to_currency": {"type": "string"},
                    "date": date("Optional date of the rates, defaults to the latest bulletin"),
                    "rate_type": rate_type
                },
                "required": ["amount", "from_currency", "to_currency"]
            }
        }),
        json!({
            "name": RATE_HISTORY,
            "description": "Daily rates of one currency over a period with min, max, mean, change and volatility.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "currency": {"type": "string"},
                    "start_date": date("First day of the period"),
                    "end_date": date("Last day of the period"),
                    "rate_type": rate_type
                },
                "required": ["currency", "start_date", "end_date"]
            }
        }),
        json!({
            "name": COMPARE_CURRENCIES,
            "description": "Compares several currencies on one date, or their change over a period (last 30 days by default).",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "currencies": currencies,
                    "date": date("Compare on this single date"),
                    "start_date": date("Start of the comparison period"),
                    "end_date": date("End of the comparison period, defaults to today"),
                    "days": {"type": "integer", "minimum": 1, "maximum": 365, "default": DEFAULT_COMPARE_DAYS}
                },
                "required": ["currencies"]
            }
        }),
    ]
}

/// Runs one tool and returns its JSON payload.
pub async fn call_tool(
    service: &RateService,
    policy: ConversionPolicy,
    name: &str,
    arguments: Value,
) -> Result<Value, ToolError> {
    match name {
        CURRENT_RATES => {
            let args: CurrentRatesArgs = parse_args(arguments)?;
            let rates = service.current_rates().await?;
            Ok(rates_payload(&rates, args.currencies))
        }
        HISTORICAL_RATES => {
            let args: HistoricalRatesArgs = parse_args(arguments)?;
            let date = parse_date(&args.date, service.today())?;
            let rates = service.rates_for_date(date).await?;
            Ok(rates_payload(&rates, args.currencies))
        }
        LIST_CURRENCIES => {
            let args: ListCurrenciesArgs = parse_args(arguments)?;
            list_currencies(service, args.include_rates).await
        }
        CONVERT_CURRENCY => convert(service, policy, parse_args(arguments)?).await,
        RATE_HISTORY => history(service, parse_args(arguments)?).await,
        COMPARE_CURRENCIES => compare(service, parse_args(arguments)?).await,
        other => Err(ToolError::UnknownTool(other.to_string())),
    }
}

fn record_json(record: &RateRecord) -> Value {
    json!({
        "code": record.code,
        "name": record.name,
        "name_tr": record.name_tr,
        "unit": record.unit,
        "forex_buying": record.forex_buying,
        "forex_selling": record.forex_selling,
        "banknote_buying": record.banknote_buying,
        "banknote_selling": record.banknote_selling,
        "cross_rate_usd": record.cross_rate_usd,
    })
}

fn rates_payload(rates: &ResolvedRates, filter: Option<CodeList>) -> Value {
    let codes = filter.map(CodeList::into_codes).unwrap_or_default();
    let records: Vec<Value> = rates.snapshot.filtered(&codes).iter().map(record_json).collect();
    let missing: Vec<&String> = codes
        .iter()
        .filter(|code| rates.snapshot.get(code).is_none())
        .collect();

    json!({
        "date": rates.effective_date,
        "requested_date": rates.requested_date,
        "bulletin_no": rates.snapshot.bulletin_no,
        "base_currency": BASE_CURRENCY,
        "from_cache": rates.from_cache,
        "notice": rates.notice,
        "count": records.len(),
        "rates": records,
        "missing": missing,
    })
}

async fn list_currencies(service: &RateService, include_rates: bool) -> Result<Value, ToolError> {
    if include_rates {
        let rates = service.current_rates().await?;
        return Ok(json!({
            "date": rates.effective_date,
            "count": rates.snapshot.rates.len(),
            "currencies": rates.snapshot.rates.values().map(record_json).collect::<Vec<_>>(),
        }));
    }
    let list = service.list_currencies().await?;
    Ok(json!({
        "date": list.date,
        "count": list.currencies.len(),
        "currencies": list.currencies,
    }))
}

fn parse_kind(rate_type: Option<&str>) -> Result<Option<RateKind>, ToolError> {
    rate_type
        .map(str::parse::<RateKind>)
        .transpose()
        .map_err(ToolError::from)
}

async fn convert(
    service: &RateService,
    policy: ConversionPolicy,
    args: ConvertArgs,
) -> Result<Value, ToolError> {
    let policy = match parse_kind(args.rate_type.as_deref())? {
        Some(kind) => ConversionPolicy::uniform(kind),
        None => policy,
    };
    if args.amount <= Decimal::ZERO {
        return Err(RateError::InvalidAmount(format!(
            "{}, amount must be greater than zero",
            args.amount
        ))
        .into());
    }

    let rates = match args.date.as_deref() {
        Some(date) => service.rates_for_date(parse_date(date, service.today())?).await?,
        None => service.current_rates().await?,
    };
    let conversion = analytics::convert(
        &rates.snapshot,
        args.amount,
        &args.from_currency,
        &args.to_currency,
        policy,
    )?;

    Ok(json!({
        "amount": conversion.amount,
        "from_currency": conversion.from,
        "to_currency": conversion.to,
        "converted_amount": conversion.converted,
        "rate": conversion.rate,
        "source_leg": conversion.source_leg,
        "target_leg": conversion.target_leg,
        "date": conversion.date,
        "requested_date": rates.requested_date,
        "notice": rates.notice,
    }))
}

async fn history(service: &RateService, args: HistoryArgs) -> Result<Value, ToolError> {
    let kind = parse_kind(args.rate_type.as_deref())?.unwrap_or(RateKind::ForexSelling);
    let today = service.today();
    let start = parse_date(&args.start_date, today)?;
    let end = parse_date(&args.end_date, today)?;

    let range = service.rates_for_range(start, end).await?;
    let snapshots: Vec<_> = range.snapshots.into_iter().map(|r| r.snapshot).collect();
    let gaps = range.failed.iter().map(|(date, _)| *date).collect();
    let history = analytics::build_history(&args.currency, kind, start, end, &snapshots, gaps)?;

    serde_json::to_value(&history).map_err(|e| ToolError::Internal(e.to_string()))
}

async fn compare(service: &RateService, args: CompareArgs) -> Result<Value, ToolError> {
    let codes = args.currencies.into_codes();
    if codes.is_empty() {
        return Err(ToolError::InvalidParams(
            "currencies must name at least one currency".to_string(),
        ));
    }
    let today = service.today();
    let parse = |value: Option<String>| value.map(|v| parse_date(&v, today)).transpose();

    let period = ComparePeriod::from_args(
        parse(args.date)?,
        parse(args.start_date)?,
        parse(args.end_date)?,
        args.days,
        today,
    )?;
    let comparison = service
        .compare(&codes, period, RateKind::ForexSelling)
        .await?;

    serde_json::to_value(&comparison).map_err(|e| ToolError::Internal(e.to_string()))
}
