//! Parser for the TCMB daily bulletin XML.

use crate::core::error::RateError;
use crate::core::rates::{RateRecord, RateSnapshot};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct Bulletin {
    #[serde(rename = "@Tarih")]
    tarih: Option<String>,
    #[serde(rename = "@Date")]
    date: Option<String>,
    #[serde(rename = "@Bulten_No")]
    bulletin_no: Option<String>,
    #[serde(rename = "Currency", default)]
    currencies: Vec<CurrencyEntry>,
}

#[derive(Debug, Deserialize)]
struct CurrencyEntry {
    #[serde(rename = "@CurrencyCode")]
    code: Option<String>,
    #[serde(rename = "@Kod")]
    kod: Option<String>,
    #[serde(rename = "Unit")]
    unit: Option<String>,
    #[serde(rename = "Isim")]
    name_tr: Option<String>,
    #[serde(rename = "CurrencyName")]
    name: Option<String>,
    #[serde(rename = "ForexBuying")]
    forex_buying: Option<String>,
    #[serde(rename = "ForexSelling")]
    forex_selling: Option<String>,
    #[serde(rename = "BanknoteBuying")]
    banknote_buying: Option<String>,
    #[serde(rename = "BanknoteSelling")]
    banknote_selling: Option<String>,
    #[serde(rename = "CrossRateUSD")]
    cross_rate_usd: Option<String>,
}

/// Parses one bulletin into a snapshot.
///
/// Empty forex fields and empty or zero banknote fields become `None`.
/// A document that is not XML, lacks a valid date or lists no currencies
/// is a `Parse` error.
pub fn parse_bulletin(raw: &str) -> Result<RateSnapshot, RateError> {
    let raw = raw.trim_start_matches('\u{feff}');
    if raw.trim().is_empty() {
        return Err(RateError::Parse("empty document".to_string()));
    }

    let bulletin: Bulletin =
        quick_xml::de::from_str(raw).map_err(|e| RateError::Parse(e.to_string()))?;

    let date = bulletin_date(&bulletin)?;

    let records: Vec<RateRecord> = bulletin
        .currencies
        .into_iter()
        .filter_map(|entry| to_record(entry, date))
        .collect();

    if records.is_empty() {
        return Err(RateError::Parse(format!(
            "bulletin for {date} has no currency entries"
        )));
    }

    debug!(
        "Parsed bulletin {} for {} with {} currencies",
        bulletin.bulletin_no.as_deref().unwrap_or("-"),
        date,
        records.len()
    );

    Ok(RateSnapshot::new(
        date,
        bulletin.bulletin_no.filter(|no| !no.trim().is_empty()),
        records,
    ))
}

fn bulletin_date(bulletin: &Bulletin) -> Result<NaiveDate, RateError> {
    if let Some(tarih) = non_empty(bulletin.tarih.as_deref()) {
        return NaiveDate::parse_from_str(tarih, "%d.%m.%Y")
            .map_err(|e| RateError::Parse(format!("invalid bulletin date '{tarih}': {e}")));
    }
    if let Some(date) = non_empty(bulletin.date.as_deref()) {
        return NaiveDate::parse_from_str(date, "%m/%d/%Y")
            .map_err(|e| RateError::Parse(format!("invalid bulletin date '{date}': {e}")));
    }
    Err(RateError::Parse("bulletin has no date".to_string()))
}

fn to_record(entry: CurrencyEntry, date: NaiveDate) -> Option<RateRecord> {
    let code = non_empty(entry.code.as_deref())
        .or_else(|| non_empty(entry.kod.as_deref()))?
        .to_uppercase();

    let unit = match non_empty(entry.unit.as_deref()) {
        Some(unit) => match unit.parse::<u32>() {
            Ok(unit) if unit > 0 => unit,
            _ => {
                warn!("Ignoring invalid unit '{}' for {}", unit, code);
                1
            }
        },
        None => 1,
    };

    let banknote = |value: Option<String>, field: &str| {
        parse_decimal(value.as_deref(), &code, field).filter(|rate| !rate.is_zero())
    };

    Some(RateRecord {
        date,
        unit,
        name: non_empty(entry.name.as_deref()).unwrap_or(&code).to_string(),
        name_tr: non_empty(entry.name_tr.as_deref()).unwrap_or(&code).to_string(),
        forex_buying: parse_decimal(entry.forex_buying.as_deref(), &code, "ForexBuying"),
        forex_selling: parse_decimal(entry.forex_selling.as_deref(), &code, "ForexSelling"),
        banknote_buying: banknote(entry.banknote_buying, "BanknoteBuying"),
        banknote_selling: banknote(entry.banknote_selling, "BanknoteSelling"),
        cross_rate_usd: parse_decimal(entry.cross_rate_usd.as_deref(), &code, "CrossRateUSD"),
        code,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts `30.1234`, `30,1234` and `1,030.12`.
fn parse_decimal(value: Option<&str>, code: &str, field: &str) -> Option<Decimal> {
    let value = non_empty(value)?;
    let normalized = if value.contains(',') && value.contains('.') {
        value.replace(',', "")
    } else {
        value.replace(',', ".")
    };
    match Decimal::from_str(&normalized) {
        Ok(rate) => Some(rate),
        Err(e) => {
            warn!("Ignoring unparsable {} '{}' for {}: {}", field, value, code, e);
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;

    /// Builds a minimal bulletin quoting `(code, forex_buying, forex_selling)`.
    pub fn bulletin(date: NaiveDate, rates: &[(&str, &str, &str)]) -> String {
        let currencies: String = rates
            .iter()
            .map(|(code, buying, selling)| {
                format!(
                    "<Currency Kod=\"{code}\" CurrencyCode=\"{code}\"><Unit>1</Unit>\
                     <Isim>{code}</Isim><CurrencyName>{code}</CurrencyName>\
                     <ForexBuying>{buying}</ForexBuying><ForexSelling>{selling}</ForexSelling>\
                     <BanknoteBuying/><BanknoteSelling/></Currency>"
                )
            })
            .collect();
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Tarih_Date Tarih=\"{}\" Bulten_No=\"{}/1\">{}</Tarih_Date>",
            date.format("%d.%m.%Y"),
            date.format("%Y"),
            currencies
        )
    }

    /// A trimmed real bulletin: USD and EUR fully quoted, JPY per 100 units,
    /// XDR without banknote quotes.
    pub const BULLETIN_2024_01_15: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<?xml-stylesheet type="text/xsl" href="isokur.xsl"?>
<Tarih_Date Tarih="15.01.2024" Date="01/15/2024" Bulten_No="2024/10">
  <Currency CrossOrder="0" Kod="USD" CurrencyCode="USD">
    <Unit>1</Unit>
    <Isim>ABD DOLARI</Isim>
    <CurrencyName>US DOLLAR</CurrencyName>
    <ForexBuying>30.1234</ForexBuying>
    <ForexSelling>30.5000</ForexSelling>
    <BanknoteBuying>30.1023</BanknoteBuying>
    <BanknoteSelling>30.5600</BanknoteSelling>
    <CrossRateUSD/>
    <CrossRateOther/>
  </Currency>
  <Currency CrossOrder="9" Kod="EUR" CurrencyCode="EUR">
    <Unit>1</Unit>
    <Isim>EURO</Isim>
    <CurrencyName>EURO</CurrencyName>
    <ForexBuying>33.0012</ForexBuying>
    <ForexSelling>33.0607</ForexSelling>
    <BanknoteBuying>32.9781</BanknoteBuying>
    <BanknoteSelling>33.1103</BanknoteSelling>
    <CrossRateUSD/>
    <CrossRateOther>1.0954</CrossRateOther>
  </Currency>
  <Currency CrossOrder="12" Kod="JPY" CurrencyCode="JPY">
    <Unit>100</Unit>
    <Isim>JAPON YENİ</Isim>
    <CurrencyName>JAPENESE YEN</CurrencyName>
    <ForexBuying>20,7345</ForexBuying>
    <ForexSelling>20,8718</ForexSelling>
    <BanknoteBuying>20.6005</BanknoteBuying>
    <BanknoteSelling>20.9528</BanknoteSelling>
    <CrossRateUSD>145.28</CrossRateUSD>
    <CrossRateOther/>
  </Currency>
  <Currency CrossOrder="18" Kod="XDR" CurrencyCode="XDR">
    <Unit>1</Unit>
    <Isim>ÖZEL ÇEKME HAKKI (SDR)</Isim>
    <CurrencyName>SPECIAL DRAWING RIGHT (SDR)</CurrencyName>
    <ForexBuying>40.3421</ForexBuying>
    <ForexSelling/>
    <BanknoteBuying>0</BanknoteBuying>
    <BanknoteSelling></BanknoteSelling>
    <CrossRateUSD>0.74673</CrossRateUSD>
    <CrossRateOther/>
  </Currency>
</Tarih_Date>"#;
}
