use super::ui;
use crate::core::analytics::{
    self, ComparePeriod, Comparison, Conversion, ConversionPolicy, RateHistory,
};
use crate::core::rates::RateKind;
use crate::service::RateService;
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;
use rust_decimal::Decimal;

impl Conversion {
    pub fn display(&self) -> String {
        let legs: Vec<String> = [self.source_leg, self.target_leg]
            .into_iter()
            .flatten()
            .map(|kind| kind.to_string())
            .collect();
        let mut output = format!(
            "{} {} = {} {}\n",
            self.amount,
            self.from,
            ui::style_text(&format!("{:.4}", self.converted), ui::StyleType::TotalValue),
            ui::style_text(&self.to, ui::StyleType::TotalLabel),
        );
        output.push_str(&ui::note(&format!(
            "1 {} = {} {} on {}{}",
            self.from,
            self.rate,
            self.to,
            self.date,
            if legs.is_empty() {
                String::new()
            } else {
                format!(" ({})", legs.join(" / "))
            }
        )));
        output
    }
}

impl RateHistory {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Date"),
            ui::header_cell(&self.kind.to_string()),
            ui::header_cell("Forex Buying"),
            ui::header_cell("Forex Selling"),
        ]);
        for point in &self.points {
            table.add_row(vec![
                Cell::new(point.date),
                ui::rate_cell(Some(point.rate)),
                ui::rate_cell(point.buying),
                ui::rate_cell(point.selling),
            ]);
        }

        let mut stats = ui::new_styled_table();
        stats.set_header(vec![
            ui::header_cell("Min"),
            ui::header_cell("Max"),
            ui::header_cell("Mean"),
            ui::header_cell("Change"),
            ui::header_cell("Volatility"),
        ]);
        stats.add_row(vec![
            ui::rate_cell(Some(self.stats.min)),
            ui::rate_cell(Some(self.stats.max)),
            ui::rate_cell(Some(self.stats.mean)),
            ui::change_cell(Some(self.stats.change_percent)),
            ui::rate_cell(Some(self.stats.volatility)),
        ]);

        let unit = if self.unit > 1 {
            format!(" per {} units", self.unit)
        } else {
            String::new()
        };
        let mut output = format!(
            "{}{}\n\n{}\n\n{}",
            ui::style_text(
                &format!("{} {} from {} to {}", self.currency, self.kind, self.start, self.end),
                ui::StyleType::Title
            ),
            unit,
            table,
            stats
        );
        if !self.gaps.is_empty() {
            output.push_str(&format!(
                "\n{}",
                ui::note(&format!("No bulletin for: {}", join_dates(&self.gaps)))
            ));
        }
        if !self.missing_currency.is_empty() {
            output.push_str(&format!(
                "\n{}",
                ui::note(&format!(
                    "{} not quoted on: {}",
                    self.currency,
                    join_dates(&self.missing_currency)
                ))
            ));
        }
        output
    }
}

impl Comparison {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        let ranged = self.start_date.is_some();

        let mut header = vec![ui::header_cell("Code"), ui::header_cell("Currency")];
        if let Some(start) = self.start_date {
            header.push(ui::header_cell(&start.to_string()));
        }
        header.push(ui::header_cell(&self.date.to_string()));
        if ranged {
            header.push(ui::header_cell("Change"));
        }
        table.set_header(header);

        for row in &self.rows {
            let mut cells = vec![Cell::new(&row.code), Cell::new(&row.name)];
            if ranged {
                cells.push(ui::rate_cell(row.start_rate));
            }
            cells.push(ui::rate_cell(Some(row.rate)));
            if ranged {
                cells.push(ui::change_cell(row.change_percent));
            }
            table.add_row(cells);
        }

        let mut output = format!(
            "{}\n\n{}",
            ui::style_text(&format!("Comparison ({})", self.kind), ui::StyleType::Title),
            table
        );
        if !self.missing.is_empty() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("Not available: {}", self.missing.join(", ")),
                    ui::StyleType::Error
                )
            ));
        }
        if !self.gaps.is_empty() {
            output.push_str(&format!(
                "\n{}",
                ui::note(&format!("No bulletin for: {}", join_dates(&self.gaps)))
            ));
        }
        output
    }
}

fn join_dates(dates: &[NaiveDate]) -> String {
    dates
        .iter()
        .map(NaiveDate::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub async fn convert(
    service: &RateService,
    policy: ConversionPolicy,
    amount: Decimal,
    from: &str,
    to: &str,
    date: Option<NaiveDate>,
) -> Result<()> {
    let spinner = ui::new_spinner("Fetching rates...");
    let rates = match date {
        Some(date) => service.rates_for_date(date).await,
        None => service.current_rates().await,
    };
    spinner.finish_and_clear();
    let rates = rates?;

    let conversion = analytics::convert(&rates.snapshot, amount, from, to, policy)?;
    println!("{}", conversion.display());
    if let Some(notice) = &rates.notice {
        println!("{}", ui::note(notice));
    }
    Ok(())
}

pub async fn history(
    service: &RateService,
    currency: &str,
    kind: RateKind,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<()> {
    let spinner = ui::new_spinner(&format!("Fetching {currency} rates from {start} to {end}..."));
    let range = service.rates_for_range(start, end).await;
    spinner.finish_and_clear();
    let range = range?;

    let gaps = range.failed.iter().map(|(date, _)| *date).collect();
    let snapshots: Vec<_> = range.snapshots.into_iter().map(|r| r.snapshot).collect();
    let history = analytics::build_history(currency, kind, start, end, &snapshots, gaps)?;
    println!("{}", history.display_as_table());
    Ok(())
}

pub async fn compare(service: &RateService, codes: &[String], period: ComparePeriod) -> Result<()> {
    let spinner = ui::new_spinner("Fetching rates...");
    let comparison = service.compare(codes, period, RateKind::ForexSelling).await;
    spinner.finish_and_clear();
    println!("{}", comparison?.display_as_table());
    Ok(())
}
