use super::ui;
use crate::core::rates::BASE_CURRENCY;
use crate::service::{CurrencyList, RateService, ResolvedRates};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::{Cell, CellAlignment};

impl ResolvedRates {
    /// Renders the requested currencies (all when `codes` is empty).
    pub fn display_as_table(&self, codes: &[String]) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Code"),
            ui::header_cell("Currency"),
            ui::header_cell("Unit"),
            ui::header_cell("Forex Buying"),
            ui::header_cell("Forex Selling"),
            ui::header_cell("Banknote Buying"),
            ui::header_cell("Banknote Selling"),
        ]);

        for record in self.snapshot.filtered(codes) {
            table.add_row(vec![
                Cell::new(&record.code),
                Cell::new(&record.name),
                Cell::new(record.unit).set_alignment(CellAlignment::Right),
                ui::rate_cell(record.forex_buying),
                ui::rate_cell(record.forex_selling),
                ui::rate_cell(record.banknote_buying),
                ui::rate_cell(record.banknote_selling),
            ]);
        }

        let source = if self.from_cache { "cache" } else { "TCMB" };
        let mut output = format!(
            "{} {} ({} per unit, from {})\n\n",
            ui::style_text("Exchange rates for", ui::StyleType::Title),
            ui::style_text(&self.effective_date.to_string(), ui::StyleType::Title),
            BASE_CURRENCY,
            source
        );
        output.push_str(&table.to_string());

        if let Some(notice) = &self.notice {
            output.push_str(&format!("\n{}", ui::note(notice)));
        }
        let missing: Vec<&str> = codes
            .iter()
            .filter(|code| self.snapshot.get(code).is_none())
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!("Not published: {}", missing.join(", ")),
                    ui::StyleType::Error
                )
            ));
        }
        output
    }
}

impl CurrencyList {
    pub fn display_as_table(&self) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Code"),
            ui::header_cell("Name"),
            ui::header_cell("Turkish Name"),
            ui::header_cell("Unit"),
        ]);
        for currency in &self.currencies {
            table.add_row(vec![
                Cell::new(&currency.code),
                Cell::new(&currency.name),
                Cell::new(&currency.name_tr),
                Cell::new(currency.unit).set_alignment(CellAlignment::Right),
            ]);
        }
        format!(
            "{} ({})\n\n{}",
            ui::style_text(
                &format!("{} currencies published on {}", self.currencies.len(), self.date),
                ui::StyleType::Title
            ),
            BASE_CURRENCY,
            table
        )
    }
}

pub async fn show_rates(
    service: &RateService,
    date: Option<NaiveDate>,
    codes: &[String],
) -> Result<()> {
    let spinner = ui::new_spinner("Fetching rates...");
    let result = match date {
        Some(date) => service.rates_for_date(date).await,
        None => service.current_rates().await,
    };
    spinner.finish_and_clear();
    println!("{}", result?.display_as_table(codes));
    Ok(())
}

pub async fn show_currencies(service: &RateService) -> Result<()> {
    let spinner = ui::new_spinner("Fetching currency list...");
    let result = service.list_currencies().await;
    spinner.finish_and_clear();
    println!("{}", result?.display_as_table());
    Ok(())
}
