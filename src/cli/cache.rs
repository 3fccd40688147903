use super::ui;
use crate::store::rates::{CachedEntryInfo, RateCache};
use anyhow::Result;
use comfy_table::{Cell, CellAlignment, Color};

pub fn entries_table(entries: &[CachedEntryInfo]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Scope"),
        ui::header_cell("Fetched At (UTC)"),
        ui::header_cell("Currencies"),
        ui::header_cell("Status"),
    ]);
    for entry in entries {
        let status = if entry.fresh {
            Cell::new("fresh").fg(Color::Green)
        } else {
            Cell::new("stale").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(entry.date),
            Cell::new(entry.scope),
            Cell::new(entry.fetched_at.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(entry.currencies).set_alignment(CellAlignment::Right),
            status,
        ]);
    }
    table.to_string()
}

pub async fn list(cache: &RateCache) -> Result<()> {
    if !cache.is_enabled() {
        println!("{}", ui::style_text("Cache is disabled", ui::StyleType::Error));
        return Ok(());
    }
    let entries = cache.entries().await;
    if entries.is_empty() {
        println!("{}", ui::note("Cache is empty"));
        return Ok(());
    }
    println!(
        "{}\n\n{}",
        ui::style_text(&format!("{} cached bulletins", entries.len()), ui::StyleType::Title),
        entries_table(&entries)
    );
    Ok(())
}

pub async fn clear(cache: &RateCache) -> Result<()> {
    let count = cache.entries().await.len();
    cache.clear().await;
    println!("Removed {count} cached bulletins");
    Ok(())
}
