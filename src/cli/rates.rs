use super::ui;
use crate::core::COIN;
use crate::fx::FxCoordinator;
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use comfy_table::Cell;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use tracing::info;

/// Runs one forced refresh to completion.
async fn refresh(fx: &FxCoordinator) -> Result<()> {
    if !fx.is_enabled() {
        bail!("Fiat rates are disabled for this network or by the use_exchange_rate setting");
    }
    if let Some(handle) = fx.refresh_now() {
        let pb = ui::new_spinner(&format!(
            "Fetching {} rates from {}",
            fx.currency(),
            fx.provider_name()
        ));
        handle.join().await;
        pb.finish_and_clear();
    }
    Ok(())
}

fn enable_history(fx: &FxCoordinator) {
    if !fx.history_config() {
        info!("Enabling historical rates");
        fx.set_history_config(true);
    }
    if !fx.show_history() {
        println!(
            "{}",
            ui::style_text(
                &format!("{} has no history for {}", fx.provider_name(), fx.currency()),
                ui::StyleType::Subtle
            )
        );
    }
}

fn to_units(amount: Decimal) -> Result<i64> {
    amount
        .checked_mul(Decimal::from(COIN))
        .and_then(|units| units.trunc().to_i64())
        .with_context(|| format!("Amount {amount} is out of range"))
}

fn print_missing_rate(fx: &FxCoordinator) {
    println!(
        "{}",
        ui::style_text(
            &format!("No {} rate from {}", fx.currency(), fx.provider_name()),
            ui::StyleType::Error
        )
    );
}

pub async fn quote(
    fx: &FxCoordinator,
    currency: Option<&str>,
    provider: Option<&str>,
) -> Result<()> {
    if let Some(ccy) = currency {
        fx.set_currency(&ccy.to_uppercase());
    }
    if let Some(name) = provider {
        fx.set_provider(name);
    }
    refresh(fx).await?;

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Provider"),
        ui::header_cell("Currency"),
        ui::header_cell("Rate"),
        ui::header_cell("1 coin"),
    ]);
    table.add_row(vec![
        Cell::new(fx.provider_name()),
        Cell::new(fx.currency()),
        ui::format_optional_cell(fx.current_rate(), |rate| rate.normalize().to_string()),
        ui::amount_cell(&fx.convert_to_fiat(COIN, None)),
    ]);
    println!("\n{}", ui::style_text("Exchange rate", ui::StyleType::Title));
    println!("{table}");

    if fx.current_rate().is_none() {
        print_missing_rate(fx);
    }
    Ok(())
}

pub async fn convert(fx: &FxCoordinator, amount: Decimal, date: Option<NaiveDate>) -> Result<()> {
    let units = to_units(amount)?;
    if date.is_some() {
        enable_history(fx);
    }
    refresh(fx).await?;

    let value = fx.convert_to_fiat(units, date);
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Amount"),
        ui::header_cell("Date"),
        ui::header_cell(&fx.currency()),
    ]);
    table.add_row(vec![
        Cell::new(amount.normalize()),
        Cell::new(date.map_or_else(|| "spot".to_string(), |d| d.to_string())),
        ui::amount_cell(&value),
    ]);
    println!("{table}");

    if fx.take_history_used_spot() {
        println!(
            "{}",
            ui::style_text("No history for that day yet, spot rate used", ui::StyleType::Subtle)
        );
    }
    Ok(())
}

pub async fn to_amount(fx: &FxCoordinator, fiat: Decimal) -> Result<()> {
    refresh(fx).await?;

    let Some(units) = fx.convert_from_fiat(fiat) else {
        print_missing_rate(fx);
        return Ok(());
    };
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(&fx.currency()),
        ui::header_cell("Coins"),
        ui::header_cell("Units"),
    ]);
    table.add_row(vec![
        Cell::new(fiat.normalize()),
        ui::amount_cell(&Decimal::new(units, 8).normalize().to_string()),
        Cell::new(units),
    ]);
    println!("{table}");
    Ok(())
}

pub async fn history(fx: &FxCoordinator, date: NaiveDate) -> Result<()> {
    enable_history(fx);
    refresh(fx).await?;

    let rate = fx.historical_rate(date);
    let source = if fx.take_history_used_spot() {
        "spot"
    } else {
        "history"
    };
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("Currency"),
        ui::header_cell("Rate"),
        ui::header_cell("Source"),
    ]);
    table.add_row(vec![
        Cell::new(date),
        Cell::new(fx.currency()),
        ui::format_optional_cell(rate, |rate| rate.normalize().to_string()),
        Cell::new(if rate.is_some() { source } else { "-" }),
    ]);
    println!("{table}");
    Ok(())
}
