use super::ui;
use crate::fx::FxCoordinator;
use anyhow::Result;
use comfy_table::Cell;

/// Lists known currencies and the providers quoting them.
pub fn run(fx: &FxCoordinator, history: bool) -> Result<()> {
    let currencies = fx.currencies(history);
    if currencies.is_empty() {
        println!("No currencies found in the currency index.");
        return Ok(());
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Currency"), ui::header_cell("Providers")]);
    let selected = fx.currency();
    for ccy in &currencies {
        let label = if *ccy == selected {
            ui::style_text(ccy, ui::StyleType::Value)
        } else {
            ccy.clone()
        };
        table.add_row(vec![
            Cell::new(label),
            Cell::new(fx.providers_for_currency(ccy, history).join(", ")),
        ]);
    }

    let title = if history {
        "Currencies with history"
    } else {
        "Currencies"
    };
    println!("\n{}", ui::style_text(title, ui::StyleType::Title));
    println!("{table}");
    Ok(())
}
