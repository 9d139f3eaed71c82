use super::ui;
use crate::providers::ProviderRegistry;
use crate::providers::index::CurrencyIndex;
use anyhow::{Context, Result};
use tracing::info;

/// Probes every provider and writes a fresh currency index to `output`, or
/// prints it when no path is given.
pub async fn run(registry: &ProviderRegistry, output: Option<&str>) -> Result<()> {
    let pb = ui::new_progress_bar(registry.names().count() as u64);
    pb.set_message("Probing providers");
    let index = CurrencyIndex::generate(registry, |name, ok| {
        if !ok {
            pb.println(ui::style_text(
                &format!("{name}: no currencies"),
                ui::StyleType::Error,
            ));
        }
        pb.inc(1);
    })
    .await;
    pb.finish_and_clear();

    let json = index.to_json_pretty()?;
    match output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("Failed to write currency index to {path}"))?;
            info!("Wrote currency index to {}", path);
            println!("Currency index written to {path}");
        }
        None => println!("{json}"),
    }
    Ok(())
}
