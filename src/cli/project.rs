use super::ui;
use crate::core::config::AppConfig;
use crate::core::currency::CurrencyNormalizer;
use crate::core::pipeline::{Pipeline, PipelineError, PipelineOutput};
use crate::core::resolver::MarketDataResolver;
use crate::core::{PortfolioStore, ProjectionReport};
use anyhow::Result;
use comfy_table::Cell;

const CHART_WIDTH: usize = 30;

fn display_table(report: &ProjectionReport) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Symbol"),
        ui::header_cell("Price"),
        ui::header_cell("Market Cap (B)"),
        ui::header_cell("2030 Target (B)"),
        ui::header_cell("2030 Price"),
        ui::header_cell("CAGR"),
        ui::header_cell("Weight"),
        ui::header_cell("Source"),
    ]);

    for result in &report.results {
        let quote = &result.quote;
        let name = match &quote.short_name {
            Some(short_name) => format!(
                "{}\n{}",
                quote.display_symbol,
                ui::style_text(short_name, ui::StyleType::Subtle)
            ),
            None => quote.display_symbol.clone(),
        };
        table.add_row(vec![
            ui::number_cell(result.rank.to_string()),
            Cell::new(name),
            ui::number_cell(format!("{:.2} {}", quote.price, quote.currency)),
            ui::number_cell(format!("{:.2}", quote.market_cap_billions)),
            ui::number_cell(format!("{:.2}", result.target.target_market_cap_billions)),
            ui::number_cell(format!("{:.2}", result.target_price)),
            ui::change_cell(result.cagr_percent),
            ui::number_cell(format!("{:.1}%", result.target.weight_percent)),
            Cell::new(quote.source.to_string()),
        ]);
    }
    table.to_string()
}

fn display_chart(report: &ProjectionReport) -> String {
    let max_abs = report
        .results
        .iter()
        .map(|r| r.cagr_percent.abs())
        .fold(0.0, f64::max);
    let label_width = report
        .results
        .iter()
        .map(|r| r.quote.display_symbol.len())
        .max()
        .unwrap_or(0);

    report
        .results
        .iter()
        .map(|r| {
            format!(
                "{:<label_width$} {} {:.2}%",
                r.quote.display_symbol,
                ui::bar(r.cagr_percent, max_abs, CHART_WIDTH),
                r.cagr_percent
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the ranked table, CAGR chart, totals and skipped symbols.
pub fn display_output(output: &PipelineOutput) -> String {
    let report = &output.report;
    let mut text = format!(
        "{}\n\n",
        ui::style_text("2030 Projection", ui::StyleType::Title)
    );
    text.push_str(&display_table(report));
    text.push_str("\n\n");
    text.push_str(&display_chart(report));

    text.push_str(&format!(
        "\n\n{} {}",
        ui::style_text("Portfolio CAGR:", ui::StyleType::TotalLabel),
        ui::style_text(
            &format!("{:.2}%", report.portfolio_cagr),
            ui::StyleType::TotalValue
        )
    ));

    let allocation = format!("{:.1}%", report.total_allocation);
    let allocation = if (report.total_allocation - 100.0).abs() > 1e-9 {
        ui::style_text(
            &format!("{allocation} (does not add up to 100%)"),
            ui::StyleType::Warning,
        )
    } else {
        ui::style_text(&allocation, ui::StyleType::TotalValue)
    };
    text.push_str(&format!(
        "\n{} {}",
        ui::style_text("Total allocation:", ui::StyleType::TotalLabel),
        allocation
    ));

    if !output.unresolved.is_empty() {
        text.push_str(&format!(
            "\n\n{}",
            ui::style_text(
                &format!("Skipped (no data): {}", output.unresolved.join(", ")),
                ui::StyleType::Warning
            )
        ));
    }
    text
}

/// Runs one projection and prints it.
///
/// Projects the tracked list, or the symbols in `share_reference` when given.
/// Returns the store when it holds new default targets worth saving, which is
/// only the case for the tracked list.
pub async fn run(
    resolver: &MarketDataResolver,
    config: &AppConfig,
    share_reference: Option<&str>,
    refresh: bool,
) -> Result<Option<PortfolioStore>> {
    let mut store = match share_reference {
        Some(reference) => {
            let mut store = PortfolioStore::from_share_reference(reference);
            store.load_targets(config);
            store
        }
        None => PortfolioStore::from_config(config),
    };

    if refresh {
        resolver.invalidate().await;
    }

    let normalizer = CurrencyNormalizer::new(resolver, config.convert_to_usd);
    let pipeline = Pipeline {
        resolver,
        normalizer: &normalizer,
        ttl: config.cache_ttl(),
        target_multiplier: config.target_multiplier,
    };

    let pb = ui::new_progress_bar(store.list_symbols().len() as u64, "Fetching market data...");
    let result = pipeline.run(&mut store, &|| pb.inc(1)).await;
    pb.finish_and_clear();

    match result {
        Ok(output) => {
            println!("{}", display_output(&output));
            Ok(share_reference.is_none().then_some(store))
        }
        Err(PipelineError::NoSymbols) => {
            println!(
                "{}",
                ui::style_text(
                    "No symbols tracked. Add some with `cagr2030 add <SYMBOL>`.",
                    ui::StyleType::Warning
                )
            );
            Ok(None)
        }
        Err(e @ PipelineError::NoData(_)) => {
            println!("{}", ui::style_text(&e.to_string(), ui::StyleType::Error));
            println!("Re-run with --refresh to bypass cached results.");
            Ok(None)
        }
    }
}
