//! Terminal trade outcome storage

use anyhow::Result;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::info;
use crate::types::TradeOutcome;

pub fn record_trade_outcome(output_dir: &Path, outcome: &TradeOutcome) -> Result<()> {
    let filename = output_dir
        .join("trades")
        .join(format!("trades_{}.jsonl", Utc::now().format("%Y-%m-%d")));

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&filename)?;

    writeln!(file, "{}", serde_json::to_string(outcome)?)?;

    info!(
        trade_id = %outcome.trade_id,
        status = %outcome.status,
        realized_profit = ?outcome.realized_profit,
        "Saved trade outcome"
    );

    Ok(())
}
