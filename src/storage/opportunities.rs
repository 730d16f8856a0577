//! Opportunity event storage

use anyhow::Result;
use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use tracing::debug;
use crate::types::OpportunityEvent;

pub fn record_opportunity_event(output_dir: &Path, event: &OpportunityEvent) -> Result<()> {
    let filename = output_dir
        .join("opportunities")
        .join(format!("opportunities_{}.jsonl", Utc::now().format("%Y-%m-%d")));

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&filename)?;

    writeln!(file, "{}", serde_json::to_string(event)?)?;

    debug!(reason = event.reason().map(|r| r.code()).unwrap_or("accepted"), "Recorded opportunity event");

    Ok(())
}
