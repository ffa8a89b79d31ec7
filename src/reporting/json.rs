use crate::reporting::reporter::{Entry, Reporter};
use serde::Serialize;

#[derive(Serialize)]
struct Report<'a> {
    scan_metadata: ScanMetadata,
    target: &'a str,
    dialect: &'a str,
    summary: Summary,
    results: &'a [Entry],
}

#[derive(Serialize)]
struct ScanMetadata {
    tool: String,
    version: String,
    scan_date: String,
    report_format: String,
}

#[derive(Serialize)]
struct Summary {
    results: usize,
    failed_items: usize,
    spray_hit: Option<bool>,
}

pub fn render(reporter: &Reporter) -> anyhow::Result<String> {
    let entries = reporter.entries();
    let failed_items = entries
        .iter()
        .map(|e| match e {
            Entry::Listing { failures, .. } | Entry::Dump { failures, .. } => failures.len(),
            _ => 0,
        })
        .sum();
    let spray_hit = entries.iter().find_map(|e| match e {
        Entry::Spray { outcome, .. } => Some(outcome.hit.is_some()),
        _ => None,
    });

    let report = Report {
        scan_metadata: ScanMetadata {
            tool: "BLINDSPOT".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            scan_date: chrono::Utc::now().to_rfc3339(),
            report_format: "application/json".to_string(),
        },
        target: reporter.target(),
        dialect: reporter.dialect(),
        summary: Summary {
            results: entries.len(),
            failed_items,
            spray_hit,
        },
        results: entries,
    };

    let json = serde_json::to_string_pretty(&report)?;
    Ok(json)
}
