use blindspot::{Enumeration, SprayOutcome, TableDump};
use serde::Serialize;

/// One recovered result, in the order it was produced.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entry {
    Value {
        label: String,
        value: String,
    },
    Listing {
        label: String,
        items: Vec<String>,
        failures: Vec<String>,
    },
    Dump {
        dump: TableDump,
        failures: Vec<String>,
    },
    Spray {
        candidates: usize,
        outcome: SprayOutcome,
    },
}

pub struct Reporter {
    target: String,
    dialect: String,
    entries: Vec<Entry>,
}

impl Reporter {
    pub fn new(target: &str, dialect: &str) -> Self {
        Self {
            target: target.to_string(),
            dialect: dialect.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn add_value(&mut self, label: &str, value: String) {
        self.entries.push(Entry::Value {
            label: label.to_string(),
            value,
        });
    }

    pub fn add_listing(&mut self, label: &str, listing: Enumeration<String>) {
        self.entries.push(Entry::Listing {
            label: label.to_string(),
            failures: listing.failures.iter().map(ToString::to_string).collect(),
            items: listing.items,
        });
    }

    pub fn add_dump(&mut self, dump: TableDump) {
        let failures = dump.failures.iter().map(ToString::to_string).collect();
        self.entries.push(Entry::Dump { dump, failures });
    }

    pub fn add_spray(&mut self, candidates: usize, outcome: SprayOutcome) {
        self.entries.push(Entry::Spray {
            candidates,
            outcome,
        });
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}
