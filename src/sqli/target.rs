use crate::sqli::dialect::{Dialect, RowQuery};
use serde::Serialize;
use std::fmt;

/// Which row of a table a cell target addresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RowSelector {
    /// Zero-based offset in the ordering of the selected column.
    Offset(usize),
    /// First row (in column order) matching a caller-written `WHERE` clause.
    Filter(String),
}

/// Value to recover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ExtractionTarget {
    /// Any SQL expression or scalar subquery, used verbatim.
    Expression(String),
    Cell {
        column: String,
        table: String,
        schema: Option<String>,
        row: RowSelector,
    },
}

impl ExtractionTarget {
    pub fn expression(expr: impl Into<String>) -> Self {
        Self::Expression(expr.into())
    }

    pub fn cell(column: impl Into<String>, table: impl Into<String>, row: RowSelector) -> Self {
        Self::Cell {
            column: column.into(),
            table: table.into(),
            schema: None,
            row,
        }
    }

    pub fn in_schema(self, name: impl Into<String>) -> Self {
        match self {
            Self::Cell {
                column, table, row, ..
            } => Self::Cell {
                column,
                table,
                schema: Some(name.into()),
                row,
            },
            other => other,
        }
    }

    /// Scalar SQL fragment the extractor probes.
    pub fn to_expression(&self, dialect: Dialect) -> String {
        match self {
            Self::Expression(expr) => expr.clone(),
            Self::Cell {
                column,
                table,
                schema,
                row,
            } => {
                let query = RowQuery::new(
                    column.as_str(),
                    dialect.qualified_table(table, schema.as_deref()),
                );
                match row {
                    RowSelector::Offset(n) => dialect.select_row(&query, *n),
                    RowSelector::Filter(clause) => {
                        dialect.select_row(&query.filter(clause.as_str()), 0)
                    }
                }
            }
        }
    }
}

impl fmt::Display for ExtractionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Expression(expr) => write!(f, "{}", expr),
            Self::Cell {
                column, table, row, ..
            } => match row {
                RowSelector::Offset(n) => write!(f, "{}.{}[{}]", table, column, n),
                RowSelector::Filter(clause) => write!(f, "{}.{} WHERE {}", table, column, clause),
            },
        }
    }
}
