mod common;

use blindspot::error::BlindError;
use blindspot::sqli::CountScope;
use blindspot::{BlindSession, Dialect, EngineConfig, Enumerator, Extractor};
use common::{Down, FakeDb};
use std::sync::atomic::Ordering;
use std::sync::Arc;

const COLUMNS: [&str; 2] = ["username", "password"];

/// MySQL `shop` schema with `orders` and `users(username, password)`.
fn shop(dialect: Dialect) -> FakeDb {
    let columns: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut db = FakeDb::new()
        .text(dialect.current_schema(), "shop")
        .text(dialect.version(), "8.0.36")
        .number(dialect.build_count_query(CountScope::Tables { schema: "shop" }), 2)
        .text(dialect.select_row(&dialect.table_names("shop"), 0), "orders")
        .text(dialect.select_row(&dialect.table_names("shop"), 1), "users")
        .number(
            dialect.build_count_query(CountScope::Columns {
                table: "users",
                schema: "shop",
            }),
            2,
        )
        .number(
            dialect.build_count_query(CountScope::Rows {
                table: "users",
                schema: Some("shop"),
            }),
            2,
        );

    for (i, column) in COLUMNS.iter().enumerate() {
        db = db.text(
            dialect.select_row(&dialect.column_names("users", "shop"), i),
            column,
        );
    }

    let rows = [("alice", "Sup3r!"), ("bob", "hunter2")];
    for (row, (username, password)) in rows.iter().enumerate() {
        let cell = |column: &str| {
            dialect.select_row(&dialect.cell("users", Some("shop"), column, &columns), row)
        };
        db = db.text(cell("username"), username).text(cell("password"), password);
    }
    db
}

fn enumerator(db: FakeDb) -> Enumerator<FakeDb> {
    Enumerator::new(Extractor::new(db, Dialect::MySql))
}

#[tokio::test]
async fn test_schema_and_version() {
    let enumerator = enumerator(shop(Dialect::MySql));
    assert_eq!(enumerator.current_schema().await.unwrap(), "shop");
    assert_eq!(enumerator.version().await.unwrap(), "8.0.36");
}

#[tokio::test]
async fn test_list_tables_and_columns() {
    let enumerator = enumerator(shop(Dialect::MySql));

    let tables = enumerator.list_tables("shop").await.unwrap();
    assert!(tables.is_complete());
    assert_eq!(tables.items, vec!["orders", "users"]);

    let columns = enumerator.list_columns("users", "shop").await.unwrap();
    assert_eq!(columns.into_complete().unwrap(), vec!["username", "password"]);
}

#[tokio::test]
async fn test_dump_table_rows_in_order() {
    let enumerator = enumerator(shop(Dialect::MySql));

    let dump = enumerator.dump_table("users", "shop").await.unwrap();
    assert!(dump.is_complete());
    assert_eq!(dump.columns, vec!["username", "password"]);
    assert_eq!(
        dump.rows,
        vec![vec!["alice", "Sup3r!"], vec!["bob", "hunter2"]]
    );
    assert!(dump.to_csv().starts_with("username,password\nalice,Sup3r!\n"));
}

#[tokio::test]
async fn test_unreadable_table_name_is_isolated() {
    let dialect = Dialect::MySql;
    let db = FakeDb::new()
        .number(dialect.build_count_query(CountScope::Tables { schema: "shop" }), 3)
        .text(dialect.select_row(&dialect.table_names("shop"), 0), "orders")
        .text(dialect.select_row(&dialect.table_names("shop"), 2), "users");
    let enumerator = enumerator(db);

    let tables = enumerator.list_tables("shop").await.unwrap();
    assert_eq!(tables.items, vec!["orders", "users"]);
    assert_eq!(tables.failures.len(), 1);
    assert_eq!(tables.failures[0].index, 1);
    assert_eq!(tables.failures[0].item, "shop.table[1]");

    match tables.into_complete() {
        Err(BlindError::PartialEnumeration {
            recovered, failed, ..
        }) => {
            assert_eq!(recovered, 2);
            assert_eq!(failed, 1);
        }
        other => panic!("expected partial enumeration, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failing_cell_drops_only_its_row() {
    let dialect = Dialect::MySql;
    let columns: Vec<String> = COLUMNS.iter().map(|c| c.to_string()).collect();
    let mut db = shop(dialect);
    // Replace alice's password with something outside the searched charset.
    db = db.text(
        dialect.select_row(&dialect.cell("users", Some("shop"), "password", &columns), 0),
        "caf\u{e9}",
    );
    let enumerator = enumerator(db);

    let dump = enumerator.dump_table("users", "shop").await.unwrap();
    assert_eq!(dump.rows, vec![vec!["bob", "hunter2"]]);
    assert_eq!(dump.failures.len(), 1);
    assert_eq!(dump.failures[0].item, "users[0].password");
    assert!(!dump.is_complete());
}

#[tokio::test]
async fn test_uncountable_rows_keep_columns() {
    let dialect = Dialect::MySql;
    // More rows than a 12-bit count can express.
    let db = shop(dialect).number(
        dialect.build_count_query(CountScope::Rows {
            table: "users",
            schema: Some("shop"),
        }),
        5000,
    );
    let enumerator = enumerator(db);

    let dump = enumerator.dump_table("users", "shop").await.unwrap();
    assert_eq!(dump.columns, vec!["username", "password"]);
    assert!(dump.rows.is_empty());
    assert_eq!(dump.failures.len(), 1);
    assert_eq!(dump.failures[0].item, "users.rows");
    assert!(matches!(
        dump.failures[0].error,
        BlindError::CountOverflow { max_bits: 12 }
    ));
    assert!(!dump.is_complete());
}

#[tokio::test(start_paused = true)]
async fn test_transport_failure_stops_enumeration() {
    let down = Arc::new(Down::default());
    let session = BlindSession::new(EngineConfig::new("mysql"), down.clone()).unwrap();
    let enumerator = session.enumerator(session.content_oracle(blindspot::Marker::Status(200)));

    match enumerator.list_tables("shop").await {
        Err(BlindError::Network { attempts, .. }) => assert_eq!(attempts, 4),
        other => panic!("expected network error, got {:?}", other.map(|e| e.items)),
    }
    // One count probe, four attempts, nothing after it.
    assert_eq!(down.calls.load(Ordering::SeqCst), 4);
}
