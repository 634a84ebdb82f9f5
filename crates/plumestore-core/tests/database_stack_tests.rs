//! Database, store, and table bookkeeping over real table data.
//!
//! The unit tests in `database` cover name validation and directory
//! plumbing with synthetic entries; these tests run the same surface
//! against tables that actually hold partitions, and check that handles
//! resolved after a reconnect or a rename still read the stored rows.
#![allow(missing_docs)]

use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use tempfile::TempDir;

use plumestore_core::{
    database::{CreateMode, Database, DatabaseError},
    table::{ErrorKind, WriteOptions},
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

#[test]
fn a_database_full_of_tables_survives_reconnection() -> TestResult {
    let tmp = TempDir::new()?;
    let root = tmp.path().join("db");
    {
        let db = Database::create(&root, CreateMode::New)?;
        let store = db.create_store("market")?;
        store.table("spot")?.write(&rows(0..50), &indexed())?;
        store.table("futures")?.write(&rows(0..20), &indexed())?;
    }

    // Handles carry no state, so a fresh connection sees everything.
    let db = Database::connect(&root)?;
    let store = db.store("market")?;
    assert_eq!(store.list_tables(None)?, vec!["futures", "spot"]);
    assert_eq!(store.list_tables(Some("s%"))?, vec!["spot"]);
    assert_eq!(store.table("spot")?.num_rows()?, 50);

    // Reuse mode reconnects rather than failing.
    let reused = Database::create(&root, CreateMode::Reuse)?;
    assert_eq!(reused.store("market")?.table("futures")?.num_rows()?, 20);
    Ok(())
}

#[test]
fn an_unwritten_table_handle_is_not_a_table_yet() -> TestResult {
    let tmp = TempDir::new()?;
    let db = Database::create(tmp.path().join("db"), CreateMode::New)?;
    let store = db.create_store("market")?;

    let table = store.table("pending")?;
    assert!(!table.exists());
    let err = table.read().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    // The directory only appears once the first write lands.
    assert_eq!(store.list_tables(None)?, Vec::<String>::new());

    table.write(&rows(0..5), &indexed())?;
    assert_eq!(store.list_tables(None)?, vec!["pending"]);
    Ok(())
}

#[test]
fn renaming_a_table_moves_its_files_and_keeps_it_readable() -> TestResult {
    let tmp = TempDir::new()?;
    let db = Database::create(tmp.path().join("db"), CreateMode::New)?;
    let store = db.create_store("market")?;
    store.table("spot")?.write(&rows(0..50), &indexed())?;

    store.rename_table("spot", "spot_v2")?;

    assert!(!store.table("spot")?.exists());
    let renamed = store.table("spot_v2")?;
    assert_eq!(renamed.num_rows()?, 50);
    assert_eq!(renamed.columns()?, vec!["id", "price"]);

    // The renamed table keeps mutating normally.
    renamed.append(&rows(50..60))?;
    assert_eq!(renamed.num_rows()?, 60);
    Ok(())
}

#[test]
fn dropping_tables_then_the_store_clears_the_tree() -> TestResult {
    let tmp = TempDir::new()?;
    let db = Database::create(tmp.path().join("db"), CreateMode::New)?;
    let store = db.create_store("market")?;
    store.table("spot")?.write(&rows(0..10), &indexed())?;

    // A populated store refuses to go.
    let err = db.drop_store("market").unwrap_err();
    assert!(matches!(err, DatabaseError::StoreNotEmpty { .. }));

    store.drop_table("spot")?;
    assert!(!store.table("spot")?.exists());
    db.drop_store("market")?;
    assert_eq!(db.list_stores(None)?, Vec::<String>::new());
    assert!(!store.path().exists());
    Ok(())
}

#[test]
fn stores_isolate_tables_of_the_same_name() -> TestResult {
    let tmp = TempDir::new()?;
    let db = Database::create(tmp.path().join("db"), CreateMode::New)?;
    db.create_store("us")?.table("prices")?.write(&rows(0..10), &indexed())?;
    db.create_store("eu")?.table("prices")?.write(&rows(0..99), &indexed())?;

    assert_eq!(db.store("us")?.table("prices")?.num_rows()?, 10);
    assert_eq!(db.store("eu")?.table("prices")?.num_rows()?, 99);

    // Renaming one store leaves the other's table alone.
    db.rename_store("us", "na")?;
    assert_eq!(db.store("na")?.table("prices")?.num_rows()?, 10);
    assert_eq!(db.store("eu")?.table("prices")?.num_rows()?, 99);
    assert!(matches!(
        db.store("us").unwrap_err(),
        DatabaseError::StoreNotFound { .. }
    ));
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn indexed() -> WriteOptions {
    WriteOptions::default()
        .with_index("id")
        .with_rows_per_partition(25)
}

fn rows(ids: std::ops::Range<i64>) -> RecordBatch {
    let ids: Vec<i64> = ids.collect();
    let prices: Vec<f64> = ids.iter().map(|id| *id as f64 / 10.0).collect();
    let schema = Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("price", DataType::Float64, false),
    ]);
    RecordBatch::try_new(
        Arc::new(schema),
        vec![
            Arc::new(Int64Array::from(ids)),
            Arc::new(Float64Array::from(prices)),
        ],
    )
    .expect("test batch")
}
