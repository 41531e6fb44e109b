//! Schema creation and additive migration.
//!
//! The store is not version-numbered. Each table is described by the columns
//! the current model needs; on open, the live column list of every table is
//! compared against that description. A table that is missing columns, still
//! lives under a legacy name, or leaves a backfilled `NOT NULL` column
//! nullable is rebuilt by copy-default-swap: create
//! `<table>_new`, copy every row while supplying a backfill for each absent
//! column, drop the old table and rename the new one into place. The whole
//! pass runs in one `IMMEDIATE` transaction.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, Transaction, TransactionBehavior, params};
use tracing::info;

use crate::db::ensure_personal_collection;

struct ColumnDef {
    name: &'static str,
    ddl: &'static str,
    /// Column name used by older layouts for the same data.
    legacy_name: Option<&'static str>,
    /// SQL expression supplying a value when the column is absent, or NULL
    /// in a NOT NULL column. `None` copies the column as is (or NULL).
    backfill: Option<&'static str>,
}

struct TableDef {
    name: &'static str,
    /// Table name used by older layouts for the same data.
    legacy_name: Option<&'static str>,
    columns: &'static [ColumnDef],
    constraints: &'static [&'static str],
    /// Rows failing this predicate (in new column names) are not carried over.
    copy_filter: Option<&'static str>,
}

const fn col(name: &'static str, ddl: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        ddl,
        legacy_name: None,
        backfill: None,
    }
}

const fn col_default(name: &'static str, ddl: &'static str, backfill: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        ddl,
        legacy_name: None,
        backfill: Some(backfill),
    }
}

const fn col_renamed(
    name: &'static str,
    ddl: &'static str,
    legacy_name: &'static str,
) -> ColumnDef {
    ColumnDef {
        name,
        ddl,
        legacy_name: Some(legacy_name),
        backfill: None,
    }
}

const COLLECTIONS: TableDef = TableDef {
    name: "collections",
    legacy_name: None,
    columns: &[
        col("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        col("name", "TEXT NOT NULL"),
        col("description", "TEXT"),
        col_default(
            "created_at",
            "TEXT NOT NULL",
            "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        ),
        col_default("is_personal", "INTEGER NOT NULL DEFAULT 0", "0"),
    ],
    constraints: &[],
    copy_filter: None,
};

const FOOD_ITEMS: TableDef = TableDef {
    name: "food_items",
    legacy_name: None,
    columns: &[
        col("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        col_default(
            "collection_id",
            "INTEGER NOT NULL REFERENCES collections(id)",
            "(SELECT id FROM collections WHERE is_personal = 1)",
        ),
        col_default("name", "TEXT NOT NULL", "'Unknown shop'"),
        col_default("city", "TEXT NOT NULL", "'Unknown city'"),
        col_default("address", "TEXT NOT NULL", "'Unknown address'"),
        col_default("latitude", "REAL NOT NULL", "0.0"),
        col_default("longitude", "REAL NOT NULL", "0.0"),
        col_default("rating", "REAL NOT NULL", "5.0"),
        col("reason", "TEXT"),
        col_default("food_type", "TEXT NOT NULL DEFAULT 'Other'", "'Other'"),
        col_default("is_imported", "INTEGER NOT NULL DEFAULT 0", "0"),
        col_default(
            "created_at",
            "TEXT NOT NULL",
            "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
        ),
    ],
    constraints: &[],
    copy_filter: None,
};

const PHOTOS: TableDef = TableDef {
    name: "photos",
    legacy_name: Some("food_photos"),
    columns: &[
        col("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        col_renamed(
            "food_item_id",
            "INTEGER NOT NULL REFERENCES food_items(id)",
            "food_id",
        ),
        col_renamed("data", "BLOB NOT NULL", "photo_data"),
    ],
    constraints: &[],
    copy_filter: Some("food_item_id IN (SELECT id FROM food_items) AND data IS NOT NULL"),
};

const TAGS: TableDef = TableDef {
    name: "tags",
    legacy_name: None,
    columns: &[
        col("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
        col("name", "TEXT NOT NULL UNIQUE"),
    ],
    constraints: &[],
    copy_filter: None,
};

const FOOD_TAGS: TableDef = TableDef {
    name: "food_tags",
    legacy_name: None,
    columns: &[
        col_renamed(
            "food_item_id",
            "INTEGER NOT NULL REFERENCES food_items(id)",
            "food_id",
        ),
        col("tag_id", "INTEGER NOT NULL REFERENCES tags(id)"),
    ],
    constraints: &["PRIMARY KEY (food_item_id, tag_id)"],
    copy_filter: Some(
        "food_item_id IN (SELECT id FROM food_items) AND tag_id IN (SELECT id FROM tags)",
    ),
};

/// Parents before children, so backfills and copy filters can see the rows
/// they refer to.
const TABLES: &[&TableDef] = &[&COLLECTIONS, &FOOD_ITEMS, &PHOTOS, &TAGS, &FOOD_TAGS];

const INDEXES: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS idx_collections_personal
        ON collections(is_personal) WHERE is_personal = 1;
    CREATE INDEX IF NOT EXISTS idx_food_items_collection ON food_items(collection_id);
    CREATE INDEX IF NOT EXISTS idx_food_items_city ON food_items(city);
    CREATE INDEX IF NOT EXISTS idx_food_items_name_address ON food_items(name, address);
    CREATE INDEX IF NOT EXISTS idx_photos_food_item ON photos(food_item_id);
    CREATE INDEX IF NOT EXISTS idx_food_tags_tag ON food_tags(tag_id);
";

/// Bring the store up to the current layout. Idempotent.
///
/// Foreign key enforcement is suspended while tables are swapped and
/// restored afterwards, whether or not the migration succeeded. Any error
/// rolls the whole pass back.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", false)?;
    let result = migrate(conn);
    conn.pragma_update(None, "foreign_keys", true)?;
    result.context("Schema migration failed")
}

fn migrate(conn: &Connection) -> Result<()> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    for table in TABLES {
        ensure_table(&tx, table)?;
        if table.name == COLLECTIONS.name {
            demote_extra_personal(&tx)?;
            ensure_personal_collection(&tx)?;
        }
    }
    tx.execute_batch(INDEXES)?;

    let mut stmt = tx.prepare("PRAGMA foreign_key_check")?;
    if stmt.query([])?.next()?.is_some() {
        bail!("Foreign key violations found after migration");
    }
    drop(stmt);

    tx.commit()?;
    Ok(())
}

fn ensure_table(conn: &Connection, table: &TableDef) -> Result<()> {
    let source = if table_exists(conn, table.name)? {
        Some(table.name)
    } else {
        match table.legacy_name {
            Some(legacy) if table_exists(conn, legacy)? => Some(legacy),
            _ => None,
        }
    };

    let Some(source) = source else {
        conn.execute_batch(&create_table_sql(table, table.name))?;
        return Ok(());
    };

    let live = live_columns(conn, source)?;
    let missing: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| !live.iter().any(|l| l == c.name))
        .map(|c| c.name)
        .collect();

    let nullable = nullable_columns(conn, source)?;
    let loosened: Vec<&str> = table
        .columns
        .iter()
        .filter(|c| c.backfill.is_some() && c.ddl.contains("NOT NULL"))
        .filter(|c| nullable.iter().any(|n| n == c.name))
        .map(|c| c.name)
        .collect();

    if source == table.name && missing.is_empty() && loosened.is_empty() {
        return Ok(());
    }

    info!(
        table = table.name,
        source,
        missing = ?missing,
        loosened = ?loosened,
        "Migrating table to current layout"
    );
    rebuild_table(conn, table, source, &live)
}

/// Older stores could end up with several personal collections. Keep the
/// oldest so the unique index can be created.
fn demote_extra_personal(conn: &Connection) -> Result<()> {
    let demoted = conn.execute(
        "UPDATE collections SET is_personal = 0
         WHERE is_personal = 1
           AND id <> (SELECT MIN(id) FROM collections WHERE is_personal = 1)",
        [],
    )?;
    if demoted > 0 {
        info!(demoted, "Demoted extra personal collections");
    }
    Ok(())
}

fn rebuild_table(conn: &Connection, table: &TableDef, source: &str, live: &[String]) -> Result<()> {
    let shadow = format!("{}_new", table.name);
    let column_names: Vec<&str> = table.columns.iter().map(|c| c.name).collect();
    let column_list = column_names.join(", ");
    let projections: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("{} AS {}", copy_expression(c, live), c.name))
        .collect();
    let filter = table
        .copy_filter
        .map(|f| format!(" WHERE {f}"))
        .unwrap_or_default();

    conn.execute_batch(&format!("DROP TABLE IF EXISTS {shadow};"))?;
    conn.execute_batch(&create_table_sql(table, &shadow))?;
    let copied = conn.execute(
        &format!(
            "INSERT INTO {shadow} ({column_list})
             SELECT {column_list} FROM (SELECT {} FROM {source}){filter}",
            projections.join(", ")
        ),
        [],
    )?;
    conn.execute_batch(&format!(
        "DROP TABLE {source};
         ALTER TABLE {shadow} RENAME TO {};",
        table.name
    ))?;

    info!(table = table.name, rows = copied, "Table migrated");
    Ok(())
}

/// Expression producing a column's value from the old table.
fn copy_expression(column: &ColumnDef, live: &[String]) -> String {
    let present = if live.iter().any(|l| l == column.name) {
        Some(column.name)
    } else {
        column
            .legacy_name
            .filter(|legacy| live.iter().any(|l| l == legacy))
    };

    match (present, column.backfill) {
        (Some(existing), Some(backfill)) => format!("COALESCE({existing}, {backfill})"),
        (Some(existing), None) => existing.to_string(),
        (None, Some(backfill)) => backfill.to_string(),
        (None, None) => "NULL".to_string(),
    }
}

fn create_table_sql(table: &TableDef, name: &str) -> String {
    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("{} {}", c.name, c.ddl))
        .collect();
    parts.extend(table.constraints.iter().map(ToString::to_string));
    format!("CREATE TABLE {name} (\n    {}\n);", parts.join(",\n    "))
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Column names of a live table, in declaration order.
pub fn live_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
    let columns = stmt
        .query_map(params![table], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(columns)
}

/// Columns of a live table that accept NULL.
fn nullable_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM pragma_table_info(?1) WHERE \"notnull\" = 0")?;
    let columns = stmt
        .query_map(params![table], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(columns)
}
