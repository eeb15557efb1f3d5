use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Transaction, params};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS item (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    url TEXT
);

CREATE TABLE IF NOT EXISTS component (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE
);

CREATE TABLE IF NOT EXISTS item_scraps (
    item_id INTEGER NOT NULL REFERENCES item(id),
    component_id INTEGER NOT NULL REFERENCES component(id),
    quantity INTEGER NOT NULL CHECK (quantity > 0),
    PRIMARY KEY (item_id, component_id)
);

CREATE TABLE IF NOT EXISTS region (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE COLLATE NOCASE,
    url TEXT
);

CREATE TABLE IF NOT EXISTS location (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL COLLATE NOCASE,
    region_id INTEGER NOT NULL REFERENCES region(id),
    url TEXT,
    UNIQUE (name, region_id)
);

CREATE TABLE IF NOT EXISTS item_locations (
    id INTEGER PRIMARY KEY,
    item_id INTEGER NOT NULL REFERENCES item(id),
    location_id INTEGER NOT NULL REFERENCES location(id),
    description TEXT NOT NULL,
    quantity INTEGER,
    UNIQUE (item_id, location_id, description)
);
"#;

/// Owns the sqlite connection. Extractors go through the named upsert
/// operations below and never build SQL themselves.
pub struct Store {
    connection: Connection,
}

impl Store {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!(
                    "failed to create database parent directory {}",
                    parent.display()
                )
            })?;
        }
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        Self::bootstrap(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::bootstrap(connection)
    }

    fn bootstrap(connection: Connection) -> Result<Self> {
        connection
            .busy_timeout(Duration::from_secs(5))
            .context("failed to set sqlite busy timeout")?;
        connection
            .pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign_keys pragma")?;
        connection
            .pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL journal mode")?;
        connection
            .execute_batch(SCHEMA_SQL)
            .context("failed to initialize schema")?;
        Ok(Self { connection })
    }

    /// One transaction per row-level unit of work (one item, one region).
    /// Rolls back on drop unless committed.
    pub fn transaction(&mut self) -> Result<Transaction<'_>> {
        self.connection
            .transaction()
            .context("failed to start transaction")
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
}

/// Create-or-fetch by unique name. An existing row keeps its id; a null
/// url is backfilled from the new value but a non-null url is never
/// overwritten.
pub fn upsert_item(connection: &Connection, name: &str, url: Option<&str>) -> Result<i64> {
    let existing: Option<i64> = connection
        .query_row("SELECT id FROM item WHERE name = ?1", [name], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("failed to look up item {name}"))?;
    if let Some(id) = existing {
        if url.is_some() {
            connection
                .execute(
                    "UPDATE item SET url = COALESCE(url, ?1) WHERE id = ?2",
                    params![url, id],
                )
                .with_context(|| format!("failed to backfill url for item {name}"))?;
        }
        return Ok(id);
    }
    connection
        .execute(
            "INSERT INTO item (name, url) VALUES (?1, ?2)",
            params![name, url],
        )
        .with_context(|| format!("failed to insert item {name}"))?;
    Ok(connection.last_insert_rowid())
}

pub fn upsert_component(connection: &Connection, name: &str) -> Result<i64> {
    let existing: Option<i64> = connection
        .query_row("SELECT id FROM component WHERE name = ?1", [name], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("failed to look up component {name}"))?;
    if let Some(id) = existing {
        return Ok(id);
    }
    connection
        .execute("INSERT INTO component (name) VALUES (?1)", [name])
        .with_context(|| format!("failed to insert component {name}"))?;
    Ok(connection.last_insert_rowid())
}

/// Insert-or-replace on conflict: the latest scrape wins on quantity.
pub fn set_item_scrap(
    connection: &Connection,
    item_id: i64,
    component_id: i64,
    quantity: u32,
) -> Result<()> {
    connection
        .execute(
            "INSERT INTO item_scraps (item_id, component_id, quantity)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (item_id, component_id) DO UPDATE SET quantity = excluded.quantity",
            params![item_id, component_id, i64::from(quantity)],
        )
        .context("failed to set item scrap quantity")?;
    Ok(())
}

pub fn upsert_region(connection: &Connection, name: &str, url: Option<&str>) -> Result<i64> {
    let existing: Option<i64> = connection
        .query_row("SELECT id FROM region WHERE name = ?1", [name], |row| {
            row.get(0)
        })
        .optional()
        .with_context(|| format!("failed to look up region {name}"))?;
    if let Some(id) = existing {
        if url.is_some() {
            connection
                .execute(
                    "UPDATE region SET url = COALESCE(url, ?1) WHERE id = ?2",
                    params![url, id],
                )
                .with_context(|| format!("failed to backfill url for region {name}"))?;
        }
        return Ok(id);
    }
    connection
        .execute(
            "INSERT INTO region (name, url) VALUES (?1, ?2)",
            params![name, url],
        )
        .with_context(|| format!("failed to insert region {name}"))?;
    Ok(connection.last_insert_rowid())
}

/// Region-scoped location upsert. The same name may exist under several
/// regions; within one region the url follows the coalesce-if-null policy.
pub fn upsert_location(
    connection: &Connection,
    name: &str,
    region_id: i64,
    url: Option<&str>,
) -> Result<i64> {
    connection
        .execute(
            "INSERT INTO location (name, region_id, url)
             VALUES (?1, ?2, ?3)
             ON CONFLICT (name, region_id)
             DO UPDATE SET url = COALESCE(location.url, excluded.url)",
            params![name, region_id, url],
        )
        .with_context(|| format!("failed to upsert location {name}"))?;
    connection
        .query_row(
            "SELECT id FROM location WHERE name = ?1 AND region_id = ?2",
            params![name, region_id],
            |row| row.get(0),
        )
        .with_context(|| format!("failed to read back location {name}"))
}

/// Insert an item-location mention; an identical row is ignored, not
/// merged. Returns whether a row was actually inserted.
pub fn insert_item_location(
    connection: &Connection,
    item_id: i64,
    location_id: i64,
    description: &str,
    quantity: Option<u32>,
) -> Result<bool> {
    let affected = connection
        .execute(
            "INSERT OR IGNORE INTO item_locations (item_id, location_id, description, quantity)
             VALUES (?1, ?2, ?3, ?4)",
            params![item_id, location_id, description, quantity.map(i64::from)],
        )
        .context("failed to insert item location")?;
    Ok(affected > 0)
}

/// Existence probe backing the lazy item-location pass: any prior rows
/// mean no network access happens.
pub fn has_item_locations(connection: &Connection, item_id: i64) -> Result<bool> {
    let exists: i64 = connection
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM item_locations WHERE item_id = ?1)",
            [item_id],
            |row| row.get(0),
        )
        .context("failed to check for existing item locations")?;
    Ok(exists == 1)
}

pub fn find_location_by_name(connection: &Connection, name: &str) -> Result<Option<i64>> {
    connection
        .query_row(
            "SELECT id FROM location WHERE name = ?1 ORDER BY id LIMIT 1",
            [name],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("failed to look up location {name}"))
}

pub fn find_item_by_name(connection: &Connection, name: &str) -> Result<Option<ItemRow>> {
    connection
        .query_row(
            "SELECT id, name, url FROM item WHERE name = ?1",
            [name],
            |row| {
                Ok(ItemRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    url: row.get(2)?,
                })
            },
        )
        .optional()
        .with_context(|| format!("failed to look up item {name}"))
}
