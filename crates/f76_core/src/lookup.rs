use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ScrapRow {
    pub component: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct YieldRow {
    pub item: String,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MentionRow {
    pub location: String,
    pub description: String,
    pub quantity: Option<i64>,
}

/// What a junk item scraps into.
pub fn components_of(connection: &Connection, item: &str) -> Result<Vec<ScrapRow>> {
    let mut statement = connection
        .prepare(
            "SELECT c.name, s.quantity
             FROM item i
             JOIN item_scraps s ON s.item_id = i.id
             JOIN component c ON c.id = s.component_id
             WHERE i.name = ?1
             ORDER BY c.name",
        )
        .context("failed to prepare components query")?;
    let rows = statement
        .query_map([item], |row| {
            Ok(ScrapRow {
                component: row.get(0)?,
                quantity: row.get(1)?,
            })
        })
        .context("failed to run components query")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("failed to decode components row")?);
    }
    Ok(out)
}

/// Which junk items yield a component, highest quantity first.
pub fn items_for(connection: &Connection, component: &str) -> Result<Vec<YieldRow>> {
    let mut statement = connection
        .prepare(
            "SELECT i.name, s.quantity
             FROM component c
             JOIN item_scraps s ON s.component_id = c.id
             JOIN item i ON i.id = s.item_id
             WHERE c.name = ?1
             ORDER BY s.quantity DESC, i.name",
        )
        .context("failed to prepare items query")?;
    let rows = statement
        .query_map([component], |row| {
            Ok(YieldRow {
                item: row.get(0)?,
                quantity: row.get(1)?,
            })
        })
        .context("failed to run items query")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("failed to decode items row")?);
    }
    Ok(out)
}

/// Regions containing a location of the given name. The same name can
/// exist under several regions, hence the list.
pub fn region_of(connection: &Connection, location: &str) -> Result<Vec<String>> {
    let mut statement = connection
        .prepare(
            "SELECT r.name
             FROM location l
             JOIN region r ON r.id = l.region_id
             WHERE l.name = ?1
             ORDER BY r.name",
        )
        .context("failed to prepare region query")?;
    let rows = statement
        .query_map([location], |row| row.get::<_, String>(0))
        .context("failed to run region query")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("failed to decode region row")?);
    }
    Ok(out)
}

pub fn locations_in(connection: &Connection, region: &str) -> Result<Vec<String>> {
    let mut statement = connection
        .prepare(
            "SELECT l.name
             FROM region r
             JOIN location l ON l.region_id = r.id
             WHERE r.name = ?1
             ORDER BY l.name",
        )
        .context("failed to prepare locations query")?;
    let rows = statement
        .query_map([region], |row| row.get::<_, String>(0))
        .context("failed to run locations query")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("failed to decode locations row")?);
    }
    Ok(out)
}

/// Documented occurrences of an item, with the free-text notes.
pub fn mentions_of(connection: &Connection, item: &str) -> Result<Vec<MentionRow>> {
    let mut statement = connection
        .prepare(
            "SELECT l.name, il.description, il.quantity
             FROM item i
             JOIN item_locations il ON il.item_id = i.id
             JOIN location l ON l.id = il.location_id
             WHERE i.name = ?1
             ORDER BY il.id",
        )
        .context("failed to prepare mentions query")?;
    let rows = statement
        .query_map([item], |row| {
            Ok(MentionRow {
                location: row.get(0)?,
                description: row.get(1)?,
                quantity: row.get(2)?,
            })
        })
        .context("failed to run mentions query")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("failed to decode mentions row")?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{components_of, items_for, locations_in, region_of};
    use crate::store::{
        Store, set_item_scrap, upsert_component, upsert_item, upsert_location, upsert_region,
    };

    fn seeded() -> Store {
        let store = Store::open_in_memory().expect("store");
        let connection = store.connection();
        let bear = upsert_item(connection, "Teddy Bear", None).expect("item");
        let camera = upsert_item(connection, "Camera", None).expect("item");
        let cloth = upsert_component(connection, "Cloth").expect("component");
        let glue = upsert_component(connection, "Wonderglue").expect("component");
        set_item_scrap(connection, bear, cloth, 1).expect("scrap");
        set_item_scrap(connection, bear, glue, 3).expect("scrap");
        set_item_scrap(connection, camera, glue, 1).expect("scrap");
        let forest = upsert_region(connection, "The Forest", None).expect("region");
        upsert_location(connection, "Flatwoods", forest, None).expect("location");
        upsert_location(connection, "Vault 76", forest, None).expect("location");
        store
    }

    #[test]
    fn components_lookup_is_case_insensitive_and_ordered_by_name() {
        let store = seeded();
        let rows = components_of(store.connection(), "teddy bear").expect("query");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].component, "Cloth");
        assert_eq!(rows[1].component, "Wonderglue");
        assert_eq!(rows[1].quantity, 3);
    }

    #[test]
    fn items_lookup_orders_by_quantity_descending() {
        let store = seeded();
        let rows = items_for(store.connection(), "WONDERGLUE").expect("query");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].item, "Teddy Bear");
        assert_eq!(rows[1].item, "Camera");
    }

    #[test]
    fn region_and_location_lookups_join_both_ways() {
        let store = seeded();
        assert_eq!(
            region_of(store.connection(), "flatwoods").expect("query"),
            vec!["The Forest".to_string()]
        );
        assert_eq!(
            locations_in(store.connection(), "the forest").expect("query"),
            vec!["Flatwoods".to_string(), "Vault 76".to_string()]
        );
    }
}
