use std::sync::LazyLock;

use anyhow::{Context, Result, bail};
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use crate::absolutize_url;
use crate::dom::{self, element_text};
use crate::parse::parse_components_cell;
use crate::store::{self, Store};

pub const ANCHOR_ID: &str = "Junk_items";

// Class marker on the junk items table; it also belongs to several other
// tables on the page, which is why the anchor scan comes first.
const TABLE_CLASSES: [&str; 3] = ["va-table", "va-table-center", "va-table-full"];

static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct JunkItemsReport {
    pub items: usize,
    pub component_links: usize,
}

/// Walk the junk-items table and upsert every item, its components, and
/// their scrap quantities. One transaction per item row; re-running
/// against the same page converges instead of duplicating.
pub fn scrape_junk_items(store: &mut Store, html: &str) -> Result<JunkItemsReport> {
    let document = Html::parse_document(html);
    let table = dom::locate_after_anchor(&document, ANCHOR_ID, "the junk items table", |element| {
        element.value().name() == "table" && dom::has_classes(element, &TABLE_CLASSES)
    })?;

    let mut rows = table.select(&ROW);
    let header = rows.next().context("junk items table has no header row")?;
    let headers: Vec<String> = cells(header)
        .iter()
        .map(|cell| element_text(*cell).to_lowercase())
        .collect();
    let name_index = headers.iter().position(|header| header.starts_with("name"));
    let component_index = headers.iter().position(|header| header.contains("component"));
    let (Some(name_index), Some(component_index)) = (name_index, component_index) else {
        bail!("unexpected junk items table headers: {headers:?}");
    };

    let mut items = 0usize;
    let mut component_links = 0usize;
    for row in rows {
        let row_cells = cells(row);
        if row_cells.len() <= name_index.max(component_index) {
            continue;
        }

        let name_cell = row_cells[name_index];
        let link = dom::first_link(name_cell);
        let name = match link {
            Some(link) => element_text(link),
            None => element_text(name_cell),
        };
        if name.is_empty() {
            continue;
        }
        let url = link
            .and_then(|link| link.value().attr("href"))
            .map(absolutize_url);

        let components = parse_components_cell(row_cells[component_index]);
        if components.is_empty() {
            continue;
        }

        let transaction = store.transaction()?;
        let item_id = store::upsert_item(&transaction, &name, url.as_deref())?;
        for (quantity, component_name) in &components {
            let component_id = store::upsert_component(&transaction, component_name)?;
            store::set_item_scrap(&transaction, item_id, component_id, *quantity)?;
            component_links += 1;
        }
        transaction
            .commit()
            .with_context(|| format!("failed to commit junk item {name}"))?;
        items += 1;
    }

    Ok(JunkItemsReport {
        items,
        component_links,
    })
}

fn cells(row: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|element| matches!(element.value().name(), "td" | "th"))
        .collect()
}
