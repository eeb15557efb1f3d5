use anyhow::{Context, Result, bail};
use scraper::{ElementRef, Html};
use serde::Serialize;

use crate::dom::{self, element_text};
use crate::fetch::PageFetcher;
use crate::store::{self, Store};
use crate::text::{clean_text, leading_count_word};

pub const ANCHOR_ID: &str = "Locations";

#[derive(Debug, Clone, Serialize)]
pub struct ItemLocationsReport {
    pub inserted: usize,
    pub fetched: bool,
}

/// Resolve an item by name and populate its location mentions on demand.
pub fn ensure_item_locations(
    store: &mut Store,
    fetcher: &dyn PageFetcher,
    item_name: &str,
) -> Result<ItemLocationsReport> {
    let Some(item) = store::find_item_by_name(store.connection(), item_name)? else {
        bail!("unknown item: {item_name}");
    };
    let Some(url) = &item.url else {
        // No detail page on record, nothing to fetch.
        return Ok(ItemLocationsReport {
            inserted: 0,
            fetched: false,
        });
    };
    populate_item_locations(store, fetcher, item.id, url)
}

/// Lazy, idempotent population of an item's location mentions.
///
/// Any pre-existing rows short-circuit before network access. A detail
/// page without a "Locations" section yields zero rows, not an error.
/// Locations must already be known from the region pass; candidates that
/// resolve to no stored location are dropped.
pub fn populate_item_locations(
    store: &mut Store,
    fetcher: &dyn PageFetcher,
    item_id: i64,
    item_url: &str,
) -> Result<ItemLocationsReport> {
    if store::has_item_locations(store.connection(), item_id)? {
        return Ok(ItemLocationsReport {
            inserted: 0,
            fetched: false,
        });
    }

    let html = fetcher.fetch_html(item_url)?;
    let document = Html::parse_document(&html);

    let list = dom::element_by_id(&document, ANCHOR_ID)
        .and_then(dom::enclosing_heading)
        .and_then(|heading| {
            dom::first_following(heading, |element| element.value().name() == "ul")
        });
    let Some(list) = list else {
        // Not every item page documents locations.
        return Ok(ItemLocationsReport {
            inserted: 0,
            fetched: true,
        });
    };

    let mut inserted = 0usize;
    let transaction = store.transaction()?;
    for entry in list
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|element| element.value().name() == "li")
    {
        let Some(link) = main_location_link(entry) else {
            continue;
        };
        let title = display_title(link);
        if title.is_empty() {
            continue;
        }
        let Some(location_id) = store::find_location_by_name(&transaction, &title)? else {
            continue;
        };

        let description = element_text(entry);
        if !description.is_empty() {
            let quantity = leading_count_word(&description);
            if store::insert_item_location(&transaction, item_id, location_id, &description, quantity)?
            {
                inserted += 1;
            }
        }

        // Sub-points describe sub-locations within the same place.
        for sub_entry in sub_items(entry) {
            let description = element_text(sub_entry);
            if description.is_empty() {
                continue;
            }
            let quantity = leading_count_word(&description);
            if store::insert_item_location(&transaction, item_id, location_id, &description, quantity)?
            {
                inserted += 1;
            }
        }
    }
    transaction
        .commit()
        .context("failed to commit item locations")?;

    Ok(ItemLocationsReport {
        inserted,
        fetched: true,
    })
}

// Prefer the first non-image link that is not nested in the entry's own
// sub-list; fall back to the first link found anywhere in the entry.
fn main_location_link(entry: ElementRef<'_>) -> Option<ElementRef<'_>> {
    dom::text_links(entry)
        .into_iter()
        .find(|link| !inside_sublist(*link, entry))
        .or_else(|| dom::first_link(entry))
}

fn inside_sublist(link: ElementRef<'_>, entry: ElementRef<'_>) -> bool {
    for ancestor in link.ancestors() {
        if ancestor.id() == entry.id() {
            return false;
        }
        if let Some(element) = ElementRef::wrap(ancestor)
            && matches!(element.value().name(), "ul" | "ol")
        {
            return true;
        }
    }
    false
}

fn sub_items(entry: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    entry
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|element| element.value().name() == "li" && element.id() != entry.id())
        .collect()
}

// Wiki links carry the canonical page name in the title attribute; the
// visible text may be abbreviated.
fn display_title(link: ElementRef<'_>) -> String {
    if let Some(title) = link.value().attr("title") {
        let title = clean_text(title);
        if !title.is_empty() {
            return title;
        }
    }
    element_text(link)
}
