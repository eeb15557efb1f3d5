use std::sync::LazyLock;

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use serde::Serialize;

use crate::absolutize_url;
use crate::dom::{self, element_text};
use crate::store::{self, Store};

pub const ANCHOR_ID: &str = "Regions";

// Marker on the per-region category listing container.
const PAGELIST_CLASSES: [&str; 2] = ["va-pagelist", "CategoryTreeTag"];

static CELL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

#[derive(Debug, Clone, Serialize)]
pub struct RegionsReport {
    pub regions: usize,
    pub locations: usize,
}

/// Two phases over one fetched page: upsert every region from the regions
/// table, then walk each region's sub-heading to its category listing and
/// upsert the locations it links to.
pub fn scrape_regions_and_locations(store: &mut Store, html: &str) -> Result<RegionsReport> {
    let document = Html::parse_document(html);
    let table = dom::locate_after_anchor(&document, ANCHOR_ID, "the regions table", |element| {
        element.value().name() == "table"
    })?;

    let mut regions: Vec<(String, String)> = Vec::new();
    for cell in table.select(&CELL) {
        // The canonical region link comes last; the cell may also hold a
        // decorative image link.
        let links = dom::text_links(cell);
        let Some(link) = links.last() else {
            continue;
        };
        let name = element_text(*link);
        if name.is_empty() {
            continue;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        regions.push((name, absolutize_url(href)));
    }

    let transaction = store.transaction()?;
    let mut region_ids: Vec<(i64, String)> = Vec::new();
    for (name, url) in &regions {
        let id = store::upsert_region(&transaction, name, Some(url))?;
        region_ids.push((id, name.clone()));
    }
    transaction.commit().context("failed to commit regions")?;

    let mut locations = 0usize;
    for (region_id, region_name) in &region_ids {
        let candidates = locations_for_region(&document, region_name);
        if candidates.is_empty() {
            continue;
        }
        let transaction = store.transaction()?;
        for (location_name, location_url) in &candidates {
            store::upsert_location(&transaction, location_name, *region_id, Some(location_url))?;
        }
        transaction
            .commit()
            .with_context(|| format!("failed to commit locations for {region_name}"))?;
        locations += candidates.len();
    }

    Ok(RegionsReport {
        regions: regions.len(),
        locations,
    })
}

// A region without its own headline or listing simply contributes no
// locations; only the top-level regions table is load-bearing.
fn locations_for_region(document: &Html, region_name: &str) -> Vec<(String, String)> {
    let anchor_id = region_name.replace(' ', "_");
    let Some(anchor) = dom::element_by_id(document, &anchor_id) else {
        return Vec::new();
    };
    if !dom::has_classes(anchor, &["mw-headline"]) {
        return Vec::new();
    }
    let Some(heading) = dom::enclosing_heading(anchor) else {
        return Vec::new();
    };
    let Some(listing) = dom::first_following(heading, |element| {
        element.value().name() == "div" && dom::has_classes(element, &PAGELIST_CLASSES)
    }) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for link in dom::text_links(listing) {
        let text = element_text(link);
        if text.is_empty() {
            continue;
        }
        // The first listing link repeats the region itself.
        if text.eq_ignore_ascii_case(region_name) {
            continue;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        out.push((text, absolutize_url(href)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::scrape_regions_and_locations;
    use crate::store::Store;

    const PAGE: &str = r#"
        <h2><span class="mw-headline" id="Regions">Regions</span></h2>
        <table>
          <tr>
            <td>
              <a href="/wiki/File:Forest.png"><img src="forest.png"></a>
              <a href="/wiki/The_Forest">The Forest</a>
            </td>
            <td>
              <a href="/wiki/File:Mire.png"><img src="mire.png"></a>
              <a href="/wiki/The_Mire">The Mire</a>
            </td>
          </tr>
        </table>
        <h3><span class="mw-headline" id="The_Forest">The Forest</span></h3>
        <div class="va-pagelist CategoryTreeTag">
          <a href="/wiki/Category:The_Forest">The Forest</a>
          <a href="/wiki/Flatwoods">Flatwoods</a>
          <a href="/wiki/Vault_76">Vault 76</a>
        </div>
        <h3><span class="mw-headline" id="The_Mire">The Mire</span></h3>
        <div class="va-pagelist CategoryTreeTag">
          <a href="/wiki/Category:The_Mire">The Mire</a>
          <a href="/wiki/Harpers_Ferry">Harpers Ferry</a>
        </div>
    "#;

    fn count(store: &Store, sql: &str) -> i64 {
        store
            .connection()
            .query_row(sql, [], |row| row.get(0))
            .expect("count query")
    }

    #[test]
    fn region_comes_from_the_text_link_not_the_image_link() {
        let mut store = Store::open_in_memory().expect("store");
        let report = scrape_regions_and_locations(&mut store, PAGE).expect("scrape");

        assert_eq!(report.regions, 2);
        let url: Option<String> = store
            .connection()
            .query_row(
                "SELECT url FROM region WHERE name = 'The Forest'",
                [],
                |row| row.get(0),
            )
            .expect("region url");
        assert_eq!(
            url.as_deref(),
            Some("https://fallout.fandom.com/wiki/The_Forest")
        );
    }

    #[test]
    fn locations_are_scoped_to_their_region_and_self_links_skipped() {
        let mut store = Store::open_in_memory().expect("store");
        let report = scrape_regions_and_locations(&mut store, PAGE).expect("scrape");

        // Per listing: region self-link skipped, remaining links kept.
        assert_eq!(report.locations, 3);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM location"), 3);

        let region: String = store
            .connection()
            .query_row(
                "SELECT r.name FROM location l JOIN region r ON r.id = l.region_id
                 WHERE l.name = 'Flatwoods'",
                [],
                |row| row.get(0),
            )
            .expect("region of Flatwoods");
        assert_eq!(region, "The Forest");
    }

    #[test]
    fn rerunning_the_extractor_is_idempotent() {
        let mut store = Store::open_in_memory().expect("store");
        scrape_regions_and_locations(&mut store, PAGE).expect("first run");
        scrape_regions_and_locations(&mut store, PAGE).expect("second run");

        assert_eq!(count(&store, "SELECT COUNT(*) FROM region"), 2);
        assert_eq!(count(&store, "SELECT COUNT(*) FROM location"), 3);
    }

    #[test]
    fn region_without_a_listing_contributes_no_locations() {
        let page = r#"
            <h2><span id="Regions">Regions</span></h2>
            <table><tr><td><a href="/wiki/Ash_Heap">Ash Heap</a></td></tr></table>
        "#;
        let mut store = Store::open_in_memory().expect("store");
        let report = scrape_regions_and_locations(&mut store, page).expect("scrape");
        assert_eq!(report.regions, 1);
        assert_eq!(report.locations, 0);
    }

    #[test]
    fn missing_regions_anchor_is_fatal() {
        let mut store = Store::open_in_memory().expect("store");
        let error =
            scrape_regions_and_locations(&mut store, "<p>empty</p>").expect_err("must fail");
        assert!(error.to_string().contains("#Regions"));
    }
}
