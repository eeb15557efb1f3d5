pub mod dom;
pub mod fetch;
pub mod item_locations;
pub mod junk_items;
pub mod lookup;
pub mod parse;
pub mod regions;
pub mod runtime;
pub mod store;
pub mod text;

/// Origin prefixed onto path-relative wiki links.
pub const SITE_BASE: &str = "https://fallout.fandom.com";

pub const JUNK_ITEMS_URL: &str = "https://fallout.fandom.com/wiki/Fallout_76_junk_items";
pub const LOCATIONS_URL: &str = "https://fallout.fandom.com/wiki/Fallout_76_locations";

/// Turn a path-relative wiki href into an absolute URL.
pub fn absolutize_url(href: &str) -> String {
    if href.starts_with('/') {
        format!("{SITE_BASE}{href}")
    } else {
        href.to_string()
    }
}
