use std::sync::LazyLock;

use anyhow::{Context, Result};
use ego_tree::NodeRef;
use scraper::{ElementRef, Html, Node, Selector};

use crate::text::clean_text;

static ANY_LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

/// Find the element carrying the given `id` attribute anywhere in the
/// document. Heading anchors are the only stable identifiers the wiki
/// markup offers, so this is the entry point for every extractor.
pub fn element_by_id<'a>(document: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|element| element.value().id() == Some(id))
}

/// Walk up from an anchor to the `h1`..`h6` element enclosing it.
pub fn enclosing_heading(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| is_heading(ancestor.value().name()))
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Scan forward in document order from `start` (exclusive) and return the
/// first element satisfying the predicate.
pub fn first_following<'a, F>(start: ElementRef<'a>, predicate: F) -> Option<ElementRef<'a>>
where
    F: Fn(ElementRef<'a>) -> bool,
{
    let mut node = next_in_document(*start);
    while let Some(current) = node {
        if let Some(element) = ElementRef::wrap(current)
            && predicate(element)
        {
            return Some(element);
        }
        node = next_in_document(current);
    }
    None
}

fn next_in_document<'a>(node: NodeRef<'a, Node>) -> Option<NodeRef<'a, Node>> {
    if let Some(child) = node.first_child() {
        return Some(child);
    }
    let mut current = node;
    loop {
        if let Some(sibling) = current.next_sibling() {
            return Some(sibling);
        }
        current = current.parent()?;
    }
}

/// True when the element's class set contains every class in `wanted`.
pub fn has_classes(element: ElementRef<'_>, wanted: &[&str]) -> bool {
    wanted
        .iter()
        .all(|want| element.value().classes().any(|have| have == *want))
}

/// Locate the anchor with `anchor_id`, its enclosing heading, and the first
/// following element matching the predicate. Any miss is a structural
/// mismatch: the page layout changed and the caller's run must abort.
pub fn locate_after_anchor<'a, F>(
    document: &'a Html,
    anchor_id: &str,
    what: &str,
    predicate: F,
) -> Result<ElementRef<'a>>
where
    F: Fn(ElementRef<'a>) -> bool,
{
    let anchor = element_by_id(document, anchor_id)
        .with_context(|| format!("could not find #{anchor_id} anchor"))?;
    let heading = enclosing_heading(anchor)
        .with_context(|| format!("no heading element encloses #{anchor_id}"))?;
    first_following(heading, predicate)
        .with_context(|| format!("could not find {what} after #{anchor_id}"))
}

/// Normalized text content of an element's subtree. Text chunks are joined
/// with a space so words separated only by markup do not run together.
pub fn element_text(element: ElementRef<'_>) -> String {
    clean_text(&element.text().collect::<Vec<_>>().join(" "))
}

/// All `a[href]` descendants that do not wrap an image. Wiki cells routinely
/// pair a decorative image link with the canonical text link.
pub fn text_links(element: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    element
        .select(&ANY_LINK)
        .filter(|link| link.select(&IMG).next().is_none())
        .collect()
}

/// First `a[href]` descendant, image-wrapping or not.
pub fn first_link(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.select(&ANY_LINK).next()
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::{
        element_by_id, element_text, enclosing_heading, first_following, has_classes,
        locate_after_anchor, text_links,
    };

    const PAGE: &str = r#"
        <h2><span id="Decoy">Decoy</span></h2>
        <table class="va-table"><tr><td>wrong</td></tr></table>
        <h3><span class="mw-headline" id="Junk_items">Junk items</span></h3>
        <p>intro paragraph</p>
        <table class="plain"><tr><td>also wrong</td></tr></table>
        <table class="va-table va-table-center va-table-full">
          <tr><td>right</td></tr>
        </table>
    "#;

    #[test]
    fn forward_scan_skips_non_matching_tables() {
        let document = Html::parse_document(PAGE);
        let anchor = element_by_id(&document, "Junk_items").expect("anchor");
        let heading = enclosing_heading(anchor).expect("heading");
        assert_eq!(heading.value().name(), "h3");

        let table = first_following(heading, |element| {
            element.value().name() == "table"
                && has_classes(element, &["va-table", "va-table-center", "va-table-full"])
        })
        .expect("table");
        assert_eq!(element_text(table), "right");
    }

    #[test]
    fn tables_before_the_anchor_are_never_matched() {
        let document = Html::parse_document(PAGE);
        let table = locate_after_anchor(&document, "Junk_items", "any table", |element| {
            element.value().name() == "table"
        })
        .expect("table");
        // The decoy va-table precedes the anchor and must not win.
        assert_eq!(element_text(table), "also wrong");
    }

    #[test]
    fn missing_anchor_is_a_structural_error() {
        let document = Html::parse_document(PAGE);
        let error = locate_after_anchor(&document, "Nope", "table", |_| true)
            .expect_err("missing anchor must fail");
        assert!(error.to_string().contains("#Nope"));
    }

    #[test]
    fn adjacent_inline_elements_keep_a_word_boundary() {
        let document =
            Html::parse_document("<table><tr><td><b>Big</b><i>Fred</i></td></tr></table>");
        let cell = document
            .root_element()
            .descendants()
            .filter_map(scraper::ElementRef::wrap)
            .find(|element| element.value().name() == "td")
            .expect("cell");
        assert_eq!(element_text(cell), "Big Fred");
    }

    #[test]
    fn text_links_skip_image_links() {
        let html = r#"<td>
            <a href="/wiki/File:Forest.png"><img src="forest.png"></a>
            <a href="/wiki/The_Forest">The Forest</a>
        </td>"#;
        let document = Html::parse_document(&format!("<table><tr>{html}</tr></table>"));
        let cell = document
            .root_element()
            .descendants()
            .filter_map(scraper::ElementRef::wrap)
            .find(|element| element.value().name() == "td")
            .expect("cell");
        let links = text_links(cell);
        assert_eq!(links.len(), 1);
        assert_eq!(element_text(links[0]), "The Forest");
    }
}
