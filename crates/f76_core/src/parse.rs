use std::sync::LazyLock;

use regex::Regex;
use ego_tree::NodeRef;
use scraper::{ElementRef, Node};

use crate::text::clean_text;

// Matches the " x2" / " ×2" quantity marker trailing a component name.
static QTY_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?:\bx|×)\s*(\d+)\b").unwrap());

/// Parse a components `<td>` of the shape
/// `<a>Steel</a> x2<br><a>Lead</a>` into ordered `(quantity, name)` pairs.
///
/// Each `<br>`-delimited line is one component entry; a trailing line with
/// no closing `<br>` still counts. Lines yielding no name are dropped
/// silently, blank separators are expected in the source markup. Quantity
/// defaults to 1 when no marker is present.
pub fn parse_components_cell(cell: ElementRef<'_>) -> Vec<(u32, String)> {
    let mut groups: Vec<Vec<NodeRef<'_, Node>>> = Vec::new();
    let mut current: Vec<NodeRef<'_, Node>> = Vec::new();
    for child in cell.children() {
        let is_break = child
            .value()
            .as_element()
            .is_some_and(|element| element.name() == "br");
        if is_break {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(child);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    groups
        .iter()
        .filter_map(|nodes| parse_group(nodes))
        .collect()
}

fn parse_group(nodes: &[NodeRef<'_, Node>]) -> Option<(u32, String)> {
    let link_index = nodes.iter().position(|node| {
        node.value()
            .as_element()
            .is_some_and(|element| element.name() == "a")
    });

    let Some(index) = link_index else {
        return parse_plain_group(nodes);
    };

    let link = ElementRef::wrap(nodes[index])?;
    let name = clean_text(&link.text().collect::<String>());
    if name.is_empty() {
        return None;
    }

    // The marker, when present, sits in the text node immediately after
    // the link ("<a>Wonderglue</a> x3").
    let mut quantity = 1u32;
    if let Some(next) = nodes.get(index + 1)
        && let Some(text) = next.value().as_text()
        && let Some(captures) = QTY_MARKER.captures(text)
    {
        quantity = captures[1].parse().unwrap_or(1);
    }
    Some((quantity, name))
}

// Linkless line: concatenate the plain-text children and apply the marker
// pattern directly ("Steel x3").
fn parse_plain_group(nodes: &[NodeRef<'_, Node>]) -> Option<(u32, String)> {
    let joined = nodes
        .iter()
        .filter_map(|node| node.value().as_text())
        .map(|text| text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let text = clean_text(&joined);
    let text = text.trim_matches(|ch: char| ch == ' ' || ch == '.' || ch == ';');
    if text.is_empty() {
        return None;
    }

    let quantity = QTY_MARKER
        .captures(text)
        .and_then(|captures| captures[1].parse().ok())
        .unwrap_or(1);
    let name = clean_text(&QTY_MARKER.replace_all(text, ""));
    if name.is_empty() {
        return None;
    }
    Some((quantity, name))
}

#[cfg(test)]
mod tests {
    use scraper::{Html, Selector};

    use super::parse_components_cell;

    fn parse_cell(inner: &str) -> Vec<(u32, String)> {
        let document = Html::parse_document(&format!("<table><tr><td>{inner}</td></tr></table>"));
        let selector = Selector::parse("td").unwrap();
        let cell = document.select(&selector).next().expect("cell");
        parse_components_cell(cell)
    }

    fn pairs(entries: &[(u32, &str)]) -> Vec<(u32, String)> {
        entries
            .iter()
            .map(|(quantity, name)| (*quantity, name.to_string()))
            .collect()
    }

    #[test]
    fn linked_components_with_and_without_markers() {
        assert_eq!(
            parse_cell(r#"<a href="/wiki/Steel">Steel</a> x2<br><a href="/wiki/Lead">Lead</a>"#),
            pairs(&[(2, "Steel"), (1, "Lead")])
        );
    }

    #[test]
    fn bare_link_defaults_to_quantity_one() {
        assert_eq!(
            parse_cell(r#"<a href="/wiki/Cloth">Cloth</a>"#),
            pairs(&[(1, "Cloth")])
        );
    }

    #[test]
    fn multiplication_sign_marker_is_recognized() {
        assert_eq!(
            parse_cell(r#"<a href="/wiki/Spring">Spring</a> ×4"#),
            pairs(&[(4, "Spring")])
        );
    }

    #[test]
    fn plain_text_line_without_a_link_falls_back() {
        assert_eq!(parse_cell("Steel x3"), pairs(&[(3, "Steel")]));
        assert_eq!(parse_cell("Wood."), pairs(&[(1, "Wood")]));
    }

    #[test]
    fn blank_lines_are_dropped() {
        assert_eq!(
            parse_cell(r#"<br><a href="/wiki/Screws">Screws</a><br> <br>"#),
            pairs(&[(1, "Screws")])
        );
        assert!(parse_cell("").is_empty());
    }

    #[test]
    fn order_follows_source_lines() {
        let got = parse_cell(
            r#"<a href="/w/A">Adhesive</a><br><a href="/w/B">Bone</a> x2<br><a href="/w/C">Ceramic</a>"#,
        );
        assert_eq!(got, pairs(&[(1, "Adhesive"), (2, "Bone"), (1, "Ceramic")]));
    }

    #[test]
    fn footnote_markers_do_not_leak_into_names() {
        assert_eq!(
            parse_cell(r#"<a href="/wiki/Steel">Steel[2]</a> x2"#),
            pairs(&[(2, "Steel")])
        );
    }
}
