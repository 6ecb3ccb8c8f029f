//! Helpers over a parsed `scraper` document
//!
//! Element handles carry element-child index paths from the root element,
//! so every helper here works on a freshly parsed [`Html`] and a path.

use scraper::{ElementRef, Html};

use crate::domain::browser::{AncestrySnapshot, NodeInfo, Selector};
use crate::domain::DomainError;

/// Compile a domain selector for `scraper`
pub fn compile(selector: &Selector) -> Result<scraper::Selector, DomainError> {
    let css = selector.to_css()?;
    scraper::Selector::parse(&css).map_err(|e| {
        DomainError::capability("selector", format!("invalid selector '{}': {:?}", selector, e))
    })
}

/// All matches in document order, descendants of `within` only when given
pub fn select<'a>(
    document: &'a Html,
    selector: &scraper::Selector,
    within: Option<ElementRef<'a>>,
) -> Vec<ElementRef<'a>> {
    match within {
        Some(scope) => scope.select(selector).collect(),
        None => document.select(selector).collect(),
    }
}

/// Element-child index path from the root element
pub fn path_of(element: ElementRef<'_>) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = element;

    while let Some(parent) = current.parent().and_then(ElementRef::wrap) {
        let index = current
            .prev_siblings()
            .filter(|node| node.value().is_element())
            .count();
        path.push(index);
        current = parent;
    }

    path.reverse();
    path
}

/// Element at `path`, if the document has one there
pub fn element_at<'a>(document: &'a Html, path: &[usize]) -> Option<ElementRef<'a>> {
    path.iter().try_fold(document.root_element(), |current, &index| {
        current.children().filter_map(ElementRef::wrap).nth(index)
    })
}

/// Text content with all descendant text nodes concatenated
pub fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>()
}

/// Nodes from the root element down to `element`
pub fn ancestry_of(element: ElementRef<'_>) -> AncestrySnapshot {
    let mut nodes = Vec::new();
    let mut current = Some(element);

    while let Some(el) = current {
        nodes.push(node_info(el));
        current = el.parent().and_then(ElementRef::wrap);
    }

    nodes.reverse();
    AncestrySnapshot::new(nodes)
}

fn node_info(element: ElementRef<'_>) -> NodeInfo {
    let value = element.value();
    let tag = value.name().to_ascii_lowercase();
    let classes = sorted_classes(element);

    let siblings: Vec<ElementRef<'_>> = match element.parent() {
        Some(parent) => parent.children().filter_map(ElementRef::wrap).collect(),
        None => vec![element],
    };

    let same_tag: Vec<&ElementRef<'_>> = siblings
        .iter()
        .filter(|s| s.value().name().eq_ignore_ascii_case(&tag))
        .collect();

    let position = same_tag
        .iter()
        .position(|s| s.id() == element.id())
        .map(|p| p + 1)
        .unwrap_or(1);

    let same_signature = same_tag
        .iter()
        .filter(|s| sorted_classes(***s) == classes)
        .count();

    NodeInfo {
        tag,
        id: value.id().map(str::to_string),
        classes,
        position,
        same_tag_siblings: same_tag.len().max(1),
        same_signature_siblings: same_signature.max(1),
    }
}

fn sorted_classes(element: ElementRef<'_>) -> Vec<String> {
    let mut classes: Vec<String> = element.value().classes().map(str::to_string).collect();
    classes.sort();
    classes
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>t</title></head><body>
        <div id="main">
          <ul class="news">
            <li class="item"><a href="/1">One</a></li>
            <li class="item"><a href="/2">Two</a></li>
            <li class="item promo"><a href="/3">Three</a></li>
          </ul>
        </div>
    </body></html>"#;

    #[test]
    fn test_path_round_trip() {
        let document = Html::parse_document(PAGE);
        let selector = compile(&Selector::parse("li a")).unwrap();

        for element in select(&document, &selector, None) {
            let path = path_of(element);
            let found = element_at(&document, &path).unwrap();
            assert_eq!(found.id(), element.id());
        }
    }

    #[test]
    fn test_ancestry_signatures() {
        let document = Html::parse_document(PAGE);
        let selector = compile(&Selector::parse("li:nth-of-type(2) a")).unwrap();
        let link = select(&document, &selector, None)[0];

        let snapshot = ancestry_of(link);
        let tags: Vec<&str> = snapshot.nodes.iter().map(|n| n.tag.as_str()).collect();
        assert_eq!(tags, vec!["html", "body", "div", "ul", "li", "a"]);

        let li = &snapshot.nodes[4];
        assert_eq!(li.position, 2);
        assert_eq!(li.same_tag_siblings, 3);
        assert_eq!(li.same_signature_siblings, 2);
        assert_eq!(snapshot.nodes[2].id.as_deref(), Some("main"));
    }

    #[test]
    fn test_scoped_select_excludes_scope() {
        let document = Html::parse_document(PAGE);
        let ul = select(&document, &compile(&Selector::parse("ul")).unwrap(), None)[0];
        let items = select(&document, &compile(&Selector::parse("li")).unwrap(), Some(ul));
        assert_eq!(items.len(), 3);

        let none = select(&document, &compile(&Selector::parse("ul")).unwrap(), Some(ul));
        assert!(none.is_empty());
    }

    #[test]
    fn test_invalid_selector() {
        assert!(compile(&Selector::parse("li[")).is_err());
        assert!(compile(&Selector::parse("//a/text()")).is_err());
    }
}
