//! Selector cascades: ordered lookups where the first non-empty hit wins.

use scraper::{ElementRef, Html, Selector};

use super::text::clean_text;

/// Compiles `selectors`, skipping any the CSS engine does not support
/// (for example jQuery-style `:contains`).
pub(crate) fn compile(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|raw| match Selector::parse(raw) {
            Ok(selector) => Some(selector),
            Err(e) => {
                tracing::debug!(selector = %raw, error = ?e, "skipping unsupported selector");
                None
            }
        })
        .collect()
}

/// Where a cascade searches: the whole document or one element's subtree.
#[derive(Clone, Copy)]
pub(crate) enum Scope<'a> {
    Document(&'a Html),
    Element(ElementRef<'a>),
}

impl<'a> Scope<'a> {
    pub(crate) fn select(self, selector: &Selector) -> Vec<ElementRef<'a>> {
        match self {
            Scope::Document(doc) => doc.select(selector).collect(),
            Scope::Element(el) => el.select(selector).collect(),
        }
    }

    pub(crate) fn select_first(self, selector: &Selector) -> Option<ElementRef<'a>> {
        match self {
            Scope::Document(doc) => doc.select(selector).next(),
            Scope::Element(el) => el.select(selector).next(),
        }
    }

    /// First element matched by any selector, in cascade order.
    pub(crate) fn first_match(self, selectors: &[Selector]) -> Option<ElementRef<'a>> {
        selectors.iter().find_map(|s| self.select_first(s))
    }
}

/// All descendant text of `el`, whitespace-collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    clean_text(&el.text().collect::<Vec<_>>().join(" "))
}

/// Descendant text nodes of `el`, one per line, blank nodes dropped.
pub(crate) fn element_lines(el: ElementRef<'_>) -> Vec<String> {
    el.text()
        .flat_map(str::lines)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Text of the first selector whose first match has non-empty text.
pub(crate) fn first_text(scope: Scope<'_>, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|s| {
        scope
            .select_first(s)
            .map(element_text)
            .filter(|text| !text.is_empty())
    })
}

/// Like [`first_text`], but keeps going until `parse` accepts a match.
pub(crate) fn first_parsed<T>(
    scope: Scope<'_>,
    selectors: &[Selector],
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    selectors.iter().find_map(|s| {
        scope
            .select_first(s)
            .map(element_text)
            .filter(|text| !text.is_empty())
            .and_then(|text| parse(&text))
    })
}

/// Evaluates `steps` left to right and returns the first `Some`.
pub(crate) fn first_some<T>(steps: &[&dyn Fn() -> Option<T>]) -> Option<T> {
    steps.iter().find_map(|step| step())
}
