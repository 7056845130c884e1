//! Fallback extraction over drifting job-board markup.
//!
//! Every structural lookup is an ordered list of CSS selectors, most specific
//! first. The first selector that produces non-empty text (or, for card
//! lookups, any elements at all) wins. Selectors that fail to parse are
//! skipped rather than reported.

use scraper::{ElementRef, Html, Selector};

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-normalized visible text of an element.
pub fn element_text(element: ElementRef<'_>) -> String {
    normalize_ws(&element.text().collect::<Vec<_>>().join(" "))
}

#[derive(Debug, Clone, Copy)]
pub struct LocatorChain(pub &'static [&'static str]);

impl LocatorChain {
    fn selectors(&self) -> impl Iterator<Item = Selector> + '_ {
        self.0.iter().filter_map(|raw| match Selector::parse(raw) {
            Ok(selector) => Some(selector),
            Err(_) => {
                tracing::debug!("skipping unparsable selector {raw:?}");
                None
            }
        })
    }

    /// All elements matched by the first selector that matches anything.
    pub fn select_all<'a>(&self, document: &'a Html) -> Vec<ElementRef<'a>> {
        for selector in self.selectors() {
            let found: Vec<_> = document.select(&selector).collect();
            if !found.is_empty() {
                return found;
            }
        }
        Vec::new()
    }

    /// First element under `scope` matched by any selector, in chain order.
    pub fn first_in<'a>(&self, scope: ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.selectors()
            .find_map(|selector| scope.select(&selector).next())
    }

    /// First non-empty text under `scope`.
    pub fn text_in(&self, scope: ElementRef<'_>) -> Option<String> {
        self.selectors().find_map(|selector| {
            scope
                .select(&selector)
                .map(element_text)
                .find(|text| !text.is_empty())
        })
    }

    /// First non-empty text anywhere in `document`.
    pub fn text_in_document(&self, document: &Html) -> Option<String> {
        self.text_in(document.root_element())
    }
}
