// src/extractors/locator.rs
use scraper::{ElementRef, Html, Selector};

/// Concatenated text of all descendant text nodes, trimmed.
pub fn element_text(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Text of the first element matched by the first selector that matches
/// anything. `None` when no selector matches; the caller decides whether
/// that is fatal.
pub fn first_match_text(document: &Html, selectors: &[Selector]) -> Option<String> {
    selectors.iter().find_map(|selector| {
        let element = document.select(selector).next()?;
        tracing::trace!("Selector {:?} matched <{}>", selector, element.value().name());
        Some(element_text(element))
    })
}
