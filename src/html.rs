use scraper::{ElementRef, Html, Selector};
use url::Url;

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector")
}

/// Text content with every whitespace run collapsed to one space.
pub(crate) fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn first_element<'a>(document: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css);
    document.select(&sel).next()
}

pub(crate) fn first_text(document: &Html, css: &str) -> Option<String> {
    first_element(document, css)
        .map(|el| element_text(&el))
        .filter(|text| !text.is_empty())
}

pub(crate) fn first_attr(document: &Html, css: &str, attr: &str) -> Option<String> {
    first_element(document, css)
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Absolute http(s) URL for an href or src found on `page`, without fragment.
pub(crate) fn absolute_url(raw: &str, page: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    let mut url = page.join(raw).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.into())
}
