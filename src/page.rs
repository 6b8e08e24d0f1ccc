use crate::html::{absolute_url, element_text, first_attr, first_text, selector};
use crate::media::{Stats, Uploader, UNTITLED};
use crate::urls::PROFILE_LINK_RE;
use scraper::{ElementRef, Html};
use url::Url;

const SUBMITTED_BY_PREFIX: &str = "Submitted by";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageModel {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub stats: Stats,
    pub uploader: Uploader,
}

pub fn parse_page(html: &str, page_url: &str) -> PageModel {
    let document = Html::parse_document(html);
    parse_document(&document, page_url)
}

pub(crate) fn parse_document(document: &Html, page_url: &str) -> PageModel {
    PageModel {
        title: first_text(document, "h1").unwrap_or_else(|| UNTITLED.to_string()),
        description: first_text(document, "div.main-description"),
        thumbnail_url: first_attr(document, r#"meta[property="og:image"]"#, "content"),
        stats: parse_stats(document),
        uploader: parse_uploader(document, page_url),
    }
}

fn parse_stats(document: &Html) -> Stats {
    let container_sel = selector("div.stats-container");
    let item_sel = selector("li");
    let labels: Vec<String> = document
        .select(&container_sel)
        .next()
        .map(|container| container.select(&item_sel).map(|li| stat_label(&li)).collect())
        .unwrap_or_default();

    Stats {
        duration_seconds: labels.first().and_then(|v| parse_duration(v)),
        view_count: labels.get(1).and_then(|v| parse_view_count(v)),
        upload_date: labels.get(2).and_then(|v| parse_upload_date(v)),
    }
}

fn stat_label(li: &ElementRef<'_>) -> String {
    let label_sel = selector("span.sub-label");
    li.select(&label_sel)
        .next()
        .map(|span| element_text(&span))
        .unwrap_or_else(|| element_text(li))
}

/// `H:MM:SS` or `MM:SS` to seconds. Any other shape is `None`.
pub fn parse_duration(text: &str) -> Option<u64> {
    let parts: Vec<u64> = text
        .trim()
        .split(':')
        .map(|p| p.trim().parse::<u64>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [h, m, s] => h
            .checked_mul(3600)?
            .checked_add(m.checked_mul(60)?)?
            .checked_add(*s),
        [m, s] => m.checked_mul(60)?.checked_add(*s),
        _ => None,
    }
}

pub fn parse_view_count(text: &str) -> Option<u64> {
    let digits: String = text
        .trim()
        .chars()
        .filter(|ch| *ch != ',' && !ch.is_whitespace())
        .collect();
    digits.parse::<u64>().ok()
}

/// Drops `-`, `:` and spaces and keeps the first eight characters.
pub fn parse_upload_date(text: &str) -> Option<String> {
    let compact: String = text
        .chars()
        .filter(|ch| !matches!(ch, '-' | ':' | ' '))
        .take(8)
        .collect();
    let compact = compact.trim().to_string();
    if compact.is_empty() {
        None
    } else {
        Some(compact)
    }
}

fn parse_uploader(document: &Html, page_url: &str) -> Uploader {
    let Ok(base) = Url::parse(page_url) else {
        return Uploader::anonymous();
    };
    let anchor_sel = selector("a[href]");
    for anchor in document.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(resolved) = absolute_url(href, &base) else {
            continue;
        };
        let Some(caps) = PROFILE_LINK_RE.captures(&resolved) else {
            continue;
        };
        let text = element_text(&anchor);
        let name = text
            .strip_prefix(SUBMITTED_BY_PREFIX)
            .unwrap_or(&text)
            .trim()
            .to_string();
        return Uploader {
            id: Some(caps["id"].to_string()),
            display_name: (!name.is_empty()).then_some(name),
            profile_url: Some(resolved),
        };
    }
    Uploader::anonymous()
}
