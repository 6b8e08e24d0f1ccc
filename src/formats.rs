use crate::html::{absolute_url, element_text, selector};
use crate::media::{Format, GalleryImage};
use crate::{EngineError, Result};
use regex::Regex;
use scraper::{ElementRef, Html};
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use url::Url;

const DIALECT_A_PLAYER: &str = "video#vjsplayer";
const DIALECT_B_PLAYER: &str = "video#videoPlayer";
const RESTRICTION_NOTICES: &[&str] = &["div.notice", "div.video-overlay", "div.player-overlay"];
const GALLERY_THUMBS: &str = "div.gallery-thumbs img";
const GALLERY_FULL: &str = "div.gallery-full img";

const TIER_ABOVE_HD: i64 = 4;
const TIER_HD: i64 = 3;
const TIER_LOW: i64 = 2;
const TIER_SD: i64 = 1;
const TIER_UNKNOWN: i64 = 0;
const TIER_WIDTH: i64 = 10_000;
const HD_SIZE: i64 = 720;

const SCAN_FIRST_RANK: i64 = -1;
const SCAN_REST_RANK: i64 = -10;
const GALLERY_FULL_RANK: i64 = 10;
const GALLERY_THUMB_RANK: i64 = 0;

const VIDEO_EXTS: &[&str] = &[
    "mov", "avi", "flv", "wmv", "mkv", "mpg", "mpeg", "m4v", "3gp", "webm", "mp2", "m2v",
    "mpeg4", "f4v", "mp4",
];
const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];

static RAW_VIDEO_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"["'](https?://[^"'\s<>]+\.(?:mov|avi|flv|wmv|mkv|mpg|mpeg|m4v|3gp|webm|mp2|m2v|mpeg4|f4v|mp4))["']"#,
    )
    .expect("raw video url regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatStrategy {
    PlayerSizes,
    PlayerLabels,
    RawScan,
}

impl FormatStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormatStrategy::PlayerSizes => "player_sizes",
            FormatStrategy::PlayerLabels => "player_labels",
            FormatStrategy::RawScan => "raw_scan",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFormats {
    /// Best first, one entry per distinct URL.
    pub formats: Vec<Format>,
    pub strategy: FormatStrategy,
}

pub fn resolve_formats(html: &str, page_url: &str, referer: &str) -> Result<Vec<Format>> {
    resolve_formats_detailed(html, page_url, referer).map(|r| r.formats)
}

pub fn resolve_formats_detailed(
    html: &str,
    page_url: &str,
    referer: &str,
) -> Result<ResolvedFormats> {
    let document = Html::parse_document(html);
    resolve_document_formats(&document, html, page_url, referer)
}

pub(crate) fn resolve_document_formats(
    document: &Html,
    raw_html: &str,
    page_url: &str,
    referer: &str,
) -> Result<ResolvedFormats> {
    let base = Url::parse(page_url).map_err(|_| EngineError::InvalidUrl(page_url.to_string()))?;
    let headers = referer_headers(referer);

    let sized = player_sources(document, DIALECT_A_PLAYER, &base, "size")
        .into_iter()
        .map(|(url, label)| {
            let rank = size_rank(&label);
            build_format(url, &label, rank, "mp4", &headers)
        })
        .collect::<Vec<_>>();
    if !sized.is_empty() {
        return Ok(finish(sized, FormatStrategy::PlayerSizes));
    }

    let labelled = player_sources(document, DIALECT_B_PLAYER, &base, "label")
        .into_iter()
        .map(|(url, label)| {
            let rank = hd_sd_rank(&label);
            build_format(url, &label, rank, "mp4", &headers)
        })
        .collect::<Vec<_>>();
    if !labelled.is_empty() {
        return Ok(finish(labelled, FormatStrategy::PlayerLabels));
    }

    if let Some(message) = restriction_notice(document) {
        return Err(EngineError::RestrictedContent {
            url: page_url.to_string(),
            message,
        });
    }

    let scanned = scan_raw_video_urls(raw_html)
        .into_iter()
        .enumerate()
        .map(|(i, url)| {
            let rank = if i == 0 { SCAN_FIRST_RANK } else { SCAN_REST_RANK };
            let mut format = build_format(url, "", rank, "mp4", &headers);
            format.format_id = format!("scan-{}", i + 1);
            format
        })
        .collect::<Vec<_>>();
    if !scanned.is_empty() {
        return Ok(finish(scanned, FormatStrategy::RawScan));
    }

    Err(EngineError::NoPlayableMedia {
        url: page_url.to_string(),
    })
}

/// Above 720, then 720 / `hd`, then smaller numbers, then `sd`, then anything else.
pub fn size_rank(size: &str) -> i64 {
    let label = size.trim().to_ascii_lowercase();
    let numeric = label.strip_suffix('p').unwrap_or(&label);
    if let Ok(n) = numeric.parse::<u32>() {
        let n = i64::from(n);
        let tier = if n > HD_SIZE {
            TIER_ABOVE_HD
        } else if n == HD_SIZE {
            TIER_HD
        } else {
            TIER_LOW
        };
        return tier * TIER_WIDTH + n;
    }
    match label.as_str() {
        "hd" => TIER_HD * TIER_WIDTH + HD_SIZE,
        "sd" => TIER_SD * TIER_WIDTH,
        _ => TIER_UNKNOWN,
    }
}

pub fn hd_sd_rank(label: &str) -> i64 {
    match label.trim().to_ascii_lowercase().as_str() {
        "hd" => TIER_HD * TIER_WIDTH,
        "sd" => TIER_SD * TIER_WIDTH,
        _ => TIER_UNKNOWN,
    }
}

fn player_sources(
    document: &Html,
    player_css: &str,
    base: &Url,
    label_attr: &str,
) -> Vec<(String, String)> {
    let player_sel = selector(player_css);
    let source_sel = selector("source[src]");
    let Some(player) = document.select(&player_sel).next() else {
        return Vec::new();
    };
    player
        .select(&source_sel)
        .filter_map(|source| {
            let url = absolute_url(source.value().attr("src")?, base)?;
            Some((url, source_label(&source, label_attr)))
        })
        .collect()
}

fn source_label(source: &ElementRef<'_>, label_attr: &str) -> String {
    source
        .value()
        .attr(label_attr)
        .or_else(|| source.value().attr("title"))
        .unwrap_or("")
        .trim()
        .to_string()
}

fn restriction_notice(document: &Html) -> Option<String> {
    RESTRICTION_NOTICES.iter().find_map(|css| {
        let sel = selector(css);
        document
            .select(&sel)
            .map(|el| element_text(&el))
            .find(|text| !text.is_empty())
    })
}

fn scan_raw_video_urls(raw_html: &str) -> Vec<String> {
    let unescaped = raw_html.replace("\\/", "/");
    RAW_VIDEO_URL_RE
        .captures_iter(&unescaped)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn referer_headers(referer: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("Referer".to_string(), referer.to_string());
    headers
}

fn build_format(
    url: String,
    label: &str,
    rank: i64,
    default_ext: &str,
    headers: &BTreeMap<String, String>,
) -> Format {
    let format_id = if label.is_empty() {
        "source".to_string()
    } else {
        label.to_ascii_lowercase()
    };
    Format {
        container_extension: container_extension(&url, default_ext),
        url,
        format_id,
        quality_label: label.to_string(),
        rank,
        required_headers: headers.clone(),
    }
}

fn container_extension(url: &str, default_ext: &str) -> String {
    let path = Url::parse(url)
        .map(|u| u.path().to_ascii_lowercase())
        .unwrap_or_default();
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_string())
        .filter(|ext| VIDEO_EXTS.contains(&ext.as_str()) || IMAGE_EXTS.contains(&ext.as_str()))
        .unwrap_or_else(|| default_ext.to_string())
}

// Repeated URLs keep their first position and best rank; equal ranks keep page order.
fn dedupe_and_order(formats: Vec<Format>) -> Vec<Format> {
    let mut out: Vec<Format> = Vec::with_capacity(formats.len());
    let mut index_by_url: HashMap<String, usize> = HashMap::new();
    for format in formats {
        match index_by_url.get(&format.url) {
            Some(&i) => {
                if format.rank > out[i].rank {
                    out[i] = format;
                }
            }
            None => {
                index_by_url.insert(format.url.clone(), out.len());
                out.push(format);
            }
        }
    }
    out.sort_by(|a, b| b.rank.cmp(&a.rank));
    out
}

fn finish(formats: Vec<Format>, strategy: FormatStrategy) -> ResolvedFormats {
    ResolvedFormats {
        formats: dedupe_and_order(formats),
        strategy,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryResolution {
    pub entries: Vec<GalleryImage>,
    /// `(full_size_count, thumbnail_count)` when the two lists disagree.
    pub length_mismatch: Option<(usize, usize)>,
}

/// Pairs `view=full` images with primary-page thumbnails by position.
pub fn resolve_gallery_images(
    primary_html: &str,
    full_html: Option<&str>,
    page_url: &str,
    referer: &str,
) -> Result<GalleryResolution> {
    let base = Url::parse(page_url).map_err(|_| EngineError::InvalidUrl(page_url.to_string()))?;
    let primary = Html::parse_document(primary_html);
    let thumbs = image_sources(&primary, GALLERY_THUMBS, &base);
    let full = full_html
        .map(|html| image_sources(&Html::parse_document(html), GALLERY_FULL, &base))
        .unwrap_or_default();

    if thumbs.is_empty() && full.is_empty() {
        if let Some(message) = restriction_notice(&primary) {
            return Err(EngineError::RestrictedContent {
                url: page_url.to_string(),
                message,
            });
        }
        return Err(EngineError::NoPlayableMedia {
            url: page_url.to_string(),
        });
    }

    let headers = referer_headers(referer);
    let positions = full.len().max(thumbs.len());
    let entries = (0..positions)
        .map(|index| {
            let mut formats = Vec::with_capacity(2);
            if let Some(url) = full.get(index) {
                let mut f = build_format(url.clone(), "full", GALLERY_FULL_RANK, "jpg", &headers);
                f.quality_label = "full".to_string();
                formats.push(f);
            }
            if let Some(url) = thumbs.get(index) {
                let mut f = build_format(url.clone(), "thumb", GALLERY_THUMB_RANK, "jpg", &headers);
                f.quality_label = "thumb".to_string();
                formats.push(f);
            }
            GalleryImage { index, formats }
        })
        .collect();

    let length_mismatch = (full.len() != thumbs.len()).then_some((full.len(), thumbs.len()));
    Ok(GalleryResolution {
        entries,
        length_mismatch,
    })
}

fn image_sources(document: &Html, css: &str, base: &Url) -> Vec<String> {
    let sel = selector(css);
    document
        .select(&sel)
        .filter_map(|img| {
            let raw = img
                .value()
                .attr("data-src")
                .or_else(|| img.value().attr("src"))?;
            absolute_url(raw, base)
        })
        .collect()
}
