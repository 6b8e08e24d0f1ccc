use crate::comments::{comments_url, parse_comments};
use crate::config::ExtractorConfig;
use crate::events::{redact_url_for_log, EventLog};
use crate::fetch::{fetch_optional, fetch_required, PageFetcher};
use crate::formats::{resolve_document_formats, resolve_gallery_images, FormatStrategy};
use crate::login;
use crate::media::{
    CollectionInfo, CollectionReference, Comment, ItemType, LoginOutcome, MediaRecord,
};
use crate::page::parse_document;
use crate::paginate::{CollectionPages, PaginationPlan};
use crate::urls::{classify_url, SiteUrl};
use crate::{EngineError, Result};
use scraper::Html;
use url::Url;

pub enum Extraction<'a> {
    Item(MediaRecord),
    Collection(CollectionPages<'a>),
}

pub struct Extractor<F, L> {
    fetcher: F,
    log: L,
    config: ExtractorConfig,
    base: Url,
}

impl<F: PageFetcher, L: EventLog> Extractor<F, L> {
    pub fn new(fetcher: F, log: L, config: ExtractorConfig) -> Result<Self> {
        let config = config.normalized()?;
        let base = config.base()?;
        Ok(Self {
            fetcher,
            log,
            config,
            base,
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn extract(&self, url: &str) -> Result<Extraction<'_>> {
        match classify_url(url)? {
            SiteUrl::Video { .. } => self.extract_video(url).map(Extraction::Item),
            SiteUrl::Gallery { .. } => self.extract_gallery(url).map(Extraction::Item),
            collection => self.collection(collection).map(Extraction::Collection),
        }
    }

    pub fn resolve_reference(&self, reference: &CollectionReference) -> Result<MediaRecord> {
        match reference.item_type {
            ItemType::Video => self.extract_video(&reference.target_url),
            ItemType::Gallery => self.extract_gallery(&reference.target_url),
        }
    }

    pub fn extract_video(&self, url: &str) -> Result<MediaRecord> {
        let SiteUrl::Video { id, .. } = classify_url(url)? else {
            return Err(EngineError::UnsupportedUrl(url.to_string()));
        };
        let page = fetch_required(&self.fetcher, url, &[])?;
        self.log_page_fetched(url, ItemType::Video)?;

        let document = Html::parse_document(&page.body);
        let model = parse_document(&document, &page.final_url);
        let resolved = match resolve_document_formats(
            &document,
            &page.body,
            &page.final_url,
            &self.config.base_url,
        ) {
            Ok(resolved) => resolved,
            Err(err) => {
                self.log_resolution_failure(url, &err);
                return Err(err);
            }
        };
        if resolved.strategy == FormatStrategy::RawScan {
            self.log.log_line(
                "warn",
                "format_fallback_scan",
                serde_json::json!({
                    "url": redact_url_for_log(url),
                    "matches": resolved.formats.len(),
                }),
            )?;
        }
        self.log.log_line(
            "info",
            "formats_resolved",
            serde_json::json!({
                "id": id,
                "strategy": resolved.strategy.as_str(),
                "count": resolved.formats.len(),
            }),
        )?;

        let comments = self.extract_comments(&id, ItemType::Video);
        Ok(MediaRecord {
            id,
            kind: ItemType::Video,
            webpage_url: url.to_string(),
            title: model.title,
            description: model.description,
            thumbnail_url: model.thumbnail_url,
            uploader: model.uploader,
            stats: model.stats,
            formats: resolved.formats,
            entries: Vec::new(),
            comments,
        })
    }

    pub fn extract_gallery(&self, url: &str) -> Result<MediaRecord> {
        let SiteUrl::Gallery { id, .. } = classify_url(url)? else {
            return Err(EngineError::UnsupportedUrl(url.to_string()));
        };
        let page = fetch_required(&self.fetcher, url, &[])?;
        self.log_page_fetched(url, ItemType::Gallery)?;
        let model = parse_document(&Html::parse_document(&page.body), &page.final_url);

        let full_page = fetch_optional(&self.fetcher, url, &[("view", "full")]);
        if full_page.is_none() {
            self.log_failure(
                "warn",
                "gallery_full_size_unavailable",
                serde_json::json!({ "id": id }),
            );
        }
        let resolution = match resolve_gallery_images(
            &page.body,
            full_page.as_ref().map(|p| p.body.as_str()),
            &page.final_url,
            &self.config.base_url,
        ) {
            Ok(resolution) => resolution,
            Err(err) => {
                self.log_resolution_failure(url, &err);
                return Err(err);
            }
        };
        if let Some((full, thumbs)) = resolution.length_mismatch {
            self.log.log_line(
                "warn",
                "gallery_length_mismatch",
                serde_json::json!({ "id": id, "full": full, "thumbnails": thumbs }),
            )?;
        }

        let formats = resolution
            .entries
            .iter()
            .flat_map(|entry| entry.formats.iter().cloned())
            .collect();
        let comments = self.extract_comments(&id, ItemType::Gallery);
        Ok(MediaRecord {
            id,
            kind: ItemType::Gallery,
            webpage_url: url.to_string(),
            title: model.title,
            description: model.description,
            thumbnail_url: model.thumbnail_url,
            uploader: model.uploader,
            stats: model.stats,
            formats,
            entries: resolution.entries,
            comments,
        })
    }

    /// Comment feed for one item. Fetch or parse trouble yields an empty list.
    pub fn extract_comments(&self, item_id: &str, item_type: ItemType) -> Vec<Comment> {
        if !self.config.fetch_comments {
            return Vec::new();
        }
        let Some(feed_url) = comments_url(&self.base, item_id, item_type) else {
            return Vec::new();
        };
        match fetch_optional(&self.fetcher, &feed_url, &[]) {
            Some(page) => parse_comments(&page.body, &page.final_url),
            None => {
                self.log_failure(
                    "warn",
                    "comments_fetch_failed",
                    serde_json::json!({ "id": item_id, "kind": item_type.as_str() }),
                );
                Vec::new()
            }
        }
    }

    /// Starts a fresh traversal; nothing is fetched until the first pull.
    pub fn collection(&self, site_url: SiteUrl) -> Result<CollectionPages<'_>> {
        let kind = site_url
            .collection_kind()
            .ok_or_else(|| EngineError::UnsupportedUrl(format!("{site_url:?}")))?;
        let (id, title) = match &site_url {
            SiteUrl::User { id, .. } => (Some(id.clone()), None),
            SiteUrl::Channel { id, name } => (Some(id.clone()), Some(name.clone())),
            SiteUrl::Playlist { id, slug } => (Some(id.clone()), Some(slug.clone())),
            SiteUrl::Favorites | SiteUrl::Video { .. } | SiteUrl::Gallery { .. } => (None, None),
        };
        let item_types = match &site_url {
            SiteUrl::User { photos: true, .. } => vec![ItemType::Gallery],
            SiteUrl::Favorites => vec![ItemType::Video, ItemType::Gallery],
            _ => vec![ItemType::Video],
        };
        let detect_redirects = matches!(site_url, SiteUrl::Playlist { .. });

        let plan = PaginationPlan {
            collection: site_url,
            info: CollectionInfo { id, title, kind },
            item_types,
            detect_redirects,
            max_pages: self.config.max_pages,
        };
        Ok(CollectionPages::new(
            &self.fetcher,
            &self.log,
            self.base.clone(),
            plan,
        ))
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginOutcome> {
        login::login(&self.fetcher, &self.log, &self.base, username, password)
    }

    fn log_page_fetched(&self, url: &str, item_type: ItemType) -> Result<()> {
        self.log.log_line(
            "info",
            "page_fetched",
            serde_json::json!({ "url": redact_url_for_log(url), "kind": item_type.as_str() }),
        )
    }

    fn log_resolution_failure(&self, url: &str, err: &EngineError) {
        match err {
            EngineError::RestrictedContent { message, .. } => self.log_failure(
                "warn",
                "restricted_content",
                serde_json::json!({ "url": redact_url_for_log(url), "message": message }),
            ),
            EngineError::NoPlayableMedia { .. } => self.log_failure(
                "error",
                "no_playable_media",
                serde_json::json!({ "url": redact_url_for_log(url) }),
            ),
            _ => {}
        }
    }

    // Best-effort: a sink error never replaces the failure being reported.
    fn log_failure(&self, level: &str, event: &str, data: serde_json::Value) {
        let _ = self.log.log_line(level, event, data);
    }
}
