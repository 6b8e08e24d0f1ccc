use crate::media::{CollectionKind, ItemType};
use crate::{EngineError, Result};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static VIDEO_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/video/(?P<slug>.+)-(?P<id>\d+)\.html$").expect("video regex"));
static GALLERY_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/galleries/(?P<slug>.+)-(?P<id>\d+)\.html$").expect("gallery regex")
});
static USER_PROFILE_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/user/(?P<slug>.+)-(?P<id>\d+)/?$").expect("user regex"));
static USER_UPLOADS_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/uploads-by-user/(?P<id>\d+)(?:/page(?P<page>\d+)\.html)?/?$")
        .expect("uploads regex")
});
static CHANNEL_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/channels/(?P<id>\d+)/(?P<name>[^/]+?)(?:/page(?P<page>\d+)\.html)?/?$")
        .expect("channel regex")
});
static PLAYLIST_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/playlist/(?P<id>\d+)/(?P<slug>[^/]+?)(?:/page(?P<page>\d+)\.html)?/?$")
        .expect("playlist regex")
});
static FAVORITES_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/favorites/?(?:page(?P<page>\d+)(?:\.html)?/?)?$").expect("favorites regex")
});
pub(crate) static PROFILE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/user/[^/]*-(?P<id>\d+)/").expect("profile link regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteUrl {
    Video { id: String, url: String },
    Gallery { id: String, url: String },
    User { id: String, photos: bool },
    Channel { id: String, name: String },
    Playlist { id: String, slug: String },
    Favorites,
}

impl SiteUrl {
    pub fn collection_kind(&self) -> Option<CollectionKind> {
        match self {
            SiteUrl::Video { .. } | SiteUrl::Gallery { .. } => None,
            SiteUrl::User { photos: false, .. } => Some(CollectionKind::UserUploads),
            SiteUrl::User { photos: true, .. } => Some(CollectionKind::UserPhotos),
            SiteUrl::Channel { .. } => Some(CollectionKind::Channel),
            SiteUrl::Playlist { .. } => Some(CollectionKind::Playlist),
            SiteUrl::Favorites => Some(CollectionKind::Favorites),
        }
    }

    /// URL of listing page `page` (1-based) for collection URLs, `None` for items.
    pub fn page_url(&self, base: &Url, page: usize) -> Option<String> {
        let path = match self {
            SiteUrl::Video { .. } | SiteUrl::Gallery { .. } => return None,
            SiteUrl::User { id, photos } => {
                let suffix = if *photos { "?photos=1" } else { "" };
                format!("uploads-by-user/{id}/page{page}.html{suffix}")
            }
            SiteUrl::Channel { id, name } => format!("channels/{id}/{name}/page{page}.html"),
            SiteUrl::Playlist { id, slug } => format!("playlist/{id}/{slug}/page{page}.html"),
            SiteUrl::Favorites => format!("favorites/page{page}.html"),
        };
        base.join(&path).ok().map(|u| u.to_string())
    }
}

pub fn classify_url(raw: &str) -> Result<SiteUrl> {
    let trimmed = raw.trim();
    let parsed = Url::parse(trimmed).map_err(|_| EngineError::InvalidUrl(trimmed.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(EngineError::InvalidUrl(trimmed.to_string()));
    }
    let path = parsed.path();

    if let Some(caps) = VIDEO_PATH_RE.captures(path) {
        return Ok(SiteUrl::Video {
            id: caps["id"].to_string(),
            url: trimmed.to_string(),
        });
    }
    if let Some(caps) = GALLERY_PATH_RE.captures(path) {
        return Ok(SiteUrl::Gallery {
            id: caps["id"].to_string(),
            url: trimmed.to_string(),
        });
    }
    if let Some(caps) = USER_PROFILE_PATH_RE.captures(path) {
        return Ok(SiteUrl::User {
            id: caps["id"].to_string(),
            photos: false,
        });
    }
    if let Some(caps) = USER_UPLOADS_PATH_RE.captures(path) {
        let photos = parsed
            .query_pairs()
            .any(|(k, v)| k == "photos" && v == "1");
        return Ok(SiteUrl::User {
            id: caps["id"].to_string(),
            photos,
        });
    }
    if let Some(caps) = CHANNEL_PATH_RE.captures(path) {
        return Ok(SiteUrl::Channel {
            id: caps["id"].to_string(),
            name: caps["name"].to_string(),
        });
    }
    if let Some(caps) = PLAYLIST_PATH_RE.captures(path) {
        return Ok(SiteUrl::Playlist {
            id: caps["id"].to_string(),
            slug: caps["slug"].to_string(),
        });
    }
    if FAVORITES_PATH_RE.is_match(path) {
        return Ok(SiteUrl::Favorites);
    }

    Err(EngineError::UnsupportedUrl(trimmed.to_string()))
}

pub fn item_link_type(url: &Url) -> Option<ItemType> {
    let path = url.path();
    if VIDEO_PATH_RE.is_match(path) {
        Some(ItemType::Video)
    } else if GALLERY_PATH_RE.is_match(path) {
        Some(ItemType::Gallery)
    } else {
        None
    }
}

pub(crate) fn same_site(a: &Url, b: &Url) -> bool {
    fn bare(url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
    }
    matches!((bare(a), bare(b)), (Some(x), Some(y)) if x == y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_item_urls() {
        assert_eq!(
            classify_url("https://hypnotube.com/video/deep-spiral-trance-40110.html").expect("video"),
            SiteUrl::Video {
                id: "40110".to_string(),
                url: "https://hypnotube.com/video/deep-spiral-trance-40110.html".to_string(),
            }
        );
        assert!(matches!(
            classify_url("https://www.hypnotube.com/galleries/pocket-watch-set-812.html"),
            Ok(SiteUrl::Gallery { id, .. }) if id == "812"
        ));
    }

    #[test]
    fn classifies_both_user_url_shapes() {
        assert_eq!(
            classify_url("https://hypnotube.com/user/some-hypnotist-5521/").expect("user"),
            SiteUrl::User { id: "5521".to_string(), photos: false }
        );
        assert_eq!(
            classify_url("https://hypnotube.com/uploads-by-user/5521/page3.html").expect("uploads"),
            SiteUrl::User { id: "5521".to_string(), photos: false }
        );
        assert_eq!(
            classify_url("https://hypnotube.com/uploads-by-user/5521/?photos=1").expect("photos"),
            SiteUrl::User { id: "5521".to_string(), photos: true }
        );
    }

    #[test]
    fn classifies_listing_urls() {
        assert_eq!(
            classify_url("https://hypnotube.com/channels/38/hd/page2.html").expect("channel"),
            SiteUrl::Channel { id: "38".to_string(), name: "hd".to_string() }
        );
        assert_eq!(
            classify_url("https://hypnotube.com/channels/38/hd/").expect("channel"),
            SiteUrl::Channel { id: "38".to_string(), name: "hd".to_string() }
        );
        assert_eq!(
            classify_url("https://hypnotube.com/playlist/77/sleep-mix/").expect("playlist"),
            SiteUrl::Playlist { id: "77".to_string(), slug: "sleep-mix".to_string() }
        );
        assert_eq!(
            classify_url("https://hypnotube.com/favorites/").expect("favorites"),
            SiteUrl::Favorites
        );
        assert_eq!(
            classify_url("https://hypnotube.com/favorites/page4").expect("favorites"),
            SiteUrl::Favorites
        );
    }

    #[test]
    fn rejects_unknown_and_malformed_urls() {
        assert!(matches!(
            classify_url("https://hypnotube.com/categories/"),
            Err(EngineError::UnsupportedUrl(_))
        ));
        assert!(matches!(classify_url("not a url"), Err(EngineError::InvalidUrl(_))));
        assert!(matches!(
            classify_url("ftp://hypnotube.com/video/a-1.html"),
            Err(EngineError::InvalidUrl(_))
        ));
    }

    #[test]
    fn builds_listing_page_urls() {
        let base = Url::parse("https://hypnotube.com/").expect("base");
        let user = SiteUrl::User { id: "9".to_string(), photos: true };
        assert_eq!(
            user.page_url(&base, 2).as_deref(),
            Some("https://hypnotube.com/uploads-by-user/9/page2.html?photos=1")
        );
        let playlist = SiteUrl::Playlist { id: "77".to_string(), slug: "mix".to_string() };
        assert_eq!(
            playlist.page_url(&base, 1).as_deref(),
            Some("https://hypnotube.com/playlist/77/mix/page1.html")
        );
        let video = SiteUrl::Video { id: "1".to_string(), url: String::new() };
        assert!(video.page_url(&base, 1).is_none());
    }

    #[test]
    fn same_site_ignores_www_prefix() {
        let a = Url::parse("https://www.hypnotube.com/a").expect("a");
        let b = Url::parse("https://hypnotube.com/b").expect("b");
        let c = Url::parse("https://ads.example.com/video/x-1.html").expect("c");
        assert!(same_site(&a, &b));
        assert!(!same_site(&a, &c));
    }
}
