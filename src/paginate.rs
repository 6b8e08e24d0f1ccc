use crate::events::{redact_url_for_log, EventLog};
use crate::fetch::PageFetcher;
use crate::html::{absolute_url, selector};
use crate::media::{CollectionInfo, CollectionReference, ItemType};
use crate::urls::{item_link_type, same_site, SiteUrl};
use crate::{EngineError, Result};
use scraper::Html;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    Exhausted,
    Empty,
    Redirected { requested: String, served: String },
    HttpStatus { status: u16 },
    NoNewItems,
    PageLimit,
    Failed { message: String },
}

impl StopReason {
    pub fn is_anomaly(&self) -> bool {
        !matches!(self, StopReason::Exhausted | StopReason::Empty)
    }

    fn as_str(&self) -> &'static str {
        match self {
            StopReason::Exhausted => "exhausted",
            StopReason::Empty => "empty",
            StopReason::Redirected { .. } => "redirected",
            StopReason::HttpStatus { .. } => "http_status",
            StopReason::NoNewItems => "no_new_items",
            StopReason::PageLimit => "page_limit",
            StopReason::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaginationPlan {
    pub collection: SiteUrl,
    pub info: CollectionInfo,
    pub item_types: Vec<ItemType>,
    /// Stop when the served page differs from the requested one.
    pub detect_redirects: bool,
    pub max_pages: usize,
}

pub struct CollectionPages<'a> {
    fetcher: &'a dyn PageFetcher,
    log: &'a dyn EventLog,
    base: Url,
    plan: PaginationPlan,
    next_page: usize,
    pending: VecDeque<CollectionReference>,
    seen: HashSet<String>,
    found: usize,
    stop: Option<StopReason>,
}

impl<'a> CollectionPages<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        log: &'a dyn EventLog,
        base: Url,
        plan: PaginationPlan,
    ) -> Self {
        Self {
            fetcher,
            log,
            base,
            plan,
            next_page: 1,
            pending: VecDeque::new(),
            seen: HashSet::new(),
            found: 0,
            stop: None,
        }
    }

    pub fn info(&self) -> &CollectionInfo {
        &self.plan.info
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop.as_ref()
    }

    pub fn pages_fetched(&self) -> usize {
        self.next_page - 1
    }

    /// Drops all traversal state so the next pull starts again at page 1.
    pub fn restart(&mut self) {
        self.next_page = 1;
        self.pending.clear();
        self.seen.clear();
        self.found = 0;
        self.stop = None;
    }

    fn load_next_page(&mut self) -> Result<()> {
        let page_index = self.next_page;
        if page_index > self.plan.max_pages {
            return self.finish(StopReason::PageLimit);
        }
        let requested = self
            .plan
            .collection
            .page_url(&self.base, page_index)
            .ok_or_else(|| EngineError::UnsupportedUrl(format!("{:?}", self.plan.collection)))?;

        let page = self.fetcher.fetch_page(&requested, &[])?;
        self.next_page += 1;

        if !page.is_success() {
            return self.finish(StopReason::HttpStatus {
                status: page.status,
            });
        }
        if self.plan.detect_redirects && !same_page(&requested, &page.final_url) {
            return self.finish(StopReason::Redirected {
                requested,
                served: page.final_url,
            });
        }

        let links = extract_item_links(&page.body, &page.final_url, &self.plan.item_types);
        let total = links.len();
        let fresh: Vec<CollectionReference> = links
            .into_iter()
            .filter(|r| self.seen.insert(r.target_url.clone()))
            .collect();

        self.log.log_line(
            "info",
            "collection_page",
            serde_json::json!({
                "page": page_index,
                "url": redact_url_for_log(&requested),
                "links": total,
                "new": fresh.len(),
            }),
        )?;

        if total == 0 {
            let reason = if self.found == 0 {
                StopReason::Empty
            } else {
                StopReason::Exhausted
            };
            return self.finish(reason);
        }
        if fresh.is_empty() {
            return self.finish(StopReason::NoNewItems);
        }

        self.found += fresh.len();
        self.pending.extend(fresh);
        Ok(())
    }

    fn finish(&mut self, reason: StopReason) -> Result<()> {
        let level = if reason.is_anomaly() { "warn" } else { "info" };
        let mut data = serde_json::json!({
            "kind": self.plan.info.kind,
            "reason": reason.as_str(),
            "pages": self.pages_fetched(),
            "items": self.found,
        });
        if let StopReason::Redirected { requested, served } = &reason {
            data["requested"] = redact_url_for_log(requested).into();
            data["served"] = redact_url_for_log(served).into();
        }
        if let StopReason::HttpStatus { status } = &reason {
            data["status"] = (*status).into();
        }
        self.stop = Some(reason);
        self.log.log_line(level, "collection_stopped", data)
    }
}

impl Iterator for CollectionPages<'_> {
    type Item = Result<CollectionReference>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(reference) = self.pending.pop_front() {
                return Some(Ok(reference));
            }
            if self.stop.is_some() {
                return None;
            }
            if let Err(err) = self.load_next_page() {
                if self.stop.is_none() {
                    self.stop = Some(StopReason::Failed {
                        message: err.to_string(),
                    });
                }
                self.pending.clear();
                return Some(Err(err));
            }
        }
    }
}

pub fn extract_item_links(
    html: &str,
    page_url: &str,
    item_types: &[ItemType],
) -> Vec<CollectionReference> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let document = Html::parse_document(html);
    let anchor_sel = selector("a[href]");
    document
        .select(&anchor_sel)
        .filter_map(|a| absolute_url(a.value().attr("href")?, &base))
        .filter_map(|href| {
            let parsed = Url::parse(&href).ok()?;
            if !same_site(&parsed, &base) {
                return None;
            }
            let item_type = item_link_type(&parsed)?;
            item_types.contains(&item_type).then(|| CollectionReference {
                target_url: href,
                item_type,
            })
        })
        .collect()
}

fn same_page(requested: &str, served: &str) -> bool {
    let (Ok(a), Ok(b)) = (Url::parse(requested), Url::parse(served)) else {
        return requested == served;
    };
    same_site(&a, &b)
        && a.path().trim_end_matches('/') == b.path().trim_end_matches('/')
        && a.query() == b.query()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventLog;
    use crate::fetch::FetchedPage;
    use crate::media::CollectionKind;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// Serves canned pages; anything else is a 404. `redirects` maps a
    /// requested URL to the URL reported as served.
    #[derive(Default)]
    struct CannedSite {
        pages: HashMap<String, String>,
        redirects: HashMap<String, String>,
        requests: RefCell<Vec<String>>,
    }

    impl CannedSite {
        fn page(mut self, url: &str, body: &str) -> Self {
            self.pages.insert(url.to_string(), body.to_string());
            self
        }

        fn redirect(mut self, from: &str, to: &str) -> Self {
            self.redirects.insert(from.to_string(), to.to_string());
            self
        }
    }

    impl PageFetcher for CannedSite {
        fn fetch_page(&self, url: &str, _query: &[(&str, &str)]) -> Result<FetchedPage> {
            self.requests.borrow_mut().push(url.to_string());
            let served = self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
            match self.pages.get(&served) {
                Some(body) => Ok(FetchedPage {
                    status: 200,
                    body: body.clone(),
                    final_url: served,
                }),
                None => Ok(FetchedPage {
                    status: 404,
                    body: String::new(),
                    final_url: served,
                }),
            }
        }

        fn submit_form(&self, url: &str, _fields: &[(&str, &str)]) -> Result<FetchedPage> {
            Err(EngineError::Transport {
                url: url.to_string(),
                message: "not supported".to_string(),
            })
        }
    }

    struct BrokenFetcher;

    impl PageFetcher for BrokenFetcher {
        fn fetch_page(&self, url: &str, _query: &[(&str, &str)]) -> Result<FetchedPage> {
            Err(EngineError::Transport {
                url: url.to_string(),
                message: "connection reset".to_string(),
            })
        }

        fn submit_form(&self, url: &str, _fields: &[(&str, &str)]) -> Result<FetchedPage> {
            self.fetch_page(url, &[])
        }
    }

    fn base() -> Url {
        Url::parse("https://hypnotube.com/").expect("base")
    }

    fn listing(paths: &[&str]) -> String {
        let anchors: String = paths
            .iter()
            .map(|p| format!(r#"<a href="{p}"><img src="/t.jpg"></a>"#))
            .collect();
        format!("<html><body><div class=\"list\">{anchors}</div></body></html>")
    }

    fn plan(collection: SiteUrl, kind: CollectionKind, detect_redirects: bool) -> PaginationPlan {
        PaginationPlan {
            collection,
            info: CollectionInfo {
                id: None,
                title: None,
                kind,
            },
            item_types: vec![ItemType::Video],
            detect_redirects,
            max_pages: 50,
        }
    }

    fn channel_plan() -> PaginationPlan {
        plan(
            SiteUrl::Channel {
                id: "38".to_string(),
                name: "hd".to_string(),
            },
            CollectionKind::Channel,
            false,
        )
    }

    fn urls(pages: CollectionPages<'_>) -> Vec<String> {
        pages
            .map(|r| r.expect("reference").target_url)
            .collect()
    }

    #[test]
    fn walks_pages_in_order_until_a_page_has_no_links() {
        let site = CannedSite::default()
            .page(
                "https://hypnotube.com/channels/38/hd/page1.html",
                &listing(&["/video/a-1.html", "/video/b-2.html"]),
            )
            .page(
                "https://hypnotube.com/channels/38/hd/page2.html",
                &listing(&["/video/c-3.html"]),
            )
            .page("https://hypnotube.com/channels/38/hd/page3.html", &listing(&[]));
        let log = NullEventLog;
        let mut pages = CollectionPages::new(&site, &log, base(), channel_plan());
        let got: Vec<String> = pages
            .by_ref()
            .map(|r| r.expect("reference").target_url)
            .collect();
        assert_eq!(
            got,
            vec![
                "https://hypnotube.com/video/a-1.html",
                "https://hypnotube.com/video/b-2.html",
                "https://hypnotube.com/video/c-3.html",
            ]
        );
        assert_eq!(pages.stop_reason(), Some(&StopReason::Exhausted));
        assert_eq!(pages.pages_fetched(), 3);
        assert_eq!(site.requests.borrow().len(), 3);
    }

    #[test]
    fn empty_first_page_is_a_valid_empty_collection() {
        let site = CannedSite::default()
            .page("https://hypnotube.com/channels/38/hd/page1.html", &listing(&[]));
        let log = NullEventLog;
        let mut pages = CollectionPages::new(&site, &log, base(), channel_plan());
        assert!(pages.next().is_none());
        assert_eq!(pages.stop_reason(), Some(&StopReason::Empty));
    }

    #[test]
    fn fetches_lazily_one_page_at_a_time() {
        let site = CannedSite::default()
            .page(
                "https://hypnotube.com/channels/38/hd/page1.html",
                &listing(&["/video/a-1.html", "/video/b-2.html"]),
            )
            .page(
                "https://hypnotube.com/channels/38/hd/page2.html",
                &listing(&["/video/c-3.html"]),
            );
        let log = NullEventLog;
        let mut pages = CollectionPages::new(&site, &log, base(), channel_plan());
        pages.next().expect("first").expect("ok");
        pages.next().expect("second").expect("ok");
        assert_eq!(site.requests.borrow().len(), 1);
        pages.next().expect("third").expect("ok");
        assert_eq!(site.requests.borrow().len(), 2);
    }

    #[test]
    fn playlist_redirect_stops_after_first_page_with_warning() {
        let site = CannedSite::default()
            .page(
                "https://hypnotube.com/playlist/77/mix/page1.html",
                &listing(&["/video/a-1.html"]),
            )
            .redirect(
                "https://hypnotube.com/playlist/77/mix/page2.html",
                "https://hypnotube.com/",
            )
            .page("https://hypnotube.com/", &listing(&["/video/front-page-9.html"]));
        let warnings = RefCell::new(Vec::new());
        let log = |level: &str, event: &str, data: serde_json::Value| -> Result<()> {
            if level == "warn" {
                warnings.borrow_mut().push((event.to_string(), data));
            }
            Ok(())
        };
        let playlist = plan(
            SiteUrl::Playlist {
                id: "77".to_string(),
                slug: "mix".to_string(),
            },
            CollectionKind::Playlist,
            true,
        );
        let mut pages = CollectionPages::new(&site, &log, base(), playlist);
        let got: Vec<String> = pages
            .by_ref()
            .map(|r| r.expect("reference").target_url)
            .collect();
        assert_eq!(got, vec!["https://hypnotube.com/video/a-1.html"]);
        assert!(matches!(pages.stop_reason(), Some(StopReason::Redirected { .. })));
        let warnings = warnings.borrow();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].0, "collection_stopped");
        assert_eq!(warnings[0].1["reason"], "redirected");
    }

    #[test]
    fn repeated_last_page_does_not_loop() {
        let mut site = CannedSite::default();
        for n in 1..=20 {
            let body = if n == 1 {
                listing(&["/video/a-1.html"])
            } else {
                listing(&["/video/b-2.html"])
            };
            site = site.page(&format!("https://hypnotube.com/channels/38/hd/page{n}.html"), &body);
        }
        let log = NullEventLog;
        let mut pages = CollectionPages::new(&site, &log, base(), channel_plan());
        let got: Vec<String> = pages
            .by_ref()
            .map(|r| r.expect("reference").target_url)
            .collect();
        assert_eq!(got.len(), 2);
        assert_eq!(pages.stop_reason(), Some(&StopReason::NoNewItems));
        assert_eq!(pages.pages_fetched(), 3);
    }

    #[test]
    fn page_cap_and_http_status_end_traversal() {
        let site = CannedSite::default().page(
            "https://hypnotube.com/channels/38/hd/page1.html",
            &listing(&["/video/a-1.html"]),
        );
        let log = NullEventLog;

        let mut capped = channel_plan();
        capped.max_pages = 1;
        let mut pages = CollectionPages::new(&site, &log, base(), capped);
        assert_eq!(pages.by_ref().count(), 1);
        assert_eq!(pages.stop_reason(), Some(&StopReason::PageLimit));

        let mut pages = CollectionPages::new(&site, &log, base(), channel_plan());
        assert_eq!(pages.by_ref().count(), 1);
        assert_eq!(pages.stop_reason(), Some(&StopReason::HttpStatus { status: 404 }));
    }

    #[test]
    fn transport_error_is_yielded_once_then_fuses() {
        let log = NullEventLog;
        let mut pages = CollectionPages::new(&BrokenFetcher, &log, base(), channel_plan());
        assert!(matches!(pages.next(), Some(Err(EngineError::Transport { .. }))));
        assert!(pages.next().is_none());
        assert!(matches!(pages.stop_reason(), Some(StopReason::Failed { .. })));
    }

    #[test]
    fn restart_begins_again_at_page_one() {
        let site = CannedSite::default()
            .page(
                "https://hypnotube.com/channels/38/hd/page1.html",
                &listing(&["/video/a-1.html"]),
            )
            .page("https://hypnotube.com/channels/38/hd/page2.html", &listing(&[]));
        let log = NullEventLog;
        let mut pages = CollectionPages::new(&site, &log, base(), channel_plan());
        assert_eq!(pages.by_ref().count(), 1);
        pages.restart();
        assert!(pages.stop_reason().is_none());
        assert_eq!(urls(pages), vec!["https://hypnotube.com/video/a-1.html"]);
    }

    #[test]
    fn mixed_links_keep_document_order_and_skip_foreign_hosts() {
        let html = r#"
        <a href="/galleries/set-5.html">g</a>
        <a href="https://hypnotube.com/video/a-1.html">v</a>
        <a href="https://ads.example.com/video/spam-9.html">ad</a>
        <a href="/categories/">c</a>
        <a href="/video/a-1.html">dup</a>
        <a href="/galleries/set-6.html">g2</a>
        "#;
        let refs = extract_item_links(
            html,
            "https://hypnotube.com/favorites/page1.html",
            &[ItemType::Video, ItemType::Gallery],
        );
        let kinds: Vec<(ItemType, &str)> = refs
            .iter()
            .map(|r| (r.item_type, r.target_url.as_str()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (ItemType::Gallery, "https://hypnotube.com/galleries/set-5.html"),
                (ItemType::Video, "https://hypnotube.com/video/a-1.html"),
                (ItemType::Video, "https://hypnotube.com/video/a-1.html"),
                (ItemType::Gallery, "https://hypnotube.com/galleries/set-6.html"),
            ]
        );

        let videos_only = extract_item_links(
            html,
            "https://hypnotube.com/favorites/page1.html",
            &[ItemType::Video],
        );
        assert_eq!(videos_only.len(), 2);
    }

    #[test]
    fn same_page_ignores_trailing_slash_and_www() {
        assert!(same_page(
            "https://hypnotube.com/playlist/77/mix/page2.html",
            "https://www.hypnotube.com/playlist/77/mix/page2.html"
        ));
        assert!(!same_page(
            "https://hypnotube.com/playlist/77/mix/page2.html",
            "https://hypnotube.com/"
        ));
    }
}
