use crate::config::ExtractorConfig;
use crate::{EngineError, Result};
use std::cell::Cell;
use std::io::Read;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};
use ureq::ResponseExt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
    /// URL actually served once redirects were followed.
    pub final_url: String,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        self.status < 400
    }
}

pub trait PageFetcher {
    fn fetch_page(&self, url: &str, query: &[(&str, &str)]) -> Result<FetchedPage>;

    fn submit_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<FetchedPage>;
}

impl<T: PageFetcher + ?Sized> PageFetcher for &T {
    fn fetch_page(&self, url: &str, query: &[(&str, &str)]) -> Result<FetchedPage> {
        (**self).fetch_page(url, query)
    }

    fn submit_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<FetchedPage> {
        (**self).submit_form(url, fields)
    }
}

/// Probe-style fetch: transport failures and error statuses read as `None`.
pub fn fetch_optional<F: PageFetcher + ?Sized>(
    fetcher: &F,
    url: &str,
    query: &[(&str, &str)],
) -> Option<FetchedPage> {
    fetcher
        .fetch_page(url, query)
        .ok()
        .filter(FetchedPage::is_success)
}

/// Fetch that turns error statuses into [`EngineError::HttpStatus`].
pub fn fetch_required<F: PageFetcher + ?Sized>(
    fetcher: &F,
    url: &str,
    query: &[(&str, &str)],
) -> Result<FetchedPage> {
    let page = fetcher.fetch_page(url, query)?;
    if !page.is_success() {
        return Err(EngineError::HttpStatus {
            url: url.to_string(),
            status: page.status,
        });
    }
    Ok(page)
}

pub struct HttpFetcher {
    agent: ureq::Agent,
    auth_cookie: Option<String>,
    delay: Duration,
    last_request: Cell<Option<Instant>>,
}

impl HttpFetcher {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            agent: build_http_agent(config),
            auth_cookie: normalize_cookie(config.auth_cookie.as_deref()),
            delay: Duration::from_millis(config.delay_ms),
            last_request: Cell::new(None),
        }
    }

    fn wait_turn(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                thread::sleep(self.delay - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch_page(&self, url: &str, query: &[(&str, &str)]) -> Result<FetchedPage> {
        self.wait_turn();
        let mut request = self.agent.get(url);
        for (key, value) in query {
            request = request.query(*key, *value);
        }
        if let Some(cookie) = self.auth_cookie.as_deref() {
            request = request.header("Cookie", cookie);
        }
        let response = request.call().map_err(|e| transport_error(url, e))?;
        read_page(url, response)
    }

    fn submit_form(&self, url: &str, fields: &[(&str, &str)]) -> Result<FetchedPage> {
        self.wait_turn();
        let mut request = self.agent.post(url);
        if let Some(cookie) = self.auth_cookie.as_deref() {
            request = request.header("Cookie", cookie);
        }
        let response = request
            .send_form(fields.iter().copied())
            .map_err(|e| transport_error(url, e))?;
        read_page(url, response)
    }
}

fn build_http_agent(config: &ExtractorConfig) -> ureq::Agent {
    let mut builder = ureq::Agent::config_builder();
    builder = builder
        .http_status_as_error(false)
        .timeout_global(Some(Duration::from_secs(config.timeout_secs.max(1))))
        .user_agent(config.user_agent.as_str());
    builder.build().into()
}

fn read_page(url: &str, mut response: ureq::http::Response<ureq::Body>) -> Result<FetchedPage> {
    let status = response.status().as_u16();
    let final_url = response.get_uri().to_string();
    let mut buf = Vec::new();
    response
        .body_mut()
        .as_reader()
        .read_to_end(&mut buf)
        .map_err(|e| EngineError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
    Ok(FetchedPage {
        status,
        body: String::from_utf8_lossy(&buf).into_owned(),
        final_url,
    })
}

fn transport_error(url: &str, err: ureq::Error) -> EngineError {
    EngineError::Transport {
        url: url.to_string(),
        message: err.to_string(),
    }
}

/// A raw `Cookie` header value, or a path to a file holding one.
pub fn normalize_cookie(value: Option<&str>) -> Option<String> {
    let raw = value?.trim();
    if raw.is_empty() {
        return None;
    }
    let header = match std::fs::read_to_string(Path::new(raw)) {
        Ok(contents) => contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        Err(_) => raw.to_string(),
    };
    let header = header.trim().trim_end_matches(';').trim().to_string();
    (!header.is_empty()).then_some(header)
}
