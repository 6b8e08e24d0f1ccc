use crate::events::EventLog;
use crate::fetch::PageFetcher;
use crate::html::{element_text, first_text};
use crate::media::LoginOutcome;
use crate::{EngineError, Result};
use regex::Regex;
use scraper::Html;
use std::sync::LazyLock;
use url::Url;

const LOGIN_PATH: &str = "login.php";
const FAILURE_NOTICES: &[&str] = &["invalid username or password", "incorrect login"];

static LOGGED_IN_AS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)logged in as:?\s+(?P<name>[^\s<>]+)").expect("logged in regex")
});

pub fn login(
    fetcher: &dyn PageFetcher,
    log: &dyn EventLog,
    base: &Url,
    username: &str,
    password: &str,
) -> Result<LoginOutcome> {
    let url = base
        .join(LOGIN_PATH)
        .map_err(|_| EngineError::InvalidUrl(base.to_string()))?
        .to_string();
    let page = fetcher.submit_form(
        &url,
        &[
            ("username", username),
            ("pass", password),
            ("remember_me", "1"),
            ("action", "login"),
        ],
    )?;
    if !page.is_success() {
        return Err(EngineError::HttpStatus {
            url,
            status: page.status,
        });
    }

    match interpret_login_response(&page.body, &url) {
        Ok(outcome) => {
            log.log_line(
                "info",
                "login_result",
                serde_json::json!({
                    "succeeded": outcome.succeeded,
                    "display_name": outcome.display_name,
                }),
            )?;
            Ok(outcome)
        }
        Err(err) => {
            // Best-effort: the authentication error wins over a sink error.
            let _ = log.log_line(
                "warn",
                "login_result",
                serde_json::json!({ "succeeded": false, "error": err.to_string() }),
            );
            Err(err)
        }
    }
}

/// A known failure notice is an error. A response with no logged-in marker
/// is reported as not logged in rather than failing.
pub fn interpret_login_response(html: &str, url: &str) -> Result<LoginOutcome> {
    let lowered = html.to_ascii_lowercase();
    if let Some(notice) = FAILURE_NOTICES.iter().find(|n| lowered.contains(*n)) {
        return Err(EngineError::Authentication {
            url: url.to_string(),
            message: notice.to_string(),
        });
    }

    let document = Html::parse_document(html);
    let display_name = first_text(&document, "a.username").or_else(|| {
        let text = element_text(&document.root_element());
        LOGGED_IN_AS_RE
            .captures(&text)
            .map(|caps| caps["name"].to_string())
    });

    Ok(LoginOutcome {
        succeeded: display_name.is_some(),
        display_name,
    })
}
