use std::path::PathBuf;

use hypnotube_engine::config::{load_extractor_config, read_password};
use hypnotube_engine::events::JsonlEventLog;
use hypnotube_engine::extractor::{Extraction, Extractor};
use hypnotube_engine::fetch::HttpFetcher;
use hypnotube_engine::paths::AppPaths;

fn main() -> Result<(), String> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "-h" || a == "--help") {
        print_help();
        return Ok(());
    }

    let mut base_dir: Option<PathBuf> = None;
    let mut do_login = false;
    let mut no_comments = false;
    let mut limit: Option<usize> = None;
    let mut urls: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--base-dir" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--base-dir requires a value".to_string())?;
                base_dir = Some(PathBuf::from(v));
            }
            "--login" => do_login = true,
            "--no-comments" => no_comments = true,
            "--limit" => {
                i += 1;
                let v = args
                    .get(i)
                    .ok_or_else(|| "--limit requires a value".to_string())?;
                limit = Some(
                    v.parse::<usize>()
                        .map_err(|_| format!("--limit expects a number, got {v}"))?,
                );
            }
            other if other.starts_with("--") => {
                return Err(format!("unknown arg: {other} (try --help)"))
            }
            url => urls.push(url.to_string()),
        }
        i += 1;
    }

    if urls.is_empty() {
        return Err("nothing to do (pass at least one URL, try --help)".to_string());
    }

    let paths = AppPaths::new(base_dir.unwrap_or_else(default_base_dir));
    paths.ensure_dirs().map_err(|e| e.to_string())?;

    let mut config = load_extractor_config(&paths).map_err(|e| e.to_string())?;
    if no_comments {
        config.fetch_comments = false;
    }

    let fetcher = HttpFetcher::new(&config);
    let log = JsonlEventLog::for_paths(&paths);
    let extractor = Extractor::new(fetcher, log, config).map_err(|e| e.to_string())?;

    if do_login {
        let username = extractor
            .config()
            .username
            .clone()
            .ok_or_else(|| "--login needs `username` in config/extractor.json".to_string())?;
        let password = read_password(&paths)
            .map_err(|e| e.to_string())?
            .ok_or_else(|| {
                format!(
                    "--login needs a password in {}",
                    paths.password_path().to_string_lossy()
                )
            })?;
        let outcome = extractor
            .login(&username, &password)
            .map_err(|e| e.to_string())?;
        match outcome.display_name {
            Some(name) => eprintln!("Logged in as {name}"),
            None => eprintln!("Login submitted, but the site does not show a logged-in user"),
        }
    }

    for url in urls {
        let json = match extractor.extract(&url).map_err(|e| e.to_string())? {
            Extraction::Item(record) => serde_json::to_value(&record),
            Extraction::Collection(mut pages) => {
                let mut entries = Vec::new();
                for reference in pages.by_ref() {
                    entries.push(reference.map_err(|e| e.to_string())?);
                    if limit.is_some_and(|n| entries.len() >= n) {
                        break;
                    }
                }
                Ok(serde_json::json!({
                    "collection": pages.info(),
                    "entries": entries,
                    "stop_reason": pages.stop_reason(),
                }))
            }
        }
        .map_err(|e| e.to_string())?;
        let text = serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?;
        println!("{text}");
    }

    Ok(())
}

fn default_base_dir() -> PathBuf {
    if let Ok(v) = std::env::var("HYPNOTUBE_BASE_DIR") {
        let t = v.trim();
        if !t.is_empty() {
            return PathBuf::from(t);
        }
    }
    PathBuf::from(".hypnotube")
}

fn print_help() {
    println!(
        r#"hypnotube_extract

Prints metadata for video and gallery pages, or the item references of a
user, channel, playlist or favorites listing, as JSON.

Usage:
  cargo run --bin hypnotube_extract -- https://hypnotube.com/video/some-title-12345.html
  cargo run --bin hypnotube_extract -- --limit 50 https://hypnotube.com/channels/38/hd/
  cargo run --bin hypnotube_extract -- --login https://hypnotube.com/favorites/

Options:
  --base-dir <path>  Config and log directory (default: $HYPNOTUBE_BASE_DIR or ./.hypnotube)
  --login            Log in first with `username` from config/extractor.json and config/password.txt
  --no-comments      Skip the comment feed
  --limit <n>        Stop a listing after n references
"#
    );
}
