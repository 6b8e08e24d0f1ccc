use crate::paths::AppPaths;
use crate::Result;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use url::Url;

const EVENT_LOG_ROTATE_BYTES: u64 = 2 * 1024 * 1024;
const EVENT_LOG_MAX_BACKUPS: usize = 3;

pub trait EventLog {
    fn log_line(&self, level: &str, event: &str, data: serde_json::Value) -> Result<()>;
}

impl<F> EventLog for F
where
    F: Fn(&str, &str, serde_json::Value) -> Result<()>,
{
    fn log_line(&self, level: &str, event: &str, data: serde_json::Value) -> Result<()> {
        self(level, event, data)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventLog;

impl EventLog for NullEventLog {
    fn log_line(&self, _level: &str, _event: &str, _data: serde_json::Value) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct JsonlEventLog {
    path: PathBuf,
}

impl JsonlEventLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn for_paths(paths: &AppPaths) -> Self {
        Self::new(paths.event_log_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventLog for JsonlEventLog {
    fn log_line(&self, level: &str, event: &str, data: serde_json::Value) -> Result<()> {
        let line = serde_json::json!({
            "ts_ms": now_ms(),
            "level": level,
            "event": event,
            "data": data
        })
        .to_string();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        rotate_if_needed(&self.path)?;
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?
            .write_all(format!("{line}\n").as_bytes())?;
        Ok(())
    }
}

// events.jsonl -> events.jsonl.1 -> ... -> events.jsonl.N, oldest dropped.
fn rotate_if_needed(path: &Path) -> Result<()> {
    let full = std::fs::metadata(path)
        .map(|m| m.len() >= EVENT_LOG_ROTATE_BYTES)
        .unwrap_or(false);
    if !full {
        return Ok(());
    }
    let _ = std::fs::remove_file(backup_path(path, EVENT_LOG_MAX_BACKUPS));
    for n in (1..EVENT_LOG_MAX_BACKUPS).rev() {
        let older = backup_path(path, n);
        if older.exists() {
            std::fs::rename(&older, backup_path(path, n + 1))?;
        }
    }
    std::fs::rename(path, backup_path(path, 1))?;
    Ok(())
}

fn backup_path(path: &Path, n: usize) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(format!(".{n}"));
    path.with_file_name(name)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Keeps only scheme and host so session tokens in paths or queries never reach the log.
pub fn redact_url_for_log(value: &str) -> String {
    match Url::parse(value) {
        Ok(uri) => {
            let scheme = uri.scheme();
            let authority = uri.host_str().unwrap_or("unknown-host");
            format!("{scheme}://{authority}/...")
        }
        Err(_) => "[invalid-url]".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn jsonl_log_appends_structured_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::new(dir.path().to_path_buf());
        let log = JsonlEventLog::for_paths(&paths);

        log.log_line("info", "page_fetched", serde_json::json!({"page": 1}))
            .expect("log");
        log.log_line("warn", "collection_stopped", serde_json::json!({"reason": "redirected"}))
            .expect("log");

        let raw = std::fs::read_to_string(log.path()).expect("read");
        let lines: Vec<serde_json::Value> = raw
            .lines()
            .map(|l| serde_json::from_str(l).expect("json line"))
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "page_fetched");
        assert_eq!(lines[1]["level"], "warn");
        assert_eq!(lines[1]["data"]["reason"], "redirected");
    }

    #[test]
    fn full_log_rolls_over_to_numbered_backups() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = AppPaths::new(dir.path().to_path_buf());
        let log = JsonlEventLog::for_paths(&paths);
        std::fs::create_dir_all(paths.logs_dir()).expect("dir");

        for _ in 0..EVENT_LOG_MAX_BACKUPS + 1 {
            std::fs::write(log.path(), vec![b'x'; EVENT_LOG_ROTATE_BYTES as usize]).expect("fill");
            log.log_line("info", "page_fetched", serde_json::Value::Null)
                .expect("log");
        }

        let raw = std::fs::read_to_string(log.path()).expect("read");
        assert_eq!(raw.lines().count(), 1);
        for n in 1..=EVENT_LOG_MAX_BACKUPS {
            assert!(backup_path(log.path(), n).is_file(), "missing backup {n}");
        }
        assert!(!backup_path(log.path(), EVENT_LOG_MAX_BACKUPS + 1).exists());
    }

    #[test]
    fn closures_act_as_event_logs() {
        let seen = RefCell::new(Vec::new());
        let sink = |level: &str, event: &str, _data: serde_json::Value| -> Result<()> {
            seen.borrow_mut().push(format!("{level}:{event}"));
            Ok(())
        };
        sink.log_line("warn", "gallery_length_mismatch", serde_json::Value::Null)
            .expect("log");
        assert_eq!(seen.into_inner(), vec!["warn:gallery_length_mismatch"]);
    }

    #[test]
    fn redaction_drops_path_and_query() {
        assert_eq!(
            redact_url_for_log("https://hypnotube.com/video/secret-1.html?sid=abc"),
            "https://hypnotube.com/..."
        );
        assert_eq!(redact_url_for_log("not a url"), "[invalid-url]");
    }
}
