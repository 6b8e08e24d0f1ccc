use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_dir: PathBuf,
}

impl AppPaths {
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn config_dir(&self) -> PathBuf {
        self.base_dir.join("config")
    }

    pub fn extractor_config_path(&self) -> PathBuf {
        self.config_dir().join("extractor.json")
    }

    pub fn password_path(&self) -> PathBuf {
        self.config_dir().join("password.txt")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.logs_dir().join("events.jsonl")
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [self.config_dir(), self.logs_dir()] {
            ensure_dir(&dir)?;
        }
        Ok(())
    }
}

fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
