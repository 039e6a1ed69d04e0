use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name an analyzed CSV is saved under.
pub fn analyzed_file_name(original: &str) -> String {
    format!("analyzed_{}", original)
}

/// Destination for downloaded artifacts.
pub trait DownloadSink: Send {
    /// Save `bytes` under `file_name` and return where they ended up.
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes downloads into a directory on disk, replacing existing files.
#[derive(Debug, Clone)]
pub struct DownloadDir {
    dir: PathBuf,
}

impl DownloadDir {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DownloadDir {
    fn save(&mut self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Could not create {}", self.dir.display()))?;

        let target = self.dir.join(file_name);
        fs::write(&target, bytes)
            .with_context(|| format!("Could not write {}", target.display()))?;

        info!(path = %target.display(), bytes = bytes.len(), "download saved");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyzed_file_name() {
        assert_eq!(analyzed_file_name("reviews.csv"), "analyzed_reviews.csv");
    }

    #[test]
    fn test_download_dir_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = DownloadDir::new(tmp.path().join("nested"));

        let path = sink.save("analyzed_a.csv", b"comment\nhay\n").unwrap();

        assert_eq!(path, tmp.path().join("nested").join("analyzed_a.csv"));
        assert_eq!(fs::read(&path).unwrap(), b"comment\nhay\n");
    }
}
