use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::error::{StoreError, StoreResult};
use super::{FRAME_COUNT, PAGE_SIZE};

/// Tuning knobs for a `PagedStore`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Number of in-memory frames
    pub frame_count: usize,
    /// Upper bound on the length of a single page
    pub max_page_size: usize,
    /// Directory for page backing files, system temp dir when unset
    pub temp_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            frame_count: FRAME_COUNT,
            max_page_size: PAGE_SIZE,
            temp_dir: None,
        }
    }
}

impl StoreConfig {
    pub fn with_frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    pub fn with_temp_dir<P: Into<PathBuf>>(mut self, temp_dir: P) -> Self {
        self.temp_dir = Some(temp_dir.into());
        self
    }

    /// Reject settings a store cannot run with
    pub fn validate(&self) -> StoreResult<()> {
        if self.frame_count == 0 {
            return Err(StoreError::InvalidConfig(
                "frame_count must be at least 1".to_string(),
            ));
        }
        if self.max_page_size == 0 {
            return Err(StoreError::InvalidConfig(
                "max_page_size must be at least 1".to_string(),
            ));
        }
        if let Some(dir) = &self.temp_dir
            && !dir.is_dir()
        {
            return Err(StoreError::InvalidConfig(format!(
                "temp_dir {} is not a directory",
                dir.display()
            )));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file; missing fields take their defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: StoreConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
