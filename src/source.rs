use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use crate::error::Result;
use crate::io::{excel_read, fetch};
use crate::model::Dataset;

/// Produces a fresh dataset snapshot on every call.
pub trait DatasetSource {
    fn load(&self) -> Result<Dataset>;
}

/// Workbook published at a URL and cached at a local path.
#[derive(Debug, Clone)]
pub struct RemoteWorkbook {
    url: String,
    cache_path: PathBuf,
}

impl RemoteWorkbook {
    pub fn new(url: impl Into<String>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            cache_path: cache_path.into(),
        }
    }
}

impl DatasetSource for RemoteWorkbook {
    /// Re-downloads the workbook, replacing the cached copy, and reads it.
    #[instrument(
        level = "info",
        skip_all,
        fields(url = %self.url, cache = %self.cache_path.display())
    )]
    fn load(&self) -> Result<Dataset> {
        fetch::download(&self.url, &self.cache_path)?;
        let dataset = excel_read::read_dataset(&self.cache_path)?;
        info!(sheets = dataset.len(), "remote workbook loaded");
        Ok(dataset)
    }
}

/// Workbook read straight from disk.
#[derive(Debug, Clone)]
pub struct LocalWorkbook {
    path: PathBuf,
}

impl LocalWorkbook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetSource for LocalWorkbook {
    fn load(&self) -> Result<Dataset> {
        excel_read::read_dataset(&self.path)
    }
}

/// Fixed snapshot. Each load hands out a copy.
#[derive(Debug, Clone, Default)]
pub struct StaticSource(pub Dataset);

impl DatasetSource for StaticSource {
    fn load(&self) -> Result<Dataset> {
        Ok(self.0.clone())
    }
}
