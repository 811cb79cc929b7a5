//! Build settings overrides passed to xcodebuild via `-xcconfig`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::types::BuildError;

/// Writes xcconfig content to a file xcodebuild can read.
#[derive(Debug, Clone, Default)]
pub struct XcconfigWriter {
    dir: Option<PathBuf>,
}

impl XcconfigWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes into `dir` instead of a fresh temporary directory.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    /// Returns the path of an `.xcconfig` file holding `content`.
    ///
    /// Content that is itself the path of an existing `.xcconfig` file is
    /// used as is.
    pub fn write(&self, content: &str) -> Result<PathBuf, BuildError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(BuildError::Config("xcconfig content is empty".to_string()));
        }

        let as_path = Path::new(trimmed);
        if as_path.extension().and_then(|e| e.to_str()) == Some("xcconfig") && as_path.is_file() {
            debug!("Using existing xcconfig file {:?}", as_path);
            return Ok(as_path.to_path_buf());
        }

        let dir = match &self.dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                dir.clone()
            }
            None => tempfile::Builder::new()
                .prefix("xcconfig")
                .tempdir()?
                .keep(),
        };
        let path = dir.join("temp.xcconfig");
        fs::write(&path, content)?;
        debug!("Wrote xcconfig to {:?}", path);
        Ok(path)
    }
}
