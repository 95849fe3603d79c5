use std::path::{Path, PathBuf};

/// A book file on disk, identified by its path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BookFile {
    path: PathBuf,
}

impl BookFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path as UTF-8, replacing anything that does not decode.
    pub fn path_utf8(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    /// File name without directories, optionally without its extension.
    pub fn name(&self, hide_extension: bool) -> String {
        let name = if hide_extension {
            self.path.file_stem()
        } else {
            self.path.file_name()
        };
        name.map(|value| value.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    /// Lowercased extension, empty when the file has none.
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .and_then(|value| value.to_str())
            .unwrap_or("")
            .to_lowercase()
    }

    /// The sidecar info file stored next to this one.
    pub fn sidecar(&self, suffix: &str) -> PathBuf {
        let mut raw = self.path.clone().into_os_string();
        raw.push(suffix);
        PathBuf::from(raw)
    }
}
