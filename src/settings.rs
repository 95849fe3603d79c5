use serde::{Deserialize, Serialize};

use crate::language::is_known_language;

/// Library-wide options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LibrarySettings {
    /// Language given to books that declare none.
    pub default_language: String,
    /// Suffix appended to a book's file name to find its sidecar info file.
    pub info_suffix: String,
    /// Whether the scanner descends into dot-directories.
    pub scan_hidden: bool,
}

impl Default for LibrarySettings {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            info_suffix: ".info.json".to_string(),
            scan_hidden: false,
        }
    }
}

impl LibrarySettings {
    pub fn from_json(json: &str) -> Result<Self, String> {
        let settings: Self = serde_json::from_str(json).map_err(|err| err.to_string())?;
        if !is_known_language(&settings.default_language) {
            log::warn!(
                "default language {:?} is not a known language code",
                settings.default_language
            );
        }
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|err| err.to_string())
    }
}
