use serde::Serialize;

/// A gallery entry as returned by uploads and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageEntry {
    /// Public URL of the original file.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Object key, reported for object-storage uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// URL of the 400x300 thumbnail, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb: Option<String>,
    /// URL of the width-capped medium variant, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub medium: Option<String>,
}

impl ImageEntry {
    pub fn new(url: String, name: String) -> Self {
        Self {
            url,
            name,
            key: None,
            thumb: None,
            medium: None,
        }
    }
}
