use serde::{Deserialize, Serialize};

/// A model the user can fetch: where it lives and what to call the
/// local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub url: String,
    pub filename: String,
}

/// Record created once a model has been fetched successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRecord {
    pub name: String,
    pub url: String,
    pub filename: String,
    pub status: String,
}

impl ModelRecord {
    pub fn downloaded(spec: &ModelSpec) -> Self {
        Self {
            name: spec.name.clone(),
            url: spec.url.clone(),
            filename: spec.filename.clone(),
            status: "downloaded".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadStatus {
    NotStarted,
    Downloading,
    Downloaded,
    Failed,
}
