use std::path::{Path, PathBuf};

use crate::domain::ModelSpec;
use crate::utils::sanitize_filename;

const APP_DIR: &str = "model-fetcher";

/// Application configuration: where fetched models live and which
/// models the catalog offers.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub models_dir: PathBuf,
    pub catalog: Vec<ModelSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models_dir: app_data_dir().join("models"),
            catalog: default_catalog(),
        }
    }
}

impl AppConfig {
    /// Read the catalog from `models.json` in the app data directory
    /// when present, falling back to the built-in entry. A broken or
    /// empty file is logged and ignored rather than aborting startup.
    pub fn load() -> Self {
        Self::from_catalog_file(&app_data_dir().join("models.json"))
    }

    pub fn from_catalog_file(path: &Path) -> Self {
        let mut config = Self::default();

        match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Vec<ModelSpec>>(&raw) {
                Ok(catalog) if !catalog.is_empty() => config.catalog = catalog,
                Ok(_) => log::warn!("Catalog at {} is empty, using defaults", path.display()),
                Err(e) => log::warn!("Failed to parse {}: {}", path.display(), e),
            },
            Err(_) => {}
        }

        // Destination names must stay inside the managed directory.
        for spec in &mut config.catalog {
            spec.filename = sanitize_filename(&spec.filename);
        }

        config
    }
}

fn app_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_catalog() -> Vec<ModelSpec> {
    vec![ModelSpec {
        name: "TheBloke / TinyLlama-1.1B-1T-OpenOrca-GGUF (Q4_0)".to_string(),
        url: "https://huggingface.co/TheBloke/TinyLlama-1.1B-1T-OpenOrca-GGUF/resolve/main/tinyllama-1.1b-1t-openorca.Q4_0.gguf?download=true"
            .to_string(),
        filename: "tinyllama-1.1b-1t-openorca.Q4_0.gguf".to_string(),
    }]
}
