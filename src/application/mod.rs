pub mod download_controller;
pub mod loader;

pub use download_controller::{DownloadController, DownloadEvent};
pub use loader::{LogLoader, ModelLoader};
