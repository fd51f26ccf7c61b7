use std::path::Path;

use crate::domain::AppError;

/// Contract the host fulfils to take over a fetched model file.
pub trait ModelLoader {
    fn load(&mut self, path: &Path) -> Result<(), AppError>;
}

/// Default loader that only records the hand-off. A real host swaps
/// in its inference engine here.
#[derive(Default)]
pub struct LogLoader;

impl ModelLoader for LogLoader {
    fn load(&mut self, path: &Path) -> Result<(), AppError> {
        log::info!("Loading model from {}", path.display());
        Ok(())
    }
}
