use crate::api::HttpClient;
use crate::application::{DownloadController, DownloadEvent, LogLoader, ModelLoader};
use crate::config::AppConfig;
use crate::domain::DownloadStatus;
use crate::ui::{self, DownloadMessage, ModelRow};
use futures::StreamExt;
use iced::Task;

pub struct FetcherApp {
    client: HttpClient,
    controllers: Vec<DownloadController>,
    loader: Box<dyn ModelLoader>,
    status_line: String,
}

impl Default for FetcherApp {
    fn default() -> Self {
        Self::new(AppConfig::load())
    }
}

impl FetcherApp {
    pub fn new(config: AppConfig) -> Self {
        Self::with_loader(config, Box::new(LogLoader))
    }

    pub fn with_loader(config: AppConfig, loader: Box<dyn ModelLoader>) -> Self {
        let models_dir = config.models_dir;
        let controllers = config
            .catalog
            .into_iter()
            .map(|spec| DownloadController::new(spec, models_dir.clone()))
            .collect();

        Self {
            client: HttpClient::new(),
            controllers,
            loader,
            status_line: "Pick a model to download".to_string(),
        }
    }

    fn start_download(&mut self, index: usize) -> Task<Message> {
        let Some(controller) = self.controllers.get_mut(index) else {
            return Task::none();
        };

        match controller.begin(&self.client) {
            Ok(stream) => {
                self.status_line = format!("Downloading {}...", controller.spec().name);
                Task::stream(stream.map(move |event| Message::Transfer(index, event)))
            }
            Err(e) => {
                log::warn!("Could not start download: {}", e);
                self.status_line = e.to_string();
                Task::none()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Message {
    Ui(DownloadMessage),
    /// Event from an in-flight transfer, tagged with the catalog index
    Transfer(usize, DownloadEvent),
}

pub fn update(app: &mut FetcherApp, message: Message) -> Task<Message> {
    match message {
        Message::Ui(DownloadMessage::DownloadPressed(index)) => {
            return app.start_download(index);
        }
        Message::Ui(DownloadMessage::CancelPressed(index)) => {
            if let Some(controller) = app.controllers.get_mut(index) {
                controller.cancel();
                app.status_line = format!("Cancelling {}...", controller.spec().name);
            }
        }
        Message::Ui(DownloadMessage::LoadPressed(index)) => {
            let Some(controller) = app.controllers.get(index) else {
                return Task::none();
            };

            let path = controller.target_path();
            if !path.exists() {
                // The file was removed behind our back; fetch it again.
                return app.start_download(index);
            }

            let name = controller.spec().name.clone();
            match app.loader.load(&path) {
                Ok(()) => app.status_line = format!("Loaded {}", name),
                Err(e) => {
                    log::error!("Failed to load {}: {}", name, e);
                    app.status_line = format!("Failed to load {}: {}", name, e);
                }
            }
        }
        Message::Transfer(index, event) => {
            if let Some(controller) = app.controllers.get_mut(index) {
                controller.apply(event);
                app.status_line = match controller.status() {
                    DownloadStatus::Downloading => format!(
                        "Downloading {}: {:.1}%",
                        controller.spec().name,
                        controller.progress() * 100.0
                    ),
                    DownloadStatus::Downloaded => {
                        format!("Saved: {}", controller.target_path().display())
                    }
                    DownloadStatus::Failed => {
                        format!("Download of {} failed", controller.spec().name)
                    }
                    DownloadStatus::NotStarted => "Download cancelled".to_string(),
                };
            }
        }
    }
    Task::none()
}

pub fn view(app: &FetcherApp) -> iced::Element<'_, Message> {
    let rows = app
        .controllers
        .iter()
        .enumerate()
        .map(|(index, controller)| ModelRow {
            index,
            name: &controller.spec().name,
            status: controller.status(),
            progress: controller.progress(),
        })
        .collect();

    ui::view(rows, &app.status_line).map(Message::Ui)
}
