use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{stream::BoxStream, StreamExt};
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::{
    api::HttpClient,
    domain::{AppError, DownloadStatus, ModelRecord, ModelSpec},
};

#[derive(Debug, Clone)]
pub enum DownloadEvent {
    Progress(f32),
    Completed(PathBuf),
    Failed(AppError),
    Cancelled,
}

/// Cooperative cancellation flag shared with the in-flight transfer.
#[derive(Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Owns the lifecycle of fetching one model file: status, progress,
/// the active transfer handle and the record produced on completion.
///
/// All mutation happens on the UI update turn: `begin` hands back an
/// event stream, and every item that comes out of it must be fed to
/// `apply`. At most one transfer is in flight per controller.
pub struct DownloadController {
    spec: ModelSpec,
    dest_dir: PathBuf,
    status: DownloadStatus,
    progress: f32,
    model: Option<ModelRecord>,
    cancel: Option<CancelHandle>,
}

impl DownloadController {
    pub fn new(spec: ModelSpec, dest_dir: PathBuf) -> Self {
        let target = dest_dir.join(&spec.filename);
        let status = if target.exists() {
            DownloadStatus::Downloaded
        } else {
            DownloadStatus::NotStarted
        };

        Self {
            spec,
            dest_dir,
            status,
            progress: 0.0,
            model: None,
            cancel: None,
        }
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    pub fn status(&self) -> DownloadStatus {
        self.status
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn model(&self) -> Option<&ModelRecord> {
        self.model.as_ref()
    }

    pub fn target_path(&self) -> PathBuf {
        self.dest_dir.join(&self.spec.filename)
    }

    fn part_path(&self) -> PathBuf {
        self.dest_dir.join(format!("{}.part", self.spec.filename))
    }

    /// Start fetching the model. Rejects a second call while a
    /// transfer is already in flight and rejects unparseable URLs.
    ///
    /// The returned stream performs the transfer lazily; the caller
    /// routes every event back into [`apply`](Self::apply).
    pub fn begin(
        &mut self,
        client: &HttpClient,
    ) -> Result<BoxStream<'static, DownloadEvent>, AppError> {
        if self.status == DownloadStatus::Downloading {
            return Err(AppError::TransferInFlight);
        }

        Url::parse(&self.spec.url).map_err(|_| AppError::InvalidUrl(self.spec.url.clone()))?;

        log::info!(
            "Downloading model {} from {}",
            self.spec.name,
            self.spec.url
        );

        self.status = DownloadStatus::Downloading;
        self.progress = 0.0;

        let cancel = CancelHandle::default();
        self.cancel = Some(cancel.clone());

        Ok(transfer_stream(
            client.clone(),
            self.spec.url.clone(),
            self.part_path(),
            self.target_path(),
            cancel,
        ))
    }

    /// Trip the active transfer, if any. The state reset to
    /// `NotStarted` happens when the `Cancelled` event comes back
    /// through `apply`.
    pub fn cancel(&mut self) {
        if let Some(handle) = &self.cancel {
            log::info!("Cancelling download of {}", self.spec.name);
            handle.cancel();
        }
    }

    /// Fold a transfer event into the controller state. This is the
    /// only mutation point once a transfer is running.
    pub fn apply(&mut self, event: DownloadEvent) {
        match event {
            DownloadEvent::Progress(fraction) => {
                // Monotone within one attempt.
                self.progress = self.progress.max(fraction.clamp(0.0, 1.0));
            }
            DownloadEvent::Completed(path) => {
                log::info!("Writing to {} completed", path.display());
                self.model = Some(ModelRecord::downloaded(&self.spec));
                self.status = DownloadStatus::Downloaded;
                self.progress = 1.0;
                self.cancel = None;
            }
            DownloadEvent::Failed(err) => {
                log::error!("Download of {} failed: {}", self.spec.name, err);
                self.status = DownloadStatus::Failed;
                self.cancel = None;
            }
            DownloadEvent::Cancelled => {
                self.status = DownloadStatus::NotStarted;
                self.progress = 0.0;
                self.cancel = None;
            }
        }
    }
}

/// Internal state for the transfer stream
enum TransferState {
    Start {
        client: HttpClient,
        url: String,
        part_path: PathBuf,
        dest_path: PathBuf,
        cancel: CancelHandle,
    },
    Downloading {
        file: tokio::fs::File,
        stream: BoxStream<'static, crate::api::Result<bytes::Bytes>>,
        downloaded: u64,
        total: Option<u64>,
        part_path: PathBuf,
        dest_path: PathBuf,
        cancel: CancelHandle,
    },
    Finished,
}

fn transfer_stream(
    client: HttpClient,
    url: String,
    part_path: PathBuf,
    dest_path: PathBuf,
    cancel: CancelHandle,
) -> BoxStream<'static, DownloadEvent> {
    futures::stream::unfold(
        TransferState::Start {
            client,
            url,
            part_path,
            dest_path,
            cancel,
        },
        |state| async move {
            match state {
                TransferState::Start {
                    client,
                    url,
                    part_path,
                    dest_path,
                    cancel,
                } => {
                    if let Some(parent) = part_path.parent() {
                        if let Err(e) = tokio::fs::create_dir_all(parent).await {
                            return Some((
                                DownloadEvent::Failed(AppError::Filesystem(format!(
                                    "Failed to create model directory: {}",
                                    e
                                ))),
                                TransferState::Finished,
                            ));
                        }
                    }

                    // Stream into a temporary artifact; moved into
                    // place only on a clean finish.
                    let file = match tokio::fs::File::create(&part_path).await {
                        Ok(file) => file,
                        Err(e) => {
                            return Some((
                                DownloadEvent::Failed(AppError::Filesystem(format!(
                                    "Failed to create file: {}",
                                    e
                                ))),
                                TransferState::Finished,
                            ));
                        }
                    };

                    match client.fetch_stream(&url).await {
                        Ok((total_size, stream)) => Some((
                            DownloadEvent::Progress(0.0),
                            TransferState::Downloading {
                                file,
                                stream: stream.boxed(),
                                downloaded: 0,
                                total: total_size,
                                part_path,
                                dest_path,
                                cancel,
                            },
                        )),
                        Err(e) => Some((DownloadEvent::Failed(e), TransferState::Finished)),
                    }
                }
                TransferState::Downloading {
                    mut file,
                    mut stream,
                    mut downloaded,
                    total,
                    part_path,
                    dest_path,
                    cancel,
                } => {
                    if cancel.is_cancelled() {
                        drop(file);
                        let _ = tokio::fs::remove_file(&part_path).await;
                        return Some((DownloadEvent::Cancelled, TransferState::Finished));
                    }

                    match stream.next().await {
                        Some(Ok(chunk)) => {
                            if let Err(e) = file.write_all(&chunk).await {
                                return Some((
                                    DownloadEvent::Failed(AppError::Filesystem(format!(
                                        "Write error: {}",
                                        e
                                    ))),
                                    TransferState::Finished,
                                ));
                            }

                            downloaded += chunk.len() as u64;

                            let progress = if let Some(total_size) = total {
                                if total_size > 0 {
                                    downloaded as f32 / total_size as f32
                                } else {
                                    0.0
                                }
                            } else {
                                0.0
                            };

                            Some((
                                DownloadEvent::Progress(progress),
                                TransferState::Downloading {
                                    file,
                                    stream,
                                    downloaded,
                                    total,
                                    part_path,
                                    dest_path,
                                    cancel,
                                },
                            ))
                        }
                        Some(Err(e)) => Some((DownloadEvent::Failed(e), TransferState::Finished)),
                        None => {
                            if let Err(e) = file.sync_all().await {
                                return Some((
                                    DownloadEvent::Failed(AppError::Filesystem(format!(
                                        "Failed to sync file: {}",
                                        e
                                    ))),
                                    TransferState::Finished,
                                ));
                            }
                            drop(file);

                            if let Err(e) = tokio::fs::rename(&part_path, &dest_path).await {
                                return Some((
                                    DownloadEvent::Failed(AppError::Filesystem(format!(
                                        "Failed to move artifact into place: {}",
                                        e
                                    ))),
                                    TransferState::Finished,
                                ));
                            }

                            Some((
                                DownloadEvent::Completed(dest_path),
                                TransferState::Finished,
                            ))
                        }
                    }
                }
                TransferState::Finished => None,
            }
        },
    )
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_llama() -> ModelSpec {
        ModelSpec {
            name: "TinyLlama".to_string(),
            url: "https://host/m.gguf".to_string(),
            filename: "m.gguf".to_string(),
        }
    }

    fn spec_for(url: &str) -> ModelSpec {
        ModelSpec {
            name: "TinyLlama".to_string(),
            url: url.to_string(),
            filename: "m.gguf".to_string(),
        }
    }

    async fn drive(controller: &mut DownloadController, mut stream: BoxStream<'_, DownloadEvent>) {
        while let Some(event) = stream.next().await {
            controller.apply(event);
        }
    }

    #[test]
    fn initial_status_is_not_started_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let controller = DownloadController::new(tiny_llama(), dir.path().to_path_buf());
        assert_eq!(controller.status(), DownloadStatus::NotStarted);
        assert_eq!(controller.progress(), 0.0);
        assert!(controller.model().is_none());
    }

    #[test]
    fn initial_status_is_downloaded_when_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("m.gguf"), b"weights").unwrap();
        let controller = DownloadController::new(tiny_llama(), dir.path().to_path_buf());
        assert_eq!(controller.status(), DownloadStatus::Downloaded);
    }

    #[test]
    fn begin_sets_downloading_and_resets_progress() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = DownloadController::new(tiny_llama(), dir.path().to_path_buf());
        controller.progress = 0.8;

        let stream = controller.begin(&HttpClient::new());
        assert!(stream.is_ok());
        assert_eq!(controller.status(), DownloadStatus::Downloading);
        assert_eq!(controller.progress(), 0.0);
    }

    #[test]
    fn begin_rejects_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller =
            DownloadController::new(spec_for("not a url"), dir.path().to_path_buf());

        match controller.begin(&HttpClient::new()) {
            Err(AppError::InvalidUrl(url)) => assert_eq!(url, "not a url"),
            _ => panic!("expected InvalidUrl"),
        }
        assert_eq!(controller.status(), DownloadStatus::NotStarted);
    }

    #[test]
    fn begin_rejects_second_start_while_in_flight() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = DownloadController::new(tiny_llama(), dir.path().to_path_buf());
        let client = HttpClient::new();

        let first = controller.begin(&client);
        assert!(first.is_ok());

        match controller.begin(&client) {
            Err(AppError::TransferInFlight) => {}
            _ => panic!("expected TransferInFlight"),
        }
    }

    #[test]
    fn progress_is_monotone_within_an_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let mut controller = DownloadController::new(tiny_llama(), dir.path().to_path_buf());

        controller.apply(DownloadEvent::Progress(0.26));
        assert!((controller.progress() - 0.26).abs() < f32::EPSILON);

        // A late, out-of-order report never walks progress backwards.
        controller.apply(DownloadEvent::Progress(0.1));
        assert!((controller.progress() - 0.26).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn successful_transfer_lands_file_and_record() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/m.gguf")
            .with_status(200)
            .with_body(vec![7u8; 1000])
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/m.gguf", server.url());
        let mut controller = DownloadController::new(spec_for(&url), dir.path().to_path_buf());
        assert_eq!(controller.status(), DownloadStatus::NotStarted);

        let stream = controller.begin(&HttpClient::new()).unwrap();
        assert_eq!(controller.status(), DownloadStatus::Downloading);
        drive(&mut controller, stream).await;

        assert_eq!(controller.status(), DownloadStatus::Downloaded);
        assert_eq!(controller.progress(), 1.0);

        let record = controller.model().expect("record after completion");
        assert_eq!(record.name, "TinyLlama");
        assert_eq!(record.url, url);
        assert_eq!(record.filename, "m.gguf");
        assert_eq!(record.status, "downloaded");

        let written = std::fs::read(dir.path().join("m.gguf")).unwrap();
        assert_eq!(written.len(), 1000);
        assert!(!dir.path().join("m.gguf.part").exists());
    }

    #[tokio::test]
    async fn http_404_transitions_to_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/m.gguf")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/m.gguf", server.url());
        let mut controller = DownloadController::new(spec_for(&url), dir.path().to_path_buf());

        let stream = controller.begin(&HttpClient::new()).unwrap();
        drive(&mut controller, stream).await;

        assert_eq!(controller.status(), DownloadStatus::Failed);
        assert!(controller.model().is_none());
        assert!(!dir.path().join("m.gguf").exists());
    }

    #[tokio::test]
    async fn cancel_returns_to_not_started_without_record() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/m.gguf")
            .with_status(200)
            .with_body(vec![7u8; 1000])
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/m.gguf", server.url());
        let mut controller = DownloadController::new(spec_for(&url), dir.path().to_path_buf());

        let stream = controller.begin(&HttpClient::new()).unwrap();
        controller.cancel();
        drive(&mut controller, stream).await;

        assert_eq!(controller.status(), DownloadStatus::NotStarted);
        assert_eq!(controller.progress(), 0.0);
        assert!(controller.model().is_none());
        assert!(!dir.path().join("m.gguf").exists());
        assert!(!dir.path().join("m.gguf.part").exists());
    }

    #[tokio::test]
    async fn retry_after_failure_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let broken = server
            .mock("GET", "/m.gguf")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let url = format!("{}/m.gguf", server.url());
        let mut controller = DownloadController::new(spec_for(&url), dir.path().to_path_buf());
        let client = HttpClient::new();

        let stream = controller.begin(&client).unwrap();
        drive(&mut controller, stream).await;
        assert_eq!(controller.status(), DownloadStatus::Failed);

        broken.remove_async().await;
        server
            .mock("GET", "/m.gguf")
            .with_status(200)
            .with_body(b"weights".to_vec())
            .create_async()
            .await;

        let stream = controller.begin(&client).unwrap();
        assert_eq!(controller.progress(), 0.0);
        drive(&mut controller, stream).await;

        assert_eq!(controller.status(), DownloadStatus::Downloaded);
        assert!(dir.path().join("m.gguf").exists());
    }
}
