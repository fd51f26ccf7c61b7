use futures::Stream;
use futures::TryStreamExt;
use reqwest::Client;

use crate::domain::AppError;

pub type Result<T> = std::result::Result<T, AppError>;

/// Thin wrapper over reqwest for streaming a remote file to disk.
#[derive(Clone, Default)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Issue the GET and hand back the body as a chunk stream.
    /// Returns (total_size, stream). Transport failures map to
    /// `Network`, non-2xx statuses to `Server`.
    pub async fn fetch_stream(
        &self,
        url: &str,
    ) -> Result<(Option<u64>, impl Stream<Item = Result<bytes::Bytes>>)> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Server(status.as_u16()));
        }

        let total_size = response.content_length();
        let stream = response
            .bytes_stream()
            .map_err(|e| AppError::Network(e.to_string()));

        Ok((total_size, stream))
    }
}
