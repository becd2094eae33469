use async_trait::async_trait;
use thiserror::Error;

use drivesync_models::publish::PublishRequest;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("http error: {0}")]
    Http(String),

    #[error("publish rejected: status {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<reqwest::Error> for PublishError {
    fn from(err: reqwest::Error) -> Self {
        PublishError::Http(err.to_string())
    }
}

/// Downstream sink for resolved documents. Export, conversion and rendering
/// all live behind this seam.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish_document(&self, request: &PublishRequest) -> Result<(), PublishError>;
}

/// POSTs each document descriptor to the ingest endpoint of the publishing
/// pipeline.
pub struct HttpPublisher {
    client: reqwest::Client,
    publish_url: String,
}

impl HttpPublisher {
    pub fn new(publish_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            publish_url,
        }
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish_document(&self, request: &PublishRequest) -> Result<(), PublishError> {
        log::debug!(
            "publishing document {} to {}",
            request.document_id,
            self.publish_url
        );

        let response = self
            .client
            .post(&self.publish_url)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected { status, body });
        }

        Ok(())
    }
}
