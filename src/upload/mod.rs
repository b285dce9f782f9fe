//! Upload dispatcher
//!
//! Sends every finished recording to the configured endpoint, one request at
//! a time in slot order, and stops at the first failure.

pub mod transport;

pub use transport::{HttpTransport, UploadError, UploadTransport};

use crate::slot::{upload_filename, Artifact};
use async_stream::stream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Where a batch goes
#[derive(Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub url: String,
    pub bearer_token: String,
}

impl std::fmt::Debug for UploadTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadTarget")
            .field("url", &self.url)
            .field("bearer_token", &"<redacted>")
            .finish()
    }
}

/// One artifact to upload, tagged with the slot it came from
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub index: usize,
    pub artifact: Artifact,
}

impl UploadItem {
    pub fn filename(&self) -> String {
        upload_filename(self.index, self.artifact.container())
    }
}

/// Progress of an upload batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    /// The URL was empty; nothing was sent
    InvalidUrl,
    /// The artifact of slot `index` was accepted
    Uploaded { index: usize },
    /// The artifact of slot `index` was rejected; the batch stopped here
    Failed { index: usize, detail: String },
    /// Every item was accepted
    Finished { uploaded: usize },
}

impl UploadStatus {
    /// Text for the status line
    pub fn message(&self) -> String {
        match self {
            UploadStatus::InvalidUrl => "Please enter a valid URL.".to_string(),
            UploadStatus::Uploaded { index } => format!("Upload {} successful!", index + 1),
            UploadStatus::Failed { detail, .. } => {
                format!("Failed to upload the audio: {}", detail)
            }
            UploadStatus::Finished { uploaded } => {
                format!("Uploaded {} recording(s)", uploaded)
            }
        }
    }

    /// Whether the batch is over after this status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, UploadStatus::Uploaded { .. })
    }
}

/// Check the upload URL before anything touches the network
pub fn validate_url(url: &str) -> Result<(), UploadStatus> {
    if url.trim().is_empty() {
        return Err(UploadStatus::InvalidUrl);
    }
    Ok(())
}

/// Runs upload batches over a transport
#[derive(Clone)]
pub struct UploadDispatcher {
    transport: Arc<dyn UploadTransport>,
}

impl UploadDispatcher {
    pub fn new(transport: Arc<dyn UploadTransport>) -> Self {
        Self { transport }
    }

    /// Upload `items` in order, yielding a status after each request
    ///
    /// Requests are strictly sequential. The stream ends after
    /// `InvalidUrl`, the first `Failed`, or `Finished`.
    pub fn upload(
        &self,
        target: UploadTarget,
        items: Vec<UploadItem>,
    ) -> impl Stream<Item = UploadStatus> + Send + 'static {
        let transport = Arc::clone(&self.transport);
        let batch_id = Uuid::new_v4();

        stream! {
            if let Err(status) = validate_url(&target.url) {
                warn!(%batch_id, "Upload requested without a URL");
                yield status;
                return;
            }

            let mut uploaded = 0;
            for item in items {
                let filename = item.filename();
                match transport.post_artifact(&target, &filename, &item.artifact).await {
                    Ok(()) => {
                        info!(%batch_id, "Uploaded {} to {}", filename, target.url);
                        uploaded += 1;
                        yield UploadStatus::Uploaded { index: item.index };
                    }
                    Err(e) => {
                        error!(%batch_id, "Upload failed for {}: {}", filename, e);
                        yield UploadStatus::Failed {
                            index: item.index,
                            detail: e.to_string(),
                        };
                        return;
                    }
                }
            }

            info!(%batch_id, "Upload batch finished: {} item(s)", uploaded);
            yield UploadStatus::Finished { uploaded };
        }
    }

    /// Run a batch to completion and collect every status
    pub async fn upload_all(&self, target: UploadTarget, items: Vec<UploadItem>) -> Vec<UploadStatus> {
        self.upload(target, items).collect().await
    }
}
