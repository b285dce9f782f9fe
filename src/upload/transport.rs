//! HTTP transport for artifact uploads

use super::UploadTarget;
use crate::slot::Artifact;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadError {
    #[error("server responded with HTTP {code} {reason}")]
    Status { code: u16, reason: String },

    #[error("request failed: {0}")]
    Transport(String),
}

/// Sends one artifact to the upload endpoint
#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// POST the artifact as the multipart part `file`; any non-2xx is an error
    async fn post_artifact(
        &self,
        target: &UploadTarget,
        filename: &str,
        artifact: &Artifact,
    ) -> Result<(), UploadError>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    async fn post_artifact(
        &self,
        target: &UploadTarget,
        filename: &str,
        artifact: &Artifact,
    ) -> Result<(), UploadError> {
        let part = Part::bytes(artifact.bytes().to_vec())
            .file_name(filename.to_string())
            .mime_str(artifact.mime_type())
            .map_err(|e| UploadError::Transport(e.to_string()))?;
        let form = Form::new().part("file", part);

        debug!("POST {} ({}, {} bytes)", target.url, filename, artifact.len());

        let response = self
            .client
            .post(&target.url)
            .bearer_auth(&target.bearer_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or_default().to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::Container;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one request, answer with `status_line`, return the raw request
    async fn serve_once(listener: TcpListener, status_line: &'static str) -> String {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];

        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if request_complete(&request) {
                break;
            }
        }

        let response = format!("{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line);
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        String::from_utf8_lossy(&request).into_owned()
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let headers = text[..header_end].to_ascii_lowercase();
        let body_len = request.len() - (header_end + 4);

        if let Some(line) = headers.lines().find(|l| l.starts_with("content-length:")) {
            let expected: usize = line["content-length:".len()..].trim().parse().unwrap_or(0);
            body_len >= expected
        } else if headers.contains("transfer-encoding: chunked") {
            text.ends_with("0\r\n\r\n")
        } else {
            true
        }
    }

    fn target(url: String) -> UploadTarget {
        UploadTarget {
            url,
            bearer_token: "secret-token".into(),
        }
    }

    #[tokio::test]
    async fn test_posts_multipart_with_bearer_token() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 200 OK"));

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let artifact = Artifact::new(b"webm-bytes".to_vec(), Container::Webm);

        transport
            .post_artifact(&target(url), "audio-2.webm", &artifact)
            .await
            .unwrap();

        let request = server.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /upload HTTP/1.1"));
        assert!(lower.contains("authorization: bearer secret-token"));
        assert!(lower.contains("content-type: multipart/form-data"));
        assert!(request.contains("name=\"file\""));
        assert!(request.contains("filename=\"audio-2.webm\""));
        assert!(request.contains("audio/webm"));
        assert!(request.contains("webm-bytes"));
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 500 Internal Server Error"));

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let artifact = Artifact::new(vec![1, 2, 3], Container::Webm);

        let err = transport
            .post_artifact(&target(url), "audio-0.webm", &artifact)
            .await
            .unwrap_err();
        server.await.unwrap();

        assert_eq!(
            err,
            UploadError::Status {
                code: 500,
                reason: "Internal Server Error".into()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/upload", listener.local_addr().unwrap());
        drop(listener);

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let artifact = Artifact::new(vec![1, 2, 3], Container::Webm);

        let err = transport
            .post_artifact(&target(url), "audio-0.webm", &artifact)
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Transport(_)));
    }
}
