// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Fetching the page served by a deployed application

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Why a page could not be fetched
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status { url: String, status: u16, body: String },
}

/// Retrieves the body of a URL
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// GET `url` and return the body with surrounding whitespace removed.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// HTTP(S) fetcher that does not verify certificates
///
/// Platform routes are served with self-signed or shared certificates, so
/// peer verification is turned off. No retries are attempted.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        debug!("Fetching {}", url);
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: body.trim().to_string(),
            });
        }

        Ok(body.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve one canned HTTP response on a local port and return its URL.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/", addr)
    }

    #[test_log::test(tokio::test)]
    async fn test_fetch_trims_body() {
        let url = serve_once(
            "200 OK",
            "\n  <p>Database Username: space_username</p>\n  ",
        )
        .await;

        let body = HttpFetcher::new().unwrap().fetch(&url).await.unwrap();
        assert_eq!(body, "<p>Database Username: space_username</p>");
    }

    #[test_log::test(tokio::test)]
    async fn test_non_success_status_is_an_error() {
        let url = serve_once("404 Not Found", "404 Not Found: Requested route does not exist.").await;

        let err = HttpFetcher::new().unwrap().fetch(&url).await.unwrap_err();
        match err {
            FetchError::Status { status, body, .. } => {
                assert_eq!(status, 404);
                assert!(body.contains("route does not exist"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = HttpFetcher::new()
            .unwrap()
            .fetch(&format!("http://{}/", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
