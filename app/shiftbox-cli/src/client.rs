//! HTTP client for the daemon's unix socket API.

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::{Method, Request};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::net::UnixStream;

/// Client for the daemon API.
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Creates a client for the given socket path.
    #[must_use]
    pub const fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Resolves the socket path from (in order) an explicit flag, the
    /// `SHIFTBOX_SOCKET` environment variable, and the default location.
    #[must_use]
    pub fn resolve(socket: Option<&Path>) -> Self {
        let socket_path = socket.map(Path::to_path_buf).unwrap_or_else(|| {
            std::env::var_os("SHIFTBOX_SOCKET").map_or_else(default_socket_path, PathBuf::from)
        });
        Self::new(socket_path)
    }

    /// Sends a GET request and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is unreachable or answers with an
    /// error status.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.request(Method::GET, path, None).await?;
        serde_json::from_slice(&body).context("Failed to decode daemon response")
    }

    /// Sends a POST request and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is unreachable or answers with an
    /// error status.
    pub async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let body = self.request(Method::POST, path, body).await?;
        serde_json::from_slice(&body).context("Failed to decode daemon response")
    }

    /// Sends a DELETE request and decodes the JSON response.
    ///
    /// # Errors
    ///
    /// Returns an error if the daemon is unreachable or answers with an
    /// error status.
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let body = self.request(Method::DELETE, path, None).await?;
        serde_json::from_slice(&body).context("Failed to decode daemon response")
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Bytes> {
        let stream = UnixStream::connect(&self.socket_path).await.with_context(|| {
            format!(
                "Cannot connect to the shiftbox daemon at {} (is it running?)",
                self.socket_path.display()
            )
        })?;

        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .context("HTTP handshake with daemon failed")?;
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let payload = match body {
            Some(value) => Bytes::from(value.to_string()),
            None => Bytes::new(),
        };
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(hyper::header::HOST, "shiftbox")
            .header(hyper::header::CONTENT_TYPE, "application/json")
            .body(Full::new(payload))
            .context("Failed to build request")?;

        let response = sender
            .send_request(request)
            .await
            .context("Request to daemon failed")?;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .context("Failed to read daemon response")?
            .to_bytes();

        if !status.is_success() {
            bail!("{}", error_message(&bytes, status));
        }
        Ok(bytes)
    }
}

fn default_socket_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(".shiftbox")
        .join(shiftbox_constants::API_SOCKET_NAME)
}

/// Extracts the daemon's error message, falling back to the HTTP status.
fn error_message(body: &[u8], status: hyper::StatusCode) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| format!("daemon answered with HTTP {status}"))
}
