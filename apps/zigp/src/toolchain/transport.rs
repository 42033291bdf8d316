//! Fetching release indexes and toolchain archives.
//!
//! [`HttpTransport`] speaks HTTP(S) through reqwest and reads `file://`
//! URLs straight from disk, so a local directory laid out like the
//! distribution server works as an offline mirror.
//!
//! Downloads stream to disk; archives are never held in memory. There is
//! no retry: a failed transfer fails the install.

use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;

use crate::errors::{Result, ZigpError};

/// User agent sent with every request.
const USER_AGENT: &str = concat!("zigp/", env!("CARGO_PKG_VERSION"));

/// Minimum interval between progress updates in milliseconds.
const PROGRESS_INTERVAL_MS: u128 = 250;

/// Source of remote documents and archives.
pub trait Transport {
    /// Fetches a small text document, such as the release index.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// Streams the resource at `url` into `dest`, replacing its contents.
    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Transport backed by reqwest, with `file://` support.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    show_progress: bool,
}

impl HttpTransport {
    /// Creates a transport whose requests time out after `timeout`.
    ///
    /// Progress is drawn only when stderr is a terminal.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if the HTTP client cannot be constructed.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ZigpError::network_with_source("", "failed to create HTTP client", e))?;
        Ok(Self {
            client,
            show_progress: std::io::stderr().is_terminal(),
        })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ZigpError::network_with_source(url, "request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ZigpError::network(url, describe_status(status)));
        }
        Ok(response)
    }
}

impl Transport for HttpTransport {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        if let Some(path) = local_path(url)? {
            return tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| ZigpError::network_with_source(url, "cannot read local file", e));
        }

        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| ZigpError::network_with_source(url, "failed to read response", e))
    }

    async fn fetch_to_file(&self, url: &str, dest: &Path) -> Result<()> {
        if let Some(path) = local_path(url)? {
            tokio::fs::copy(&path, dest)
                .await
                .map_err(|e| ZigpError::network_with_source(url, "cannot copy local file", e))?;
            return Ok(());
        }

        let response = self.get(url).await?;
        let total_size = response.content_length().unwrap_or(0);

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ZigpError::fs("failed to create", dest, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let start_time = Instant::now();
        let mut last_update = Instant::now();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk
                .map_err(|e| ZigpError::network_with_source(url, "connection interrupted", e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ZigpError::fs("failed to write", dest, e))?;
            downloaded += chunk.len() as u64;

            let now = Instant::now();
            if self.show_progress
                && now.duration_since(last_update).as_millis() >= PROGRESS_INTERVAL_MS
            {
                print_progress(downloaded, total_size, start_time.elapsed().as_secs_f64());
                last_update = now;
            }
        }

        file.flush()
            .await
            .map_err(|e| ZigpError::fs("failed to flush", dest, e))?;

        if total_size > 0 && downloaded != total_size {
            return Err(ZigpError::network(
                url,
                format!("expected {total_size} bytes, received {downloaded}"),
            ));
        }

        if self.show_progress {
            print_progress(downloaded, total_size, start_time.elapsed().as_secs_f64());
            eprintln!();
        }
        tracing::debug!(url, bytes = downloaded, "download complete");

        Ok(())
    }
}

/// Maps a `file://` URL to a path. Other schemes yield `None`.
fn local_path(url: &str) -> Result<Option<PathBuf>> {
    if !url.starts_with("file:") {
        return Ok(None);
    }
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| ZigpError::network_with_source(url, "invalid URL", e))?;
    parsed
        .to_file_path()
        .map(Some)
        .map_err(|()| ZigpError::network(url, "not a local file path"))
}

fn describe_status(status: reqwest::StatusCode) -> String {
    match status.as_u16() {
        404 => "not found (404)".to_string(),
        code if code >= 500 => format!("server error ({code})"),
        code => format!("HTTP error {code}"),
    }
}

/// Prints a single-line progress indicator to stderr.
#[allow(clippy::cast_precision_loss)]
#[allow(clippy::cast_possible_truncation)]
#[allow(clippy::cast_sign_loss)]
fn print_progress(downloaded: u64, total: u64, elapsed_secs: f64) {
    let speed = if elapsed_secs > 0.0 {
        (downloaded as f64 / elapsed_secs) as u64
    } else {
        0
    };
    let mut stderr = std::io::stderr();
    if total > 0 {
        let percent = (downloaded as f64 / total as f64 * 100.0) as u8;
        let _ = write!(
            stderr,
            "\r{}/{} ({percent}%) {}/s     ",
            format_bytes(downloaded),
            format_bytes(total),
            format_bytes(speed)
        );
    } else {
        let _ = write!(
            stderr,
            "\r{} {}/s     ",
            format_bytes(downloaded),
            format_bytes(speed)
        );
    }
    let _ = stderr.flush();
}

/// Formats bytes into a human-readable string (KB, MB, GB).
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn describe_status_distinguishes_not_found_and_server_errors() {
        assert_eq!(
            describe_status(reqwest::StatusCode::NOT_FOUND),
            "not found (404)"
        );
        assert_eq!(
            describe_status(reqwest::StatusCode::BAD_GATEWAY),
            "server error (502)"
        );
        assert_eq!(
            describe_status(reqwest::StatusCode::FORBIDDEN),
            "HTTP error 403"
        );
    }

    #[test]
    fn only_file_urls_map_to_local_paths() {
        assert_eq!(local_path("https://ziglang.org/x").unwrap(), None);

        #[cfg(unix)]
        assert_eq!(
            local_path("file:///srv/mirror/index.json").unwrap(),
            Some(PathBuf::from("/srv/mirror/index.json"))
        );
    }

    #[tokio::test]
    async fn file_urls_are_read_from_disk() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("index.json");
        std::fs::write(&source, "{}").unwrap();
        let url = reqwest::Url::from_file_path(&source).unwrap().to_string();

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        assert_eq!(transport.fetch_text(&url).await.unwrap(), "{}");

        let dest = temp.path().join("copy.json");
        transport.fetch_to_file(&url, &dest).await.unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "{}");
    }

    #[tokio::test]
    async fn missing_local_file_is_network_error() {
        let temp = tempfile::tempdir().unwrap();
        let url = reqwest::Url::from_file_path(temp.path().join("absent.tar.xz"))
            .unwrap()
            .to_string();

        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let err = transport
            .fetch_to_file(&url, &temp.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, ZigpError::NetworkError { .. }));
    }
}
