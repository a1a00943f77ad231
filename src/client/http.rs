// Copyright 2022-2024 Protocol Labs
// SPDX-License-Identifier: MIT

use anyhow::{anyhow, Context};
use reqwest::StatusCode;
use tokio::time::Duration;
use url::Url;

use super::store::BlobSource;
use crate::config::{ResolverConfig, DEFAULT_MAX_BODY_BYTES, DEFAULT_REQ_TIMEOUT};
use crate::proofs::common::error::{SnapshotError, SnapshotResult};

/// Read-only HTTP blob source.
///
/// `http(s)://` URIs are fetched directly; `ipfs://<cid>/<path>` is rewritten onto
/// the configured gateway as `<gateway>/ipfs/<cid>/<path>`.
#[derive(Clone, Debug)]
pub struct HttpStore {
    http_client: reqwest::Client,
    gateway: Url,
    timeout: Duration,
    max_body_bytes: usize,
}

impl HttpStore {
    /// Creates a new store that resolves `ipfs://` through `gateway`
    pub fn new(mut gateway: Url) -> Self {
        if !gateway.path().ends_with('/') {
            let path = format!("{}/", gateway.path());
            gateway.set_path(&path);
        }
        Self {
            http_client: reqwest::Client::default(),
            gateway,
            timeout: DEFAULT_REQ_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    pub fn from_config(config: &ResolverConfig) -> SnapshotResult<Self> {
        let gateway = Url::parse(&config.ipfs_gateway)
            .with_context(|| format!("Invalid IPFS gateway '{}'", config.ipfs_gateway))?;
        Ok(Self::new(gateway)
            .with_timeout(config.request_timeout)
            .with_max_body_bytes(config.max_body_bytes))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    /// Map a blob URI to the HTTP URL it is served from
    pub fn resolve_url(&self, uri: &str) -> SnapshotResult<Url> {
        if let Some(rest) = uri.strip_prefix("ipfs://") {
            let rest = rest.trim_start_matches("ipfs/");
            return self
                .gateway
                .join(&format!("ipfs/{}", rest))
                .map_err(|e| anyhow!("Cannot map '{}' onto gateway: {}", uri, e).into());
        }

        let url = Url::parse(uri).map_err(|e| anyhow!("Invalid URI '{}': {}", uri, e))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(anyhow!("HttpStore cannot serve scheme '{}' ({})", other, uri).into()),
        }
    }

    fn too_large(&self, uri: &str) -> SnapshotError {
        SnapshotError::corrupt(
            uri,
            format!("body exceeds {} bytes", self.max_body_bytes),
        )
    }
}

impl BlobSource for HttpStore {
    async fn fetch(&self, uri: &str) -> SnapshotResult<Option<Vec<u8>>> {
        let url = self.resolve_url(uri)?;
        tracing::debug!("GET {} ({})", url, uri);

        let transport_error = |e: reqwest::Error| {
            let message = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                format!("request failed: {}", e)
            };
            SnapshotError::transport_with_source(uri, message, e.into())
        };

        let mut response = self
            .http_client
            .get(url.as_str())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            tracing::debug!("{} not found", uri);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(SnapshotError::transport(uri, format!("HTTP {}", status)));
        }

        if response
            .content_length()
            .map_or(false, |len| len > self.max_body_bytes as u64)
        {
            return Err(self.too_large(uri));
        }

        // Content-Length may be absent, so the cap is enforced while reading too
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(transport_error)? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(self.too_large(uri));
            }
            body.extend_from_slice(&chunk);
        }
        tracing::debug!("received {} bytes for {}", body.len(), uri);
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn store(gateway: &str) -> HttpStore {
        HttpStore::new(Url::parse(gateway).unwrap())
    }

    /// Serve one canned HTTP response per connection; `None` accepts and never answers
    async fn serve(response: Option<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    match response {
                        Some(response) => {
                            let _ = socket.write_all(response.as_bytes()).await;
                            let _ = socket.shutdown().await;
                        }
                        None => tokio::time::sleep(Duration::from_secs(30)).await,
                    }
                });
            }
        });
        format!("http://{}/snap/0a.json", addr)
    }

    #[test]
    fn test_ipfs_rewrite() {
        let s = store("https://ipfs.io/");
        assert_eq!(
            s.resolve_url("ipfs://QmCid/0a.json").unwrap().as_str(),
            "https://ipfs.io/ipfs/QmCid/0a.json"
        );
        assert_eq!(
            s.resolve_url("ipfs://ipfs/QmCid/0a.json").unwrap().as_str(),
            "https://ipfs.io/ipfs/QmCid/0a.json"
        );
    }

    #[test]
    fn test_gateway_without_trailing_slash() {
        let s = store("https://gateway.example/prefix");
        assert_eq!(
            s.resolve_url("ipfs://QmCid/info.json").unwrap().as_str(),
            "https://gateway.example/prefix/ipfs/QmCid/info.json"
        );
    }

    #[test]
    fn test_http_passthrough_and_rejects() {
        let s = store("https://ipfs.io/");
        assert_eq!(
            s.resolve_url("https://cdn.example/snap/0a.json").unwrap().as_str(),
            "https://cdn.example/snap/0a.json"
        );
        assert!(s.resolve_url("ftp://host/file").is_err());
        assert!(s.resolve_url("not a uri").is_err());
        assert!(s.resolve_url("/etc/passwd").is_err());
    }

    #[test]
    fn test_from_config() {
        let config = ResolverConfig {
            ipfs_gateway: "not a url".into(),
            ..ResolverConfig::default()
        };
        assert!(HttpStore::from_config(&config).is_err());
        assert!(HttpStore::from_config(&ResolverConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let uri = serve(Some(
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}",
        ))
        .await;
        let body = store("https://ipfs.io/").fetch(&uri).await.unwrap();
        assert_eq!(body.unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_fetch_not_found_is_absence() {
        let uri = serve(Some(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ))
        .await;
        assert!(store("https://ipfs.io/").fetch(&uri).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_server_error_is_transport() {
        let uri = serve(Some(
            "HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ))
        .await;
        let err = store("https://ipfs.io/").fetch(&uri).await.unwrap_err();
        assert!(matches!(err, SnapshotError::Transport { .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_transport() {
        let uri = serve(None).await;
        let err = store("https://ipfs.io/")
            .with_timeout(Duration::from_millis(200))
            .fetch(&uri)
            .await
            .unwrap_err();
        match &err {
            SnapshotError::Transport { message, .. } => assert_eq!(message, "request timed out"),
            other => panic!("expected transport error, got {:?}", other),
        }
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let declared = serve(Some(
            "HTTP/1.1 200 OK\r\nContent-Length: 16\r\nConnection: close\r\n\r\n0123456789abcdef",
        ))
        .await;
        let err = store("https://ipfs.io/")
            .with_max_body_bytes(8)
            .fetch(&declared)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::CorruptSnapshot { .. }));

        // no Content-Length: the cap applies while streaming
        let streamed = serve(Some(
            "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n0123456789abcdef",
        ))
        .await;
        let err = store("https://ipfs.io/")
            .with_max_body_bytes(8)
            .fetch(&streamed)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::CorruptSnapshot { .. }));
    }
}
