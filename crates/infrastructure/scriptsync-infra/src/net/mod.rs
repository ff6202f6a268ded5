use camino::{Utf8Path, Utf8PathBuf};
use futures::StreamExt;
use reqwest::Client;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub mod proxy;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("cannot reach host for {0}: name resolution or connection failed")]
    NoConnection(String),
    #[error("{0} was not found on the server; check the repository URL or reinstall")]
    NotFound(String),
    #[error("server rejected request ({status}): {body}")]
    Server { status: u16, body: String },
    #[error("transport failure: {0}")]
    Connection(String),
    #[error("io failure: {0}")]
    Io(#[from] std::io::Error),
}

fn classify(err: reqwest::Error, url: &str) -> TransportError {
    if err.is_connect() {
        TransportError::NoConnection(url.to_string())
    } else {
        TransportError::Connection(err.to_string())
    }
}

/// Narrow seam over the repository server. The engine only ever needs a GET
/// that lands in a file (or is discarded, for connectivity probes) and a
/// multipart POST returning the raw reply body.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, dest: Option<&Utf8Path>) -> Result<(), TransportError>;

    async fn post_form(
        &self,
        url: &str,
        fields: Vec<(String, String)>,
        file: Option<(String, Utf8PathBuf)>,
    ) -> Result<String, TransportError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client with the fixed short request timeout, honoring a discovered
    /// system proxy when one validates (see [`proxy`]).
    pub async fn with_discovered_proxy(
        timeout_secs: u64,
        remote_url: &str,
    ) -> Result<Self, TransportError> {
        let timeout = Duration::from_secs(timeout_secs);
        let client = proxy::client_for(timeout, remote_url).await?;
        Ok(Self::new(client))
    }

    pub fn direct(timeout_secs: u64) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        Ok(Self::new(client))
    }

    async fn stream_to_file(
        resp: reqwest::Response,
        url: &str,
        dest: &Utf8Path,
    ) -> Result<(), TransportError> {
        let tmp_path = dest.with_extension("part");
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent.as_std_path()).await?;
        }

        let mut file = File::create(tmp_path.as_std_path()).await?;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| classify(e, url))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        drop(file);

        tokio::fs::rename(tmp_path.as_std_path(), dest.as_std_path()).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &str, dest: Option<&Utf8Path>) -> Result<(), TransportError> {
        debug!("GET {url}");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify(e, url))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Server {
                status: status.as_u16(),
                body,
            });
        }

        match dest {
            Some(dest) => Self::stream_to_file(resp, url, dest).await,
            None => {
                // Connectivity probe: drain and discard.
                let _ = resp.bytes().await.map_err(|e| classify(e, url))?;
                Ok(())
            }
        }
    }

    async fn post_form(
        &self,
        url: &str,
        fields: Vec<(String, String)>,
        file: Option<(String, Utf8PathBuf)>,
    ) -> Result<String, TransportError> {
        debug!("POST {url}");
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in fields {
            form = form.text(name, value);
        }
        if let Some((name, path)) = file {
            let bytes = tokio::fs::read(path.as_std_path()).await?;
            let file_name = path.file_name().unwrap_or("file").to_string();
            form = form.part(
                name,
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );
        }

        let resp = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify(e, url))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| classify(e, url))?;
        if !status.is_success() {
            warn!("POST {url} returned {status}");
            return Err(TransportError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
