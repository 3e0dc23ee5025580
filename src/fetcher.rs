//! Retrieves raw source content: local files, inline lists and HTTP URLs.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Method};
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::error::FetchError;
use crate::factory::Pair;
use crate::model::{Origin, Source};
use crate::utils::format_bytes;

/// Outcome of fetching one (group, source) pair.
#[derive(Debug)]
pub struct Fetched<'a> {
    pub pair: Pair<'a>,
    pub result: Result<String, FetchError>,
}

/// Fetches source content with a bounded number of concurrent workers.
pub struct Fetcher {
    client: Client,
    method: Method,
    timeout: Duration,
    workers: usize,
    max_size: usize,
}

impl Fetcher {
    /// Create a fetcher from settings. The worker limit is passed in
    /// explicitly; nothing process-wide is changed.
    pub fn new(settings: &Settings) -> Result<Self> {
        let timeout = settings.timeout();
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(format!("edgeblock/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;
        let method = settings
            .method
            .parse::<Method>()
            .with_context(|| format!("Invalid HTTP method '{}'", settings.method))?;

        Ok(Self {
            client,
            method,
            timeout,
            workers: settings.workers().max(1),
            max_size: settings.max_source_size,
        })
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Fetch the raw content of one source.
    pub async fn fetch(&self, source: &Source) -> Result<String, FetchError> {
        match &source.origin {
            Origin::File(path) => self.fetch_file(path).await,
            Origin::Inline(text) => Ok(text.clone()),
            Origin::Url(url) => self.fetch_url(url).await,
        }
    }

    /// Fetch every pair concurrently, at most `workers` at a time.
    ///
    /// Results come back in input order regardless of completion order.
    /// Failures are logged here and returned; they never cancel siblings.
    pub async fn fetch_all<'a>(&self, pairs: &[Pair<'a>]) -> Vec<Fetched<'a>> {
        let fetches: Vec<_> = pairs
            .iter()
            .copied()
            .map(|pair| async move {
                debug!("Fetching {} ({})...", pair.label(), pair.source.kind());
                let result = self.fetch(pair.source).await;
                match &result {
                    Ok(content) => {
                        info!("Fetched {} - {}", pair.label(), format_bytes(content.len()))
                    }
                    Err(e) => warn!(
                        "Failed to fetch {} ({}): {}",
                        pair.label(),
                        pair.source.description,
                        e
                    ),
                }
                Fetched { pair, result }
            })
            .collect();
        stream::iter(fetches).buffered(self.workers).collect().await
    }

    async fn fetch_file(&self, path: &Path) -> Result<String, FetchError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => FetchError::NotFound {
                    path: path.to_path_buf(),
                },
                _ => FetchError::Unreadable {
                    path: path.to_path_buf(),
                    source: e,
                },
            })?;
        self.check_size(content.len())?;
        Ok(content)
    }

    async fn fetch_url(&self, url: &str) -> Result<String, FetchError> {
        let unreachable_err = |reason: String| FetchError::Unreachable {
            url: url.to_string(),
            reason,
        };
        let describe = |e: reqwest::Error| {
            if e.is_timeout() {
                format!("timed out after {:?}", self.timeout)
            } else {
                e.to_string()
            }
        };

        let response = self
            .client
            .request(self.method.clone(), url)
            .send()
            .await
            .map_err(|e| unreachable_err(describe(e)))?;

        if !response.status().is_success() {
            return Err(unreachable_err(format!("HTTP {}", response.status())));
        }

        // Check Content-Length header if available
        if let Some(content_length) = response.content_length() {
            self.check_size(content_length as usize)?;
        }

        let body = response
            .text()
            .await
            .map_err(|e| unreachable_err(describe(e)))?;

        // Double-check actual size after download
        self.check_size(body.len())?;
        Ok(body)
    }

    fn check_size(&self, size: usize) -> Result<(), FetchError> {
        if size > self.max_size {
            return Err(FetchError::TooLarge {
                size,
                max: self.max_size,
            });
        }
        Ok(())
    }
}
