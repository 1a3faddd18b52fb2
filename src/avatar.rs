//! Avatar lookup for new accounts.
//!
//! Registration asks an external endpoint for a random avatar. The lookup
//! is best effort: `fetch_avatar_or_none` turns every failure into `None`
//! so a flaky avatar service never blocks sign-up.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client, Url};
use tracing::{debug, warn};

use crate::config::AvatarConfig;

#[async_trait]
pub trait AvatarSource: Send + Sync {
    /// Returns an absolute avatar URL.
    async fn fetch(&self) -> anyhow::Result<String>;
}

/// Fetches avatar URLs over HTTP.
#[derive(Clone)]
pub struct HttpAvatarSource {
    client: Client,
    url: String,
}

impl HttpAvatarSource {
    pub fn new(config: &AvatarConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build avatar http client")?;
        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }
}

#[async_trait]
impl AvatarSource for HttpAvatarSource {
    async fn fetch(&self) -> anyhow::Result<String> {
        let res = self
            .client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?
            .error_for_status()
            .context("avatar endpoint returned an error status")?;

        // The endpoint either redirects to an image or answers with a URL.
        let is_image = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("image/"));
        if is_image {
            return Ok(res.url().to_string());
        }

        let body = res.text().await.context("read avatar response body")?;
        let url = Url::parse(body.trim()).context("avatar response is not a URL")?;
        Ok(url.to_string())
    }
}

/// Best-effort fetch: logs and returns `None` on any failure.
pub async fn fetch_avatar_or_none(source: &dyn AvatarSource) -> Option<String> {
    match source.fetch().await {
        Ok(url) => {
            debug!(%url, "avatar fetched");
            Some(url)
        }
        Err(e) => {
            warn!(error = %format!("{e:#}"), "avatar fetch failed; continuing without avatar");
            None
        }
    }
}
