//! Logo and favicon handler.
//!
//! Each non-empty URL is validated on its own. An invalid field is
//! reported while the valid ones are still written.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use netsync_core::{ChangeRecord, EnvironmentUpdate, ServicesConfig};
use netsync_env::EnvStore;

use crate::error::HandlerError;
use crate::handler::{apply_unit_updates, Handler, HandlerResult, HandlerSettings};

/// Checks that a URL serves an image.
#[async_trait]
pub trait ImageProbe: Send + Sync {
    async fn probe(&self, url: &Url) -> Result<(), String>;
}

/// `HEAD` probe: status 200 with an `image/*` content type.
pub struct HttpImageProbe {
    client: reqwest::Client,
}

impl HttpImageProbe {
    pub fn new(timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageProbe for HttpImageProbe {
    async fn probe(&self, url: &Url) -> Result<(), String> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|e| format!("failed to access image: {e}"))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(format!("image not accessible, status code: {}", status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("image/") {
            return Err(format!(
                "URL does not point to an image (content-type: {content_type})"
            ));
        }
        Ok(())
    }
}

pub struct ImageHandler {
    store: Arc<dyn EnvStore>,
    services: ServicesConfig,
    max_len: usize,
    probe: Option<Arc<dyn ImageProbe>>,
}

impl ImageHandler {
    /// `probe` is `None` when image verification is disabled.
    pub fn new(
        store: Arc<dyn EnvStore>,
        settings: &HandlerSettings,
        probe: Option<Arc<dyn ImageProbe>>,
    ) -> Self {
        Self {
            store,
            services: settings.services.clone(),
            max_len: settings.limits.max_image_url_length,
            probe,
        }
    }

    async fn validate(&self, field: &'static str, raw: &str) -> Result<(), HandlerError> {
        if raw.chars().count() > self.max_len {
            return Err(HandlerError::invalid(
                field,
                format!("length cannot exceed {} characters", self.max_len),
            ));
        }
        let url = Url::parse(raw)
            .map_err(|e| HandlerError::invalid(field, format!("invalid URL format: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(HandlerError::invalid(
                field,
                "URL must start with http:// or https://",
            ));
        }
        if let Some(probe) = &self.probe {
            probe
                .probe(&url)
                .await
                .map_err(|reason| HandlerError::invalid(field, reason))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for ImageHandler {
    fn name(&self) -> &'static str {
        "image"
    }

    async fn handle(&self, record: &ChangeRecord) -> HandlerResult {
        if record.has_no_images() {
            return HandlerResult::default();
        }

        let frontend = self.services.frontend();
        let fields = [
            ("light_logo_url", "NEXT_PUBLIC_NETWORK_LOGO", &record.light_logo_url),
            ("dark_logo_url", "NEXT_PUBLIC_NETWORK_LOGO_DARK", &record.dark_logo_url),
            ("favicon_url", "NEXT_PUBLIC_NETWORK_ICON", &record.favicon_url),
        ];

        let mut errors = Vec::new();
        let mut updates = Vec::new();
        for (field, key, value) in fields {
            if value.is_empty() {
                continue;
            }
            match self.validate(field, value).await {
                Ok(()) => updates.push(EnvironmentUpdate::new(&frontend, key, value)),
                Err(e) => {
                    debug!(field, error = %e, "image rejected");
                    errors.push(e);
                }
            }
        }

        let mut result = HandlerResult {
            errors,
            restart: Vec::new(),
        };
        if !updates.is_empty() {
            result.merge(apply_unit_updates(&self.store, updates));
        }
        result
    }
}
