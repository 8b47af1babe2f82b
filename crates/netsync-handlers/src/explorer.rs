//! Explorer URL handler.
//!
//! The explorer URL fans out into the shared configuration every service
//! loads, so a change restarts the backend, frontend, stats and (when
//! configured) the proxy together.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use url::Url;

use netsync_core::{ChangeRecord, FeaturedNetworksConfig, ServicesConfig};
use netsync_env::{EnvStore, Scope};

use crate::error::HandlerError;
use crate::featured::featured_networks;
use crate::handler::{Handler, HandlerResult, HandlerSettings};

const FIELD: &str = "explorer_url";

/// Host and protocol derived from an explorer URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerTarget {
    /// Host without port.
    pub host: String,
    /// `http` only for plain-http URLs, `https` otherwise.
    pub protocol: &'static str,
}

impl ExplorerTarget {
    pub fn parse(raw: &str, max_len: usize) -> Result<Self, HandlerError> {
        if raw.is_empty() {
            return Err(HandlerError::invalid(FIELD, "cannot be empty"));
        }
        if raw.chars().count() > max_len {
            return Err(HandlerError::invalid(
                FIELD,
                format!("length cannot exceed {max_len} characters"),
            ));
        }
        let url = Url::parse(raw)
            .map_err(|e| HandlerError::invalid(FIELD, format!("invalid URL format: {e}")))?;
        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_string(),
            _ => return Err(HandlerError::invalid(FIELD, "URL must include a valid host")),
        };
        let protocol = if url.scheme() == "http" { "http" } else { "https" };
        Ok(Self { host, protocol })
    }

    /// `protocol://host`
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.host)
    }

    /// The shared environment batch for this target.
    pub fn environment(&self, name: &str, featured: &FeaturedNetworksConfig) -> BTreeMap<String, String> {
        let host = &self.host;
        let base = self.base_url();
        [
            ("BLOCKSCOUT_HOST", host.clone()),
            ("EXPLORER_URL", host.clone()),
            ("NEXT_PUBLIC_API_HOST", host.clone()),
            ("NEXT_PUBLIC_APP_HOST", host.clone()),
            ("NEXT_PUBLIC_STATS_API_HOST", base.clone()),
            ("NEXT_PUBLIC_VISUALIZE_API_HOST", base.clone()),
            ("STATS__BLOCKSCOUT_API_URL", base),
            (
                "MICROSERVICE_VISUALIZE_SOL2UML_URL",
                format!("{}://visualize.{}", self.protocol, host),
            ),
            ("BLOCKSCOUT_HTTP_PROTOCOL", self.protocol.to_string()),
            (
                "NEXT_PUBLIC_FEATURED_NETWORKS",
                featured_networks(featured, name, Some(self)),
            ),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

pub struct ExplorerHandler {
    store: Arc<dyn EnvStore>,
    services: ServicesConfig,
    featured: FeaturedNetworksConfig,
    max_len: usize,
}

impl ExplorerHandler {
    pub fn new(store: Arc<dyn EnvStore>, settings: &HandlerSettings) -> Self {
        Self {
            store,
            services: settings.services.clone(),
            featured: settings.featured.clone(),
            max_len: settings.limits.max_explorer_url_length,
        }
    }
}

#[async_trait]
impl Handler for ExplorerHandler {
    fn name(&self) -> &'static str {
        "explorer"
    }

    async fn handle(&self, record: &ChangeRecord) -> HandlerResult {
        let target = match ExplorerTarget::parse(&record.explorer_url, self.max_len) {
            Ok(target) => target,
            Err(e) => return HandlerResult::failed(e),
        };

        let batch = target.environment(&record.name, &self.featured);
        let mut units = vec![
            self.services.backend(),
            self.services.frontend(),
            self.services.stats(),
        ];
        units.extend(self.services.proxy());
        let names: Vec<&str> = units.iter().map(|u| u.service.as_str()).collect();
        let scope = Scope::Shared(&names);

        match self.store.update(scope, &batch) {
            Ok(false) => HandlerResult::default(),
            Ok(true) => {
                info!(host = %target.host, protocol = target.protocol, "explorer host updated");
                HandlerResult {
                    errors: Vec::new(),
                    restart: units,
                }
            }
            Err(source) => HandlerResult::failed(HandlerError::Store {
                scope: scope.to_string(),
                source,
            }),
        }
    }
}
