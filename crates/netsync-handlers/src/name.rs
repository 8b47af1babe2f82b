//! Network display name handler.

use std::sync::Arc;

use async_trait::async_trait;

use netsync_core::{ChangeRecord, EnvironmentUpdate, FeaturedNetworksConfig, ServicesConfig};
use netsync_env::EnvStore;

use crate::explorer::ExplorerTarget;
use crate::featured::featured_networks;
use crate::handler::{apply_unit_updates, validate_text, Handler, HandlerResult, HandlerSettings};

pub struct NameHandler {
    store: Arc<dyn EnvStore>,
    services: ServicesConfig,
    featured: FeaturedNetworksConfig,
    max_len: usize,
    max_explorer_len: usize,
}

impl NameHandler {
    pub fn new(store: Arc<dyn EnvStore>, settings: &HandlerSettings) -> Self {
        Self {
            store,
            services: settings.services.clone(),
            featured: settings.featured.clone(),
            max_len: settings.limits.max_name_length,
            max_explorer_len: settings.limits.max_explorer_url_length,
        }
    }
}

#[async_trait]
impl Handler for NameHandler {
    fn name(&self) -> &'static str {
        "name"
    }

    async fn handle(&self, record: &ChangeRecord) -> HandlerResult {
        if let Err(e) = validate_text("name", &record.name, self.max_len) {
            return HandlerResult::failed(e);
        }

        // An invalid explorer URL is the explorer handler's error to report.
        let explorer = ExplorerTarget::parse(&record.explorer_url, self.max_explorer_len).ok();
        let frontend = self.services.frontend();
        let updates = vec![
            EnvironmentUpdate::new(&frontend, "NEXT_PUBLIC_NETWORK_NAME", &record.name),
            EnvironmentUpdate::new(&frontend, "NEXT_PUBLIC_NETWORK_SHORT_NAME", &record.name),
            EnvironmentUpdate::new(
                &frontend,
                "NEXT_PUBLIC_FEATURED_NETWORKS",
                featured_networks(&self.featured, &record.name, explorer.as_ref()),
            ),
        ];
        apply_unit_updates(&self.store, updates)
    }
}
