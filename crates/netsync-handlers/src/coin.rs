//! Native coin symbol handler.

use std::sync::Arc;

use async_trait::async_trait;

use netsync_core::{ChangeRecord, EnvironmentUpdate, ServicesConfig};
use netsync_env::EnvStore;

use crate::handler::{apply_unit_updates, validate_text, Handler, HandlerResult, HandlerSettings};

pub struct CoinHandler {
    store: Arc<dyn EnvStore>,
    services: ServicesConfig,
    max_len: usize,
}

impl CoinHandler {
    pub fn new(store: Arc<dyn EnvStore>, settings: &HandlerSettings) -> Self {
        Self {
            store,
            services: settings.services.clone(),
            max_len: settings.limits.max_coin_length,
        }
    }

    fn updates(&self, coin: &str) -> Vec<EnvironmentUpdate> {
        vec![
            EnvironmentUpdate::new(
                &self.services.frontend(),
                "NEXT_PUBLIC_NETWORK_CURRENCY_SYMBOL",
                coin,
            ),
            EnvironmentUpdate::new(&self.services.backend(), "COIN", coin),
            EnvironmentUpdate::new(
                &self.services.stats(),
                "STATS_CHARTS__TEMPLATE_VALUES__NATIVE_COIN_SYMBOL",
                coin,
            ),
        ]
    }
}

#[async_trait]
impl Handler for CoinHandler {
    fn name(&self) -> &'static str {
        "coin"
    }

    async fn handle(&self, record: &ChangeRecord) -> HandlerResult {
        if let Err(e) = validate_text("coin", &record.coin, self.max_len) {
            return HandlerResult::failed(e);
        }
        apply_unit_updates(&self.store, self.updates(&record.coin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::test_support::{record, settings, MemoryStore};

    fn with_coin(coin: &str) -> ChangeRecord {
        let mut record = record();
        record.coin = coin.to_string();
        record
    }

    #[tokio::test]
    async fn writes_all_three_units() {
        let store = Arc::new(MemoryStore::default());
        let handler = CoinHandler::new(store.clone(), &settings(false));

        let result = handler.handle(&with_coin("AURORA")).await;
        assert!(result.is_ok());
        assert_eq!(result.restart.len(), 3);
        assert_eq!(store.get("service:backend", "COIN").as_deref(), Some("AURORA"));
        assert_eq!(
            store
                .get("service:stats", "STATS_CHARTS__TEMPLATE_VALUES__NATIVE_COIN_SYMBOL")
                .as_deref(),
            Some("AURORA")
        );
    }

    #[tokio::test]
    async fn length_boundary() {
        let store = Arc::new(MemoryStore::default());
        let handler = CoinHandler::new(store, &settings(false));

        assert!(handler.handle(&with_coin(&"C".repeat(20))).await.is_ok());

        let too_long = handler.handle(&with_coin(&"C".repeat(21))).await;
        assert_eq!(too_long.errors.len(), 1);
        assert!(too_long.restart.is_empty());

        let empty = handler.handle(&with_coin("")).await;
        assert!(!empty.is_ok());
    }

    #[tokio::test]
    async fn only_changed_units_restart() {
        let store = Arc::new(MemoryStore::default());
        let handler = CoinHandler::new(store.clone(), &settings(false));
        handler.handle(&with_coin("ETH")).await;

        // Someone else already set the backend value.
        store
            .scopes
            .lock()
            .unwrap()
            .get_mut("service:backend")
            .unwrap()
            .insert("COIN".into(), "AUR".into());
        let result = handler.handle(&with_coin("AUR")).await;
        let services: Vec<&str> = result.restart.iter().map(|u| u.service.as_str()).collect();
        assert_eq!(services, vec!["frontend", "stats"]);
    }
}
