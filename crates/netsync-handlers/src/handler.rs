//! The handler seam and helpers shared by the concrete handlers.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use netsync_core::{
    ChangeRecord, DeployableUnit, EnvironmentUpdate, FeaturedNetworksConfig, LimitsConfig,
    NetsyncConfig, ServicesConfig,
};
use netsync_env::{EnvStore, Scope};

use crate::error::HandlerError;

/// Outcome of one handler run: errors (empty on success) and the units
/// whose stored configuration changed.
#[derive(Debug, Default)]
pub struct HandlerResult {
    pub errors: Vec<HandlerError>,
    pub restart: Vec<DeployableUnit>,
}

impl HandlerResult {
    pub fn failed(error: HandlerError) -> Self {
        Self {
            errors: vec![error],
            restart: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn merge(&mut self, other: HandlerResult) {
        self.errors.extend(other.errors);
        self.restart.extend(other.restart);
    }
}

/// Maps the fields of a change record it cares about onto environment
/// updates.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Short name used in logs and aggregated errors.
    fn name(&self) -> &'static str;

    async fn handle(&self, record: &ChangeRecord) -> HandlerResult;
}

/// The slice of configuration the handlers read.
#[derive(Debug, Clone)]
pub struct HandlerSettings {
    pub services: ServicesConfig,
    pub limits: LimitsConfig,
    pub featured: FeaturedNetworksConfig,
}

impl HandlerSettings {
    pub fn from_config(config: &NetsyncConfig) -> Self {
        Self {
            services: config.services.clone(),
            limits: config.limits.clone(),
            featured: config.featured_networks.clone(),
        }
    }
}

/// Apply unit-scoped updates, one store call per unit.
///
/// A unit joins the restart set only if its stored values changed. A
/// failing unit does not stop the others.
pub(crate) fn apply_unit_updates(
    store: &Arc<dyn EnvStore>,
    updates: Vec<EnvironmentUpdate>,
) -> HandlerResult {
    let mut grouped: Vec<(DeployableUnit, BTreeMap<String, String>)> = Vec::new();
    for update in updates {
        match grouped.iter_mut().find(|(unit, _)| *unit == update.unit) {
            Some((_, batch)) => {
                batch.insert(update.key, update.value);
            }
            None => {
                let mut batch = BTreeMap::new();
                batch.insert(update.key, update.value);
                grouped.push((update.unit, batch));
            }
        }
    }

    let mut result = HandlerResult::default();
    for (unit, batch) in grouped {
        match store.update(Scope::Service(&unit.service), &batch) {
            Ok(true) => {
                debug!(service = %unit.service, keys = ?batch.keys().collect::<Vec<_>>(), "environment changed");
                result.restart.push(unit);
            }
            Ok(false) => {}
            Err(source) => result.errors.push(HandlerError::Store {
                scope: Scope::Service(&unit.service).to_string(),
                source,
            }),
        }
    }
    result
}

/// Reject empty values and values longer than `max` characters.
pub(crate) fn validate_text(field: &'static str, value: &str, max: usize) -> Result<(), HandlerError> {
    if value.is_empty() {
        return Err(HandlerError::invalid(field, "cannot be empty"));
    }
    if value.chars().count() > max {
        return Err(HandlerError::invalid(
            field,
            format!("length cannot exceed {max} characters"),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use netsync_env::EnvResult;

    use super::*;

    /// In-memory store keyed by scope label, mirroring the
    /// changed/unchanged semantics of the file stores.
    #[derive(Default)]
    pub struct MemoryStore {
        pub scopes: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
        pub fail_service: Option<String>,
    }

    impl MemoryStore {
        pub fn get(&self, scope: &str, key: &str) -> Option<String> {
            self.scopes
                .lock()
                .unwrap()
                .get(scope)
                .and_then(|vars| vars.get(key).cloned())
        }
    }

    impl EnvStore for MemoryStore {
        fn update(&self, scope: Scope<'_>, updates: &BTreeMap<String, String>) -> EnvResult<bool> {
            if let (Scope::Service(name), Some(fail)) = (scope, &self.fail_service) {
                if name == fail {
                    return Err(netsync_env::EnvError::ServiceNotFound(name.to_string()));
                }
            }
            let mut scopes = self.scopes.lock().unwrap();
            let vars = scopes.entry(scope.to_string()).or_default();
            let mut changed = false;
            for (k, v) in updates {
                if vars.get(k) != Some(v) {
                    vars.insert(k.clone(), v.clone());
                    changed = true;
                }
            }
            Ok(changed)
        }

        fn verify(&self) -> EnvResult<()> {
            Ok(())
        }

        fn describe(&self) -> String {
            "memory".to_string()
        }
    }

    pub fn settings(with_proxy: bool) -> HandlerSettings {
        let unit = |name: &str| netsync_core::UnitConfig {
            service: name.to_string(),
            container: format!("{name}-1"),
        };
        HandlerSettings {
            services: ServicesConfig {
                frontend: unit("frontend"),
                backend: unit("backend"),
                stats: unit("stats"),
                proxy: if with_proxy {
                    netsync_core::ProxyConfig {
                        service: Some("proxy".to_string()),
                        container: Some("proxy-1".to_string()),
                    }
                } else {
                    netsync_core::ProxyConfig::default()
                },
            },
            limits: LimitsConfig::default(),
            featured: FeaturedNetworksConfig::default(),
        }
    }

    pub fn record() -> ChangeRecord {
        ChangeRecord::from_row(
            "silos",
            netsync_core::NetworkRow {
                id: 1,
                name: "Aurora Testnet".to_string(),
                coin: "ETH".to_string(),
                chain_id: 1313161555,
                explorer_url: "https://explorer.aurora.dev".to_string(),
                ..Default::default()
            },
        )
    }
}
