//! Compose-file backed environment store.
//!
//! The document is kept as a `serde_yaml::Value` tree (ordered mappings,
//! sequences, scalars) and every step down to
//! `services.<service>.environment` is a checked lookup. Both compose
//! environment forms are understood:
//!
//! ```yaml
//! environment:          # mapping form
//!   COIN: ETH
//! environment:          # list form
//!   - COIN=ETH
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::{EnvError, EnvResult};
use crate::store::{EnvStore, Scope};

pub struct ComposeStore {
    path: PathBuf,
}

impl ComposeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> EnvResult<Value> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| EnvError::Read {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_yaml::from_str(&content)?)
    }

    fn write(&self, doc: &Value) -> EnvResult<()> {
        let content =
            serde_yaml::to_string(doc).map_err(|e| EnvError::Serialize(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|source| EnvError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl EnvStore for ComposeStore {
    fn update(&self, scope: Scope<'_>, updates: &BTreeMap<String, String>) -> EnvResult<bool> {
        let mut doc = self.read()?;
        let services = services_mut(&mut doc)?;

        let changed = match scope {
            Scope::Service(name) => {
                let service = services
                    .get_mut(name)
                    .ok_or_else(|| EnvError::ServiceNotFound(name.to_string()))?;
                let env = environment_mut(service, name)?;
                env.apply(updates)
            }
            Scope::Shared(names) => {
                let mut touched = 0;
                let mut changed = false;
                for &name in names {
                    let service = services
                        .get_mut(name)
                        .ok_or_else(|| EnvError::ServiceNotFound(name.to_string()))?;
                    match environment_mut(service, name) {
                        Ok(env) => {
                            touched += 1;
                            changed |= env.apply(updates);
                        }
                        Err(EnvError::MissingSection(_)) => continue,
                        Err(e) => return Err(e),
                    }
                }
                if touched == 0 {
                    return Err(EnvError::MissingSection(format!(
                        "services.{{{}}}.environment",
                        names.join(",")
                    )));
                }
                changed
            }
        };

        if changed {
            self.write(&doc)?;
            debug!(path = ?self.path, %scope, keys = updates.len(), "compose file updated");
        }
        Ok(changed)
    }

    fn verify(&self) -> EnvResult<()> {
        let mut doc = self.read()?;
        services_mut(&mut doc).map(|_| ())
    }

    fn describe(&self) -> String {
        format!("compose:{}", self.path.display())
    }
}

fn services_mut(doc: &mut Value) -> EnvResult<&mut Mapping> {
    match doc.get_mut("services") {
        Some(Value::Mapping(services)) => Ok(services),
        Some(_) => Err(EnvError::Shape("services".to_string())),
        None => Err(EnvError::MissingSection("services".to_string())),
    }
}

/// Mutable view over a service's environment section.
enum Environment<'a> {
    Map(&'a mut Mapping),
    List(&'a mut Vec<Value>),
}

fn environment_mut<'a>(service: &'a mut Value, name: &str) -> EnvResult<Environment<'a>> {
    let service = service
        .as_mapping_mut()
        .ok_or_else(|| EnvError::Shape(format!("services.{name}")))?;
    match service.get_mut("environment") {
        Some(Value::Mapping(map)) => Ok(Environment::Map(map)),
        Some(Value::Sequence(list)) => Ok(Environment::List(list)),
        Some(_) => Err(EnvError::Shape(format!("services.{name}.environment"))),
        None => Err(EnvError::MissingSection(format!("services.{name}.environment"))),
    }
}

impl Environment<'_> {
    /// Overwrite differing keys; returns whether anything changed.
    fn apply(self, updates: &BTreeMap<String, String>) -> bool {
        let mut changed = false;
        match self {
            Environment::Map(map) => {
                for (key, value) in updates {
                    let current = map.get(key.as_str()).and_then(scalar_text);
                    if current.as_deref() != Some(value.as_str()) {
                        map.insert(Value::String(key.clone()), Value::String(value.clone()));
                        changed = true;
                    }
                }
            }
            Environment::List(list) => {
                for (key, value) in updates {
                    let entry = format!("{key}={value}");
                    let position = list.iter().position(|item| {
                        item.as_str()
                            .map(|s| s.split_once('=').map_or(s, |(k, _)| k) == key)
                            .unwrap_or(false)
                    });
                    match position {
                        Some(i) if list[i].as_str() == Some(entry.as_str()) => {}
                        Some(i) => {
                            list[i] = Value::String(entry);
                            changed = true;
                        }
                        None => {
                            list.push(Value::String(entry));
                            changed = true;
                        }
                    }
                }
            }
        }
        changed
    }
}

/// String rendering of a scalar, used to compare against incoming values.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => Some(String::new()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = r#"
services:
  frontend:
    image: blockscout/frontend:latest
    environment:
      NEXT_PUBLIC_NETWORK_NAME: Old
      NEXT_PUBLIC_NETWORK_CURRENCY_SYMBOL: ETH
  backend:
    image: blockscout/backend:latest
    environment:
      - COIN=ETH
      - PORT=4000
  stats:
    environment:
      STATS__PORT: 8050
  db:
    image: postgres:15
"#;

    fn fixture(content: &str) -> (tempfile::TempDir, ComposeStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docker-compose.yaml");
        std::fs::write(&path, content).unwrap();
        (dir, ComposeStore::new(path))
    }

    fn updates(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn second_identical_update_is_a_noop() {
        let (_dir, store) = fixture(COMPOSE);
        let batch = updates(&[("NEXT_PUBLIC_NETWORK_NAME", "Aurora Testnet")]);

        assert!(store.update(Scope::Service("frontend"), &batch).unwrap());
        assert!(!store.update(Scope::Service("frontend"), &batch).unwrap());

        let doc = store.read().unwrap();
        assert_eq!(
            doc["services"]["frontend"]["environment"]["NEXT_PUBLIC_NETWORK_NAME"].as_str(),
            Some("Aurora Testnet")
        );
    }

    #[test]
    fn unchanged_values_leave_file_untouched() {
        let (_dir, store) = fixture(COMPOSE);
        let before = std::fs::read_to_string(store.path()).unwrap();
        let batch = updates(&[("NEXT_PUBLIC_NETWORK_CURRENCY_SYMBOL", "ETH")]);

        assert!(!store.update(Scope::Service("frontend"), &batch).unwrap());
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn numeric_scalar_compares_by_text() {
        let (_dir, store) = fixture(COMPOSE);
        let batch = updates(&[("STATS__PORT", "8050")]);
        assert!(!store.update(Scope::Service("stats"), &batch).unwrap());
    }

    #[test]
    fn list_form_environment() {
        let (_dir, store) = fixture(COMPOSE);

        assert!(store
            .update(Scope::Service("backend"), &updates(&[("COIN", "AURORA")]))
            .unwrap());
        assert!(store
            .update(Scope::Service("backend"), &updates(&[("NEW_KEY", "1")]))
            .unwrap());
        assert!(!store
            .update(Scope::Service("backend"), &updates(&[("COIN", "AURORA")]))
            .unwrap());

        let doc = store.read().unwrap();
        let env: Vec<&str> = doc["services"]["backend"]["environment"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(env, vec!["COIN=AURORA", "PORT=4000", "NEW_KEY=1"]);
    }

    #[test]
    fn unknown_service_is_an_error() {
        let (_dir, store) = fixture(COMPOSE);
        let err = store
            .update(Scope::Service("missing"), &updates(&[("A", "b")]))
            .unwrap_err();
        assert!(matches!(err, EnvError::ServiceNotFound(_)));
    }

    #[test]
    fn service_without_environment_is_an_error() {
        let (_dir, store) = fixture(COMPOSE);
        let err = store
            .update(Scope::Service("db"), &updates(&[("A", "b")]))
            .unwrap_err();
        assert!(matches!(err, EnvError::MissingSection(_)));
    }

    #[test]
    fn missing_services_section_is_an_error() {
        let (_dir, store) = fixture("version: '3'\n");
        let err = store
            .update(Scope::Service("frontend"), &updates(&[("A", "b")]))
            .unwrap_err();
        assert!(matches!(err, EnvError::MissingSection(_)));
        assert!(store.verify().is_err());
    }

    #[test]
    fn shared_scope_reaches_listed_environments() {
        let (_dir, store) = fixture(COMPOSE);
        let batch = updates(&[("BLOCKSCOUT_HOST", "explorer.example.com")]);
        let scope = Scope::Shared(&["frontend", "stats"]);

        assert!(store.update(scope, &batch).unwrap());
        assert!(!store.update(scope, &batch).unwrap());

        let doc = store.read().unwrap();
        assert_eq!(
            doc["services"]["frontend"]["environment"]["BLOCKSCOUT_HOST"].as_str(),
            Some("explorer.example.com")
        );
        assert_eq!(
            doc["services"]["stats"]["environment"]["BLOCKSCOUT_HOST"].as_str(),
            Some("explorer.example.com")
        );
        assert!(doc["services"]["backend"]["environment"]
            .as_sequence()
            .unwrap()
            .iter()
            .all(|item| !item.as_str().unwrap().starts_with("BLOCKSCOUT_HOST=")));
    }

    #[test]
    fn shared_scope_leaves_unlisted_services_alone() {
        let compose = format!("{COMPOSE}    environment:\n      POSTGRES_PASSWORD: x\n");
        let (_dir, store) = fixture(&compose);
        let batch = updates(&[("BLOCKSCOUT_HOST", "explorer.example.com")]);

        assert!(store
            .update(Scope::Shared(&["backend", "frontend", "stats"]), &batch)
            .unwrap());

        let doc = store.read().unwrap();
        let db_env = doc["services"]["db"]["environment"].as_mapping().unwrap();
        assert_eq!(db_env.len(), 1);
        assert_eq!(db_env["POSTGRES_PASSWORD"].as_str(), Some("x"));
    }

    #[test]
    fn shared_scope_unknown_service_is_an_error() {
        let (_dir, store) = fixture(COMPOSE);
        let err = store
            .update(Scope::Shared(&["frontend", "proxy"]), &updates(&[("A", "b")]))
            .unwrap_err();
        assert!(matches!(err, EnvError::ServiceNotFound(name) if name == "proxy"));
    }

    #[test]
    fn shared_scope_without_any_environment_is_an_error() {
        let (_dir, store) = fixture(COMPOSE);
        let err = store
            .update(Scope::Shared(&["db"]), &updates(&[("A", "b")]))
            .unwrap_err();
        assert!(matches!(err, EnvError::MissingSection(_)));
    }

    #[test]
    fn other_keys_survive_rewrite() {
        let (_dir, store) = fixture(COMPOSE);
        store
            .update(Scope::Service("frontend"), &updates(&[("NEXT_PUBLIC_NETWORK_NAME", "X")]))
            .unwrap();
        let doc = store.read().unwrap();
        assert_eq!(
            doc["services"]["frontend"]["image"].as_str(),
            Some("blockscout/frontend:latest")
        );
        assert_eq!(doc["services"]["db"]["image"].as_str(), Some("postgres:15"));
    }
}
