//! Domain types shared by every netsync crate.
//!
//! `NetworkRow` is the wire/database shape of the monitored row;
//! `ChangeRecord` is the immutable snapshot handed to the handlers,
//! tagged with the table that produced it.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

// ── Deployable units ──────────────────────────────────────────────

/// A service/container pair managed by the container runtime.
///
/// Two units are the same restart target when their container names match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeployableUnit {
    /// Logical service name in the compose project.
    pub service: String,
    /// Runtime container name.
    pub container: String,
}

impl DeployableUnit {
    pub fn new(service: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            container: container.into(),
        }
    }
}

impl fmt::Display for DeployableUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.service, self.container)
    }
}

/// Collapse units sharing a container name, keeping first-seen order.
pub fn dedup_units(units: impl IntoIterator<Item = DeployableUnit>) -> Vec<DeployableUnit> {
    let mut seen = HashSet::new();
    units
        .into_iter()
        .filter(|u| seen.insert(u.container.clone()))
        .collect()
}

/// A single environment variable change destined for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentUpdate {
    pub unit: DeployableUnit,
    pub key: String,
    pub value: String,
}

impl EnvironmentUpdate {
    pub fn new(unit: &DeployableUnit, key: &str, value: impl Into<String>) -> Self {
        Self {
            unit: unit.clone(),
            key: key.to_string(),
            value: value.into(),
        }
    }
}

// ── Monitored row ─────────────────────────────────────────────────

/// The monitored row as it appears in realtime payloads.
///
/// Nullable text columns decode as empty strings; numeric columns accept
/// either JSON numbers or numeric strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRow {
    #[serde(default, deserialize_with = "flexible_number")]
    pub id: i64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(rename = "base_token_symbol", default, deserialize_with = "null_as_empty")]
    pub coin: String,
    #[serde(default, deserialize_with = "flexible_number")]
    pub chain_id: u64,
    #[serde(rename = "network_logo", default, deserialize_with = "null_as_empty")]
    pub light_logo_url: String,
    #[serde(rename = "network_logo_dark", default, deserialize_with = "null_as_empty")]
    pub dark_logo_url: String,
    #[serde(rename = "favicon", default, deserialize_with = "null_as_empty")]
    pub favicon_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub explorer_url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub created_at: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub updated_at: String,
}

/// Snapshot of the monitored row at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRecord {
    /// Table the record was read from.
    pub table: String,
    pub id: i64,
    pub chain_id: u64,
    pub name: String,
    pub coin: String,
    pub light_logo_url: String,
    pub dark_logo_url: String,
    pub favicon_url: String,
    pub explorer_url: String,
    pub created_at: String,
    pub updated_at: String,
}

impl ChangeRecord {
    /// Build a record from a decoded row.
    pub fn from_row(table: impl Into<String>, row: NetworkRow) -> Self {
        Self {
            table: table.into(),
            id: row.id,
            chain_id: row.chain_id,
            name: row.name,
            coin: row.coin,
            light_logo_url: row.light_logo_url,
            dark_logo_url: row.dark_logo_url,
            favicon_url: row.favicon_url,
            explorer_url: row.explorer_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }

    /// Whether every image field is empty.
    pub fn has_no_images(&self) -> bool {
        self.light_logo_url.is_empty() && self.dark_logo_url.is_empty() && self.favicon_url.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn flexible_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + FromStr + Default,
    T::Err: fmt::Display,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw<T> {
        Number(T),
        Text(String),
    }

    match Option::<Raw<T>>::deserialize(deserializer)? {
        None => Ok(T::default()),
        Some(Raw::Number(n)) => Ok(n),
        Some(Raw::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
