//! Initial reconciliation: read the current row before subscribing so the
//! services start out matching the database.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Connection, Row};
use tracing::{debug, warn};

use netsync_core::{NetworkRow, RealtimeConfig};

use crate::error::{ListenerError, ListenerResult};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").unwrap());

/// Reject anything that is not a plain SQL identifier, since the table
/// name is interpolated into the query text.
pub fn check_identifier(identifier: &str) -> ListenerResult<()> {
    if IDENTIFIER.is_match(identifier) {
        Ok(())
    } else {
        Err(ListenerError::UnsafeIdentifier(identifier.to_string()))
    }
}

/// Reads the current rows of the monitored table.
///
/// The outer result fails the whole reconciliation; an inner error only
/// skips its row.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(
        &self,
        table: &str,
        chain_id: u64,
    ) -> ListenerResult<Vec<ListenerResult<NetworkRow>>>;
}

/// Postgres source: one short-lived connection per reconciliation.
pub struct PgRecordSource {
    database_url: String,
    timeout: Duration,
}

impl PgRecordSource {
    pub fn new(database_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            database_url: database_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(&config.database_url, config.query_timeout())
    }
}

/// Nullable text columns are coalesced and every column is cast so the
/// row decodes regardless of the table's exact column types.
pub fn select_query(table: &str) -> ListenerResult<String> {
    check_identifier(table)?;
    Ok(format!(
        "SELECT id::bigint AS id, \
         COALESCE(name, '') AS name, \
         COALESCE(base_token_symbol, '') AS base_token_symbol, \
         chain_id::text AS chain_id, \
         COALESCE(network_logo, '') AS network_logo, \
         COALESCE(network_logo_dark, '') AS network_logo_dark, \
         COALESCE(favicon, '') AS favicon, \
         COALESCE(explorer_url, '') AS explorer_url, \
         COALESCE(created_at::text, '') AS created_at, \
         COALESCE(updated_at::text, '') AS updated_at \
         FROM {table} WHERE chain_id::text = $1 LIMIT 1"
    ))
}

#[async_trait]
impl RecordSource for PgRecordSource {
    async fn fetch(
        &self,
        table: &str,
        chain_id: u64,
    ) -> ListenerResult<Vec<ListenerResult<NetworkRow>>> {
        let query = select_query(table)?;

        let work = async {
            let mut conn = PgConnection::connect(&self.database_url).await?;
            let rows = sqlx::query(&query)
                .bind(chain_id.to_string())
                .fetch_all(&mut conn)
                .await?;
            if let Err(e) = conn.close().await {
                warn!(error = %e, "failed to close database connection");
            }
            Ok::<_, sqlx::Error>(rows)
        };

        let rows = tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| ListenerError::QueryTimeout(self.timeout))??;
        debug!(table, chain_id, rows = rows.len(), "reconciliation query finished");

        Ok(rows.iter().map(decode_row).collect())
    }
}

fn decode_row(row: &PgRow) -> ListenerResult<NetworkRow> {
    let text = |column: &str| -> ListenerResult<String> {
        row.try_get::<String, _>(column)
            .map_err(|e| ListenerError::Row(format!("{column}: {e}")))
    };
    let chain_id = text("chain_id")?;
    Ok(NetworkRow {
        id: row
            .try_get::<i64, _>("id")
            .map_err(|e| ListenerError::Row(format!("id: {e}")))?,
        name: text("name")?,
        coin: text("base_token_symbol")?,
        chain_id: chain_id
            .trim()
            .parse()
            .map_err(|e| ListenerError::Row(format!("chain_id {chain_id:?}: {e}")))?,
        light_logo_url: text("network_logo")?,
        dark_logo_url: text("network_logo_dark")?,
        favicon_url: text("favicon")?,
        explorer_url: text("explorer_url")?,
        created_at: text("created_at")?,
        updated_at: text("updated_at")?,
    })
}
