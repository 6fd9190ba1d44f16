//! Integration repository implementation

use crate::error::{Error, Result};
use crate::models::{Integration, IntegrationConfig, IntegrationId};
use libsql::{params, Connection, Row};

use super::values::{flag, integer_or_null, parse_column};

const INTEGRATION_COLUMNS: &str =
    "id, workspace_id, provider, external_id, config, sync_enabled, last_sync_at";

/// libSQL storage for integrations
pub struct LibSqlIntegrationRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlIntegrationRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, integration: &Integration) -> Result<Integration> {
        if self.get(&integration.id).await?.is_some() {
            return Err(Error::AlreadyExists(format!(
                "integration {}",
                integration.id
            )));
        }
        let config = serde_json::to_string(&integration.config)?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO integrations ({INTEGRATION_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)"
                ),
                params![
                    integration.id.as_str(),
                    integration.workspace_id.as_str(),
                    integration.provider.as_str(),
                    integration.external_id.as_str(),
                    config,
                    flag(integration.sync_enabled),
                    integer_or_null(integration.last_sync_at),
                ],
            )
            .await?;
        Ok(integration.clone())
    }

    pub async fn get(&self, id: &IntegrationId) -> Result<Option<Integration>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = ?"),
                [id.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_integration(&row)?)),
            None => Ok(None),
        }
    }

    /// All integrations, optionally limited to one workspace
    pub async fn list(&self, workspace_id: Option<&str>) -> Result<Vec<Integration>> {
        let mut rows = match workspace_id {
            Some(workspace_id) => {
                self.conn
                    .query(
                        &format!(
                            "SELECT {INTEGRATION_COLUMNS} FROM integrations
                             WHERE workspace_id = ? ORDER BY id ASC"
                        ),
                        [workspace_id],
                    )
                    .await?
            }
            None => {
                self.conn
                    .query(
                        &format!("SELECT {INTEGRATION_COLUMNS} FROM integrations ORDER BY id ASC"),
                        (),
                    )
                    .await?
            }
        };

        let mut integrations = Vec::new();
        while let Some(row) = rows.next().await? {
            integrations.push(Self::parse_integration(&row)?);
        }
        Ok(integrations)
    }

    /// Toggle sync for an integration
    pub async fn set_enabled(&self, id: &IntegrationId, enabled: bool) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE integrations SET sync_enabled = ? WHERE id = ?",
                params![flag(enabled), id.as_str()],
            )
            .await?;
        if changed == 0 {
            return Err(Error::NotFound(format!("integration {id}")));
        }
        Ok(())
    }

    pub async fn mark_synced(&self, id: &IntegrationId, at: i64) -> Result<()> {
        let changed = self
            .conn
            .execute(
                "UPDATE integrations SET last_sync_at = ? WHERE id = ?",
                params![at, id.as_str()],
            )
            .await?;
        if changed == 0 {
            return Err(Error::NotFound(format!("integration {id}")));
        }
        Ok(())
    }

    fn parse_integration(row: &Row) -> Result<Integration> {
        let id: String = row.get(0)?;
        let provider: String = row.get(2)?;
        let config: String = row.get(4)?;
        let config: IntegrationConfig = serde_json::from_str(&config)?;

        Ok(Integration {
            id: parse_column(&id, "integration id")?,
            workspace_id: row.get(1)?,
            provider: parse_column(&provider, "provider")?,
            external_id: row.get(3)?,
            config,
            sync_enabled: row.get::<i64>(5)? != 0,
            last_sync_at: row.get(6)?,
        })
    }
}
