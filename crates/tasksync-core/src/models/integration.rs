//! Integration model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::error::Error;

/// A unique identifier for an integration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IntegrationId(Uuid);

impl IntegrationId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for IntegrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IntegrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for IntegrationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// External task-tracking systems known to tasksync.
///
/// The set is closed; an integration naming a provider with no registered
/// adapter fails with `AdapterNotFound` at sync time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// JSON files in a local directory
    LocalFile,
    /// In-process tracker (dry runs and tests)
    Memory,
    Notion,
    Linear,
    Todoist,
}

impl Provider {
    pub const ALL: [Self; 5] = [
        Self::LocalFile,
        Self::Memory,
        Self::Notion,
        Self::Linear,
        Self::Todoist,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalFile => "local_file",
            Self::Memory => "memory",
            Self::Notion => "notion",
            Self::Linear => "linear",
            Self::Todoist => "todoist",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|provider| provider.as_str() == normalized)
            .ok_or_else(|| Error::InvalidInput(format!("unknown provider: {s}")))
    }
}

/// Per-integration settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationConfig {
    /// Scheduler interval in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sync_interval: Option<u64>,
    /// Provider-specific settings
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

impl IntegrationConfig {
    /// Look up a provider-specific string setting
    pub fn setting_str(&self, key: &str) -> Option<&str> {
        self.settings.get(key).and_then(serde_json::Value::as_str)
    }
}

/// A binding between a workspace and an external provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub id: IntegrationId,
    pub workspace_id: String,
    pub provider: Provider,
    /// Provider-side container (database, project, directory)
    pub external_id: String,
    pub config: IntegrationConfig,
    pub sync_enabled: bool,
    /// Last completed scheduler run (Unix ms)
    pub last_sync_at: Option<i64>,
}

impl Integration {
    #[must_use]
    pub fn new(
        workspace_id: impl Into<String>,
        provider: Provider,
        external_id: impl Into<String>,
    ) -> Self {
        Self {
            id: IntegrationId::new(),
            workspace_id: workspace_id.into(),
            provider,
            external_id: external_id.into(),
            config: IntegrationConfig::default(),
            sync_enabled: true,
            last_sync_at: None,
        }
    }

    /// Scheduler interval, falling back to `default` when unset or zero
    pub fn sync_interval(&self, default: Duration) -> Duration {
        self.config
            .sync_interval
            .filter(|secs| *secs > 0)
            .map_or(default, Duration::from_secs)
    }
}
