use anyhow::Context;
use mediasweep_core::Policy;
use mediasweep_notify::PersonalityConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "/config/config.yaml";

const MASK: &str = "********";

// ── Schema ──

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub homeserver_url: String,
    /// Label used in summaries. Defaults to the homeserver host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    pub bot: BotConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub rooms_allowlist: Vec<String>,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub add_personality: PersonalityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    pub mxid: String,
    pub access_token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub log_room_id: Option<String>,
    pub send_zero_deletion_summaries: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub retention_days: RetentionDays,
    pub disk_thresholds: DiskThresholds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionDays {
    pub image: u32,
    pub non_image: u32,
}

impl Default for RetentionDays {
    fn default() -> Self {
        Self {
            image: 90,
            non_image: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskThresholds {
    pub pressure: f64,
    pub emergency: f64,
}

impl Default for DiskThresholds {
    fn default() -> Self {
        Self {
            pressure: 0.85,
            emergency: 0.92,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub media_root: PathBuf,
    pub state_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("/srv/media"),
            state_dir: PathBuf::from("/state"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Messages fetched per room on each pass.
    pub history_limit: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { history_limit: 200 }
    }
}

// ── Loading ──

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = serde_yaml::from_str(content)?;
        if config.homeserver_url.trim().is_empty() {
            anyhow::bail!("homeserver_url must not be empty");
        }
        if config.bot.access_token.trim().is_empty() {
            anyhow::bail!("bot.access_token must not be empty");
        }
        config.to_policy()?;
        Ok(config)
    }

    /// Validated eviction policy.
    pub fn to_policy(&self) -> anyhow::Result<Policy> {
        let policy = Policy {
            image_retention_days: self.policy.retention_days.image,
            non_image_retention_days: self.policy.retention_days.non_image,
            pressure_threshold: self.policy.disk_thresholds.pressure,
            emergency_threshold: self.policy.disk_thresholds.emergency,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Rooms to scan and auto-join. An empty allowlist falls back to the
    /// notification room for invites and to every joined room for ingestion.
    pub fn invite_allowlist(&self) -> Vec<String> {
        if !self.rooms_allowlist.is_empty() {
            return self.rooms_allowlist.clone();
        }
        self.notifications.log_room_id.iter().cloned().collect()
    }

    /// Copy with every credential replaced by a mask.
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.bot.access_token = MASK.to_string();
        let personality = &mut copy.add_personality;
        if personality.characters_api_key.is_some() {
            personality.characters_api_key = Some(MASK.to_string());
        }
        if personality.cathy_api_key.is_some() {
            personality.cathy_api_key = Some(MASK.to_string());
        }
        copy
    }
}
