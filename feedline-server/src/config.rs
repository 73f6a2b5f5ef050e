use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use feedline_types::{FeedGroupDef, FeedViewDef, SampleUser};

/// Topology shipped with the server, used when no path is configured
const DEFAULT_TOPOLOGY: &str = include_str!("../config/topology.toml");

/// Sample-user roster shipped with the server, used when no path is configured
const DEFAULT_ROSTER: &str = include_str!("../config/roster.toml");

/// Longest feed group cutoff accepted from configuration
pub const MAX_CUTOFF_DAYS: i64 = 36_500;

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedBackend {
    Http,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedServiceSettings {
    pub backend: FeedBackend,
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub token: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSettings {
    pub page_size: usize,
    /// Hard stop for any pagination loop
    pub max_pages: usize,
    pub reaction_limit: usize,
    pub comment_limit: usize,
    pub comment_text: String,
    #[serde(default)]
    pub topology_path: Option<String>,
    #[serde(default)]
    pub roster_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: Server,
    pub feed_service: FeedServiceSettings,
    pub pipeline: PipelineSettings,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // 1. Try to load from settings.toml (optional for deployment)
        let config_file_name = "settings.toml";

        // Check in current directory
        let current_dir_path = PathBuf::from(config_file_name);
        if current_dir_path.exists() {
            builder = builder.add_source(File::from(current_dir_path).required(false));
        }

        // Check in feedline-server directory (for development)
        let dev_path = PathBuf::from("feedline-server").join(config_file_name);
        if dev_path.exists() {
            builder = builder.add_source(File::from(dev_path).required(false));
        }

        builder = Self::with_defaults(builder)?;

        // 2. Override with environment variables (highest priority)
        let overrides = [
            ("HOST", "server.host"),
            ("PORT", "server.port"),
            ("FEED_BACKEND", "feed_service.backend"),
            ("FEED_SERVICE_URL", "feed_service.base_url"),
            ("FEED_SERVICE_API_KEY", "feed_service.api_key"),
            ("FEED_SERVICE_TOKEN", "feed_service.token"),
            ("TOPOLOGY_PATH", "pipeline.topology_path"),
            ("ROSTER_PATH", "pipeline.roster_path"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = std::env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        let s = builder.build()?;
        s.try_deserialize()
    }

    /// Settings built from defaults plus a single TOML file, no environment
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = Config::builder().add_source(File::from(path.as_ref()));
        Self::with_defaults(builder)?.build()?.try_deserialize()
    }

    fn with_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("feed_service.backend", "http")?
            .set_default("feed_service.base_url", "http://127.0.0.1:8080/api/v2/feeds")?
            .set_default("feed_service.timeout_secs", 30)?
            .set_default("pipeline.page_size", 100)?
            .set_default("pipeline.max_pages", 1000)?
            .set_default("pipeline.reaction_limit", 3)?
            .set_default("pipeline.comment_limit", 2)?
            .set_default("pipeline.comment_text", "Welcome aboard! Great to see you here.")
    }

    pub fn topology(&self) -> Result<Topology, ConfigError> {
        Topology::load(self.pipeline.topology_path.as_deref())
    }

    pub fn roster(&self) -> Result<Roster, ConfigError> {
        Roster::load(self.pipeline.roster_path.as_deref())
    }
}

fn load_toml<T: for<'de> Deserialize<'de>>(path: Option<&str>, fallback: &str) -> Result<T, ConfigError> {
    let source = match path {
        Some(path) => Config::builder().add_source(File::new(path, FileFormat::Toml)),
        None => Config::builder().add_source(File::from_str(fallback, FileFormat::Toml)),
    };
    source.build()?.try_deserialize()
}

fn ensure_unique<'a>(kind: &str, ids: impl Iterator<Item = &'a str>) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(ConfigError::Message(format!("{} with an empty id", kind)));
        }
        if !seen.insert(id) {
            return Err(ConfigError::Message(format!("duplicate {} id '{}'", kind, id)));
        }
    }
    Ok(())
}

/// Feed groups and views the product depends on
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub feed_groups: Vec<FeedGroupDef>,
    #[serde(default)]
    pub feed_views: Vec<FeedViewDef>,
}

impl Topology {
    /// Load from `path`, or the bundled topology when `path` is `None`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let topology: Topology = load_toml(path, DEFAULT_TOPOLOGY)?;
        topology.validate()?;
        Ok(topology)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure_unique("feed group", self.feed_groups.iter().map(|g| g.id.as_str()))?;
        ensure_unique("feed view", self.feed_views.iter().map(|v| v.id.as_str()))?;

        for group in &self.feed_groups {
            if let Some(days) = group.cutoff_days {
                if !(1..=MAX_CUTOFF_DAYS).contains(&days) {
                    return Err(ConfigError::Message(format!(
                        "feed group '{}' has cutoff_days {}, expected 1 to {}",
                        group.id, days, MAX_CUTOFF_DAYS
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Fixed set of demo identities and their posts
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Roster {
    #[serde(default)]
    pub users: Vec<SampleUser>,
}

impl Roster {
    /// Load from `path`, or the bundled roster when `path` is `None`
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let roster: Roster = load_toml(path, DEFAULT_ROSTER)?;
        roster.validate()?;
        Ok(roster)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.users.is_empty() {
            return Err(ConfigError::Message("roster has no users".to_string()));
        }
        ensure_unique("sample user", self.users.iter().map(|u| u.id.as_str()))
    }
}
