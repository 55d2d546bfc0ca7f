use anyhow::Context;
use disksync_core::{DEFAULT_BASE_URL, DiskClient, paths};

pub const DEFAULT_REMOTE_ROOT: &str = paths::ROOT;

/// Options shared by every adapter operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    /// Suppress every mutating backend call; reads still happen.
    pub dry_run: bool,
    pub remote_root: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            remote_root: DEFAULT_REMOTE_ROOT.to_string(),
        }
    }
}

impl SyncOptions {
    pub fn from_env() -> Self {
        Self {
            dry_run: read_bool_env("DISKSYNC_DRY_RUN", false),
            remote_root: std::env::var("DISKSYNC_REMOTE_ROOT")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REMOTE_ROOT.to_string()),
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub token: String,
    pub api_url: String,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let token = std::env::var("DISKSYNC_TOKEN").context("DISKSYNC_TOKEN is not set")?;
        let api_url =
            std::env::var("DISKSYNC_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self { token, api_url })
    }

    pub fn connect(&self) -> anyhow::Result<DiskClient> {
        DiskClient::with_base_url(&self.api_url, self.token.clone())
            .with_context(|| format!("invalid api url: {}", self.api_url))
    }
}

fn read_bool_env(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| parse_bool(&value).unwrap_or(default))
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
