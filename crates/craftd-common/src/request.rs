use crate::{CraftdError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const MIN_MEMORY_MB: u32 = 128;
pub const MAX_MEMORY_MB: u32 = 16384;
pub const MAX_NAME_LEN: usize = 64;
pub const MAX_MOTD_LEN: usize = 256;
pub const MAX_PLAYERS_LIMIT: u32 = 1000;

static VERSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").expect("version pattern compiles"));

/// Whether an instance runs unmodified software or a managed modpack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProvisioningMode {
    #[default]
    #[serde(alias = "VANILLA")]
    Base,
    #[serde(alias = "AUTO_CURSEFORGE")]
    ManagedModpack,
}

impl ProvisioningMode {
    /// Marker understood by the server image's `TYPE` variable.
    pub fn image_marker(&self) -> &'static str {
        match self {
            Self::Base => "VANILLA",
            Self::ManagedModpack => "AUTO_CURSEFORGE",
        }
    }
}

/// Body of `POST /servers/create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreationRequest {
    pub name: String,
    #[serde(default = "default_motd")]
    pub motd: String,
    #[serde(default = "default_max_players")]
    pub max_players: u32,
    #[serde(default = "default_memory_mb", alias = "memory")]
    pub memory_mb: u32,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, alias = "type")]
    pub mode: ProvisioningMode,
    #[serde(default, alias = "cf_api_key")]
    pub modpack_api_key: Option<String>,
    #[serde(default, alias = "cf_modpack_url")]
    pub modpack_url: Option<String>,
}

fn default_motd() -> String {
    "A craftd server".to_string()
}

fn default_max_players() -> u32 {
    20
}

fn default_memory_mb() -> u32 {
    1024
}

fn default_port() -> u16 {
    25565
}

fn default_version() -> String {
    "1.20.1".to_string()
}

fn is_present(field: Option<&String>) -> bool {
    field.is_some_and(|v| !v.trim().is_empty())
}

impl CreationRequest {
    /// A base-mode request with every optional field at its default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            motd: default_motd(),
            max_players: default_max_players(),
            memory_mb: default_memory_mb(),
            port: default_port(),
            version: default_version(),
            mode: ProvisioningMode::Base,
            modpack_api_key: None,
            modpack_url: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.name.trim();
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(CraftdError::InvalidRequest(format!(
                "Name must be between 1 and {MAX_NAME_LEN} characters."
            )));
        }
        if self.motd.chars().count() > MAX_MOTD_LEN {
            return Err(CraftdError::InvalidRequest(format!(
                "Message of the day must be at most {MAX_MOTD_LEN} characters."
            )));
        }
        if self.max_players == 0 || self.max_players > MAX_PLAYERS_LIMIT {
            return Err(CraftdError::InvalidRequest(format!(
                "Max players must be between 1 and {MAX_PLAYERS_LIMIT}."
            )));
        }
        if !(MIN_MEMORY_MB..=MAX_MEMORY_MB).contains(&self.memory_mb) {
            return Err(CraftdError::InvalidRequest(format!(
                "Memory must be between {MIN_MEMORY_MB} MB and {MAX_MEMORY_MB} MB."
            )));
        }
        if self.port == 0 {
            return Err(CraftdError::InvalidRequest(
                "Port must be between 1 and 65535.".to_string(),
            ));
        }
        if !VERSION_PATTERN.is_match(&self.version) {
            return Err(CraftdError::InvalidRequest(
                "Version must be in the format X.Y.Z (e.g., 1.20.1).".to_string(),
            ));
        }

        let has_key = is_present(self.modpack_api_key.as_ref());
        let has_url = is_present(self.modpack_url.as_ref());
        match self.mode {
            ProvisioningMode::ManagedModpack if !(has_key && has_url) => {
                Err(CraftdError::InvalidRequest(
                    "Modpack API key and modpack URL are required for managed modpack servers."
                        .to_string(),
                ))
            }
            ProvisioningMode::Base if has_key || has_url => Err(CraftdError::InvalidRequest(
                "Modpack API key and modpack URL must not be provided for base servers."
                    .to_string(),
            )),
            _ => Ok(()),
        }
    }
}
