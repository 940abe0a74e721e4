use crate::metadata::ContentSource;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

/// Last-used paths so repeat runs can omit the flags. Explicit flags
/// always win and are saved back as the new defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub modsconfig_path: Option<PathBuf>,
    #[serde(default)]
    pub mods_dir: Option<PathBuf>,
    #[serde(default)]
    pub content_source: Option<ContentSourceName>,
}

/// Serializable stand-in for `ContentSource` (the metadata enum itself
/// never round-trips through config).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSourceName {
    Official,
    Local,
    Workshop,
}

impl ContentSourceName {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "official" => Some(ContentSourceName::Official),
            "local" => Some(ContentSourceName::Local),
            "workshop" => Some(ContentSourceName::Workshop),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContentSourceName::Official => "official",
            ContentSourceName::Local => "local",
            ContentSourceName::Workshop => "workshop",
        }
    }

    pub fn to_content_source(self) -> ContentSource {
        match self {
            ContentSourceName::Official => ContentSource::OfficialFolder,
            ContentSourceName::Local => ContentSource::LocalFolder,
            ContentSourceName::Workshop => ContentSource::WorkshopFolder,
        }
    }
}

impl AppConfig {
    pub fn load_or_create() -> Result<Self> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        if path.exists() {
            let raw = fs::read_to_string(&path).context("read app config")?;
            let config: AppConfig = serde_json::from_str(&raw).context("parse app config")?;
            return Ok(config);
        }

        let config = AppConfig::default();
        config.save()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let base_dir = base_data_dir()?;
        fs::create_dir_all(&base_dir).context("create app data dir")?;
        let path = base_dir.join("config.json");
        let raw = serde_json::to_string_pretty(self).context("serialize app config")?;
        fs::write(path, raw).context("write app config")?;
        Ok(())
    }
}

fn base_data_dir() -> Result<PathBuf> {
    let base = BaseDirs::new().context("resolve home dir")?;
    Ok(base.data_local_dir().join("rimsmith"))
}
