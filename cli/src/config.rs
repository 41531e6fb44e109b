use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTING_KEYS: [&str; 3] = ["place_search_key", "map_display_key", "default_city"];

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub settings_path: PathBuf,
}

impl Config {
    /// Resolve the platform data directory. `db_override` replaces the
    /// default database location but settings stay in the data directory.
    pub fn load(db_override: Option<PathBuf>) -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "foodmap").context("Could not determine home directory")?;
        Self::at(proj_dirs.data_dir(), db_override)
    }

    pub fn at(data_dir: &Path, db_override: Option<PathBuf>) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = db_override.unwrap_or_else(|| data_dir.join("foodmap.db"));
        let settings_path = data_dir.join("config.json");

        Ok(Config {
            db_path,
            data_dir: data_dir.to_path_buf(),
            settings_path,
        })
    }

    /// Missing file means defaults; a file that does not parse is an error.
    pub fn load_settings(&self) -> Result<Settings> {
        if !self.settings_path.exists() {
            return Ok(Settings::default());
        }
        let text = std::fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read {}", self.settings_path.display()))?;
        let settings: Settings = serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file {}", self.settings_path.display()))?;
        Ok(settings.normalized())
    }

    pub fn save_settings(&self, settings: &Settings) -> Result<()> {
        let text = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.settings_path, text).context("Failed to write settings file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(
                &self.settings_path,
                std::fs::Permissions::from_mode(0o600),
            )
            .context("Failed to set settings file permissions")?;
        }
        Ok(())
    }
}

/// User settings from `config.json`. The key names match files written by
/// earlier desktop versions.
///
/// The two keys are held for a `foodmap_core::place::PlaceLookupProvider`
/// implementation; this binary ships none, so nothing reads them yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(
        rename = "PLACE_SEARCH_AK",
        alias = "place_search_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub place_search_key: Option<String>,
    #[serde(
        rename = "MAP_DISPLAY_AK",
        alias = "map_display_key",
        skip_serializing_if = "Option::is_none"
    )]
    pub map_display_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_city: Option<String>,
}

impl Settings {
    /// Set one setting by name. An empty value clears it.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
        match key {
            "place_search_key" => self.place_search_key = value,
            "map_display_key" => self.map_display_key = value,
            "default_city" => self.default_city = value,
            _ => bail!(
                "Unknown setting '{key}'. Known settings: {}",
                SETTING_KEYS.join(", ")
            ),
        }
        Ok(())
    }

    // Older files store unset keys as "".
    fn normalized(self) -> Self {
        let clean = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        Settings {
            place_search_key: clean(self.place_search_key),
            map_display_key: clean(self.map_display_key),
            default_city: clean(self.default_city),
        }
    }
}
