use anyhow::Result;

use super::helpers::mask_key;
use crate::config::{Config, Settings};

pub(crate) fn cmd_config_show(config: &Config, settings: &Settings, json: bool) -> Result<()> {
    let masked = |key: &Option<String>| key.as_deref().map(mask_key);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "data_dir": config.data_dir.display().to_string(),
                "db_path": config.db_path.display().to_string(),
                "settings_path": config.settings_path.display().to_string(),
                "place_search_key": masked(&settings.place_search_key),
                "map_display_key": masked(&settings.map_display_key),
                "default_city": settings.default_city,
            }))?
        );
        return Ok(());
    }

    let unset = || "(not set)".to_string();
    println!("Database:         {}", config.db_path.display());
    println!("Settings file:    {}", config.settings_path.display());
    println!(
        "place_search_key: {}",
        masked(&settings.place_search_key).unwrap_or_else(unset)
    );
    println!(
        "map_display_key:  {}",
        masked(&settings.map_display_key).unwrap_or_else(unset)
    );
    println!(
        "default_city:     {}",
        settings.default_city.clone().unwrap_or_else(unset)
    );
    Ok(())
}

pub(crate) fn cmd_config_set(
    config: &Config,
    mut settings: Settings,
    key: &str,
    value: &str,
    json: bool,
) -> Result<()> {
    settings.set(key, value)?;
    config.save_settings(&settings)?;

    let cleared = value.trim().is_empty();
    if json {
        println!("{}", serde_json::json!({ "key": key, "cleared": cleared }));
    } else if cleared {
        println!("Cleared {key}");
    } else {
        println!("Saved {key}");
    }
    Ok(())
}
