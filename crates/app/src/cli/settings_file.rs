//! Loading and saving the user's settings and engine configuration files

use anyhow::{Context, Result};
use soundstage_core::{EngineConfig, PersistedSettings};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

/// `<config dir>/soundstage/settings.toml`
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("soundstage").join("settings.toml"))
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// Load persisted settings (TOML, or JSON for `.json` files)
#[instrument(skip(path))]
pub async fn load_settings<P: AsRef<Path>>(path: P) -> Result<PersistedSettings> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading settings");

    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let settings = if is_json(path) {
        PersistedSettings::from_json_str(&contents)
    } else {
        PersistedSettings::from_toml_str(&contents)
    }
    .with_context(|| format!("parsing {}", path.display()))?;

    debug!("Settings loaded: preset={}", settings.preset);
    Ok(settings)
}

/// Load the settings file if it exists, otherwise the defaults
pub async fn load_settings_or_default(path: Option<&Path>) -> Result<PersistedSettings> {
    match path {
        Some(path) if fs::try_exists(path).await.unwrap_or(false) => load_settings(path).await,
        _ => Ok(PersistedSettings::default()),
    }
}

#[instrument(skip(settings, path))]
pub async fn save_settings<P: AsRef<Path>>(settings: &PersistedSettings, path: P) -> Result<()> {
    let path = path.as_ref();
    info!(path = %path.display(), "Saving settings");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let contents = if is_json(path) {
        settings.to_json_string()?
    } else {
        settings.to_toml_string()?
    };
    fs::write(path, contents)
        .await
        .with_context(|| format!("writing {}", path.display()))?;

    debug!("Settings saved successfully");
    Ok(())
}

#[instrument(skip(path))]
pub async fn load_engine_config<P: AsRef<Path>>(path: P) -> Result<EngineConfig> {
    let path = path.as_ref();
    info!(path = %path.display(), "Loading engine configuration");

    let contents = fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    EngineConfig::from_toml_str(&contents).with_context(|| format!("parsing {}", path.display()))
}
