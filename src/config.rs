use crate::scope::OptionStack;
use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

const APP_DIR: &str = "playtree";
const SETTINGS_FILE: &str = "settings.json";

/// Defaults applied when building and walking a playlist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub shuffle: bool,
    #[serde(default)]
    pub loop_count: i32,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub stop_on_nodes: bool,
    /// When set, only these option names are accepted by the option stack.
    #[serde(default)]
    pub allowed_options: Option<Vec<String>>,
}

impl Settings {
    pub fn rng(&self) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_os_rng(),
        }
    }

    pub fn option_stack(&self) -> OptionStack {
        match &self.allowed_options {
            Some(names) => OptionStack::with_allowed(names),
            None => OptionStack::new(),
        }
    }
}

pub fn config_root() -> Result<PathBuf> {
    if let Ok(override_dir) = env::var("PLAYTREE_CONFIG_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let home = env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .context("neither HOME nor USERPROFILE is set")?;
    Ok(PathBuf::from(home).join(".config").join(APP_DIR))
}

pub fn settings_path() -> Result<PathBuf> {
    Ok(config_root()?.join(SETTINGS_FILE))
}

pub fn load_settings() -> Result<Settings> {
    let path = settings_path()?;
    if !path.exists() {
        return Ok(Settings::default());
    }

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let settings: Settings = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse settings file {}", path.display()))?;
    Ok(settings)
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let root = config_root()?;
    fs::create_dir_all(&root).with_context(|| format!("failed to create {}", root.display()))?;
    let path = settings_path()?;
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ConfigScope;
    use rand::Rng;
    use tempfile::tempdir;

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().expect("tempdir");
        unsafe {
            env::set_var("PLAYTREE_CONFIG_DIR", dir.path().to_string_lossy().as_ref());
        }

        let settings = Settings {
            shuffle: true,
            loop_count: -1,
            seed: Some(3),
            ..Settings::default()
        };
        save_settings(&settings).expect("save");
        let loaded = load_settings().expect("load");
        assert_eq!(loaded, settings);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"shuffle": true}"#).expect("parse");
        assert!(settings.shuffle);
        assert_eq!(settings.loop_count, 0);
        assert_eq!(settings.seed, None);
    }

    #[test]
    fn seeded_settings_give_repeatable_rng() {
        let settings = Settings {
            seed: Some(11),
            ..Settings::default()
        };
        let a: u64 = settings.rng().random();
        let b: u64 = settings.rng().random();
        assert_eq!(a, b);
    }

    #[test]
    fn allowed_options_restrict_the_stack() {
        let settings = Settings {
            allowed_options: Some(vec![String::from("volume")]),
            ..Settings::default()
        };
        let mut stack = settings.option_stack();
        assert!(stack.apply_option("volume", "1").is_ok());
        assert!(stack.apply_option("speed", "1").is_err());
    }
}
