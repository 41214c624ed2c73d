//! Application-level configuration loading, including default room settings.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::room::RoomSettings;

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SONG_SHOWDOWN_BACK_CONFIG_PATH";
/// Rounds per game when the config file does not say otherwise.
const DEFAULT_ROUND_COUNT: u32 = 3;
/// Round duration in seconds when the config file does not say otherwise.
const DEFAULT_ROUND_SECONDS: u32 = 30;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    round_count: u32,
    round_seconds: u32,
    prompt_pool: Vec<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        prompts = config.prompt_pool.len(),
                        "loaded room defaults from config"
                    );
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Settings a freshly hosted room starts with. The host can overwrite
    /// them with an `update-settings` message at any time.
    pub fn default_settings(&self) -> RoomSettings {
        RoomSettings {
            round_count: self.round_count,
            round_seconds: self.round_seconds,
            prompt_pool: self.prompt_pool.clone(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            round_count: DEFAULT_ROUND_COUNT,
            round_seconds: DEFAULT_ROUND_SECONDS,
            prompt_pool: default_prompts(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    round_count: Option<u32>,
    #[serde(default)]
    round_seconds: Option<u32>,
    #[serde(default)]
    prompts: Vec<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let prompt_pool = if value.prompts.is_empty() {
            default_prompts()
        } else {
            value.prompts
        };

        Self {
            round_count: value.round_count.filter(|n| *n > 0).unwrap_or(DEFAULT_ROUND_COUNT),
            round_seconds: value
                .round_seconds
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_ROUND_SECONDS),
            prompt_pool,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in prompt pool shipped with the binary.
fn default_prompts() -> Vec<String> {
    [
        "This song makes me feel like the main character.",
        "The soundtrack to a late-night drive.",
        "This song makes me wanna text my ex (or block them).",
        "A song that defines high school memories.",
        "The perfect song to play while getting ready to go out.",
        "This song could start a mosh pit.",
        "A song that instantly boosts your confidence.",
        "This song would play in the background of my villain arc.",
        "A song that could make me cry on the right day.",
        "The ultimate cookout anthem.",
        "A song that just feels like summertime.",
        "This song is pure nostalgia.",
        "A song that makes you feel unstoppable.",
        "If life had a montage, this song would play in mine.",
        "A song that instantly hypes up the whole room.",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_viable_room_settings() {
        let settings = AppConfig::default().default_settings();
        assert!(settings.round_count >= 1);
        assert!(settings.round_seconds >= 1);
        assert!(!settings.prompt_pool.is_empty());
    }

    #[test]
    fn zero_values_in_raw_config_fall_back() {
        let raw = RawConfig {
            round_count: Some(0),
            round_seconds: Some(0),
            prompts: Vec::new(),
        };
        let config: AppConfig = raw.into();
        assert_eq!(config.round_count, DEFAULT_ROUND_COUNT);
        assert_eq!(config.round_seconds, DEFAULT_ROUND_SECONDS);
        assert!(!config.prompt_pool.is_empty());
    }
}
