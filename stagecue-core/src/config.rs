//! Embedded-default-merged-with-user-override configuration, following the
//! teacher's `imbolc-core::config` shape: an `include_str!`-embedded default
//! TOML parsed unconditionally, then overridden field-by-field by an
//! optional user file resolved via `dirs`.

use std::path::PathBuf;

use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../config.toml");

#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    net: NetConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct EngineConfig {
    #[serde(default = "default_true")]
    local_priority: bool,
    #[serde(default = "default_sfx_slots")]
    sfx_slots: usize,
    #[serde(default = "default_silence_tick_ms")]
    silence_tick_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            local_priority: default_true(),
            sfx_slots: default_sfx_slots(),
            silence_tick_ms: default_silence_tick_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct NetConfig {
    #[serde(default = "default_bind_addr")]
    bind_addr: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_sfx_slots() -> usize {
    8
}

fn default_silence_tick_ms() -> u64 {
    50
}

fn default_bind_addr() -> String {
    "0.0.0.0:7890".to_string()
}

/// Resolved runtime configuration. Loaded once at process start by
/// `stagecue-cli`; the kernel does not re-read it at runtime.
#[derive(Debug, Clone)]
pub struct Config {
    pub local_priority: bool,
    pub sfx_slots: usize,
    pub silence_tick_ms: u64,
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::load()
    }
}

impl Config {
    /// Parses the embedded default, then merges an optional user config
    /// found at `user_config_path()`. A malformed user file is logged and
    /// ignored rather than treated as fatal.
    pub fn load() -> Self {
        let default: ConfigFile = toml::from_str(DEFAULT_CONFIG)
            .expect("embedded default config.toml must parse");

        let user = user_config_path().and_then(|path| {
            std::fs::read_to_string(&path).ok().and_then(|text| {
                match toml::from_str::<ConfigFile>(&text) {
                    Ok(cfg) => Some(cfg),
                    Err(err) => {
                        log::warn!(target: "config", "failed to parse {}: {err}", path.display());
                        None
                    }
                }
            })
        });

        Self::merge(default, user)
    }

    fn merge(default: ConfigFile, user: Option<ConfigFile>) -> Self {
        let merged = user.unwrap_or(default);
        Self {
            local_priority: merged.engine.local_priority,
            sfx_slots: merged.engine.sfx_slots,
            silence_tick_ms: merged.engine.silence_tick_ms,
            bind_addr: merged.net.bind_addr,
        }
    }
}

/// `~/.config/stagecue/config.toml` (or platform equivalent via `dirs`).
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stagecue").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_default_parses() {
        let cfg = Config::load();
        assert!(cfg.sfx_slots > 0);
        assert!(!cfg.bind_addr.is_empty());
    }

    #[test]
    fn user_override_wins_over_default() {
        let default: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap();
        let user: ConfigFile = toml::from_str("[engine]\nsfx_slots = 16\n").unwrap();
        let cfg = Config::merge(default, Some(user));
        assert_eq!(cfg.sfx_slots, 16);
    }
}
