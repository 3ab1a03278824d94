//! Configuration file.
//!
//! YAML, camelCase keys. Name lists accept either a YAML sequence or the
//! comma separated string of older ini-style setups.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::{info, warn};

use crate::core::{CommandTable, Settings};
use crate::error::ConfigError;

pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_PORT: u16 = 6567;

/// Everything read from the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Display name; generated at startup when absent.
    pub name: Option<String>,
    pub jar_path: PathBuf,
    /// Catalog key or literal text broadcast every ten minutes.
    pub notice: String,
    pub language: String,
    pub locale_dir: PathBuf,
    pub saves_dir: PathBuf,
    #[serde(deserialize_with = "name_list")]
    pub admins: Vec<String>,
    #[serde(deserialize_with = "name_list")]
    pub super_admins: Vec<String>,
    #[serde(deserialize_with = "name_list")]
    pub super_admin_cmds: Vec<String>,
    #[serde(deserialize_with = "name_list")]
    pub admin_cmds: Vec<String>,
    #[serde(deserialize_with = "name_list")]
    pub norm_cmds: Vec<String>,
    #[serde(deserialize_with = "name_list")]
    pub votetick_cmds: Vec<String>,
    /// Map hosted as soon as the server finished loading.
    pub default_map: String,
    pub restart_delay_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: None,
            jar_path: PathBuf::from("server-release.jar"),
            notice: String::new(),
            language: "en_US".to_string(),
            locale_dir: PathBuf::from("locale"),
            saves_dir: PathBuf::from("config/saves"),
            admins: Vec::new(),
            super_admins: Vec::new(),
            super_admin_cmds: Vec::new(),
            admin_cmds: Vec::new(),
            norm_cmds: Vec::new(),
            votetick_cmds: Vec::new(),
            default_map: "Fortress".to_string(),
            restart_delay_secs: 10,
        }
    }
}

impl Config {
    pub fn from_yaml(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&text, path)?;
        info!(
            path = %path.display(),
            admins = ?config.admins,
            super_admins = ?config.super_admins,
            "Config loaded"
        );
        Ok(config)
    }

    /// Load the file, or fall back to defaults when it does not exist.
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "Config not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_secs(self.restart_delay_secs)
    }

    /// Per-run settings; `name` replaces a missing configured name.
    pub fn settings(&self, name: String, port: u16, fixed_mode: Option<GameMode>) -> Settings {
        Settings {
            name: self.name.clone().unwrap_or(name),
            port,
            fixed_mode,
            notice: self.notice.clone(),
            default_map: self.default_map.clone(),
            admins: self.admins.clone(),
            super_admins: self.super_admins.clone(),
        }
    }

    /// Build the command table. Tiers are applied super-admin, admin, normal,
    /// so a name listed twice ends up with the later tier's level.
    pub fn command_table(&self) -> CommandTable {
        let mut table = CommandTable::new();
        let tiers = [
            (&self.super_admin_cmds, 9),
            (&self.admin_cmds, 1),
            (&self.norm_cmds, 0),
        ];
        for (names, level) in tiers {
            for name in names {
                table.insert(name, level);
            }
        }
        for name in &self.votetick_cmds {
            if !table.allow_vote(name) {
                warn!(command = %name, "Vote command is unknown or not votable, ignored");
            }
        }
        info!(commands = table.len(), votable = ?table.vote_eligible(), "Command table built");
        table
    }
}

fn name_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Names {
        List(Vec<String>),
        Joined(String),
    }

    let names = match Option::<Names>::deserialize(deserializer)? {
        Some(Names::List(list)) => list,
        Some(Names::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };
    Ok(names
        .into_iter()
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .collect())
}

/// Game mode the operator may pin the server to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameMode {
    Survival,
    Attack,
    Sandbox,
    Pvp,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameMode::Survival => "survival",
            GameMode::Attack => "attack",
            GameMode::Sandbox => "sandbox",
            GameMode::Pvp => "pvp",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "survival" => Ok(GameMode::Survival),
            "attack" => Ok(GameMode::Attack),
            "sandbox" => Ok(GameMode::Sandbox),
            "pvp" => Ok(GameMode::Pvp),
            other => Err(format!("unknown game mode: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lists_and_joined_strings() {
        let yaml = r#"
name: my-server
admins: "Alice, Bob"
superAdmins:
  - Root
normCmds: help,maps,status,votetick,slots,show
adminCmds: [host, hostx, save, load, gameover]
superAdminCmds: admin,showAdmin
votetickCmds: host,hostx,gameover
notice: info.notice
restartDelaySecs: 3
"#;
        let config = Config::from_yaml(yaml, Path::new("config.yaml")).unwrap();
        assert_eq!(config.name.as_deref(), Some("my-server"));
        assert_eq!(config.admins, vec!["Alice", "Bob"]);
        assert_eq!(config.super_admins, vec!["Root"]);
        assert_eq!(config.norm_cmds.len(), 6);
        assert_eq!(config.admin_cmds, vec!["host", "hostx", "save", "load", "gameover"]);
        assert_eq!(config.votetick_cmds, vec!["host", "hostx", "gameover"]);
        assert_eq!(config.restart_delay(), Duration::from_secs(3));
        // untouched fields keep their defaults
        assert_eq!(config.default_map, "Fortress");
        assert_eq!(config.jar_path, PathBuf::from("server-release.jar"));
    }

    #[test]
    fn empty_entries_are_dropped() {
        let config = Config::from_yaml("admins: \"Alice,, ,\"", Path::new("c.yaml")).unwrap();
        assert_eq!(config.admins, vec!["Alice"]);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "admins: [unclosed").unwrap();
        let err = Config::load_or_default(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn command_table_from_tiers() {
        let yaml = r#"
superAdminCmds: admin,maps
adminCmds: host,save
normCmds: maps,help,votetick
votetickCmds: host,votetick,nope
"#;
        let table = Config::from_yaml(yaml, Path::new("c.yaml")).unwrap().command_table();
        assert_eq!(table.get("admin").unwrap().level, 9);
        assert_eq!(table.get("maps").unwrap().level, 0);
        assert_eq!(table.get("host").unwrap().level, 1);
        assert_eq!(table.vote_eligible(), vec!["host"]);
    }

    #[test]
    fn settings_keep_configured_name() {
        let config = Config {
            name: Some("fixed".to_string()),
            ..Config::default()
        };
        let settings = config.settings("generated".to_string(), 7000, Some(GameMode::Pvp));
        assert_eq!(settings.name, "fixed");
        assert_eq!(settings.port, 7000);
        assert_eq!(
            Config::default().settings("generated".to_string(), 1, None).name,
            "generated"
        );
    }

    #[test]
    fn game_mode_parsing() {
        assert_eq!("PvP".parse::<GameMode>(), Ok(GameMode::Pvp));
        assert!("creative".parse::<GameMode>().is_err());
    }
}
