//! Error types for command handling and configuration.

use thiserror::Error;

/// Why a player command was refused.
///
/// Every variant maps to a message key of the catalog and an ordered list
/// of arguments, so the refusal can be broadcast in the server's language.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{player} used unknown command '{command}'")]
    UnknownCommand { player: String, command: String },

    #[error("{player} lacks permission for '{command}'")]
    PermissionDenied { player: String, command: String },

    #[error("'{operation}' is still running")]
    Busy { operation: String },

    #[error("'{input}' is missing an argument")]
    MissingArgument { input: String },

    #[error("server runs fixed mode '{mode}'")]
    HostFixedMode { mode: String },

    #[error("map index in '{input}' is not a number")]
    HostIndexNotNumber { input: String },

    #[error("map index in '{input}' is out of range")]
    HostIndexNotFound { input: String },

    #[error("map in '{input}' is unknown")]
    HostMapNotFound { input: String },

    #[error("mode in '{input}' is not allowed")]
    HostModeInvalid { input: String },

    #[error("'{input}' is not a valid command")]
    InvalidCommand { input: String },

    #[error("save slot '{slot}' is not a number")]
    SaveSlotInvalid { slot: String },

    #[error("save slot '{slot}' does not exist")]
    LoadSlotInvalid { slot: String },

    #[error("admin command needs a player name")]
    AdminNameInvalid,

    #[error("'{input}' names no command to vote on")]
    VoteTargetMissing { input: String },

    #[error("a vote is already in progress")]
    VoteInProgress,

    #[error("'{command}' cannot be voted on")]
    VoteNotPermitted { command: String },

    #[error("'{command}' is not a known command")]
    VoteUnknownCommand { command: String },

    #[error("'{command}' has no handler that supports voting")]
    VoteUnsupported { command: String },
}

impl CommandError {
    /// Catalog key of the player-facing message.
    pub fn message_key(&self) -> &'static str {
        match self {
            CommandError::UnknownCommand { .. } => "error.cmd_invalid_user",
            CommandError::PermissionDenied { .. } => "error.cmd_permission_denied",
            CommandError::Busy { .. } => "error.cmd_is_exceuting",
            CommandError::MissingArgument { .. } => "error.cmd_length_invalid",
            CommandError::HostFixedMode { .. } => "error.cmd_host_fix_mode",
            CommandError::HostIndexNotNumber { .. } => "error.cmd_hostx_id_not_number",
            CommandError::HostIndexNotFound { .. } => "error.cmd_hostx_id_not_found",
            CommandError::HostMapNotFound { .. } => "error.cmd_host_map_not_found",
            CommandError::HostModeInvalid { .. } => "error.cmd_host_mode_invalid",
            CommandError::InvalidCommand { .. } => "error.cmd_invalid",
            CommandError::SaveSlotInvalid { .. } => "error.cmd_save_slot_invalid",
            CommandError::LoadSlotInvalid { .. } => "error.cmd_load_slot_invalid",
            CommandError::AdminNameInvalid => "error.cmd_admin_name_invalid",
            CommandError::VoteTargetMissing { .. } => "error.cmd_votetick_target_invalid",
            CommandError::VoteInProgress => "error.cmd_votetick_in_progress",
            CommandError::VoteNotPermitted { .. } => "error.cmd_votetick_not_permit",
            CommandError::VoteUnknownCommand { .. } => "error.cmd_votetick_cmd_error",
            CommandError::VoteUnsupported { .. } => "error.cmd_votetick_cmd_not_support",
        }
    }

    /// Positional arguments for the message, in catalog order.
    pub fn message_args(&self) -> Vec<String> {
        match self {
            CommandError::UnknownCommand { player, command }
            | CommandError::PermissionDenied { player, command } => {
                vec![player.clone(), command.clone()]
            }
            CommandError::Busy { operation } => vec![operation.clone()],
            CommandError::HostFixedMode { mode } => vec![mode.clone()],
            CommandError::MissingArgument { input }
            | CommandError::HostIndexNotNumber { input }
            | CommandError::HostIndexNotFound { input }
            | CommandError::HostMapNotFound { input }
            | CommandError::HostModeInvalid { input }
            | CommandError::InvalidCommand { input }
            | CommandError::VoteTargetMissing { input } => vec![input.clone()],
            CommandError::SaveSlotInvalid { slot } | CommandError::LoadSlotInvalid { slot } => {
                vec![slot.clone()]
            }
            CommandError::VoteNotPermitted { command }
            | CommandError::VoteUnknownCommand { command }
            | CommandError::VoteUnsupported { command } => vec![command.clone()],
            CommandError::AdminNameInvalid | CommandError::VoteInProgress => Vec::new(),
        }
    }
}

/// Problems found while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_carries_player_and_command() {
        let err = CommandError::PermissionDenied {
            player: "Alice".to_string(),
            command: "host".to_string(),
        };
        assert_eq!(err.message_key(), "error.cmd_permission_denied");
        assert_eq!(err.message_args(), vec!["Alice", "host"]);
        assert_eq!(err.to_string(), "Alice lacks permission for 'host'");
    }

    #[test]
    fn argument_free_variants() {
        assert!(CommandError::VoteInProgress.message_args().is_empty());
        assert_eq!(
            CommandError::AdminNameInvalid.message_key(),
            "error.cmd_admin_name_invalid"
        );
    }
}
