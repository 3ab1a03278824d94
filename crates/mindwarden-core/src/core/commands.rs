//! Command table and handlers.
//!
//! Every player command resolves to one [`Handler`] variant. A handler runs
//! either as a dry check ([`RunMode::Check`], used before a vote opens) or
//! for real ([`RunMode::Execute`]); both modes share the same validation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, Local, Timelike};
use tracing::{debug, info};

use crate::core::server::{Server, ServerState, Step};
use crate::error::CommandError;
use crate::semantic::QueryKind;

/// Name of the vote command; it can never itself be voted on.
pub const VOTE_COMMAND: &str = "votetick";

const HOST_MODES: [&str; 3] = ["pvp", "attack", "sandbox"];

// ========== Command Table ==========

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: String,
    /// Minimum privilege level of the caller.
    pub level: u8,
    /// Whether players may start a vote on this command.
    pub vote: bool,
}

/// Known commands, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct CommandTable {
    specs: HashMap<String, CommandSpec>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command at a level. Registering an existing name replaces
    /// its level and clears its vote flag.
    pub fn insert(&mut self, name: &str, level: u8) {
        self.specs.insert(
            name.to_string(),
            CommandSpec {
                name: name.to_string(),
                level,
                vote: false,
            },
        );
    }

    /// Mark a command vote-eligible. Returns false for unknown names and for
    /// the vote command itself.
    pub fn allow_vote(&mut self, name: &str) -> bool {
        if name == VOTE_COMMAND {
            return false;
        }
        match self.specs.get_mut(name) {
            Some(spec) => {
                spec.vote = true;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec> {
        self.specs.get(name)
    }

    /// Names registered at exactly `level`, sorted.
    pub fn names_at(&self, level: u8) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .specs
            .values()
            .filter(|spec| spec.level == level)
            .map(|spec| spec.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn vote_eligible(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .specs
            .values()
            .filter(|spec| spec.vote)
            .map(|spec| spec.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

// ========== Handlers ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Validate only, no side effects.
    Check,
    Execute,
}

impl RunMode {
    fn executes(self) -> bool {
        self == RunMode::Execute
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handler {
    Admin,
    /// Forwards the command text to the server unchanged.
    Direct,
    GameOver,
    Help,
    Host,
    HostX,
    Save,
    Load,
    Maps,
    Status,
    Slots,
    ShowAdmin,
    Show,
    VoteTick,
}

impl Handler {
    /// Handler with its own logic for `name`, if any.
    pub fn dedicated(name: &str) -> Option<Self> {
        let handler = match name {
            "admin" => Handler::Admin,
            "gameover" => Handler::GameOver,
            "help" => Handler::Help,
            "host" => Handler::Host,
            "hostx" => Handler::HostX,
            "save" => Handler::Save,
            "load" => Handler::Load,
            "maps" => Handler::Maps,
            "status" => Handler::Status,
            "slots" => Handler::Slots,
            "showAdmin" => Handler::ShowAdmin,
            "show" => Handler::Show,
            VOTE_COMMAND => Handler::VoteTick,
            _ => return None,
        };
        Some(handler)
    }

    pub fn resolve(name: &str) -> Self {
        Self::dedicated(name).unwrap_or(Handler::Direct)
    }

    /// Validate `text` and, in [`RunMode::Execute`], carry it out.
    /// `text` is the full command without marker, e.g. `host Fortress pvp`.
    pub fn run(
        self,
        server: &Arc<Server>,
        state: &mut ServerState,
        player: &str,
        text: &str,
        mode: RunMode,
    ) -> Result<(), CommandError> {
        debug!(player = %player, command = %text, handler = ?self, mode = ?mode, "Running handler");
        match self {
            Handler::Direct => {
                if mode.executes() {
                    server.exec(state, text);
                }
                Ok(())
            }
            Handler::GameOver => {
                if mode.executes() {
                    server.exec(state, "reloadmaps");
                    server.exec(state, text);
                }
                Ok(())
            }
            Handler::Admin => admin(server, state, text, mode),
            Handler::Help => {
                if mode.executes() {
                    help(server, state, player, text);
                }
                Ok(())
            }
            Handler::Host | Handler::HostX => host(self, server, state, text, mode),
            Handler::Save => save(server, state, text, mode),
            Handler::Load => load(server, text, mode),
            Handler::Maps => query(server, state, QueryKind::Maps, mode),
            Handler::Status => query(server, state, QueryKind::Status, mode),
            Handler::Slots => {
                if mode.executes() {
                    let slots = server.slots().list();
                    server.console().say("info.slots_list", &[slots.join(",")]);
                }
                Ok(())
            }
            Handler::ShowAdmin => {
                if mode.executes() {
                    let settings = server.settings();
                    let console = server.console();
                    console.say("info.super_admin_list", &[settings.super_admins.join(",")]);
                    console.say("info.admin_list", &[settings.admins.join(",")]);
                }
                Ok(())
            }
            Handler::Show => {
                if mode.executes() {
                    let temperature = server.thermal().cpu_temperature();
                    let console = server.console();
                    console.say("info.ver", &[crate::VERSION.to_string()]);
                    console.say("info.cpu_temperature", &[format!("{temperature:.3}")]);
                }
                Ok(())
            }
            Handler::VoteTick => votetick(server, state, player, text, mode),
        }
    }
}

/// Everything after the command name, trimmed.
fn argument(text: &str) -> &str {
    text.trim()
        .split_once(char::is_whitespace)
        .map(|(_, rest)| rest.trim())
        .unwrap_or("")
}

/// Slot used by `save` without argument: day of month, hour, and the
/// minute rounded down to ten (`70940` for the 7th at 09:47).
pub fn default_save_slot(now: &(impl Datelike + Timelike)) -> String {
    format!("{}{:02}{:02}", now.day(), now.hour(), now.minute() / 10 * 10)
}

fn admin(
    server: &Arc<Server>,
    state: &mut ServerState,
    text: &str,
    mode: RunMode,
) -> Result<(), CommandError> {
    let name = argument(text);
    if name.is_empty() {
        return Err(CommandError::AdminNameInvalid);
    }
    if mode.executes() {
        state.users.promote_admin(name);
        server.exec(state, text);
        server.console().say("info.admin_added", &[name.to_string()]);
        info!(player = %name, "Admin added");
    }
    Ok(())
}

fn help(server: &Arc<Server>, state: &ServerState, player: &str, text: &str) {
    let console = server.console();
    let topic = argument(text);
    if !topic.is_empty() {
        console.say(&format!("helps.{topic}"), &[topic.to_string()]);
        return;
    }

    let (key, level) = match state.users.get(player) {
        Some(user) if user.is_super_admin() => ("info.super_admin_cmd", user.level()),
        Some(user) if user.is_admin() => ("info.admin_cmd", user.level()),
        _ => ("info.user_cmd", 0),
    };
    let commands = server.commands();
    console.say(key, &[commands.names_at(level).join(",")]);
    console.say("info.votetick_cmd", &[commands.vote_eligible().join(",")]);
}

fn host(
    handler: Handler,
    server: &Arc<Server>,
    state: &mut ServerState,
    text: &str,
    mode: RunMode,
) -> Result<(), CommandError> {
    let input = text.trim().to_string();
    let mut parts = text.split_whitespace().skip(1);
    let Some(target) = parts.next() else {
        return Err(CommandError::MissingArgument { input });
    };
    let requested = parts.next();

    let fixed = server.settings().fixed_mode;
    if let (Some(fixed), Some(requested)) = (fixed, requested) {
        if !requested.eq_ignore_ascii_case(fixed.as_str()) {
            return Err(CommandError::HostFixedMode {
                mode: fixed.to_string(),
            });
        }
    }

    let map = if handler == Handler::HostX {
        let index: usize = target
            .parse()
            .map_err(|_| CommandError::HostIndexNotNumber { input: input.clone() })?;
        state
            .maps
            .get(index)
            .cloned()
            .ok_or_else(|| CommandError::HostIndexNotFound { input: input.clone() })?
    } else {
        state
            .maps
            .iter()
            .find(|name| *name == target || name.replace(' ', "_") == target)
            .cloned()
            .ok_or_else(|| CommandError::HostMapNotFound { input: input.clone() })?
    };

    let game_mode = match fixed {
        Some(fixed) => Some(fixed.as_str().to_string()),
        None => match requested {
            Some(m) if HOST_MODES.contains(&m) => Some(m.to_string()),
            Some(_) => return Err(CommandError::HostModeInvalid { input }),
            None => None,
        },
    };

    if !mode.executes() {
        return Ok(());
    }

    let map = map.replace(' ', "_");
    let host_command = match game_mode {
        Some(game_mode) => format!("host {map} {game_mode}"),
        None => format!("host {map}"),
    };
    info!(map = %map, command = %host_command, "Restarting on new map");

    let pause = server.timing().restart_step;
    server.console().say("info.server_restart", &[]);
    server.exec(state, "reloadmaps");
    server.run_later(vec![
        Step::Pause(pause),
        Step::Exec("stop".to_string()),
        Step::Pause(pause),
        Step::Exec(host_command),
    ]);
    Ok(())
}

fn save(
    server: &Arc<Server>,
    state: &mut ServerState,
    text: &str,
    mode: RunMode,
) -> Result<(), CommandError> {
    let slot = match argument(text) {
        "" => default_save_slot(&Local::now()),
        given => given.to_string(),
    };
    if slot.parse::<i64>().is_err() {
        return Err(CommandError::SaveSlotInvalid { slot });
    }
    if mode.executes() {
        server.exec(state, &format!("save {slot}"));
        server.console().say("info.save_slot_succ", &[slot]);
    }
    Ok(())
}

fn load(server: &Arc<Server>, text: &str, mode: RunMode) -> Result<(), CommandError> {
    let slot = argument(text);
    if !server.slots().exists(slot) {
        return Err(CommandError::LoadSlotInvalid {
            slot: slot.to_string(),
        });
    }
    if !mode.executes() {
        return Ok(());
    }

    info!(slot = %slot, "Restarting from save slot");
    let pause = server.timing().restart_step;
    server.console().say("info.server_restart", &[]);
    server.run_later(vec![
        Step::Pause(pause),
        Step::Exec("stop".to_string()),
        Step::Pause(pause),
        Step::Exec(text.trim().to_string()),
    ]);
    Ok(())
}

fn query(
    server: &Arc<Server>,
    state: &mut ServerState,
    kind: QueryKind,
    mode: RunMode,
) -> Result<(), CommandError> {
    if mode.executes() {
        server.start_query(state, kind)?;
    }
    Ok(())
}

fn votetick(
    server: &Arc<Server>,
    state: &mut ServerState,
    player: &str,
    text: &str,
    mode: RunMode,
) -> Result<(), CommandError> {
    let target = argument(text);
    if target.is_empty() {
        return Err(CommandError::VoteTargetMissing {
            input: text.trim().to_string(),
        });
    }
    if state.vote.is_some() {
        return Err(CommandError::VoteInProgress);
    }

    let head = target.split_whitespace().next().unwrap_or_default();
    let spec = server
        .commands()
        .get(head)
        .ok_or_else(|| CommandError::VoteUnknownCommand {
            command: head.to_string(),
        })?;
    if !spec.vote || head == VOTE_COMMAND {
        return Err(CommandError::VoteNotPermitted {
            command: head.to_string(),
        });
    }
    let handler = Handler::dedicated(head).ok_or_else(|| CommandError::VoteUnsupported {
        command: target.to_string(),
    })?;

    handler.run(server, state, player, target, RunMode::Check)?;
    if mode.executes() {
        server.open_vote(state, player, target, handler);
        server.console().say("info.votetick_begin_info", &[]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameMode;
    use crate::core::server::tests::{drain, test_server, test_server_with};
    use chrono::NaiveDate;

    fn table() -> CommandTable {
        let mut table = CommandTable::new();
        table.insert("admin", 9);
        table.insert("host", 1);
        table.insert("gameover", 1);
        table.insert("help", 0);
        table.insert("maps", 0);
        table.insert(VOTE_COMMAND, 0);
        table
    }

    fn check(
        server: &Arc<Server>,
        state: &mut ServerState,
        handler: Handler,
        text: &str,
    ) -> Result<(), CommandError> {
        handler.run(server, state, "root", text, RunMode::Check)
    }

    fn vote(server: &Arc<Server>, state: &mut ServerState, text: &str) -> Result<(), CommandError> {
        Handler::VoteTick.run(server, state, "alice", text, RunMode::Execute)
    }

    #[test]
    fn vote_flag_needs_known_non_vote_command() {
        let mut table = table();
        assert!(table.allow_vote("host"));
        assert!(!table.allow_vote("kick"));
        assert!(!table.allow_vote(VOTE_COMMAND));
        assert_eq!(table.vote_eligible(), vec!["host"]);
    }

    #[test]
    fn later_tier_wins() {
        let mut table = table();
        table.allow_vote("maps");
        table.insert("maps", 1);
        let spec = table.get("maps").unwrap();
        assert_eq!(spec.level, 1);
        assert!(!spec.vote);
        assert_eq!(table.names_at(1), vec!["gameover", "host", "maps"]);
    }

    #[test]
    fn dedicated_handlers() {
        assert_eq!(Handler::resolve("hostx"), Handler::HostX);
        assert_eq!(Handler::resolve("showAdmin"), Handler::ShowAdmin);
        assert_eq!(Handler::resolve("kick"), Handler::Direct);
        assert_eq!(Handler::dedicated("kick"), None);
    }

    #[test]
    fn save_slot_from_clock() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 47, 12)
            .unwrap();
        assert_eq!(default_save_slot(&at), "70940");
        let at = NaiveDate::from_ymd_opt(2024, 3, 21)
            .unwrap()
            .and_hms_opt(23, 5, 0)
            .unwrap();
        assert_eq!(default_save_slot(&at), "212300");
    }

    #[test]
    fn argument_is_rest_of_line() {
        assert_eq!(argument("admin  Bob "), "Bob");
        assert_eq!(argument("votetick host Fortress pvp"), "host Fortress pvp");
        assert_eq!(argument("save"), "");
    }

    #[tokio::test]
    async fn host_validation() {
        let (server, mut rx) = test_server();
        let mut state = server.lock();
        state.maps = vec!["Fortress".to_string(), "Frozen Forest".to_string()];

        assert_eq!(
            check(&server, &mut state, Handler::Host, "host"),
            Err(CommandError::MissingArgument { input: "host".into() })
        );
        assert_eq!(
            check(&server, &mut state, Handler::Host, "host Tendrils"),
            Err(CommandError::HostMapNotFound { input: "host Tendrils".into() })
        );
        assert_eq!(
            check(&server, &mut state, Handler::HostX, "hostx one"),
            Err(CommandError::HostIndexNotNumber { input: "hostx one".into() })
        );
        assert_eq!(
            check(&server, &mut state, Handler::HostX, "hostx 2"),
            Err(CommandError::HostIndexNotFound { input: "hostx 2".into() })
        );
        assert_eq!(
            check(&server, &mut state, Handler::Host, "host Fortress creative"),
            Err(CommandError::HostModeInvalid { input: "host Fortress creative".into() })
        );
        assert_eq!(check(&server, &mut state, Handler::Host, "host Frozen_Forest pvp"), Ok(()));
        assert_eq!(check(&server, &mut state, Handler::HostX, "hostx 0"), Ok(()));
        drop(state);

        // checks never touch the console
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn fixed_mode_rejects_other_modes_and_is_applied() {
        let (server, mut rx) = test_server_with(|settings| settings.fixed_mode = Some(GameMode::Pvp));
        let mut state = server.lock();
        state.maps = vec!["Fortress".to_string()];

        assert_eq!(
            Handler::Host.run(&server, &mut state, "root", "host Fortress attack", RunMode::Check),
            Err(CommandError::HostFixedMode { mode: "pvp".into() })
        );
        assert_eq!(
            Handler::Host.run(&server, &mut state, "root", "host Fortress pvp", RunMode::Check),
            Ok(())
        );
        drop(state);
        drain(&mut rx);
    }

    #[tokio::test(start_paused = true)]
    async fn host_restarts_in_steps() {
        let (server, mut rx) = test_server();
        {
            let mut state = server.lock();
            state.maps = vec!["Frozen Forest".to_string()];
            state.play_cnt = 4;
            Handler::HostX
                .run(&server, &mut state, "root", "hostx 0 attack", RunMode::Execute)
                .unwrap();
        }
        assert_eq!(
            drain(&mut rx),
            vec!["say Server restarts in 10 seconds.", "reloadmaps"]
        );

        tokio::time::sleep(server.timing().restart_step * 2 + std::time::Duration::from_millis(10)).await;
        assert_eq!(drain(&mut rx), vec!["stop", "host Frozen_Forest attack"]);
        assert_eq!(server.lock().players(), 0);
    }

    #[tokio::test]
    async fn save_checks_slot() {
        let (server, mut rx) = test_server();
        let mut state = server.lock();
        assert_eq!(
            Handler::Save.run(&server, &mut state, "root", "save abc", RunMode::Execute),
            Err(CommandError::SaveSlotInvalid { slot: "abc".into() })
        );
        Handler::Save
            .run(&server, &mut state, "root", "save 12", RunMode::Execute)
            .unwrap();
        drop(state);
        assert_eq!(drain(&mut rx), vec!["save 12", "say Saved to slot 12."]);
    }

    #[tokio::test]
    async fn load_needs_existing_slot() {
        let (server, mut rx) = test_server();
        let mut state = server.lock();
        assert_eq!(
            Handler::Load.run(&server, &mut state, "root", "load 99", RunMode::Check),
            Err(CommandError::LoadSlotInvalid { slot: "99".into() })
        );
        assert_eq!(
            Handler::Load.run(&server, &mut state, "root", "load 1", RunMode::Check),
            Ok(())
        );
        drop(state);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn admin_promotes_and_forwards() {
        let (server, mut rx) = test_server();
        let mut state = server.lock();
        assert_eq!(
            Handler::Admin.run(&server, &mut state, "root", "admin", RunMode::Execute),
            Err(CommandError::AdminNameInvalid)
        );
        Handler::Admin
            .run(&server, &mut state, "root", "admin Bob", RunMode::Execute)
            .unwrap();
        assert!(state.users.is_admin("Bob"));
        drop(state);
        assert_eq!(drain(&mut rx), vec!["admin Bob", "say Bob is now an admin."]);
    }

    #[tokio::test]
    async fn help_lists_the_callers_tier() {
        let (server, mut rx) = test_server();
        let mut state = server.lock();
        state.users.register("alice");
        Handler::Help
            .run(&server, &mut state, "alice", "help", RunMode::Execute)
            .unwrap();
        Handler::Help
            .run(&server, &mut state, "alice", "help host", RunMode::Execute)
            .unwrap();
        Handler::Help
            .run(&server, &mut state, "alice", "help kick", RunMode::Execute)
            .unwrap();
        drop(state);

        let out = drain(&mut rx);
        assert_eq!(out.len(), 4);
        assert!(out[0].starts_with("say Commands: "));
        assert!(out[0].contains("maps"));
        assert!(!out[0].contains("hostx"));
        assert!(out[1].starts_with("say Votable commands"));
        assert!(out[2].starts_with("say /host <map>"));
        assert_eq!(out[3], "say helps.kick kick");
    }

    #[tokio::test]
    async fn informational_handlers() {
        let (server, mut rx) = test_server();
        let mut state = server.lock();
        for (handler, text) in [
            (Handler::Slots, "slots"),
            (Handler::ShowAdmin, "showAdmin"),
            (Handler::Show, "show"),
        ] {
            handler.run(&server, &mut state, "root", text, RunMode::Execute).unwrap();
        }
        drop(state);

        let out = drain(&mut rx);
        assert_eq!(out[0], "say Save slots: 1,171430");
        assert_eq!(out[1], "say Super admins: root");
        assert_eq!(out[2], "say Admins: bob");
        assert_eq!(out[3], format!("say mindwarden version {}", crate::VERSION));
        assert_eq!(out[4], "say CPU temperature: 48.250 C");
    }

    #[tokio::test]
    async fn votetick_validation() {
        let (server, mut rx) = test_server();
        let mut state = server.lock();
        state.maps = vec!["Fortress".to_string()];

        assert_eq!(
            vote(&server, &mut state, "votetick"),
            Err(CommandError::VoteTargetMissing { input: "votetick".into() })
        );
        assert_eq!(
            vote(&server, &mut state, "votetick kick Bob"),
            Err(CommandError::VoteUnknownCommand { command: "kick".into() })
        );
        assert_eq!(
            vote(&server, &mut state, "votetick admin alice"),
            Err(CommandError::VoteNotPermitted { command: "admin".into() })
        );
        assert_eq!(
            vote(&server, &mut state, "votetick votetick host Fortress"),
            Err(CommandError::VoteNotPermitted { command: "votetick".into() })
        );
        assert_eq!(
            vote(&server, &mut state, "votetick runwave"),
            Err(CommandError::VoteUnsupported { command: "runwave".into() })
        );
        // target validation runs before the vote opens
        assert_eq!(
            vote(&server, &mut state, "votetick host Nowhere"),
            Err(CommandError::HostMapNotFound { input: "host Nowhere".into() })
        );
        assert!(state.vote.is_none());

        assert_eq!(vote(&server, &mut state, "votetick host Fortress"), Ok(()));
        assert_eq!(state.current_operation(), Some("votetick"));
        assert_eq!(
            vote(&server, &mut state, "votetick gameover"),
            Err(CommandError::VoteInProgress)
        );
        drop(state);

        assert_eq!(
            drain(&mut rx),
            vec!["say Vote started: send 1 to agree or 0 to refuse within 60 seconds."]
        );
    }
}
