//! The supervised game server as seen from its console.
//!
//! [`Server`] owns the whole mutable session (users, counters, the pending
//! query, the open vote) behind one mutex. Every entry point (an output
//! line, an operator command, a scheduled job, a timer) takes the lock once
//! and finishes its read-modify-write before releasing it. Nothing awaits
//! while the lock is held; delayed work is spawned as [`Step`] sequences.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::GameMode;
use crate::core::commands::{CommandTable, Handler, RunMode};
use crate::core::console::Console;
use crate::core::users::UserDirectory;
use crate::core::vote::VoteSession;
use crate::error::CommandError;
use crate::probe::{SlotStore, ThermalProbe};
use crate::semantic::{
    chat_intent, classify, format_map_list, interpret, is_missing_file, ChatIntent, LineKind,
    QueryAccumulator, QueryKind, QueryOutcome, ServerEvent, RESERVED_NAME,
};

/// Console commands that restart the game and so empty the server.
const RESTART_COMMANDS: [&str; 4] = ["stop", "host", "hostx", "load"];

// ========== Settings ==========

/// Static per-run settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub name: String,
    pub port: u16,
    /// When set, every hosted game uses this mode.
    pub fixed_mode: Option<GameMode>,
    pub notice: String,
    pub default_map: String,
    pub admins: Vec<String>,
    pub super_admins: Vec<String>,
}

/// Timer lengths. Only tests shorten them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub query_timeout: Duration,
    pub vote_window: Duration,
    /// Gap between the steps of a restart (`stop`, then `host`/`load`).
    pub restart_step: Duration,
    pub welcome_delay: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(5),
            vote_window: Duration::from_secs(60),
            restart_step: Duration::from_secs(5),
            welcome_delay: Duration::from_secs(1),
        }
    }
}

// ========== State ==========

#[derive(Debug)]
pub struct PendingQuery {
    pub seq: u64,
    pub accumulator: QueryAccumulator,
}

/// Mutable session, guarded by [`Server::lock`].
#[derive(Debug, Default)]
pub struct ServerState {
    pub(crate) users: UserDirectory,
    /// Operator wants the process kept alive.
    pub(crate) server_is_start: bool,
    /// A game is hosted and accepts commands.
    pub(crate) server_is_run: bool,
    pub(crate) play_cnt: u32,
    pub(crate) maps: Vec<String>,
    pub(crate) query: Option<PendingQuery>,
    pub(crate) vote: Option<VoteSession>,
    pub(crate) last_error: Option<String>,
    next_seq: u64,
}

impl ServerState {
    pub fn users(&self) -> &UserDirectory {
        &self.users
    }

    pub fn wants_running(&self) -> bool {
        self.server_is_start
    }

    pub fn is_running(&self) -> bool {
        self.server_is_run
    }

    pub fn players(&self) -> u32 {
        self.play_cnt
    }

    pub fn maps(&self) -> &[String] {
        &self.maps
    }

    pub fn pending_query(&self) -> Option<QueryKind> {
        self.query.as_ref().map(|q| q.accumulator.kind())
    }

    pub fn vote(&self) -> Option<&VoteSession> {
        self.vote.as_ref()
    }

    /// Body of the last error line the server printed.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Name of the exclusive operation blocking dispatch, if any.
    pub fn current_operation(&self) -> Option<&'static str> {
        if self.vote.is_some() {
            Some(crate::core::commands::VOTE_COMMAND)
        } else {
            self.query.as_ref().map(|q| q.accumulator.kind().as_str())
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// One action of a delayed sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Exec(String),
    Say(&'static str, Vec<String>),
    Pause(Duration),
}

// ========== Server ==========

pub struct Server {
    settings: Settings,
    commands: CommandTable,
    console: Console,
    slots: Arc<dyn SlotStore>,
    thermal: Arc<dyn ThermalProbe>,
    timing: Timing,
    state: Mutex<ServerState>,
}

impl Server {
    pub fn new(
        settings: Settings,
        commands: CommandTable,
        console: Console,
        slots: Arc<dyn SlotStore>,
        thermal: Arc<dyn ThermalProbe>,
    ) -> Self {
        let mut users = UserDirectory::new();
        for name in &settings.admins {
            users.promote_admin(name);
        }
        for name in &settings.super_admins {
            users.promote_super_admin(name);
        }
        users.promote_super_admin(RESERVED_NAME);

        let state = ServerState {
            users,
            server_is_start: true,
            ..ServerState::default()
        };

        Self {
            settings,
            commands,
            console,
            slots,
            thermal,
            timing: Timing::default(),
            state: Mutex::new(state),
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Lock the session. A panic in another holder does not make the state
    /// unusable.
    pub fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn slots(&self) -> &dyn SlotStore {
        self.slots.as_ref()
    }

    pub fn thermal(&self) -> &dyn ThermalProbe {
        self.thermal.as_ref()
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn wants_running(&self) -> bool {
        self.lock().server_is_start
    }

    // ========== Output ==========

    /// Feed one line of server output, with terminal escapes already removed.
    pub fn ingest_line(self: &Arc<Self>, line: &str) {
        let mut state = self.lock();
        match classify(line) {
            LineKind::Error(body) => {
                if is_missing_file(body) {
                    error!(error = %body, "Map file missing, forcing exit");
                    self.exec(&mut state, "exit");
                }
                state.last_error = Some(body.to_string());
            }
            LineKind::Info(body) => self.on_info(&mut state, body),
            LineKind::Other => {}
        }
    }

    fn on_info(self: &Arc<Self>, state: &mut ServerState, body: &str) {
        let event = interpret(body, |name| state.users.contains(name));

        // Player chat and joins never belong to a query answer; the rest of
        // the output does until the query completes.
        let player_line = matches!(
            event,
            ServerEvent::Chat { .. }
                | ServerEvent::ServerChat
                | ServerEvent::Connected(_)
                | ServerEvent::Disconnected(_)
        );
        if !player_line {
            if let Some(pending) = state.query.as_mut() {
                let kind = pending.accumulator.kind();
                let outcome = pending.accumulator.feed(body);
                if outcome != QueryOutcome::Pending {
                    state.query = None;
                    self.finish_query(state, kind, outcome);
                }
                return;
            }
        }

        match event {
            ServerEvent::Chat { player, message } => self.on_chat(state, &player, &message),
            ServerEvent::Connected(name) => self.on_connected(state, &name),
            ServerEvent::Disconnected(name) => {
                state.play_cnt = state.play_cnt.saturating_sub(1);
                let forgotten = state.users.forget_if_unprivileged(&name);
                info!(player = %name, players = state.play_cnt, forgotten, "Player disconnected");
            }
            ServerEvent::Ready => {
                info!(name = %self.settings.name, port = self.settings.port, "Server loaded");
                state.play_cnt = 0;
                state.server_is_run = true;
                self.exec(state, &format!("name {}", self.settings.name));
                self.exec(state, &format!("port {}", self.settings.port));
                self.exec(state, &format!("host {}", self.settings.default_map));
            }
            ServerEvent::Started => {
                info!("Game started");
                state.server_is_run = true;
                state.play_cnt = 0;
            }
            ServerEvent::ServerChat | ServerEvent::Unrecognized => {}
        }
    }

    fn on_chat(self: &Arc<Self>, state: &mut ServerState, player: &str, message: &str) {
        match chat_intent(message, state.vote.is_some()) {
            ChatIntent::Command(text) => {
                let _ = self.dispatch_locked(state, player, text);
            }
            ChatIntent::Ballot(ballot) => {
                if let Some(vote) = state.vote.as_mut() {
                    debug!(player = %player, ballot = ?ballot, "Ballot cast");
                    vote.cast(player, ballot);
                }
            }
            ChatIntent::Speech => {}
        }
    }

    fn on_connected(self: &Arc<Self>, state: &mut ServerState, name: &str) {
        if name == RESERVED_NAME {
            warn!(player = %name, "Reserved name refused");
            self.console.say("error.login_forbbidden_username", &[]);
            self.exec(state, &format!("kick {name}"));
            return;
        }

        state.users.register(name);
        state.play_cnt += 1;
        info!(player = %name, players = state.play_cnt, "Player connected");

        let welcome = match state.users.get(name) {
            Some(user) if user.is_super_admin() => "info.welcom_super_admin",
            Some(user) if user.is_admin() => "info.welcom_admin",
            _ => return,
        };
        self.run_later(vec![
            Step::Pause(self.timing.welcome_delay),
            Step::Say(welcome, vec![name.to_string()]),
            Step::Exec(format!("admin {name}")),
        ]);
    }

    fn finish_query(&self, state: &mut ServerState, kind: QueryKind, outcome: QueryOutcome) {
        match outcome {
            QueryOutcome::Maps(maps) => {
                info!(count = maps.len(), "Map list refreshed");
                self.console.say("info.maps_list", &[format_map_list(&maps)]);
                state.maps = maps;
            }
            QueryOutcome::Players(Some(count)) => state.play_cnt = count,
            QueryOutcome::Players(None) => warn!("Unreadable player count"),
            QueryOutcome::NoPlayers => state.play_cnt = 0,
            QueryOutcome::Closed => {
                info!("Server reports no game hosted");
                state.server_is_run = false;
                state.play_cnt = 0;
            }
            QueryOutcome::Pending => return,
        }
        debug!(query = %kind, players = state.play_cnt, "Query complete");
    }

    // ========== Commands ==========

    /// Handle a player command (marker already removed). Rejections are
    /// broadcast to the players and returned.
    pub fn dispatch(self: &Arc<Self>, player: &str, text: &str) -> Result<(), CommandError> {
        let mut state = self.lock();
        self.dispatch_locked(&mut state, player, text)
    }

    fn dispatch_locked(
        self: &Arc<Self>,
        state: &mut ServerState,
        player: &str,
        text: &str,
    ) -> Result<(), CommandError> {
        let result = self.try_dispatch(state, player, text);
        if let Err(e) = &result {
            self.reject(player, e);
        }
        result
    }

    fn try_dispatch(
        self: &Arc<Self>,
        state: &mut ServerState,
        player: &str,
        text: &str,
    ) -> Result<(), CommandError> {
        let text = text.trim();
        let Some(head) = text.split_whitespace().next() else {
            return Err(CommandError::InvalidCommand {
                input: text.to_string(),
            });
        };
        let spec = self
            .commands
            .get(head)
            .ok_or_else(|| CommandError::UnknownCommand {
                player: player.to_string(),
                command: head.to_string(),
            })?;
        if state.users.level(player) < spec.level {
            return Err(CommandError::PermissionDenied {
                player: player.to_string(),
                command: head.to_string(),
            });
        }
        if let Some(operation) = state.current_operation() {
            return Err(CommandError::Busy {
                operation: operation.to_string(),
            });
        }

        info!(player = %player, command = %text, "Command accepted");
        Handler::resolve(head).run(self, state, player, text, RunMode::Execute)
    }

    fn reject(&self, player: &str, error: &CommandError) {
        info!(player = %player, error = %error, "Command rejected");
        self.console.say(error.message_key(), &error.message_args());
    }

    /// Send a console command, noting when it empties the server.
    pub(crate) fn exec(&self, state: &mut ServerState, command: &str) {
        let head = command.split_whitespace().next().unwrap_or_default();
        if RESTART_COMMANDS.contains(&head) {
            state.play_cnt = 0;
        }
        self.console.exec(command);
    }

    /// Line typed by the operator on our own stdin.
    pub fn operator_command(&self, line: &str) {
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        let mut state = self.lock();
        match line.split_whitespace().next() {
            Some("stop" | "exit") => {
                state.server_is_start = false;
                state.server_is_run = false;
            }
            Some("host" | "load") => state.server_is_start = true,
            _ => {}
        }
        info!(command = %line, "Operator command");
        self.exec(&mut state, line);
    }

    /// Stop keeping the process alive, e.g. on Ctrl-C.
    pub fn request_shutdown(&self) {
        let mut state = self.lock();
        state.server_is_start = false;
        state.server_is_run = false;
    }

    /// The process ended; whatever it hosted is gone.
    pub fn process_exited(&self) {
        let mut state = self.lock();
        state.server_is_run = false;
        state.play_cnt = 0;
    }

    // ========== Queries ==========

    pub(crate) fn start_query(
        self: &Arc<Self>,
        state: &mut ServerState,
        kind: QueryKind,
    ) -> Result<(), CommandError> {
        if let Some(pending) = &state.query {
            return Err(CommandError::Busy {
                operation: pending.accumulator.kind().to_string(),
            });
        }

        let seq = state.next_seq();
        state.query = Some(PendingQuery {
            seq,
            accumulator: QueryAccumulator::new(kind),
        });
        match kind {
            QueryKind::Maps => {
                self.exec(state, "reloadmaps");
                self.exec(state, "maps");
            }
            QueryKind::Status => self.exec(state, "status"),
        }

        let server = Arc::clone(self);
        let timeout = self.timing.query_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            server.expire_query(seq);
        });
        Ok(())
    }

    /// Watchdog for query `seq`; a no-op once that query finished.
    pub fn expire_query(&self, seq: u64) {
        let mut state = self.lock();
        if state.query.as_ref().map(|q| q.seq) != Some(seq) {
            return;
        }
        let Some(pending) = state.query.take() else {
            return;
        };
        let kind = pending.accumulator.kind();
        info!(query = %kind, "Query timed out");
        self.console.say("error.cmd_timeout", &[kind.to_string()]);
    }

    // ========== Votes ==========

    pub(crate) fn open_vote(
        self: &Arc<Self>,
        state: &mut ServerState,
        player: &str,
        command: &str,
        handler: Handler,
    ) {
        let seq = state.next_seq();
        let deadline = Instant::now() + self.timing.vote_window;
        state.vote = Some(VoteSession::new(seq, player, command, handler, deadline));
        info!(player = %player, command = %command, "Vote opened");

        let server = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            server.resolve_vote(seq);
        });
    }

    /// Deadline of vote `seq`: tally, announce, and run the command if it passed.
    pub fn resolve_vote(self: &Arc<Self>, seq: u64) {
        let mut state = self.lock();
        if state.vote.as_ref().map(|v| v.seq) != Some(seq) {
            return;
        }
        let Some(vote) = state.vote.take() else {
            return;
        };

        let tally = vote.tally(state.play_cnt, |name| state.users.is_admin(name));
        info!(
            command = %vote.command,
            players = tally.players,
            yes = tally.yes,
            admin_against = tally.admin_against,
            passed = tally.passed(),
            "Vote resolved"
        );
        if !tally.passed() {
            self.console.say(
                "info.votetick_fail",
                &[
                    tally.players.to_string(),
                    tally.yes.to_string(),
                    tally.admin_against.to_string(),
                ],
            );
            return;
        }

        self.console.say(
            "info.votetick_pass",
            &[tally.players.to_string(), tally.yes.to_string()],
        );
        if let Err(e) = vote
            .handler
            .run(self, &mut state, &vote.initiator, &vote.command, RunMode::Execute)
        {
            self.reject(&vote.initiator, &e);
        }
    }

    // ========== Scheduled jobs ==========

    /// Hourly save into a slot named after the hour.
    pub fn hourly_save(&self, hour: u32) {
        let mut state = self.lock();
        if !state.server_is_run {
            info!(hour, "Game not running, auto save skipped");
            return;
        }
        self.exec(&mut state, &format!("save {hour}"));
        self.console.say("info.auto_save", &[hour.to_string()]);
    }

    /// Ten-minute health check: relaunch a dead game, otherwise broadcast
    /// the notice and refresh the player count.
    pub fn maintenance(self: &Arc<Self>) {
        let temperature = self.thermal.cpu_temperature();
        info!(cpu_temperature = %format!("{temperature:.3}"), "Maintenance tick");

        let mut state = self.lock();
        if !state.server_is_start {
            return;
        }
        if !state.server_is_run {
            warn!("Game not running, forcing exit");
            self.exec(&mut state, "exit");
            return;
        }
        if !self.settings.notice.is_empty() {
            self.console.say(&self.settings.notice, &[]);
        }
        if let Err(e) = self.start_query(&mut state, QueryKind::Status) {
            debug!(error = %e, "Status refresh skipped");
        }
    }

    // ========== Delayed steps ==========

    pub(crate) fn run_later(self: &Arc<Self>, steps: Vec<Step>) {
        let server = Arc::clone(self);
        tokio::spawn(async move {
            for step in steps {
                match step {
                    Step::Pause(duration) => tokio::time::sleep(duration).await,
                    Step::Say(key, args) => server.console.say(key, &args),
                    Step::Exec(command) => {
                        let mut state = server.lock();
                        server.exec(&mut state, &command);
                    }
                }
            }
        });
    }
}
