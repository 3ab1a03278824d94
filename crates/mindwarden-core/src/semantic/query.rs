//! Accumulator for commands whose answer spans several info lines.
//!
//! `maps` answers with one line per map followed by the map directory line;
//! `status` answers with a handful of lines of which one tells the player
//! count or that the server is closed. Lines that match nothing leave the
//! query pending, so unrelated log output in between is harmless.

use std::fmt;

use serde::{Deserialize, Serialize};

const MAP_DIRECTORY: &str = "Map directory:";
const CUSTOM_MAP: &str = ": Custom /";
const DEFAULT_MAP: &str = ": Default /";
const PLAYER_COUNT: &str = "Players:";
const NO_PLAYERS: &str = "No players connected.";
const SERVER_CLOSED: &str = "Status: server closed";

/// Which multi-line query is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Maps,
    Status,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Maps => "maps",
            QueryKind::Status => "status",
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of feeding one line to a pending query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The line did not finish the query.
    Pending,
    /// The map listing finished; names in the order the server printed them.
    Maps(Vec<String>),
    /// The status line carried a player count. `None` when the count after
    /// the marker was not a number.
    Players(Option<u32>),
    /// Status reported an empty server.
    NoPlayers,
    /// Status reported that no game is hosted.
    Closed,
}

/// State of one outstanding query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAccumulator {
    kind: QueryKind,
    maps: Vec<String>,
}

impl QueryAccumulator {
    pub fn new(kind: QueryKind) -> Self {
        Self {
            kind,
            maps: Vec::new(),
        }
    }

    pub fn kind(&self) -> QueryKind {
        self.kind
    }

    /// Map names collected so far.
    pub fn collected(&self) -> &[String] {
        &self.maps
    }

    /// Consume one info body. Once a terminal outcome is returned the
    /// accumulator must not be fed again.
    pub fn feed(&mut self, body: &str) -> QueryOutcome {
        match self.kind {
            QueryKind::Maps => self.feed_maps(body),
            QueryKind::Status => feed_status(body),
        }
    }

    fn feed_maps(&mut self, body: &str) -> QueryOutcome {
        if body.starts_with(MAP_DIRECTORY) {
            return QueryOutcome::Maps(std::mem::take(&mut self.maps));
        }
        let end = body.find(DEFAULT_MAP).or_else(|| body.find(CUSTOM_MAP));
        if let Some(end) = end {
            let name = body[..end].trim();
            if !name.is_empty() {
                self.maps.push(name.to_string());
            }
        }
        QueryOutcome::Pending
    }
}

fn feed_status(body: &str) -> QueryOutcome {
    if let Some(rest) = body.strip_prefix(PLAYER_COUNT) {
        return QueryOutcome::Players(rest.trim().parse::<u32>().ok());
    }
    if body.starts_with(NO_PLAYERS) {
        return QueryOutcome::NoPlayers;
    }
    if body.starts_with(SERVER_CLOSED) {
        return QueryOutcome::Closed;
    }
    QueryOutcome::Pending
}

/// Render a map list the way players see it: `[0]Fortress [1]Frozen Forest`.
pub fn format_map_list(maps: &[String]) -> String {
    maps.iter()
        .enumerate()
        .map(|(i, name)| format!("[{i}]{name}"))
        .collect::<Vec<_>>()
        .join(" ")
}
