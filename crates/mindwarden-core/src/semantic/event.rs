//! Interpretation of info lines that are not part of a pending query.

use serde::{Deserialize, Serialize};

/// Identity the server uses for its own chat. No player may take it.
pub const RESERVED_NAME: &str = "Server";

const CONNECTED_SUFFIX: &str = " has connected.";
const DISCONNECTED_SUFFIX: &str = " has disconnected.";
const READY_PREFIX: &str = "Server loaded. Type 'help' for help.";
const STARTED_PREFIX: &str = "Opened a server on port";

/// Characters that turn a chat message into a command.
pub const COMMAND_MARKERS: [char; 3] = ['\\', '/', '!'];

/// Semantic meaning of one info line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A known player said something.
    Chat { player: String, message: String },
    /// The server's own chat echo; never acted upon.
    ServerChat,
    Connected(String),
    Disconnected(String),
    /// The process finished loading and accepts console commands.
    Ready,
    /// A game is being hosted.
    Started,
    Unrecognized,
}

/// Classify an info body. `is_known` tells whether a name belongs to the
/// user directory; chat is only recognised for known names so that log
/// lines which merely contain a colon are not mistaken for speech.
pub fn interpret(body: &str, is_known: impl Fn(&str) -> bool) -> ServerEvent {
    if let Some((speaker, message)) = body.split_once(':') {
        let speaker = speaker.trim();
        if is_known(speaker) {
            if speaker == RESERVED_NAME {
                return ServerEvent::ServerChat;
            }
            return ServerEvent::Chat {
                player: speaker.to_string(),
                message: message.trim().to_string(),
            };
        }
    }

    if let Some(name) = body.strip_suffix(CONNECTED_SUFFIX) {
        ServerEvent::Connected(name.trim().to_string())
    } else if let Some(name) = body.strip_suffix(DISCONNECTED_SUFFIX) {
        ServerEvent::Disconnected(name.trim().to_string())
    } else if body.starts_with(READY_PREFIX) {
        ServerEvent::Ready
    } else if body.starts_with(STARTED_PREFIX) {
        ServerEvent::Started
    } else {
        ServerEvent::Unrecognized
    }
}

/// A player's stance in an open vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ballot {
    Yes,
    No,
}

/// What a chat message asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatIntent<'a> {
    /// Command text with the marker removed.
    Command(&'a str),
    Ballot(Ballot),
    Speech,
}

/// Decide whether a chat message is a command, a ballot or plain speech.
/// Ballots (`1` / `0`) only count while a vote is open.
pub fn chat_intent(message: &str, vote_open: bool) -> ChatIntent<'_> {
    if let Some(rest) = message.strip_prefix(COMMAND_MARKERS) {
        return ChatIntent::Command(rest);
    }
    match message {
        "1" if vote_open => ChatIntent::Ballot(Ballot::Yes),
        "0" if vote_open => ChatIntent::Ballot(Ballot::No),
        _ => ChatIntent::Speech,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(name: &str) -> bool {
        matches!(name, "Alice" | "Bob" | RESERVED_NAME)
    }

    #[test]
    fn chat_from_known_player() {
        assert_eq!(
            interpret("Alice: /maps", known),
            ServerEvent::Chat {
                player: "Alice".to_string(),
                message: "/maps".to_string(),
            }
        );
    }

    #[test]
    fn chat_from_server_is_ignored() {
        assert_eq!(interpret("Server: /host Fortress", known), ServerEvent::ServerChat);
    }

    #[test]
    fn colon_from_unknown_name_is_not_chat() {
        assert_eq!(
            interpret("Map directory: /maps", known),
            ServerEvent::Unrecognized
        );
        assert_eq!(
            interpret("Mallory: /admin Mallory", known),
            ServerEvent::Unrecognized
        );
    }

    #[test]
    fn connect_and_disconnect() {
        assert_eq!(
            interpret("Carol has connected.", known),
            ServerEvent::Connected("Carol".to_string())
        );
        assert_eq!(
            interpret("Bob has disconnected.", known),
            ServerEvent::Disconnected("Bob".to_string())
        );
        assert_eq!(
            interpret("Server has connected.", known),
            ServerEvent::Connected(RESERVED_NAME.to_string())
        );
    }

    #[test]
    fn lifecycle_lines() {
        assert_eq!(
            interpret("Server loaded. Type 'help' for help.", known),
            ServerEvent::Ready
        );
        assert_eq!(
            interpret("Opened a server on port 6567.", known),
            ServerEvent::Started
        );
    }

    #[test]
    fn command_markers_are_stripped() {
        assert_eq!(chat_intent("/maps", false), ChatIntent::Command("maps"));
        assert_eq!(chat_intent("!host Fortress", true), ChatIntent::Command("host Fortress"));
        assert_eq!(chat_intent("\\status", false), ChatIntent::Command("status"));
    }

    #[test]
    fn ballots_only_while_vote_open() {
        assert_eq!(chat_intent("1", true), ChatIntent::Ballot(Ballot::Yes));
        assert_eq!(chat_intent("0", true), ChatIntent::Ballot(Ballot::No));
        assert_eq!(chat_intent("1", false), ChatIntent::Speech);
        assert_eq!(chat_intent("10", true), ChatIntent::Speech);
        assert_eq!(chat_intent("gg", true), ChatIntent::Speech);
    }
}
