//! Vote session and tally.

use std::collections::HashMap;

use chrono::{DateTime, Local};
use tokio::time::Instant;

use crate::core::commands::Handler;
use crate::semantic::Ballot;

/// The single in-flight vote.
#[derive(Debug, Clone)]
pub struct VoteSession {
    pub seq: u64,
    pub initiator: String,
    /// Full target command text, e.g. `host Fortress pvp`.
    pub command: String,
    pub handler: Handler,
    pub ballots: HashMap<String, Ballot>,
    pub started_at: DateTime<Local>,
    pub deadline: Instant,
}

impl VoteSession {
    /// Open a session; the initiator's yes is recorded immediately.
    pub fn new(seq: u64, initiator: &str, command: &str, handler: Handler, deadline: Instant) -> Self {
        let mut ballots = HashMap::new();
        ballots.insert(initiator.to_string(), Ballot::Yes);
        Self {
            seq,
            initiator: initiator.to_string(),
            command: command.to_string(),
            handler,
            ballots,
            started_at: Local::now(),
            deadline,
        }
    }

    /// Record a ballot; a later ballot from the same player replaces the earlier one.
    pub fn cast(&mut self, player: &str, ballot: Ballot) {
        self.ballots.insert(player.to_string(), ballot);
    }

    /// Count ballots against the current player count.
    ///
    /// An admin vetoes only with an explicit no ballot; admins who stay
    /// silent are neutral.
    pub fn tally(&self, players: u32, is_admin: impl Fn(&str) -> bool) -> Tally {
        let mut yes = 0;
        let mut admin_against = 0;
        for (player, ballot) in &self.ballots {
            match ballot {
                Ballot::Yes => yes += 1,
                Ballot::No if is_admin(player) => admin_against += 1,
                Ballot::No => {}
            }
        }
        Tally {
            yes,
            admin_against,
            players,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub yes: u32,
    pub admin_against: u32,
    pub players: u32,
}

impl Tally {
    /// Half of the connected players (rounded up) must agree and no admin may object.
    pub fn passed(&self) -> bool {
        self.players > 0 && self.admin_against == 0 && 2 * self.yes >= self.players
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> VoteSession {
        VoteSession::new(1, "alice", "gameover", Handler::GameOver, Instant::now())
    }

    #[test]
    fn initiator_votes_yes() {
        let vote = session();
        assert_eq!(vote.ballots.get("alice"), Some(&Ballot::Yes));
    }

    #[test]
    fn two_of_three_passes() {
        let mut vote = session();
        vote.cast("bob", Ballot::Yes);
        vote.cast("carol", Ballot::No);
        let tally = vote.tally(3, |_| false);
        assert_eq!(tally.yes, 2);
        assert!(tally.passed());
    }

    #[test]
    fn one_of_three_fails() {
        let tally = session().tally(3, |_| false);
        assert_eq!(tally.yes, 1);
        assert!(!tally.passed());
    }

    #[test]
    fn exactly_half_passes() {
        let mut vote = session();
        vote.cast("bob", Ballot::Yes);
        assert!(vote.tally(4, |_| false).passed());
    }

    #[test]
    fn no_players_always_fails() {
        assert!(!session().tally(0, |_| false).passed());
    }

    #[test]
    fn admin_no_vetoes() {
        let mut vote = session();
        vote.cast("bob", Ballot::Yes);
        vote.cast("carol", Ballot::Yes);
        vote.cast("root", Ballot::No);
        let tally = vote.tally(4, |name| name == "root");
        assert_eq!(tally.admin_against, 1);
        assert!(!tally.passed());
    }

    #[test]
    fn silent_admin_is_neutral() {
        let vote = session();
        let tally = vote.tally(2, |name| name == "root");
        assert_eq!(tally.admin_against, 0);
        assert!(tally.passed());
    }

    #[test]
    fn later_ballot_overwrites() {
        let mut vote = session();
        vote.cast("root", Ballot::No);
        vote.cast("root", Ballot::Yes);
        let tally = vote.tally(2, |name| name == "root");
        assert_eq!(tally.yes, 2);
        assert!(tally.passed());
    }
}
