//! Session state and everything that acts on it.

pub mod commands;
pub mod console;
pub mod process_manager;
pub mod scheduler;
pub mod server;
pub mod users;
pub mod vote;

pub use commands::{default_save_slot, CommandSpec, CommandTable, Handler, RunMode, VOTE_COMMAND};
pub use console::Console;
pub use process_manager::{LaunchOptions, ProcessEvent, ProcessStatus, ProcessSupervisor};
pub use scheduler::Job;
pub use server::{Server, ServerState, Settings, Step, Timing};
pub use users::{Role, User, UserDirectory};
pub use vote::{Tally, VoteSession};
