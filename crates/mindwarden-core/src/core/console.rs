//! Outbound console of the game server.
//!
//! Every command is queued as one whole line on an unbounded channel and
//! written by a single task, so concurrent senders never interleave
//! partial writes on the process's stdin.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, warn};

use crate::messages::Messages;

pub struct Console {
    sink: Mutex<Option<UnboundedSender<String>>>,
    messages: Arc<dyn Messages>,
}

impl Console {
    pub fn new(messages: Arc<dyn Messages>) -> Self {
        Self {
            sink: Mutex::new(None),
            messages,
        }
    }

    fn sink(&self) -> MutexGuard<'_, Option<UnboundedSender<String>>> {
        self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Attach a new process instance. Lines sent from now on arrive on the
    /// returned receiver; a previously attached receiver is closed.
    pub fn attach(&self) -> UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sink() = Some(tx);
        rx
    }

    pub fn detach(&self) {
        self.sink().take();
    }

    pub fn is_attached(&self) -> bool {
        self.sink().as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Queue one command line for the process.
    pub fn exec(&self, command: &str) {
        debug!(command = %command, "Console command");
        let sink = self.sink();
        match sink.as_ref() {
            Some(tx) => {
                if tx.send(command.to_string()).is_err() {
                    warn!(command = %command, "Console writer gone, command dropped");
                }
            }
            None => warn!(command = %command, "No server process attached, command dropped"),
        }
    }

    /// Broadcast a catalog message to every player.
    pub fn say(&self, key: &str, args: &[String]) {
        let text = self.messages.format(key, args);
        self.exec(&format!("say {text}"));
    }
}
