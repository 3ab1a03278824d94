//! Pure parsing of the server's console output.
//!
//! Nothing in here performs I/O or touches shared state, so every rule can
//! be exercised with plain strings.

pub mod ansi;
pub mod event;
pub mod line;
pub mod query;

pub use ansi::strip_ansi;
pub use event::{chat_intent, interpret, Ballot, ChatIntent, ServerEvent, COMMAND_MARKERS, RESERVED_NAME};
pub use line::{classify, is_missing_file, LineKind, ERROR_MARKER, INFO_MARKER};
pub use query::{format_map_list, QueryAccumulator, QueryKind, QueryOutcome};
