//! Interactive shell: meta-commands, bounded history, Ctrl-C cancellation.

pub mod history;
pub mod meta;
pub mod repl;

pub use history::{History, HistoryEntry};
pub use meta::MetaCommand;
pub use repl::{interrupted, Shell, Step};
