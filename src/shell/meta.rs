//! Shell meta-commands, handled before classification.

/// A command addressed to the shell itself rather than the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaCommand {
    Help,
    History,
    Clear,
    Exit,
}

impl MetaCommand {
    /// Parse a whole input line. Case-insensitive; a leading `/` is allowed.
    pub fn parse(input: &str) -> Option<Self> {
        let word = input.trim();
        let word = word.strip_prefix('/').unwrap_or(word);
        match word.to_ascii_lowercase().as_str() {
            "help" | "?" => Some(MetaCommand::Help),
            "history" => Some(MetaCommand::History),
            "clear" => Some(MetaCommand::Clear),
            "exit" | "quit" => Some(MetaCommand::Exit),
            _ => None,
        }
    }
}

pub const HELP_TEXT: &str = "\
Ask in plain English. For example:
  find BRCA1 genes in mouse
  search for diseases related to asthma
  info about HGNC:1100
  blast ATGCGATACGCTTGA
  cache stats

Shell commands:
  help       show this message
  history    list recent queries
  clear      forget the query history
  exit       leave the shell (also: quit, Ctrl-D)";

/// Shown when a query cannot be interpreted.
pub const USAGE_HINT: &str = "\
Sorry, I couldn't understand that. Try 'find <gene> genes', \
'diseases related to <term>', 'info about <ID>', 'blast <sequence>' or 'cache stats'. \
Type 'help' for more.";
