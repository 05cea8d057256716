// Console module - THE OPERATOR
// Command-line flags, the slash-command grammar and the interactive loop

mod cli;
mod command;
mod repl;

pub use cli::Cli;
pub use command::{parse_endpoint, Command, CommandError, HELP};
pub use repl::{execute, run_console, Reply};
