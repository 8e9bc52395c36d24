#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod oracle;
pub mod parse;
pub mod preference;
pub mod prompts;
pub mod rewriter;
pub mod session;
pub mod sqlgen;
pub mod utils;

pub use cli::app::{Cli, Command};
pub use error::{ClarifyError, ClarifyResult};
pub use oracle::LanguageOracle;
pub use preference::PreferenceTree;
pub use rewriter::{Rewriter, RoundState};
pub use session::{Conversation, InMemorySessionStore, SessionId, SessionStore};
