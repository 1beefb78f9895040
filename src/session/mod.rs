//! CLI session layer: transport boundary, session text handling, transcripts.

pub mod cli;
pub mod transcript;
pub mod transport;

pub use cli::{parse_lines, strip_echo, CliSession};
pub use transcript::Transcript;
pub use transport::{Channel, Transport};
