pub mod cli;
pub mod load_config;
pub mod upload;
pub mod watch;

pub use cli::{run, Cli, Commands};
