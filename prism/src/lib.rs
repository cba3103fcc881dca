pub mod cli;
pub mod load_config;
pub mod logging;

pub use cli::{execute, normalize_args, run, Cli, Commands};
