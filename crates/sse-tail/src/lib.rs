pub mod cli;
pub mod config;
pub mod output;

pub use cli::args::{Args, OutputMode, parse_args};
pub use config::paths;
