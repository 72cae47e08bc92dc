// riffmeta library
// Wave container parsing for game audio archives

pub mod cli;
pub mod config;
pub mod logging;
pub mod sound;

pub use cli::Cli;
pub use config::Options;
pub use logging::LogLevel;
