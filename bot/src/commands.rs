//! Operator commands read from stdin

use std::fmt;
use std::str::FromStr;

use swap_engine::runner::StrategyHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pause,
    Resume,
    Status,
    Stop,
    Version,
    Help,
}

#[derive(Debug, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command {:?} (try `help`)", self.0)
    }
}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('/').to_lowercase().as_str() {
            "pause" | "p" => Ok(Command::Pause),
            "resume" | "r" => Ok(Command::Resume),
            "status" | "s" => Ok(Command::Status),
            "stop" | "quit" | "exit" | "q" => Ok(Command::Stop),
            "version" => Ok(Command::Version),
            "help" | "?" => Ok(Command::Help),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

pub const HELP: &str = "commands: pause, resume, status, stop, version, help";

pub fn version() -> String {
    format!(
        "{} {} ({}@{}, built {})",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_BRANCH").unwrap_or("unknown"),
        option_env!("GIT_HASH").unwrap_or("unknown"),
        option_env!("BUILD_TIME").unwrap_or("unknown"),
    )
}

/// Apply a command to the running strategy. Returns `false` once stopped.
pub fn execute(command: Command, handle: &StrategyHandle) -> bool {
    match command {
        Command::Pause => {
            handle.pause();
            tracing::info!("Strategy paused");
        }
        Command::Resume => {
            handle.resume();
            tracing::info!("Strategy resumed");
        }
        Command::Status => {
            let status = handle.status();
            match serde_json::to_string(&status) {
                Ok(json) => tracing::info!(phase = %handle.phase(), "Status: {}", json),
                Err(e) => tracing::warn!("Failed to encode status: {}", e),
            }
        }
        Command::Stop => {
            tracing::info!("Stop requested");
            handle.stop();
            return false;
        }
        Command::Version => tracing::info!("{}", version()),
        Command::Help => tracing::info!("{}", HELP),
    }
    true
}
