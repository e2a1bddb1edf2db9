//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};

/// Where OS-level notifications go
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NotifierKind {
    /// Transient systemd user timers running notify-send; they survive our exit
    Systemd,
    /// Log the notifications instead of delivering them
    Log,
}

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "brew-timers")]
#[command(about = "A multi-timer scheduler for home brewing, served over HTTP")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// File the timer set is persisted to
    #[arg(short, long, default_value = "brew-timers.json")]
    pub state_file: PathBuf,

    /// Notification backend
    #[arg(short, long, value_enum, default_value = "systemd")]
    pub notifier: NotifierKind,

    /// Do not play completion sounds
    #[arg(long)]
    pub no_sound: bool,

    /// Seconds between checks for an unannounced system sleep
    #[arg(long, default_value = "5")]
    pub wake_check_secs: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn wake_check_interval(&self) -> Duration {
        Duration::from_secs(self.wake_check_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["brew-timers"]);
        assert_eq!(config.address(), "0.0.0.0:20554");
        assert_eq!(config.state_file, PathBuf::from("brew-timers.json"));
        assert_eq!(config.notifier, NotifierKind::Systemd);
        assert!(!config.no_sound);
        assert_eq!(config.wake_check_interval(), Duration::from_secs(5));
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn test_flags() {
        let config = Config::parse_from([
            "brew-timers",
            "--port",
            "8080",
            "--host",
            "127.0.0.1",
            "--state-file",
            "/tmp/timers.json",
            "--notifier",
            "log",
            "--no-sound",
            "--wake-check-secs",
            "0",
            "--verbose",
        ]);
        assert_eq!(config.address(), "127.0.0.1:8080");
        assert_eq!(config.notifier, NotifierKind::Log);
        assert!(config.no_sound);
        assert_eq!(config.wake_check_interval(), Duration::from_secs(1));
        assert_eq!(config.log_level(), "debug");
    }
}
