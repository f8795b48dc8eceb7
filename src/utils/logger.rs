//! Logging setup
//!
//! `RUST_LOG` wins when set. Otherwise the crate logs at the requested level
//! and the HTTP stack used by the executors is held at `warn`, since a UI run
//! talks to the WebDriver endpoint several times per unit.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Crates whose own logging is capped at `warn`
const QUIET_CRATES: &[&str] = &["reqwest", "hyper", "hyper_util", "rustls"];

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Filter directives used when `RUST_LOG` is not set
pub fn default_directives(level: LogLevel) -> String {
    let level = level.to_tracing_level().as_str().to_lowercase();
    let mut directives = vec![format!("qa_orchestrator={level}")];
    directives.extend(QUIET_CRATES.iter().map(|krate| format!("{krate}=warn")));
    directives.join(",")
}

/// Install the global subscriber
///
/// A second call is a no-op, which keeps embedding and tests safe.
pub fn init_logger(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("unknown"), None);
    }

    #[test]
    fn test_default_directives_quiet_http_stack() {
        let directives = default_directives(LogLevel::Debug);
        assert!(directives.starts_with("qa_orchestrator=debug,"));
        assert!(directives.contains("reqwest=warn"));
        assert!(directives.contains("hyper=warn"));
        assert!(!directives.contains("qa_orchestrator=warn"));
    }

    #[test]
    fn test_init_logger_twice_is_harmless() {
        init_logger(LogLevel::Error);
        init_logger(LogLevel::Trace);
    }
}
