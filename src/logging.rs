//! Tracing subscriber setup
//!
//! Every event emitted by the registry uses the `service_registry` target, so
//! a single filter directive separates scope wiring from the rest of an
//! application's output.
//!
//! # Features
//!
//! - `logging` - emit events (default)
//! - `logging-json` - install a JSON subscriber
//! - `logging-pretty` - install a human-readable subscriber
//!
//! # Example
//!
//! ```rust,ignore
//! use service_registry::logging::{self, LogFormat};
//!
//! // Registry events only, at TRACE, honouring RUST_LOG when set
//! logging::builder()
//!     .trace()
//!     .format(LogFormat::Pretty)
//!     .registry_only()
//!     .from_env()
//!     .try_init()
//!     .ok();
//! ```

use tracing::Level;

/// Target of every event emitted by this crate
pub const TARGET: &str = "service_registry";

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event
    Json,
    /// Multi-line, human-readable
    Pretty,
    /// Single line per event
    Compact,
}

impl Default for LogFormat {
    fn default() -> Self {
        if cfg!(feature = "logging-json") {
            LogFormat::Json
        } else if cfg!(feature = "logging-pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Compact
        }
    }
}

/// Subscriber configuration
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    registry_only: bool,
    from_env: bool,
    thread_names: bool,
    source_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::default(),
            registry_only: false,
            from_env: false,
            thread_names: false,
            source_location: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum level to record
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn trace(self) -> Self {
        self.level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.level(Level::DEBUG)
    }

    pub fn info(self) -> Self {
        self.level(Level::INFO)
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn json(self) -> Self {
        self.format(LogFormat::Json)
    }

    pub fn pretty(self) -> Self {
        self.format(LogFormat::Pretty)
    }

    pub fn compact(self) -> Self {
        self.format(LogFormat::Compact)
    }

    /// Drop events from every target except this crate
    pub fn registry_only(mut self) -> Self {
        self.registry_only = true;
        self
    }

    /// Prefer `RUST_LOG` over the configured directive when it is set
    pub fn from_env(mut self) -> Self {
        self.from_env = true;
        self
    }

    /// Record the emitting thread's name (useful for concurrent lookups)
    pub fn with_thread_names(mut self) -> Self {
        self.thread_names = true;
        self
    }

    /// Record file and line of each event
    pub fn with_source_location(mut self) -> Self {
        self.source_location = true;
        self
    }

    /// The `EnvFilter` directive this configuration produces
    pub fn directive(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        if self.registry_only {
            format!("{TARGET}={level}")
        } else {
            level
        }
    }

    /// Install the subscriber globally.
    ///
    /// Fails if another global subscriber is already set.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn try_init(self) -> Result<(), tracing_subscriber::util::TryInitError> {
        use tracing_subscriber::{EnvFilter, fmt, prelude::*};

        let directive = self.directive();
        let filter = if self.from_env {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive))
        } else {
            EnvFilter::new(&directive)
        };

        let layer = fmt::layer()
            .with_target(true)
            .with_thread_names(self.thread_names)
            .with_file(self.source_location)
            .with_line_number(self.source_location);

        let registry = tracing_subscriber::registry().with(filter);
        match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => registry.with(layer.json()).try_init(),
            LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
            _ => registry.with(layer.compact()).try_init(),
        }
    }
}

/// Create a new logging builder
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install the default subscriber, ignoring an already installed one
#[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
pub fn init() {
    let _ = builder().try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_is_crate_path() {
        // Events use TARGET explicitly; it must match what `registry_only` filters on
        assert_eq!(Some(TARGET), module_path!().split("::").next());
    }

    #[test]
    fn test_builder_defaults() {
        let builder = LoggingBuilder::default();
        assert_eq!(builder.level, Level::DEBUG);
        assert!(!builder.registry_only);
        assert_eq!(builder.directive(), "debug");
    }

    #[test]
    fn test_registry_only_directive() {
        let builder = builder().trace().pretty().registry_only().with_source_location();

        assert_eq!(builder.format, LogFormat::Pretty);
        assert!(builder.source_location);
        assert_eq!(builder.directive(), "service_registry=trace");
    }
}
