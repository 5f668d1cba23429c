//! Logging utilities and configuration for tablescope.
//!
//! Profiling runs issue many small queries; the configuration here keeps the
//! hot path quiet by default while allowing verbose per-pattern logging when
//! diagnosing a dataset. The profiler routes its pattern-pass and data
//! operation logging through the [`log_pattern!`](crate::log_pattern) and
//! [`log_data_op!`](crate::log_data_op) macros so disabled logging costs a
//! branch, not a format.

use tracing::Level;

/// Logging configuration for tablescope components.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base log level for tablescope components
    pub base_level: Level,
    /// Whether to log individual pattern-pass outcomes (including absorbed failures)
    pub log_pattern_details: bool,
    /// Whether to log data source registration and store operations
    pub log_data_operations: bool,
    /// Maximum length for logged field values (to prevent huge logs)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            base_level: Level::INFO,
            log_pattern_details: false,
            log_data_operations: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging a profiling run.
    pub fn verbose() -> Self {
        Self {
            base_level: Level::DEBUG,
            log_pattern_details: true,
            log_data_operations: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            base_level: Level::WARN,
            log_pattern_details: false,
            log_data_operations: false,
            max_field_length: 128,
        }
    }

    /// True when events at `level` clear the configured base level.
    /// In `tracing`, more verbose levels compare greater.
    pub fn is_enabled(&self, level: Level) -> bool {
        level <= self.base_level
    }

    /// Truncates a value to this configuration's field length cap.
    pub fn field(&self, value: &str) -> String {
        truncate_field(value, self.max_field_length)
    }
}

/// Macro for conditional pattern-pass logging.
///
/// Emits at DEBUG, and only when the configuration both asks for pattern
/// details and runs at a verbose enough base level.
#[macro_export]
macro_rules! log_pattern {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_pattern_details && $config.is_enabled(tracing::Level::DEBUG) {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for conditional data operation logging.
#[macro_export]
macro_rules! log_data_op {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_data_operations {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to the maximum field length if needed.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        value.to_string()
    } else {
        let truncated = &value[..max_length];
        format!("{truncated}...(truncated)")
    }
}

/// Utilities for setting up structured logging.
pub mod setup {
    use tracing::Level;

    /// Configuration for tablescope's logging setup.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for tablescope components specifically
        pub tablescope_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::INFO,
                tablescope_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                tablescope_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                tablescope_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},tablescope={}",
                    self.level.as_str().to_lowercase(),
                    self.tablescope_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Initializes logging with the given configuration.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use tablescope::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::default()).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer().json().boxed()
        } else {
            tracing_subscriber::fmt::layer().boxed()
        };

        let subscriber = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer);

        subscriber.init();

        Ok(())
    }
}
