//! Process-wide logging setup for applications embedding the client.
//!
//! The client itself only emits `tracing` events and never installs a
//! subscriber. Games that have no logging of their own can call
//! [`init_logging`] once at startup and [`shutdown_logging`] before exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

static INSTALLED: OnceLock<bool> = OnceLock::new();
static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();
static SHUT_DOWN: AtomicBool = AtomicBool::new(false);

/// Minimum severity that reaches the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Errors only.
    Error = 0,
    /// Warnings and errors.
    Warning = 1,
    /// Informational events and above.
    #[default]
    Info = 2,
    /// Everything, including per-attempt request logs.
    Debug = 3,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

/// Options for [`init_logging`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// Minimum level when `RUST_LOG` is not set (default: Info).
    pub min_level: LogLevel,
    /// Program name recorded in the startup event (default: "ascnd").
    pub program_name: String,
    /// Emit ANSI colours (default: true).
    pub colorize: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            program_name: "ascnd".to_string(),
            colorize: true,
        }
    }
}

/// Installs a global fmt subscriber.
///
/// Only the first call in the process has any effect; it returns true if a
/// subscriber was installed by this crate. Returns false when another
/// subscriber was already set globally. `RUST_LOG` overrides `min_level`.
pub fn init_logging(options: &LoggingOptions) -> bool {
    *INSTALLED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(options.min_level.as_directive()));
        let (filter, handle) = reload::Layer::new(filter);
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(options.colorize).with_target(true))
            .try_init()
            .is_ok();
        if installed {
            let _ = FILTER.set(handle);
            tracing::info!(program = %options.program_name, "logging initialized");
        }
        installed
    })
}

/// Stops the subscriber installed by [`init_logging`] from emitting events.
///
/// A global subscriber cannot be removed, so its filter is switched off
/// instead. Returns true for the call that performed the teardown; later
/// calls, and calls when nothing was installed, are no-ops that return false.
/// Logging cannot be re-initialized afterwards.
pub fn shutdown_logging() -> bool {
    if SHUT_DOWN.swap(true, Ordering::SeqCst) {
        return false;
    }
    // Keeps a later init_logging from installing anything.
    let _ = INSTALLED.get_or_init(|| false);
    match FILTER.get() {
        Some(handle) => {
            tracing::info!("logging shut down");
            handle.reload(EnvFilter::new("off")).is_ok()
        }
        None => false,
    }
}

/// Returns true once [`shutdown_logging`] has been called.
pub fn is_logging_shut_down() -> bool {
    SHUT_DOWN.load(Ordering::SeqCst)
}

/// Returns true once [`init_logging`] has run, whether or not it installed a subscriber.
pub fn is_logging_initialized() -> bool {
    INSTALLED.get().is_some()
}
