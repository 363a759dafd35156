//! Hostlink Telemetry - logging setup for hostlink processes.
//!
//! Installs a global `tracing` subscriber from a [`LogConfig`]: level and
//! per-crate directives, one of four output formats, and stdout, stderr or a
//! rotating file as the target.
//!
//! # Example
//!
//! ```rust,no_run
//! use hostlink_telemetry::{LogConfig, LogFormat, setup_logging};
//!
//! # fn main() -> Result<(), hostlink_telemetry::TelemetryError> {
//! let config = LogConfig::new("info")
//!     .with_format(LogFormat::Compact)
//!     .with_directive("hostlink_registry=debug");
//!
//! setup_logging(&config)?;
//! tracing::info!("logging ready");
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod prelude;

mod error;
mod logging;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{
    FileLogConfig, FileRotation, LogConfig, LogFormat, LogTarget, setup_default_logging,
    setup_logging,
};
