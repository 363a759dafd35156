//! Commonly used types for hostlink telemetry.
//!
//! ```rust
//! use hostlink_telemetry::prelude::*;
//! ```

pub use crate::{
    LogConfig, LogFormat, LogTarget, TelemetryError, TelemetryResult, setup_default_logging,
    setup_logging,
};
