//! Hostlink Test - Shared test utilities for hostlink.
//!
//! Mock hosts, providers and listeners that record every call made to them,
//! plus small fixtures. Use it as a dev-dependency:
//!
//! ```toml
//! [dev-dependencies]
//! hostlink-test.workspace = true
//! ```
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use hostlink_registry::{HostId, ProviderRegistry};
//! use hostlink_test::{MockHost, MockProvider};
//!
//! let registry = ProviderRegistry::new();
//! let api = Arc::new(MockProvider::new("my-api"));
//! let host = Arc::new(MockHost::new("bundler"));
//!
//! registry.register_api_with_host(api.clone(), host).unwrap();
//! registry.init_api(api.provider_id()).unwrap();
//!
//! assert_eq!(api.init_hosts(), vec![HostId::from_static("bundler")]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod harness;
pub mod mocks;

pub use fixtures::*;
pub use harness::*;
pub use mocks::*;
