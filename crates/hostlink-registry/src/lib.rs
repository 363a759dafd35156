//! Hostlink Registry - lifecycle and dependency broker for capability providers.
//!
//! A capability provider is an optional shared piece of functionality that
//! ships inside one module but is used by many. Modules load and unload on
//! their own schedules, so a provider cannot count on its bundling module
//! being the one that runs its code. This crate provides:
//!
//! - [`ProviderRegistry`]: live registrations plus a pending table for
//!   identities that were required before anyone registered them
//! - [`Provider`]: the `load` / `init` / `disable` contract
//! - [`ExecutionHost`]: a module able to run provider code, selected at call
//!   time among the currently active ones
//! - [`BrokerError`]: the failure taxonomy
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//!
//! use hostlink_registry::prelude::*;
//!
//! struct Module {
//!     id: HostId,
//!     enabled: AtomicBool,
//! }
//!
//! impl ExecutionHost for Module {
//!     fn id(&self) -> &HostId {
//!         &self.id
//!     }
//!     fn is_active(&self) -> bool {
//!         self.enabled.load(Ordering::SeqCst)
//!     }
//!     fn attach_listener(&self, _owner: &ProviderId, _listener: Arc<dyn EventListener>) {}
//! }
//!
//! struct GreetingApi {
//!     id: ProviderId,
//! }
//!
//! impl Provider for GreetingApi {
//!     fn id(&self) -> &ProviderId {
//!         &self.id
//!     }
//!     fn init(&self, _registry: &ProviderRegistry, host: &HostHandle) -> BrokerResult<()> {
//!         println!("greeting api running on {}", host.id());
//!         Ok(())
//!     }
//! }
//!
//! # fn main() -> BrokerResult<()> {
//! let registry = ProviderRegistry::new();
//! let api_id = ProviderId::new("greeting-api")?;
//!
//! // A consumer loads first and declares its dependency.
//! let consumer = Arc::new(Module {
//!     id: HostId::new("consumer")?,
//!     enabled: AtomicBool::new(true),
//! });
//! registry.require(&api_id, Some(consumer))?;
//!
//! // The bundling module registers the provider later.
//! registry.register_api(Arc::new(GreetingApi { id: api_id.clone() }))?;
//! registry.init_api(&api_id)?;
//! assert_eq!(registry.get_api_host(&api_id)?.id().as_str(), "consumer");
//!
//! registry.disable_api(&api_id)?;
//! assert!(!registry.is_registered(&api_id));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod host;
mod id;
mod provider;
mod record;
mod registry;

pub use error::{BrokerError, BrokerResult, Phase};
pub use host::{EventListener, ExecutionHost, HostEvent, HostHandle};
pub use id::{HostId, ProviderId, RegistrationId};
pub use provider::{Provider, ProviderFactory, ProviderState, default_factory};
pub use record::ProviderSnapshot;
pub use registry::{ProviderRegistry, RegistryOptions};
