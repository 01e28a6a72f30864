//! Capability registry, handler table, and metadata providers.

pub mod handler;
pub mod provider;
pub mod store;

pub use handler::{
    completer_fn, handler_fn, CapabilityHandler, Completer, HandlerContext, HandlerInput, Outcome,
};
pub use provider::{
    CapabilityGenerator, CompleterRegistration, EmptyProvider, MetadataProvider, Registration,
};
pub use store::{CapabilityRegistry, Resolved};
