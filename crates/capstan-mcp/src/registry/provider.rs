//! Metadata providers: where static capabilities come from.

use std::sync::Arc;

use capstan::{CapabilityKind, Descriptor};

use super::handler::{CapabilityHandler, Completer};

/// A descriptor paired with its handler.
#[derive(Clone)]
pub struct Registration {
    pub descriptor: Descriptor,
    pub handler: Arc<dyn CapabilityHandler>,
}

impl Registration {
    pub fn new(descriptor: Descriptor, handler: Arc<dyn CapabilityHandler>) -> Self {
        Self {
            descriptor,
            handler,
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        self.descriptor.kind
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Produces dynamic registrations on first access to its kind.
///
/// Runs at most once per registry, regardless of outcome.
pub trait CapabilityGenerator: Send + Sync {
    fn kind(&self) -> CapabilityKind;

    fn generate(&self) -> anyhow::Result<Vec<Registration>>;
}

/// Completer bound to one argument of one capability.
#[derive(Clone)]
pub struct CompleterRegistration {
    pub kind: CapabilityKind,
    pub key: String,
    pub argument: String,
    pub completer: Arc<dyn Completer>,
}

/// Supplies the static capability set a server starts with.
///
/// Every method defaults to empty so providers implement only what they expose.
pub trait MetadataProvider {
    fn static_tools(&self) -> Vec<Registration> {
        Vec::new()
    }

    fn static_resources(&self) -> Vec<Registration> {
        Vec::new()
    }

    fn static_resource_templates(&self) -> Vec<Registration> {
        Vec::new()
    }

    fn static_prompts(&self) -> Vec<Registration> {
        Vec::new()
    }

    fn static_prompt_templates(&self) -> Vec<Registration> {
        Vec::new()
    }

    fn generators(&self) -> Vec<Arc<dyn CapabilityGenerator>> {
        Vec::new()
    }

    fn completers(&self) -> Vec<CompleterRegistration> {
        Vec::new()
    }
}

/// Provider with nothing in it, for servers populated purely at runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyProvider;

impl MetadataProvider for EmptyProvider {}
