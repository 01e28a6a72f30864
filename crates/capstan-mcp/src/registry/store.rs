//! Capability registry: descriptors plus the handler table.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use capstan::{CapabilityKind, Descriptor, TemplateParams, UriTemplate};

use crate::protocol::validator::validate_uri;
use crate::types::{McpError, McpResult};

use super::handler::{CapabilityHandler, Completer};
use super::provider::{CapabilityGenerator, CompleterRegistration, MetadataProvider, Registration};

struct Entry {
    registration: Registration,
    template: Option<UriTemplate>,
}

impl Entry {
    fn key(&self) -> &str {
        &self.registration.descriptor.key
    }
}

#[derive(Default)]
struct KindTable {
    fixed: Vec<Entry>,
    dynamic: Vec<Entry>,
}

impl KindTable {
    fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.fixed.iter().chain(self.dynamic.iter())
    }

    fn contains(&self, key: &str) -> bool {
        self.entries().any(|e| e.key() == key)
    }
}

/// A capability picked for one request.
#[derive(Clone)]
pub struct Resolved {
    pub descriptor: Descriptor,
    pub handler: Arc<dyn CapabilityHandler>,
    /// Present when the match came from a template.
    pub template_params: Option<TemplateParams>,
}

type CompleterKey = (CapabilityKind, String, String);

/// Owns every registered capability, static and dynamic.
///
/// Listings are static entries first, then dynamic ones, each in insertion
/// order. Generators for a kind run once, on that kind's first access.
#[derive(Default)]
pub struct CapabilityRegistry {
    tables: HashMap<CapabilityKind, KindTable>,
    generators: Vec<Arc<dyn CapabilityGenerator>>,
    initialized: HashSet<CapabilityKind>,
    completers: HashMap<CompleterKey, Arc<dyn Completer>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a provider's static declarations.
    pub fn from_provider(provider: &dyn MetadataProvider) -> McpResult<Self> {
        let mut registry = Self::new();

        let statics = [
            provider.static_tools(),
            provider.static_resources(),
            provider.static_resource_templates(),
            provider.static_prompts(),
            provider.static_prompt_templates(),
        ];
        for registration in statics.into_iter().flatten() {
            registry.register_static(registration)?;
        }

        registry.generators = provider.generators();
        for completer in provider.completers() {
            registry.register_completer(completer);
        }

        tracing::debug!(
            "Registry built: {} tools, {} resources, {} resource templates, {} prompts, {} prompt templates",
            registry.count(CapabilityKind::Tool),
            registry.count(CapabilityKind::Resource),
            registry.count(CapabilityKind::ResourceTemplate),
            registry.count(CapabilityKind::Prompt),
            registry.count(CapabilityKind::PromptTemplate),
        );

        Ok(registry)
    }

    /// Add a static capability. Static entries cannot be unregistered.
    pub fn register_static(&mut self, registration: Registration) -> McpResult<()> {
        let entry = self.prepare(registration)?;
        let kind = entry.registration.kind();
        self.tables.entry(kind).or_default().fixed.push(entry);
        Ok(())
    }

    /// Add a dynamic capability.
    pub fn register(&mut self, registration: Registration) -> McpResult<()> {
        let entry = self.prepare(registration)?;
        let kind = entry.registration.kind();
        tracing::debug!("Registered {kind} {}", entry.key());
        self.tables.entry(kind).or_default().dynamic.push(entry);
        Ok(())
    }

    fn prepare(&self, registration: Registration) -> McpResult<Entry> {
        let kind = registration.kind();
        let key = registration.descriptor.key.clone();

        if key.trim().is_empty() {
            return Err(McpError::InvalidParams(format!("{kind} key must not be empty")));
        }
        if self.tables.get(&kind).is_some_and(|t| t.contains(&key)) {
            return Err(McpError::AlreadyRegistered { kind, key });
        }

        let template = if kind.is_template() {
            Some(UriTemplate::parse(&key)?)
        } else {
            None
        };

        match (kind, &template) {
            (CapabilityKind::Resource, _) => validate_uri(&key)?,
            (CapabilityKind::ResourceTemplate, Some(template)) => {
                let sample: TemplateParams = template
                    .variables()
                    .iter()
                    .map(|name| (name.clone(), "x".to_string()))
                    .collect();
                validate_uri(&template.expand(&sample)?)?;
            }
            _ => {}
        }

        Ok(Entry {
            registration,
            template,
        })
    }

    /// Remove a dynamic capability and return its descriptor.
    pub fn unregister(&mut self, kind: CapabilityKind, key: &str) -> McpResult<Descriptor> {
        let table = self
            .tables
            .get_mut(&kind)
            .ok_or_else(|| McpError::not_found(kind, key))?;

        if let Some(index) = table.dynamic.iter().position(|e| e.key() == key) {
            let entry = table.dynamic.remove(index);
            tracing::debug!("Unregistered {kind} {key}");
            return Ok(entry.registration.descriptor);
        }
        if table.fixed.iter().any(|e| e.key() == key) {
            return Err(McpError::InvalidRequest(format!(
                "{kind} '{key}' is static and cannot be unregistered"
            )));
        }
        Err(McpError::not_found(kind, key))
    }

    /// Run the generators for `kind` if they have not run yet.
    ///
    /// A failing generator is logged and skipped; the latch is set either way.
    pub fn ensure_initialized(&mut self, kind: CapabilityKind) {
        if !self.initialized.insert(kind) {
            return;
        }

        let generators: Vec<_> = self
            .generators
            .iter()
            .filter(|g| g.kind() == kind)
            .cloned()
            .collect();

        for generator in generators {
            let registrations = match generator.generate() {
                Ok(registrations) => registrations,
                Err(e) => {
                    tracing::warn!("Generator for {kind} failed: {e:#}");
                    continue;
                }
            };
            for registration in registrations {
                let key = registration.descriptor.key.clone();
                if let Err(e) = self.register(registration) {
                    tracing::warn!("Skipping generated {kind} {key}: {e}");
                }
            }
        }
    }

    pub fn is_initialized(&self, kind: CapabilityKind) -> bool {
        self.initialized.contains(&kind)
    }

    /// Exact key lookup: static entries, then dynamic ones.
    pub fn resolve(&self, kind: CapabilityKind, key: &str) -> Option<Resolved> {
        let table = self.tables.get(&kind)?;
        table
            .entries()
            .find(|e| e.key() == key)
            .map(|e| resolved(e, None))
    }

    /// First template of `kind` matching `candidate`, in registration order.
    pub fn resolve_template(&self, kind: CapabilityKind, candidate: &str) -> Option<Resolved> {
        let table = self.tables.get(&kind)?;
        table.entries().find_map(|e| {
            e.template
                .as_ref()
                .and_then(|t| t.matches(candidate))
                .map(|params| resolved(e, Some(params)))
        })
    }

    /// Resolve a resource URI: exact resources, then resource templates.
    pub fn resolve_resource(&self, uri: &str) -> Option<Resolved> {
        self.resolve(CapabilityKind::Resource, uri)
            .or_else(|| self.resolve_template(CapabilityKind::ResourceTemplate, uri))
    }

    /// Resolve a prompt name: exact prompts, then prompt templates.
    pub fn resolve_prompt(&self, name: &str) -> Option<Resolved> {
        self.resolve(CapabilityKind::Prompt, name)
            .or_else(|| self.resolve_template(CapabilityKind::PromptTemplate, name))
    }

    pub fn descriptor(&self, kind: CapabilityKind, key: &str) -> Option<Descriptor> {
        self.resolve(kind, key).map(|r| r.descriptor)
    }

    /// Descriptors of `kind` in listing order.
    pub fn list(&self, kind: CapabilityKind) -> Vec<Descriptor> {
        self.tables
            .get(&kind)
            .map(|t| {
                t.entries()
                    .map(|e| e.registration.descriptor.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn count(&self, kind: CapabilityKind) -> usize {
        self.tables
            .get(&kind)
            .map_or(0, |t| t.fixed.len() + t.dynamic.len())
    }

    pub fn has_subscribable_resource(&self) -> bool {
        [CapabilityKind::Resource, CapabilityKind::ResourceTemplate]
            .iter()
            .filter_map(|kind| self.tables.get(kind))
            .any(|t| t.entries().any(|e| e.registration.descriptor.subscribable))
    }

    pub fn register_completer(&mut self, registration: CompleterRegistration) {
        self.completers.insert(
            (registration.kind, registration.key, registration.argument),
            registration.completer,
        );
    }

    pub fn completer(
        &self,
        kind: CapabilityKind,
        key: &str,
        argument: &str,
    ) -> Option<Arc<dyn Completer>> {
        self.completers
            .get(&(kind, key.to_string(), argument.to_string()))
            .cloned()
    }
}

fn resolved(entry: &Entry, template_params: Option<TemplateParams>) -> Resolved {
    Resolved {
        descriptor: entry.registration.descriptor.clone(),
        handler: entry.registration.handler.clone(),
        template_params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::handler::handler_fn;
    use serde_json::Value;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop(descriptor: Descriptor) -> Registration {
        Registration::new(descriptor, handler_fn(|_| async { Ok(Value::Null) }))
    }

    struct Seeded;

    impl MetadataProvider for Seeded {
        fn static_tools(&self) -> Vec<Registration> {
            vec![noop(Descriptor::tool("alpha")), noop(Descriptor::tool("beta"))]
        }

        fn static_resources(&self) -> Vec<Registration> {
            vec![noop(Descriptor::resource("file:///logs/latest"))]
        }

        fn static_resource_templates(&self) -> Vec<Registration> {
            vec![
                noop(Descriptor::resource_template("file:///logs/{date}")),
                noop(Descriptor::resource_template("file:///{area}/{date}")),
            ]
        }
    }

    struct CountingGenerator {
        runs: Arc<AtomicUsize>,
    }

    impl CapabilityGenerator for CountingGenerator {
        fn kind(&self) -> CapabilityKind {
            CapabilityKind::Tool
        }

        fn generate(&self) -> anyhow::Result<Vec<Registration>> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(vec![noop(Descriptor::tool("generated"))])
        }
    }

    struct GeneratorProvider(Arc<AtomicUsize>);

    impl MetadataProvider for GeneratorProvider {
        fn generators(&self) -> Vec<Arc<dyn CapabilityGenerator>> {
            vec![Arc::new(CountingGenerator {
                runs: self.0.clone(),
            })]
        }
    }

    #[test]
    fn test_listing_is_static_then_dynamic() {
        let mut registry = CapabilityRegistry::from_provider(&Seeded).unwrap();
        registry.register(noop(Descriptor::tool("gamma"))).unwrap();
        let names: Vec<_> = registry
            .list(CapabilityKind::Tool)
            .into_iter()
            .map(|d| d.key)
            .collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = CapabilityRegistry::from_provider(&Seeded).unwrap();
        let err = registry.register(noop(Descriptor::tool("alpha"))).unwrap_err();
        assert!(matches!(err, McpError::AlreadyRegistered { .. }));
    }

    #[test]
    fn test_unreadable_resource_keys_rejected() {
        let mut registry = CapabilityRegistry::new();

        let err = registry
            .register(noop(Descriptor::resource("notes")))
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidRequest(_)));

        let err = registry
            .register(noop(Descriptor::resource_template("notes/{name}")))
            .unwrap_err();
        assert!(matches!(err, McpError::InvalidRequest(_)));

        assert_eq!(registry.count(CapabilityKind::Resource), 0);
        assert_eq!(registry.count(CapabilityKind::ResourceTemplate), 0);

        registry
            .register(noop(Descriptor::resource("mem://notes")))
            .unwrap();
        registry
            .register(noop(Descriptor::resource_template("mem://notes/{name}")))
            .unwrap();
        assert!(registry.resolve_resource("mem://notes/today").is_some());
    }

    #[test]
    fn test_invalid_template_rejected() {
        let mut registry = CapabilityRegistry::new();
        let err = registry
            .register(noop(Descriptor::resource_template("file:///{oops")))
            .unwrap_err();
        assert_eq!(err.code(), crate::types::error_codes::INTERNAL_ERROR);
    }

    #[test]
    fn test_exact_match_beats_template() {
        let registry = CapabilityRegistry::from_provider(&Seeded).unwrap();
        let hit = registry.resolve_resource("file:///logs/latest").unwrap();
        assert_eq!(hit.descriptor.kind, CapabilityKind::Resource);
        assert!(hit.template_params.is_none());
    }

    #[test]
    fn test_first_registered_template_wins() {
        let registry = CapabilityRegistry::from_provider(&Seeded).unwrap();
        let hit = registry.resolve_resource("file:///logs/2025-01-01").unwrap();
        assert_eq!(hit.descriptor.key, "file:///logs/{date}");
        let params = hit.template_params.unwrap();
        assert_eq!(params.get("date").map(String::as_str), Some("2025-01-01"));

        let other = registry.resolve_resource("file:///metrics/2025").unwrap();
        assert_eq!(other.descriptor.key, "file:///{area}/{date}");
    }

    #[test]
    fn test_unregister_dynamic_only() {
        let mut registry = CapabilityRegistry::from_provider(&Seeded).unwrap();
        registry.register(noop(Descriptor::tool("temp"))).unwrap();
        assert_eq!(registry.unregister(CapabilityKind::Tool, "temp").unwrap().key, "temp");
        assert!(registry.resolve(CapabilityKind::Tool, "temp").is_none());

        let err = registry.unregister(CapabilityKind::Tool, "alpha").unwrap_err();
        assert!(matches!(err, McpError::InvalidRequest(_)));
        let err = registry.unregister(CapabilityKind::Tool, "ghost").unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound(_)));
    }

    #[test]
    fn test_generators_run_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut registry =
            CapabilityRegistry::from_provider(&GeneratorProvider(runs.clone())).unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(registry.resolve(CapabilityKind::Tool, "generated").is_none());

        registry.ensure_initialized(CapabilityKind::Tool);
        registry.ensure_initialized(CapabilityKind::Tool);
        registry.ensure_initialized(CapabilityKind::Resource);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(registry.is_initialized(CapabilityKind::Tool));
        assert!(registry.resolve(CapabilityKind::Tool, "generated").is_some());
    }

    #[test]
    fn test_subscribable_detection() {
        let mut registry = CapabilityRegistry::from_provider(&Seeded).unwrap();
        assert!(!registry.has_subscribable_resource());
        registry
            .register(noop(Descriptor::resource("mem://live").subscribable()))
            .unwrap();
        assert!(registry.has_subscribable_resource());
    }

    #[tokio::test]
    async fn test_completer_lookup() {
        use crate::registry::handler::completer_fn;
        use capstan::CompletionCandidate;

        let mut registry = CapabilityRegistry::new();
        registry.register_completer(CompleterRegistration {
            kind: CapabilityKind::Prompt,
            key: "summarize".to_string(),
            argument: "style".to_string(),
            completer: completer_fn(|_| async { Ok(vec![CompletionCandidate::new("terse")]) }),
        });
        let completer = registry
            .completer(CapabilityKind::Prompt, "summarize", "style")
            .unwrap();
        let got = completer.complete("t").await.unwrap();
        assert_eq!(got[0].value, "terse");
        assert!(registry
            .completer(CapabilityKind::Prompt, "summarize", "length")
            .is_none());
    }
}
