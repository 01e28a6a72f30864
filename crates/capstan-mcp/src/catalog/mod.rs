//! Built-in capability catalog served by the `capstan-mcp` binary.

pub mod notes;
pub mod prompts;
pub mod server_info;

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::registry::{CapabilityGenerator, CompleterRegistration, MetadataProvider, Registration};

pub use notes::NotesStore;

/// Demonstration provider: a few tools, a notes store, and two prompts.
pub struct BuiltinCatalog {
    notes: NotesStore,
    name: String,
    version: String,
    started_at: DateTime<Utc>,
}

impl BuiltinCatalog {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            notes: NotesStore::seeded([
                ("welcome", "Capstan serves tools, resources and prompts over MCP."),
                ("roadmap", "Next: more transports."),
            ]),
            name: name.into(),
            version: version.into(),
            started_at: Utc::now(),
        }
    }

    pub fn notes(&self) -> &NotesStore {
        &self.notes
    }
}

impl MetadataProvider for BuiltinCatalog {
    fn static_tools(&self) -> Vec<Registration> {
        vec![
            server_info::echo_tool(),
            server_info::add_tool(),
            notes::note_write_tool(&self.notes),
        ]
    }

    fn static_resources(&self) -> Vec<Registration> {
        vec![
            server_info::server_info(self.name.clone(), self.version.clone(), self.started_at),
            notes::notes_index(&self.notes),
        ]
    }

    fn static_resource_templates(&self) -> Vec<Registration> {
        vec![notes::note_template(&self.notes)]
    }

    fn static_prompts(&self) -> Vec<Registration> {
        vec![prompts::summarize_prompt()]
    }

    fn static_prompt_templates(&self) -> Vec<Registration> {
        vec![prompts::review_prompt()]
    }

    fn generators(&self) -> Vec<Arc<dyn CapabilityGenerator>> {
        vec![Arc::new(notes::SeededNotes::new(&self.notes))]
    }

    fn completers(&self) -> Vec<CompleterRegistration> {
        vec![
            notes::note_name_completer(&self.notes),
            prompts::language_completer(),
        ]
    }
}
