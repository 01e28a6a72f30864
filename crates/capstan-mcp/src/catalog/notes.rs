//! In-memory notes: a tool to write them, resources to read them.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::Mutex;

use capstan::{CapabilityKind, CompletionCandidate, Descriptor, ParamDescriptor, ParamType};

use crate::registry::{
    completer_fn, handler_fn, CapabilityGenerator, CompleterRegistration, HandlerInput, Outcome,
    Registration,
};

pub const NOTES_URI: &str = "capstan://notes";
pub const NOTE_TEMPLATE: &str = "capstan://notes/{name}";

pub fn note_uri(name: &str) -> String {
    format!("{NOTES_URI}/{name}")
}

/// Shared note storage.
#[derive(Debug, Clone, Default)]
pub struct NotesStore {
    notes: Arc<Mutex<BTreeMap<String, String>>>,
    seeds: Vec<String>,
}

impl NotesStore {
    pub fn seeded<I, K, V>(seeds: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let notes: BTreeMap<String, String> = seeds
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            seeds: notes.keys().cloned().collect(),
            notes: Arc::new(Mutex::new(notes)),
        }
    }

    pub async fn get(&self, name: &str) -> Option<String> {
        self.notes.lock().await.get(name).cloned()
    }

    /// Store a note; returns whether it replaced an existing one.
    pub async fn put(&self, name: &str, text: &str) -> bool {
        self.notes
            .lock()
            .await
            .insert(name.to_string(), text.to_string())
            .is_some()
    }

    pub async fn names(&self) -> Vec<String> {
        self.notes.lock().await.keys().cloned().collect()
    }
}

pub fn note_write_tool(store: &NotesStore) -> Registration {
    let store = store.clone();
    Registration::new(
        Descriptor::tool("note_write")
            .describe("Create or replace a note")
            .param(ParamDescriptor::new("name", ParamType::String).required())
            .param(ParamDescriptor::new("text", ParamType::String).required()),
        handler_fn(move |input: HandlerInput| {
            let store = store.clone();
            async move {
                let name = input.str("name").unwrap_or_default().trim().to_string();
                let text = input.str("text").unwrap_or_default().to_string();
                if name.is_empty() || name.contains('/') {
                    return Ok(Outcome::failure("note name must be a single non-empty segment").into());
                }

                let replaced = store.put(&name, &text).await;
                input.context.resource_changed(&note_uri(&name)).await;
                input.context.resource_changed(NOTES_URI).await;

                let verb = if replaced { "Updated" } else { "Created" };
                Ok(Value::String(format!("{verb} note '{name}'")))
            }
        }),
    )
}

pub fn notes_index(store: &NotesStore) -> Registration {
    let store = store.clone();
    Registration::new(
        Descriptor::resource(NOTES_URI)
            .named("notes")
            .describe("Names of all stored notes")
            .mime("application/json")
            .subscribable(),
        handler_fn(move |_| {
            let store = store.clone();
            async move {
                let names = store.names().await;
                Ok(json!({ "count": names.len(), "notes": names }))
            }
        }),
    )
}

pub fn note_template(store: &NotesStore) -> Registration {
    let store = store.clone();
    Registration::new(
        Descriptor::resource_template(NOTE_TEMPLATE)
            .named("note")
            .describe("A single note by name")
            .mime("text/plain")
            .param(ParamDescriptor::new("name", ParamType::String).required())
            .subscribable(),
        handler_fn(move |input: HandlerInput| {
            let store = store.clone();
            async move { read_note(&store, input.str("name").unwrap_or_default()).await }
        }),
    )
}

async fn read_note(store: &NotesStore, name: &str) -> anyhow::Result<Value> {
    match store.get(name).await {
        Some(text) => Ok(Value::String(text)),
        None => Ok(Outcome::failure(format!("no note named '{name}'")).into()),
    }
}

pub fn note_name_completer(store: &NotesStore) -> CompleterRegistration {
    let store = store.clone();
    CompleterRegistration {
        kind: CapabilityKind::ResourceTemplate,
        key: NOTE_TEMPLATE.to_string(),
        argument: "name".to_string(),
        completer: completer_fn(move |_| {
            let store = store.clone();
            async move {
                Ok(store
                    .names()
                    .await
                    .into_iter()
                    .map(CompletionCandidate::new)
                    .collect())
            }
        }),
    }
}

/// Registers a concrete resource for every seeded note, on first listing.
pub struct SeededNotes {
    store: NotesStore,
}

impl SeededNotes {
    pub fn new(store: &NotesStore) -> Self {
        Self {
            store: store.clone(),
        }
    }
}

impl CapabilityGenerator for SeededNotes {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Resource
    }

    fn generate(&self) -> anyhow::Result<Vec<Registration>> {
        Ok(self
            .store
            .seeds
            .iter()
            .map(|name| {
                let store = self.store.clone();
                let note = name.clone();
                Registration::new(
                    Descriptor::resource(note_uri(name))
                        .named(name.clone())
                        .mime("text/plain")
                        .subscribable(),
                    handler_fn(move |_| {
                        let store = store.clone();
                        let note = note.clone();
                        async move { read_note(&store, &note).await }
                    }),
                )
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_put_and_get() {
        let store = NotesStore::seeded([("welcome", "hello")]);
        assert_eq!(store.get("welcome").await.as_deref(), Some("hello"));
        assert!(!store.put("todo", "ship it").await);
        assert!(store.put("todo", "ship it now").await);
        assert_eq!(store.names().await, vec!["todo", "welcome"]);
    }

    #[test]
    fn test_generator_covers_seeds_only() {
        let store = NotesStore::seeded([("a", "1"), ("b", "2")]);
        let generated = SeededNotes::new(&store).generate().unwrap();
        let keys: Vec<_> = generated.iter().map(|r| r.descriptor.key.clone()).collect();
        assert_eq!(keys, vec!["capstan://notes/a", "capstan://notes/b"]);
        assert!(generated.iter().all(|r| r.descriptor.subscribable));
    }
}
