//! Client ↔ resource subscription index.
//!
//! Two mirrored maps are kept: URI → clients and client → URIs. A pair is in
//! one iff it is in the other, and empty sets are pruned as soon as they appear.

use std::collections::{BTreeSet, HashMap};

use crate::types::{CapstanError, CapstanResult};

#[derive(Debug, Default, Clone)]
pub struct SubscriptionManager {
    by_uri: HashMap<String, BTreeSet<String>>,
    by_client: HashMap<String, BTreeSet<String>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a client to a URI. Returns `false` if it was already subscribed.
    pub fn subscribe(&mut self, client: &str, uri: &str) -> CapstanResult<bool> {
        check_identifiers(client, uri)?;

        let added = self
            .by_uri
            .entry(uri.to_string())
            .or_default()
            .insert(client.to_string());
        self.by_client
            .entry(client.to_string())
            .or_default()
            .insert(uri.to_string());

        if added {
            tracing::debug!("Client {client} subscribed to {uri}");
        }
        Ok(added)
    }

    /// Remove one subscription. Returns `false` if it did not exist.
    pub fn unsubscribe(&mut self, client: &str, uri: &str) -> CapstanResult<bool> {
        check_identifiers(client, uri)?;

        let removed = remove_pair(&mut self.by_uri, uri, client);
        remove_pair(&mut self.by_client, client, uri);

        if removed {
            tracing::debug!("Client {client} unsubscribed from {uri}");
        }
        Ok(removed)
    }

    /// Drop every subscription held by a client. Returns how many were removed.
    pub fn clear_client(&mut self, client: &str) -> usize {
        let Some(uris) = self.by_client.remove(client) else {
            return 0;
        };
        for uri in &uris {
            remove_pair(&mut self.by_uri, uri, client);
        }
        tracing::debug!("Cleared {} subscriptions for client {client}", uris.len());
        uris.len()
    }

    /// Drop every subscriber of a URI. Returns the clients that were removed.
    pub fn clear_uri(&mut self, uri: &str) -> Vec<String> {
        let Some(clients) = self.by_uri.remove(uri) else {
            return Vec::new();
        };
        for client in &clients {
            remove_pair(&mut self.by_client, client, uri);
        }
        clients.into_iter().collect()
    }

    pub fn subscribers(&self, uri: &str) -> BTreeSet<String> {
        self.by_uri.get(uri).cloned().unwrap_or_default()
    }

    /// Every URI with at least one subscriber.
    pub fn uris(&self) -> BTreeSet<String> {
        self.by_uri.keys().cloned().collect()
    }

    pub fn client_subscriptions(&self, client: &str) -> BTreeSet<String> {
        self.by_client.get(client).cloned().unwrap_or_default()
    }

    pub fn is_subscribed(&self, client: &str, uri: &str) -> bool {
        self.by_uri
            .get(uri)
            .is_some_and(|clients| clients.contains(client))
    }

    /// Number of URIs with at least one subscriber.
    pub fn uri_count(&self) -> usize {
        self.by_uri.len()
    }

    /// Number of clients with at least one subscription.
    pub fn client_count(&self) -> usize {
        self.by_client.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uri.is_empty()
    }

    /// Whether both indices agree and hold no empty sets.
    pub fn is_consistent(&self) -> bool {
        let no_empty = self.by_uri.values().all(|s| !s.is_empty())
            && self.by_client.values().all(|s| !s.is_empty());
        let forward = self.by_uri.iter().all(|(uri, clients)| {
            clients
                .iter()
                .all(|c| self.by_client.get(c).is_some_and(|u| u.contains(uri)))
        });
        let backward = self.by_client.iter().all(|(client, uris)| {
            uris.iter()
                .all(|u| self.by_uri.get(u).is_some_and(|c| c.contains(client)))
        });
        no_empty && forward && backward
    }
}

fn check_identifiers(client: &str, uri: &str) -> CapstanResult<()> {
    if client.is_empty() {
        return Err(CapstanError::InvalidInput(
            "client id must not be empty".to_string(),
        ));
    }
    if uri.is_empty() {
        return Err(CapstanError::InvalidInput("uri must not be empty".to_string()));
    }
    Ok(())
}

fn remove_pair(index: &mut HashMap<String, BTreeSet<String>>, key: &str, member: &str) -> bool {
    let Some(set) = index.get_mut(key) else {
        return false;
    };
    let removed = set.remove(member);
    if set.is_empty() {
        index.remove(key);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unsubscribe_one_of_two() {
        let mut subs = SubscriptionManager::new();
        subs.subscribe("c1", "r1").unwrap();
        subs.subscribe("c2", "r1").unwrap();
        subs.unsubscribe("c1", "r1").unwrap();
        assert_eq!(subs.subscribers("r1"), set(&["c2"]));
        assert!(subs.client_subscriptions("c1").is_empty());
        assert!(subs.is_consistent());
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let mut subs = SubscriptionManager::new();
        assert!(subs.subscribe("c1", "r1").unwrap());
        assert!(!subs.subscribe("c1", "r1").unwrap());
        assert_eq!(subs.subscribers("r1").len(), 1);
    }

    #[test]
    fn test_missing_keys_are_total() {
        let mut subs = SubscriptionManager::new();
        assert!(!subs.unsubscribe("nobody", "nothing").unwrap());
        assert_eq!(subs.clear_client("nobody"), 0);
        assert!(subs.clear_uri("nothing").is_empty());
        assert!(subs.subscribers("nothing").is_empty());
        assert!(!subs.is_subscribed("nobody", "nothing"));
    }

    #[test]
    fn test_empty_identifiers_rejected() {
        let mut subs = SubscriptionManager::new();
        assert!(subs.subscribe("", "r1").is_err());
        assert!(subs.subscribe("c1", "").is_err());
        assert!(subs.unsubscribe("", "r1").is_err());
        assert!(subs.is_empty());
    }

    #[test]
    fn test_clear_client_removes_from_every_uri() {
        let mut subs = SubscriptionManager::new();
        subs.subscribe("c1", "r1").unwrap();
        subs.subscribe("c1", "r2").unwrap();
        subs.subscribe("c2", "r2").unwrap();
        assert_eq!(subs.clear_client("c1"), 2);
        assert!(subs.subscribers("r1").is_empty());
        assert_eq!(subs.subscribers("r2"), set(&["c2"]));
        assert_eq!(subs.uri_count(), 1);
        assert_eq!(subs.uris(), set(&["r2"]));
        assert!(subs.is_consistent());
    }

    #[test]
    fn test_clear_uri_prunes_clients() {
        let mut subs = SubscriptionManager::new();
        subs.subscribe("c1", "r1").unwrap();
        subs.subscribe("c2", "r1").unwrap();
        subs.subscribe("c2", "r2").unwrap();
        let removed = subs.clear_uri("r1");
        assert_eq!(removed, vec!["c1".to_string(), "c2".to_string()]);
        assert_eq!(subs.client_count(), 1);
        assert_eq!(subs.client_subscriptions("c2"), set(&["r2"]));
        assert!(subs.is_consistent());
    }

    #[test]
    fn test_random_operation_sequences_stay_consistent() {
        // Deterministic LCG so the sequence is reproducible.
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut next = move |bound: u64| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            (state >> 33) % bound
        };

        let clients = ["c0", "c1", "c2", "c3"];
        let uris = ["u0", "u1", "u2", "u3", "u4"];
        let mut subs = SubscriptionManager::new();

        for _ in 0..2_000 {
            let client = clients[next(clients.len() as u64) as usize];
            let uri = uris[next(uris.len() as u64) as usize];
            match next(10) {
                0..=4 => {
                    subs.subscribe(client, uri).unwrap();
                }
                5..=7 => {
                    subs.unsubscribe(client, uri).unwrap();
                }
                8 => {
                    subs.clear_client(client);
                }
                _ => {
                    subs.clear_uri(uri);
                }
            }
            assert!(subs.is_consistent());
            assert_eq!(
                subs.is_subscribed(client, uri),
                subs.client_subscriptions(client).contains(uri)
            );
        }
    }
}
