use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitState {
    Pending,
    Committed,
    RolledBack,
}

/// Envelope around one in-flight (or settled) metadata write.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimisticEdit<V> {
    pub previous_value: Option<V>,
    pub pending_value: V,
    pub commit_state: CommitState,
    ticket: u64,
}

struct CacheInner<K, V> {
    values: HashMap<K, V>,
    edits: HashMap<K, OptimisticEdit<V>>,
    next_ticket: u64,
}

/// Local metadata values that may run ahead of the server.
///
/// Assumes at most one in-flight mutation per key. Two overlapping
/// mutations of the same key are not coalesced: whichever fails last
/// restores the value it saw, which may clobber the other's optimistic value.
pub struct OptimisticCache<K, V> {
    inner: Arc<Mutex<CacheInner<K, V>>>,
}

impl<K, V> Clone for OptimisticCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> Default for OptimisticCache<K, V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                values: HashMap::new(),
                edits: HashMap::new(),
                next_ticket: 0,
            })),
        }
    }
}

impl<K, V> OptimisticCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().values.get(key).cloned()
    }

    pub fn edit(&self, key: &K) -> Option<OptimisticEdit<V>> {
        self.lock().edits.get(key).cloned()
    }

    pub fn is_pending(&self, key: &K) -> bool {
        self.lock()
            .edits
            .get(key)
            .is_some_and(|edit| edit.commit_state == CommitState::Pending)
    }

    pub fn keys(&self) -> Vec<K> {
        self.lock().values.keys().cloned().collect()
    }

    /// Converges a key with the server's value and evicts its settled edit.
    ///
    /// Keys with a pending write are left alone; returns whether the key was
    /// reconciled.
    pub fn reconcile(&self, key: K, server_value: Option<V>) -> bool {
        let mut inner = self.lock();
        if inner
            .edits
            .get(&key)
            .is_some_and(|edit| edit.commit_state == CommitState::Pending)
        {
            return false;
        }
        inner.edits.remove(&key);
        match server_value {
            Some(value) => inner.values.insert(key, value),
            None => inner.values.remove(&key),
        };
        true
    }

    /// Drops a key and any edit for it, pending or not.
    pub fn evict(&self, key: &K) {
        let mut inner = self.lock();
        inner.values.remove(key);
        inner.edits.remove(key);
    }

    /// Applies `new_value` locally, then runs the remote `write`.
    ///
    /// On success the optimistic value stays in place until the next
    /// reconcile. On failure the exact previous value (or its absence) is
    /// restored and the write's error is returned unchanged.
    pub async fn mutate<F, Fut, E>(&self, key: K, new_value: V, write: F) -> Result<(), E>
    where
        F: FnOnce(V) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let (previous_value, ticket) = {
            let mut inner = self.lock();
            let previous_value = inner.values.insert(key.clone(), new_value.clone());
            inner.next_ticket += 1;
            let ticket = inner.next_ticket;
            inner.edits.insert(
                key.clone(),
                OptimisticEdit {
                    previous_value: previous_value.clone(),
                    pending_value: new_value.clone(),
                    commit_state: CommitState::Pending,
                    ticket,
                },
            );
            (previous_value, ticket)
        };

        let outcome = write(new_value).await;

        let mut inner = self.lock();
        let commit_state = match &outcome {
            Ok(()) => CommitState::Committed,
            Err(_) => {
                match previous_value {
                    Some(value) => inner.values.insert(key.clone(), value),
                    None => inner.values.remove(&key),
                };
                CommitState::RolledBack
            }
        };
        if let Some(edit) = inner.edits.get_mut(&key) {
            if edit.ticket == ticket {
                edit.commit_state = commit_state;
            }
        }
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<K, V>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Field {
        Visibility(&'static str),
    }

    fn key() -> (String, &'static str) {
        ("chat-1".to_string(), "visibility")
    }

    #[tokio::test]
    async fn test_rollback_restores_exact_previous_value() {
        let cache = OptimisticCache::new();
        cache.reconcile(key(), Some(Field::Visibility("private")));

        let result: Result<(), String> = cache
            .mutate(key(), Field::Visibility("public"), |_| async {
                Err("offline".to_string())
            })
            .await;

        assert_eq!(result, Err("offline".to_string()));
        assert_eq!(cache.get(&key()), Some(Field::Visibility("private")));
        let edit = cache.edit(&key()).expect("edit retained until reconcile");
        assert_eq!(edit.commit_state, CommitState::RolledBack);
        assert_eq!(edit.previous_value, Some(Field::Visibility("private")));
    }

    #[tokio::test]
    async fn test_rollback_of_unseeded_key_clears_value() {
        let cache: OptimisticCache<(String, &'static str), Field> = OptimisticCache::new();
        let _ = cache
            .mutate(key(), Field::Visibility("public"), |_| async { Err(()) })
            .await;
        assert_eq!(cache.get(&key()), None);
    }

    #[tokio::test]
    async fn test_success_keeps_optimistic_value_until_reconcile() {
        let cache = OptimisticCache::new();
        cache.reconcile(key(), Some(Field::Visibility("private")));

        let seen = cache.clone();
        let result: Result<(), ()> = cache
            .mutate(key(), Field::Visibility("public"), move |value| async move {
                assert_eq!(value, Field::Visibility("public"));
                assert!(seen.is_pending(&key()));
                assert_eq!(seen.get(&key()), Some(Field::Visibility("public")));
                Ok(())
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(cache.get(&key()), Some(Field::Visibility("public")));
        assert_eq!(
            cache.edit(&key()).map(|edit| edit.commit_state),
            Some(CommitState::Committed)
        );

        assert!(cache.reconcile(key(), Some(Field::Visibility("public"))));
        assert!(cache.edit(&key()).is_none());
    }

    #[test]
    fn test_reconcile_skips_pending_keys() {
        let cache = OptimisticCache::new();
        cache.lock().edits.insert(
            key(),
            OptimisticEdit {
                previous_value: None,
                pending_value: Field::Visibility("public"),
                commit_state: CommitState::Pending,
                ticket: 1,
            },
        );
        cache
            .lock()
            .values
            .insert(key(), Field::Visibility("public"));

        assert!(!cache.reconcile(key(), Some(Field::Visibility("private"))));
        assert_eq!(cache.get(&key()), Some(Field::Visibility("public")));

        cache.evict(&key());
        assert!(cache.get(&key()).is_none());
        assert!(cache.keys().is_empty());
    }
}
