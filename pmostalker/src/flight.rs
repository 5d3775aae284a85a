//! Cache par clé avec remplissage single-flight
//!
//! Une clé est soit prête (valeur en cache), soit en attente (une seule tâche de
//! remplissage en cours, partagée par tous les appelants), soit absente. Le test et
//! l'enregistrement d'une tâche en attente se font sous un seul verrou sans await
//! entre les deux : deux appelants ne lancent jamais deux tâches pour la même clé.
//!
//! Le remplissage tourne dans sa propre tâche tokio : un appelant qui cesse
//! d'attendre ne l'annule pas, et la valeur arrive quand même dans le cache.

use crate::error::{Result, StalkerError};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

type SharedOutcome<V> = Shared<BoxFuture<'static, Result<V>>>;

struct FlightState<K, V> {
    ready: HashMap<K, V>,
    /// Tâches en attente marquées d'un id de tentative : une tâche qui se termine
    /// ne désinscrit qu'elle-même
    pending: HashMap<K, (u64, SharedOutcome<V>)>,
}

pub(crate) struct FlightMap<K, V> {
    state: Arc<Mutex<FlightState<K, V>>>,
    attempts: AtomicU64,
}

fn lock<K, V>(state: &Mutex<FlightState<K, V>>) -> MutexGuard<'_, FlightState<K, V>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<K, V> FlightMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FlightState {
                ready: HashMap::new(),
                pending: HashMap::new(),
            })),
            attempts: AtomicU64::new(0),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        lock(&self.state).ready.get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        lock(&self.state).ready.insert(key, value);
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        lock(&self.state).ready.remove(key)
    }

    /// Retire la valeur en cache pour `key` quand `stale` est vrai pour elle
    pub fn remove_if(&self, key: &K, stale: impl FnOnce(&V) -> bool) -> Option<V> {
        let mut state = lock(&self.state);
        if state.ready.get(key).is_some_and(stale) {
            state.ready.remove(key)
        } else {
            None
        }
    }

    pub fn clear(&self) {
        lock(&self.state).ready.clear();
    }

    pub fn is_pending(&self, key: &K) -> bool {
        lock(&self.state).pending.contains_key(key)
    }

    /// Valeur en cache pour `key`, ou le résultat de l'unique remplissage en
    /// cours, lancé avec `start` s'il n'y en a aucun
    ///
    /// Un remplissage en échec ne met rien en cache et laisse la clé absente : l'appel
    /// suivant repart de zéro.
    pub async fn get_or_start<F, Fut>(&self, key: K, start: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let outcome = {
            let mut state = lock(&self.state);

            if let Some(value) = state.ready.get(&key) {
                return Ok(value.clone());
            }

            match state.pending.get(&key) {
                Some((id, outcome)) => {
                    trace!("Joining in-flight attempt {} for {:?}", id, key);
                    outcome.clone()
                }
                None => {
                    let id = self.attempts.fetch_add(1, Ordering::Relaxed);
                    let outcome = self.spawn(key.clone(), id, start());
                    state.pending.insert(key, (id, outcome.clone()));
                    outcome
                }
            }
        };

        outcome.await
    }

    fn spawn<Fut>(&self, key: K, id: u64, work: Fut) -> SharedOutcome<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let state = Arc::clone(&self.state);

        let handle = tokio::spawn(async move {
            let outcome = work.await;

            let mut state = lock(&state);
            if let Ok(value) = &outcome {
                state.ready.insert(key.clone(), value.clone());
            }
            if state.pending.get(&key).is_some_and(|(pending, _)| *pending == id) {
                state.pending.remove(&key);
            }
            outcome
        });

        async move {
            handle
                .await
                .map_err(|e| StalkerError::Other(format!("authentication task aborted: {e}")))?
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_attempt() {
        let map = Arc::new(FlightMap::<String, String>::new());
        let starts = Arc::new(AtomicUsize::new(0));

        let calls = (0..8).map(|_| {
            let map = Arc::clone(&map);
            let starts = Arc::clone(&starts);
            async move {
                map.get_or_start("k".to_string(), || {
                    starts.fetch_add(1, Ordering::SeqCst);
                    async {
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok("token".to_string())
                    }
                })
                .await
            }
        });

        let results = futures::future::join_all(calls).await;
        assert!(results.iter().all(|r| r.as_deref() == Ok("token")));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(map.get(&"k".to_string()).as_deref(), Some("token"));
        assert!(!map.is_pending(&"k".to_string()));
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let map = FlightMap::<u8, u8>::new();

        let err = map
            .get_or_start(1, || async { Err(StalkerError::Handshake("no token".into())) })
            .await;
        assert_eq!(err, Err(StalkerError::Handshake("no token".into())));
        assert!(!map.is_pending(&1));
        assert_eq!(map.get(&1), None);

        let ok = map.get_or_start(1, || async { Ok(7) }).await;
        assert_eq!(ok, Ok(7));
    }

    #[tokio::test]
    async fn test_abandoned_waiter_does_not_cancel() {
        let map = Arc::new(FlightMap::<u8, u8>::new());

        let waiter = {
            let map = Arc::clone(&map);
            tokio::spawn(async move {
                map.get_or_start(1, || async {
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Ok(42)
                })
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        waiter.abort();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(map.get(&1), Some(42));
        assert!(!map.is_pending(&1));
    }

    #[tokio::test]
    async fn test_ready_value_short_circuits() {
        let map = FlightMap::<u8, u8>::new();
        map.insert(3, 9);
        let value = map
            .get_or_start(3, || async { Err(StalkerError::Other("started".into())) })
            .await;
        assert_eq!(value, Ok(9));

        map.remove(&3);
        assert_eq!(map.get(&3), None);
    }

    #[test]
    fn test_remove_if_keeps_replaced_value() {
        let map = FlightMap::<u8, u8>::new();
        map.insert(1, 10);
        assert_eq!(map.remove_if(&1, |v| *v == 9), None);
        assert_eq!(map.get(&1), Some(10));
        assert_eq!(map.remove_if(&1, |v| *v == 10), Some(10));
        assert_eq!(map.get(&1), None);
        assert_eq!(map.remove_if(&2, |_| true), None);
    }
}
