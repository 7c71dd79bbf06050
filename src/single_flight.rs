//! # Single-Flight Group
//!
//! Collapses concurrent work for the same key into one execution. The first
//! caller for a key registers a flight and starts the work on a detached
//! task; later callers subscribe to that flight's completion signal.
//!
//! The registry lock is held only to look up, insert, or remove a flight and
//! to publish its result. Removal and publication happen in the same critical
//! section, so a caller either joins the flight and sees its result or
//! arrives after it and starts a new one.
//!
//! Because the work runs detached, a caller that gives up does not cancel it.
//! The work receives a [`WaitersGone`] future that resolves once every caller
//! has stopped waiting, and can use it to abandon work that has not started.
//!
//! ```rust
//! use feature_cache::single_flight::SingleFlightGroup;
//!
//! # tokio_test::block_on(async {
//! let group = SingleFlightGroup::<&'static str, u32>::new();
//! let (value, was_leader) = group.work("key", |_| async { 42 }).await.unwrap();
//! assert_eq!(value, 42);
//! assert!(was_leader);
//! assert_eq!(group.in_flight(), 0);
//! # });
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error};

/// Failure of the flight itself, as opposed to a failed value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlightError {
    #[error("flight leader panicked: {0}")]
    LeaderPanicked(String),

    /// The flight ended without publishing a result
    #[error("flight abandoned before completion")]
    Abandoned,
}

type Outcome<V> = Option<Result<V, FlightError>>;

struct Flight<V> {
    id: u64,
    tx: watch::Sender<Outcome<V>>,
}

type Registry<K, V> = Arc<Mutex<HashMap<K, Arc<Flight<V>>>>>;

/// Resolves when no caller is waiting on the flight any more
pub struct WaitersGone {
    inner: BoxFuture<'static, ()>,
}

impl Future for WaitersGone {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.inner.as_mut().poll(cx)
    }
}

/// Removes the flight on drop if it never published
struct FlightGuard<K: Eq + Hash, V> {
    registry: Registry<K, V>,
    key: Option<K>,
    flight: Arc<Flight<V>>,
}

impl<K: Eq + Hash, V> FlightGuard<K, V> {
    fn remove_locked(&mut self, flights: &mut HashMap<K, Arc<Flight<V>>>) {
        if let Some(key) = self.key.take() {
            if flights.get(&key).is_some_and(|f| f.id == self.flight.id) {
                flights.remove(&key);
            }
        }
    }

    /// Remove the flight and publish its outcome as one transition
    fn complete(mut self, outcome: Result<V, FlightError>) {
        let registry = Arc::clone(&self.registry);
        let mut flights = registry.lock();
        self.remove_locked(&mut flights);
        self.flight.tx.send_replace(Some(outcome));
    }
}

impl<K: Eq + Hash, V> Drop for FlightGuard<K, V> {
    fn drop(&mut self) {
        if self.key.is_some() {
            let registry = Arc::clone(&self.registry);
            let mut flights = registry.lock();
            self.remove_locked(&mut flights);
        }
    }
}

/// Deduplicates concurrent work per key
pub struct SingleFlightGroup<K, V> {
    flights: Registry<K, V>,
    next_id: AtomicU64,
    leaders: AtomicU64,
    followers: AtomicU64,
}

impl<K, V> std::fmt::Debug for SingleFlightGroup<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlightGroup")
            .field("in_flight", &self.flights.lock().len())
            .field("leaders", &self.leaders.load(Ordering::Relaxed))
            .field("followers", &self.followers.load(Ordering::Relaxed))
            .finish()
    }
}

impl<K, V> Default for SingleFlightGroup<K, V> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            leaders: AtomicU64::new(0),
            followers: AtomicU64::new(0),
        }
    }
}

impl<K, V> SingleFlightGroup<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys currently being computed
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    pub fn leaders(&self) -> u64 {
        self.leaders.load(Ordering::Relaxed)
    }

    pub fn followers(&self) -> u64 {
        self.followers.load(Ordering::Relaxed)
    }

    /// Run `make` once per key across concurrent callers
    ///
    /// Returns the shared value and whether this caller started the flight.
    /// `make` is only called by a leader.
    pub async fn work<F, Fut>(&self, key: K, make: F) -> Result<(V, bool), FlightError>
    where
        F: FnOnce(WaitersGone) -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut make = Some(make);

        loop {
            let (mut rx, started) = {
                let mut flights = self.flights.lock();
                match flights.get(&key) {
                    Some(flight) => (flight.tx.subscribe(), None),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        let flight = Arc::new(Flight {
                            id: self.next_id.fetch_add(1, Ordering::Relaxed),
                            tx,
                        });
                        flights.insert(key.clone(), Arc::clone(&flight));
                        (rx, Some(flight))
                    }
                }
            };

            let was_leader = started.is_some();
            if let Some(flight) = started {
                self.leaders.fetch_add(1, Ordering::Relaxed);
                // only reachable once: a leader never loops back
                let Some(make) = make.take() else {
                    return Err(FlightError::Abandoned);
                };
                self.launch(key.clone(), flight, make);
            } else {
                self.followers.fetch_add(1, Ordering::Relaxed);
            }

            let published = rx.wait_for(Option::is_some).await.map(|v| v.clone());
            match published {
                Ok(outcome) => {
                    return match outcome {
                        Some(Ok(value)) => Ok((value, was_leader)),
                        Some(Err(e)) => Err(e),
                        None => Err(FlightError::Abandoned),
                    };
                }
                Err(_) if !was_leader && make.is_some() => {
                    debug!(key = ?key, "Joined an abandoned flight, retrying");
                    continue;
                }
                Err(_) => return Err(FlightError::Abandoned),
            }
        }
    }

    fn launch<F, Fut>(&self, key: K, flight: Arc<Flight<V>>, make: F)
    where
        F: FnOnce(WaitersGone) -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let waiters_gone = {
            let flight = Arc::clone(&flight);
            WaitersGone {
                inner: async move { flight.tx.closed().await }.boxed(),
            }
        };
        let fut = make(waiters_gone);

        let guard = FlightGuard {
            registry: Arc::clone(&self.flights),
            key: Some(key),
            flight,
        };

        tokio::spawn(async move {
            let outcome = match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(value) => Ok(value),
                Err(panic_error) => {
                    let panic_msg = if let Some(s) = panic_error.downcast_ref::<&str>() {
                        s.to_string()
                    } else if let Some(s) = panic_error.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    error!(panic_msg = %panic_msg, "Single-flight leader panicked");
                    Err(FlightError::LeaderPanicked(panic_msg))
                }
            };
            guard.complete(outcome);
        });
    }
}
