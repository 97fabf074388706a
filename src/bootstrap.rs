// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Connection Bootstrap
//!
//! Brings up the broker and the store side by side. Each round tries whatever
//! is still down; every failure costs one attempt from a shared budget and is
//! followed by a fixed delay. The broker is mandatory: running out of attempts
//! without it is fatal. The store is not: its client reconnects lazily, so the
//! bootstrap only warns and lets the message loop requeue until it comes back.

use crate::{
    errors::{AmqpError, BootstrapError},
    store::DocumentStore,
};
use std::{future::Future, time::Duration};
use tracing::{error, info, warn};

/// Bounded retry with a fixed delay between failed attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        RetryPolicy {
            max_attempts,
            delay,
        }
    }
}

/// Result of a bootstrap that reached the broker.
#[derive(Debug)]
pub struct Bootstrapped<B> {
    pub broker: B,
    /// `false` when the attempts ran out before the store answered a ping.
    pub store_connected: bool,
}

/// Connects the broker through `connect_broker` and verifies `store`.
///
/// # Parameters
/// * `policy` - Attempt budget shared by both dependencies and the delay
///   after each failure
/// * `connect_broker` - Opens the broker connection, called until it succeeds
/// * `store` - Pinged until it answers
///
/// # Returns
/// * `Ok(Bootstrapped)` - The broker handle, with `store_connected` telling
///   whether the store answered within the budget
/// * `Err(BootstrapError::BrokerUnavailable)` - The budget ran out before the
///   broker connected
pub async fn bootstrap<B, F, Fut>(
    policy: &RetryPolicy,
    mut connect_broker: F,
    store: &dyn DocumentStore,
) -> Result<Bootstrapped<B>, BootstrapError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<B, AmqpError>>,
{
    let mut broker = None;
    let mut store_connected = false;
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        if broker.is_none() {
            match connect_broker().await {
                Ok(b) => {
                    info!("connected to rabbitmq");
                    broker = Some(b);
                }
                Err(err) => {
                    attempts += 1;
                    warn!(
                        error = err.to_string(),
                        attempt = attempts,
                        max_attempts = policy.max_attempts,
                        "failure to connect to rabbitmq"
                    );
                    backoff(policy, attempts).await;
                }
            }
        }

        if !store_connected && attempts < policy.max_attempts {
            match store.ping().await {
                Ok(_) => {
                    info!("connected to mongodb");
                    store_connected = true;
                }
                Err(err) => {
                    attempts += 1;
                    warn!(
                        error = err.to_string(),
                        attempt = attempts,
                        max_attempts = policy.max_attempts,
                        "failure to connect to mongodb"
                    );
                    backoff(policy, attempts).await;
                }
            }
        }

        if broker.is_some() && store_connected {
            break;
        }
    }

    let Some(broker) = broker else {
        error!(attempts, "failure to connect to rabbitmq after multiple attempts");
        return Err(BootstrapError::BrokerUnavailable { attempts });
    };

    if !store_connected {
        warn!(attempts, "mongodb not reachable yet, continuing with a lazy client");
    }

    Ok(Bootstrapped {
        broker,
        store_connected,
    })
}

async fn backoff(policy: &RetryPolicy, attempts: u32) {
    if attempts < policy.max_attempts {
        tokio::time::sleep(policy.delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::StoreError, store::MockDocumentStore};
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };
    use tokio::time::Instant;

    const DELAY: Duration = Duration::from_secs(5);

    fn policy() -> RetryPolicy {
        RetryPolicy::new(10, DELAY)
    }

    fn store_up() -> MockDocumentStore {
        let mut store = MockDocumentStore::new();
        store.expect_ping().times(1).returning(|| Ok(()));
        store
    }

    fn store_down(times: usize) -> MockDocumentStore {
        let mut store = MockDocumentStore::new();
        store
            .expect_ping()
            .times(times)
            .returning(|| Err(StoreError::ConnectionError("refused".to_owned())));
        store
    }

    /// Broker connector failing `failures` times before succeeding.
    fn broker_after(
        failures: u32,
    ) -> (
        Arc<AtomicU32>,
        impl FnMut() -> std::future::Ready<Result<&'static str, AmqpError>>,
    ) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let connect = move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < failures {
                Err(AmqpError::ConnectionError)
            } else {
                Ok("broker")
            })
        };
        (calls, connect)
    }

    #[tokio::test(start_paused = true)]
    async fn both_up_first_try() {
        let (calls, connect) = broker_after(0);
        let started = Instant::now();

        let res = bootstrap(&policy(), connect, &store_up()).await.unwrap();

        assert_eq!(res.broker, "broker");
        assert!(res.store_connected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn connected_dependency_is_not_retried() {
        let (calls, connect) = broker_after(2);
        let started = Instant::now();

        let res = bootstrap(&policy(), connect, &store_up()).await.unwrap();

        assert!(res.store_connected);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), DELAY * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn broker_exhaustion_is_fatal() {
        let (calls, connect) = broker_after(u32::MAX);

        let err = bootstrap(&policy(), connect, &store_up()).await.unwrap_err();

        assert_eq!(err, BootstrapError::BrokerUnavailable { attempts: 10 });
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn attempts_are_shared_between_dependencies() {
        let (calls, connect) = broker_after(u32::MAX);
        let started = Instant::now();

        let err = bootstrap(&policy(), connect, &store_down(5)).await.unwrap_err();

        assert_eq!(err, BootstrapError::BrokerUnavailable { attempts: 10 });
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        // no wait after the last failed attempt
        assert_eq!(started.elapsed(), DELAY * 9);
    }

    #[tokio::test(start_paused = true)]
    async fn store_exhaustion_is_not_fatal() {
        let (calls, connect) = broker_after(0);

        let res = bootstrap(&policy(), connect, &store_down(10)).await.unwrap();

        assert_eq!(res.broker, "broker");
        assert!(!res.store_connected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
