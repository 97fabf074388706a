// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Payload Applier
//!
//! Turns a message body into store writes. The body is decoded and validated
//! before anything is written, then every street is upserted into the city's
//! partition. Store failures are returned to the caller untouched so the
//! message loop can requeue the delivery.
//!
//! Writes within a batch are not atomic: a failure halfway leaves the first
//! streets written. Redelivery replays the whole batch, and since every write
//! is an upsert by id the end state is the same as a clean single pass.

use crate::{
    errors::{ApplyError, StoreError},
    model::StreetsBatch,
    store::DocumentStore,
};
use async_trait::async_trait;
use opentelemetry::Context;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info};

/// Processes the body of one delivery.
#[async_trait]
pub trait ConsumerHandler: Send + Sync {
    async fn exec(&self, ctx: &Context, payload: &[u8]) -> Result<(), ApplyError>;
}

/// Summary of a successfully applied batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedBatch {
    pub city: String,
    pub streets: usize,
}

pub struct PayloadApplier {
    store: Arc<dyn DocumentStore>,
    timeout: Option<Duration>,
}

impl PayloadApplier {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        PayloadApplier {
            store,
            timeout: None,
        }
    }

    /// Bounds every store call. A call exceeding it fails with `StoreError::Timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn apply(&self, payload: &[u8]) -> Result<AppliedBatch, ApplyError> {
        let batch = StreetsBatch::decode(payload)?;

        for street in &batch.streets {
            let write = self.store.upsert_street(&batch.city, street);

            let result = match self.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, write).await {
                    Ok(res) => res,
                    Err(_) => Err(StoreError::Timeout {
                        partition: batch.city.clone(),
                        timeout,
                    }),
                },
                None => write.await,
            };

            if let Err(err) = result {
                error!(
                    error = err.to_string(),
                    city = %batch.city,
                    street_id = street.street_id,
                    "failure to upsert street"
                );
                return Err(err.into());
            }
        }

        info!(city = %batch.city, streets = batch.streets.len(), "streets saved");

        Ok(AppliedBatch {
            city: batch.city,
            streets: batch.streets.len(),
        })
    }
}

#[async_trait]
impl ConsumerHandler for PayloadApplier {
    async fn exec(&self, _ctx: &Context, payload: &[u8]) -> Result<(), ApplyError> {
        let applied = self.apply(payload).await?;
        debug!(city = %applied.city, "batch applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, MockDocumentStore};

    const TELAVIV: &[u8] =
        br#"{"city":"telaviv","streets":[{"streetId":1,"name":"Dizengoff"},{"streetId":2,"name":"Allenby"}]}"#;

    #[tokio::test]
    async fn applies_every_street_to_the_city_partition() {
        let store = Arc::new(MemoryStore::new());
        let applier = PayloadApplier::new(store.clone());

        let applied = applier.apply(TELAVIV).await.unwrap();

        assert_eq!(
            applied,
            AppliedBatch {
                city: "telaviv".to_owned(),
                streets: 2
            }
        );
        let partition = store.partition("telaviv").unwrap();
        assert_eq!(partition.get(&1).map(String::as_str), Some("Dizengoff"));
        assert_eq!(partition.get(&2).map(String::as_str), Some("Allenby"));
    }

    #[tokio::test]
    async fn applying_twice_equals_applying_once() {
        let once = Arc::new(MemoryStore::new());
        PayloadApplier::new(once.clone()).apply(TELAVIV).await.unwrap();

        let twice = Arc::new(MemoryStore::new());
        let applier = PayloadApplier::new(twice.clone());
        applier.apply(TELAVIV).await.unwrap();
        applier.apply(TELAVIV).await.unwrap();

        assert_eq!(once.partition("telaviv"), twice.partition("telaviv"));
        assert_eq!(once.partition_names(), twice.partition_names());
    }

    #[tokio::test]
    async fn invalid_payloads_never_touch_the_store() {
        let mut store = MockDocumentStore::new();
        store.expect_upsert_street().never();
        let applier = PayloadApplier::new(Arc::new(store));

        for body in [
            br#"{"streets":[{"streetId":1,"name":"Herzl"}]}"#.as_slice(),
            br#"{"city":"haifa"}"#.as_slice(),
            b"{".as_slice(),
        ] {
            assert!(matches!(
                applier.apply(body).await,
                Err(ApplyError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn store_errors_are_propagated() {
        let mut store = MockDocumentStore::new();
        store
            .expect_upsert_street()
            .times(1)
            .returning(|partition, _| {
                Err(StoreError::WriteError {
                    partition: partition.to_owned(),
                    reason: "not primary".to_owned(),
                })
            });
        let applier = PayloadApplier::new(Arc::new(store));

        let err = applier.apply(TELAVIV).await.unwrap_err();

        assert_eq!(
            err,
            ApplyError::Store(StoreError::WriteError {
                partition: "telaviv".to_owned(),
                reason: "not primary".to_owned(),
            })
        );
    }

    #[tokio::test]
    async fn empty_batches_succeed_without_writes() {
        let mut store = MockDocumentStore::new();
        store.expect_upsert_street().never();
        let applier = PayloadApplier::new(Arc::new(store));

        let applied = applier
            .apply(br#"{"city":"eilat","streets":[]}"#)
            .await
            .unwrap();
        assert_eq!(applied.streets, 0);
    }

    struct HangingStore;

    #[async_trait]
    impl DocumentStore for HangingStore {
        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }

        async fn upsert_street(
            &self,
            _partition: &str,
            _street: &crate::model::Street,
        ) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn close(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_store_calls_time_out() {
        let applier =
            PayloadApplier::new(Arc::new(HangingStore)).with_timeout(Some(Duration::from_secs(3)));

        let err = applier.apply(TELAVIV).await.unwrap_err();

        assert_eq!(
            err,
            ApplyError::Store(StoreError::Timeout {
                partition: "telaviv".to_owned(),
                timeout: Duration::from_secs(3),
            })
        );
    }
}
