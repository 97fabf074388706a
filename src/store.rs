// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Document Store
//!
//! Streets are stored one document per street, `{ id, name }`, in a collection
//! named after the city. Writes are upserts keyed by `id`, so replaying a batch
//! never creates duplicates and the latest name for an id wins.

use crate::{errors::StoreError, model::Street};
use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use mongodb::{
    bson::{doc, Document},
    Client, Database,
};
use std::{
    collections::{BTreeMap, HashMap},
    sync::Mutex,
};
use tracing::{debug, error};

/// Persistence seam used by the payload applier and the bootstrapper.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Round trip to the server. Succeeds only once the store is reachable.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Sets `name` on the document with the street's id inside `partition`,
    /// creating the document (and the partition) when absent.
    async fn upsert_street(&self, partition: &str, street: &Street) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError>;
}

/// MongoDB backed store. The client connects lazily, `ping` forces it.
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub async fn new(url: &str, db_name: &str) -> Result<Self, StoreError> {
        debug!("creating mongodb client...");

        let client = match Client::with_uri_str(url).await {
            Ok(c) => Ok(c),
            Err(err) => {
                error!(error = err.to_string(), "invalid mongodb uri");
                Err(StoreError::ConnectionError(err.to_string()))
            }
        }?;

        let db = client.database(db_name);
        Ok(MongoStore { client, db })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn ping(&self) -> Result<(), StoreError> {
        match self.db.run_command(doc! { "ping": 1 }).await {
            Ok(_) => {
                debug!("mongodb connected");
                Ok(())
            }
            Err(err) => Err(StoreError::ConnectionError(err.to_string())),
        }
    }

    async fn upsert_street(&self, partition: &str, street: &Street) -> Result<(), StoreError> {
        self.db
            .collection::<Document>(partition)
            .update_one(
                doc! { "id": street.street_id },
                doc! { "$set": { "name": street.name.as_str() } },
            )
            .upsert(true)
            .await
            .map(|_| ())
            .map_err(|err| StoreError::WriteError {
                partition: partition.to_owned(),
                reason: err.to_string(),
            })
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

/// In-process store with the same upsert semantics as `MongoStore`.
#[derive(Default)]
pub struct MemoryStore {
    partitions: Mutex<HashMap<String, BTreeMap<i64, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a partition as `id -> name`, `None` when never written.
    pub fn partition(&self, name: &str) -> Option<BTreeMap<i64, String>> {
        self.lock().get(name).cloned()
    }

    pub fn partition_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().keys().cloned().collect();
        names.sort();
        names
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, BTreeMap<i64, String>>> {
        // a poisoned map is still consistent, every write is a single insert
        self.partitions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn upsert_street(&self, partition: &str, street: &Street) -> Result<(), StoreError> {
        self.lock()
            .entry(partition.to_owned())
            .or_default()
            .insert(street.street_id, street.name.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
