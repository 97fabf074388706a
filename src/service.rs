// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Consumer and Publisher Services
//!
//! Entry points used by the binary. `ConsumerService` owns the connection, the
//! channel and the store client for its whole life; only one should exist per
//! process. It can only be built through a successful bootstrap, so nothing
//! can ever run against a channel that is not ready.

use crate::{
    applier::PayloadApplier,
    bootstrap::{bootstrap, Bootstrapped},
    channel::new_amqp_channel,
    config::Configs,
    dispatcher::RabbitMQDispatcher,
    errors::{AmqpError, BootstrapError, ServiceError},
    lifecycle::{self, AmqpHandles},
    model::StreetsBatch,
    publisher::RabbitMQPublisher,
    source::StreetSource,
    store::{DocumentStore, MongoStore},
    topology::declare_topology,
};
use opentelemetry::Context;
use std::{future::Future, sync::Arc};
use tracing::{info, warn};

pub struct ConsumerService {
    cfg: Configs,
    broker: AmqpHandles,
    store: Arc<dyn DocumentStore>,
}

impl ConsumerService {
    /// Bootstraps RabbitMQ and MongoDB, then declares the topology.
    ///
    /// # Parameters
    /// * `cfg` - Connection targets, topology names and retry policy
    ///
    /// # Returns
    /// A connected service, `BootstrapError::BrokerUnavailable` when RabbitMQ
    /// never answered, or the topology error. On a topology error the
    /// connection, the channel and the store client are closed first.
    pub async fn connect(cfg: Configs) -> Result<Self, BootstrapError> {
        let store = MongoStore::new(&cfg.mongo_url, &cfg.mongo_db).await?;
        Self::connect_with_store(cfg, Arc::new(store)).await
    }

    /// Same as `connect` with an already built store client.
    pub async fn connect_with_store(
        cfg: Configs,
        store: Arc<dyn DocumentStore>,
    ) -> Result<Self, BootstrapError> {
        let Bootstrapped { broker, .. } =
            bootstrap(&cfg.retry, || new_amqp_channel(&cfg), store.as_ref()).await?;
        let broker = AmqpHandles::new(broker);

        lifecycle::release_on_error(
            declare_topology(broker.channel.clone(), &cfg.exchange_name, &cfg.queue_name).await,
            &broker,
            store.as_ref(),
        )
        .await?;

        info!(
            exchange = %cfg.exchange_name,
            queue = %cfg.queue_name,
            "consumer service connected"
        );

        Ok(ConsumerService {
            cfg,
            broker,
            store,
        })
    }

    /// Runs the message loop. Returns only when the subscription breaks.
    pub async fn start_consuming(&self) -> Result<(), AmqpError> {
        let applier =
            PayloadApplier::new(self.store.clone()).with_timeout(self.cfg.store_timeout);

        RabbitMQDispatcher::new(
            self.broker.channel.clone(),
            &self.cfg.queue_name,
            &self.cfg.app_name,
            Arc::new(applier),
        )
        .consume_blocking()
        .await
    }

    /// Closes channel, connection and store client. Returns `true` when all
    /// three closed cleanly.
    pub async fn close(self) -> bool {
        lifecycle::shutdown(&self.broker, self.store.as_ref()).await
    }
}

/// Bootstraps a consumer and runs it until `shutdown` resolves or the
/// subscription breaks, then closes it.
pub async fn start_consumer<F>(cfg: Configs, shutdown: F) -> Result<(), ServiceError>
where
    F: Future<Output = ()>,
{
    let consumer = ConsumerService::connect(cfg).await?;

    let outcome = tokio::select! {
        res = consumer.start_consuming() => res,
        _ = shutdown => {
            info!("shutdown requested");
            Ok(())
        }
    };

    if !consumer.close().await {
        warn!("consumer service did not close cleanly");
    }

    outcome.map_err(ServiceError::from)
}

/// Publishes the streets of `city` once and disconnects.
///
/// Connects without retry and declares the same topology as the consumer, so
/// messages are never routed to a missing queue.
pub async fn start_publisher(
    cfg: &Configs,
    city: &str,
    source: &dyn StreetSource,
) -> Result<(), ServiceError> {
    let streets = source.streets_in_city(city).await?;
    if streets.is_empty() {
        warn!(city, "no streets found, publishing an empty batch");
    }
    let batch = StreetsBatch::new(city, streets);

    let broker = AmqpHandles::new(new_amqp_channel(cfg).await?);
    let channel = broker.channel.clone();

    let published = async {
        declare_topology(channel.clone(), &cfg.exchange_name, &cfg.queue_name).await?;
        RabbitMQPublisher::new(channel.clone())
            .await?
            .publish(&Context::current(), &cfg.exchange_name, &cfg.queue_name, &batch)
            .await
    }
    .await;

    if published.is_ok() {
        info!(
            city,
            streets = batch.streets.len(),
            queue = %cfg.queue_name,
            "message published"
        );
    }

    if !lifecycle::close_broker(&broker).await {
        warn!("publisher did not close cleanly");
    }

    published.map_err(ServiceError::from)
}
