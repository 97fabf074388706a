// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Shutdown
//!
//! Closes the channel, then the connection, then the store client. A failing
//! step is logged and the next one still runs.

use crate::{
    channel::{close_channel, close_connection},
    errors::AmqpError,
    store::DocumentStore,
};
use async_trait::async_trait;
use lapin::{Channel, Connection};
#[cfg(test)]
use mockall::automock;
use std::{fmt::Display, future::Future, sync::Arc};
use tracing::{error, info};

/// Broker side resources that must be released on shutdown.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BrokerCloser: Send + Sync {
    async fn close_channel(&self) -> Result<(), AmqpError>;

    async fn close_connection(&self) -> Result<(), AmqpError>;
}

/// The connection and channel opened by `new_amqp_channel`.
#[derive(Clone)]
pub struct AmqpHandles {
    pub conn: Arc<Connection>,
    pub channel: Arc<Channel>,
}

impl AmqpHandles {
    pub fn new((conn, channel): (Arc<Connection>, Arc<Channel>)) -> Self {
        AmqpHandles { conn, channel }
    }
}

#[async_trait]
impl BrokerCloser for AmqpHandles {
    async fn close_channel(&self) -> Result<(), AmqpError> {
        close_channel(&self.channel).await
    }

    async fn close_connection(&self) -> Result<(), AmqpError> {
        close_connection(&self.conn).await
    }
}

/// Awaits one close operation, logging its outcome. Returns `true` on success.
pub(crate) async fn close_step<E, F>(step: &str, close: F) -> bool
where
    E: Display,
    F: Future<Output = Result<(), E>>,
{
    match close.await {
        Ok(_) => {
            info!(step, "closed");
            true
        }
        Err(err) => {
            error!(step, error = %err, "failure to close");
            false
        }
    }
}

/// Closes the channel, then the connection.
///
/// # Parameters
/// * `broker` - The broker resources to release
///
/// # Returns
/// `true` when both steps succeeded. The connection is closed even when the
/// channel close failed.
pub async fn close_broker(broker: &dyn BrokerCloser) -> bool {
    let channel_closed = close_step("channel", broker.close_channel()).await;
    let conn_closed = close_step("connection", broker.close_connection()).await;
    channel_closed && conn_closed
}

/// Closes everything the consumer owns: channel, connection, then store.
///
/// # Parameters
/// * `broker` - The broker resources to release
/// * `store` - The store client to shut down
///
/// # Returns
/// `true` when every step succeeded. Every step runs regardless of the
/// outcome of the previous ones.
pub async fn shutdown(broker: &dyn BrokerCloser, store: &dyn DocumentStore) -> bool {
    let broker_closed = close_broker(broker).await;
    let store_closed = close_step("store", store.close()).await;

    info!("consumer service connection closed");
    broker_closed && store_closed
}

/// Passes `result` through, releasing `broker` and `store` first when it is
/// an error.
pub(crate) async fn release_on_error<T, E>(
    result: Result<T, E>,
    broker: &dyn BrokerCloser,
    store: &dyn DocumentStore,
) -> Result<T, E> {
    if result.is_err() && !shutdown(broker, store).await {
        error!("failure to release resources after a startup error");
    }
    result
}
