// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Error Types
//!
//! Errors are split by the dependency that raised them. `AmqpError` covers the
//! broker (connection, channel, topology, acknowledgment), `StoreError` covers
//! the document store, and `ApplyError` is what the payload applier hands back
//! to the message loop so it can pick between ack and requeue.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to RabbitMQ.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AmqpError {
    /// Error establishing a connection to the RabbitMQ server
    #[error("failure to connect")]
    ConnectionError,

    /// Error creating a channel from an established connection
    #[error("failure to create a channel")]
    ChannelError,

    /// Error declaring an exchange with the given name
    #[error("failure to declare an exchange `{0}`")]
    DeclareExchangeError(String),

    /// Error declaring a queue with the given name
    #[error("failure to declare a queue `{0}`")]
    DeclareQueueError(String),

    /// Error binding an exchange to a queue
    #[error("failure to binding exchange `{0}` to queue `{1}`")]
    BindingExchangeToQueueError(String, String),

    /// Error publishing a message
    #[error("failure to publish")]
    PublishingError,

    /// Error serializing a batch before publishing
    #[error("failure to serialize payload")]
    SerializePayloadError,

    /// Error acknowledging a message
    #[error("failure to ack message")]
    AckMessageError,

    /// Error negative-acknowledging a message
    #[error("failure to nack message")]
    NackMessageError,

    /// Error configuring Quality of Service parameters
    #[error("failure to configure qos `{0}`")]
    QoSDeclarationError(String),

    /// Error registering the consumer on a queue
    #[error("failure to declare consumer `{0}`")]
    BindingConsumerError(String),

    /// Error consuming a message
    #[error("failure to consume message `{0}`")]
    ConsumerError(String),

    /// Error closing a channel or a connection
    #[error("failure to close `{0}`")]
    CloseError(String),
}

/// Errors raised by the document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("failure to connect to the store: {0}")]
    ConnectionError(String),

    #[error("failure to write into partition `{partition}`: {reason}")]
    WriteError { partition: String, reason: String },

    #[error("store operation on partition `{partition}` timed out after {timeout:?}")]
    Timeout {
        partition: String,
        timeout: Duration,
    },
}

/// Outcome of a failed payload application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The payload is malformed or incomplete. Nothing was written.
    #[error("invalid payload: {0}")]
    Validation(String),

    /// The payload was valid but the store rejected or failed the write.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Fatal outcome of the connection bootstrap.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BootstrapError {
    #[error("broker unreachable after {attempts} attempts")]
    BrokerUnavailable { attempts: u32 },

    #[error("failure to declare topology: {0}")]
    Topology(#[from] AmqpError),

    #[error("invalid store client: {0}")]
    Store(#[from] StoreError),
}

/// Errors reading the streets a publisher sends.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("failure to read streets: {0}")]
    Io(#[from] std::io::Error),

    #[error("failure to parse streets: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors surfaced by the consumer and publisher entry points.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error(transparent)]
    Amqp(#[from] AmqpError),

    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Errors loading the process configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: String, value: String },
}
