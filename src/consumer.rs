// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Delivery Processing
//!
//! Runs the handler on one delivery and settles it with the broker:
//!
//! - success: ack, the message leaves the queue;
//! - invalid payload: ack as well, a malformed body fails the same way on every
//!   redelivery so it is logged and dropped;
//! - store failure: nack with requeue, the message is redelivered later.
//!
//! There is no redelivery cap. A message whose store write fails forever is
//! redelivered forever.

use crate::{
    applier::ConsumerHandler,
    errors::{AmqpError, ApplyError},
    otel,
};
use async_trait::async_trait;
use lapin::{
    acker::Acker,
    options::{BasicAckOptions, BasicNackOptions},
    protocol::basic::AMQPProperties,
};
#[cfg(test)]
use mockall::automock;
use opentelemetry::{
    global::BoxedTracer,
    trace::{Span, Status},
};
use std::borrow::Cow;
use tracing::{debug, error, warn};

/// How a delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    Acked,
    Dropped,
    Requeued,
}

/// Settles a single delivery with the broker.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self) -> Result<(), AmqpError>;

    /// Negative acknowledgment. `requeue` puts the message back in the queue.
    async fn nack(&self, requeue: bool) -> Result<(), AmqpError>;
}

#[async_trait]
impl Acknowledger for Acker {
    async fn ack(&self) -> Result<(), AmqpError> {
        Acker::ack(self, BasicAckOptions { multiple: false })
            .await
            .map(|_| ())
            .map_err(|err| {
                error!(error = err.to_string(), "error whiling ack msg");
                AmqpError::AckMessageError
            })
    }

    async fn nack(&self, requeue: bool) -> Result<(), AmqpError> {
        Acker::nack(
            self,
            BasicNackOptions {
                multiple: false,
                requeue,
            },
        )
        .await
        .map(|_| ())
        .map_err(|err| {
            error!(error = err.to_string(), "error whiling nack msg");
            AmqpError::NackMessageError
        })
    }
}

/// Processes one delivery and settles it according to the handler outcome.
///
/// This function:
/// 1. Opens a consumer span continuing the publisher's trace
/// 2. Runs the handler on the message body
/// 3. Acks on success or on an invalid payload
/// 4. Nacks with requeue on a store failure
///
/// # Parameters
/// * `tracer` - OpenTelemetry tracer for creating spans
/// * `queue` - Name of the queue the delivery came from
/// * `props` - Delivery properties, carrying the trace headers
/// * `data` - The message body
/// * `acker` - Settles the delivery with the broker
/// * `handler` - Applies the message body
///
/// # Returns
/// How the delivery was settled, or the broker error when the settlement
/// itself failed. In that case the broker redelivers the message once the
/// channel is gone.
pub async fn consume(
    tracer: &BoxedTracer,
    queue: &str,
    props: &AMQPProperties,
    data: &[u8],
    acker: &dyn Acknowledger,
    handler: &dyn ConsumerHandler,
) -> Result<Settlement, AmqpError> {
    let (ctx, mut span) = otel::new_span(props, tracer, queue);

    debug!(queue, bytes = data.len(), "received");

    let settlement = match handler.exec(&ctx, data).await {
        Ok(_) => {
            debug!("message successfully processed");
            acker.ack().await.map(|_| Settlement::Acked)
        }
        Err(ApplyError::Validation(reason)) => {
            warn!(reason = %reason, "removing message from queue - reason: invalid payload");
            span.set_status(Status::Error {
                description: Cow::from(format!("invalid payload: {reason}")),
            });
            acker.ack().await.map(|_| Settlement::Dropped)
        }
        Err(ApplyError::Store(err)) => {
            warn!(
                error = err.to_string(),
                "error whiling handling msg, requeuing for latter"
            );
            span.record_error(&err);
            span.set_status(Status::Error {
                description: Cow::from("store failure"),
            });
            acker.nack(true).await.map(|_| Settlement::Requeued)
        }
    };

    match &settlement {
        Ok(Settlement::Acked) => span.set_status(Status::Ok),
        Ok(_) => {}
        Err(err) => {
            span.record_error(err);
            span.set_status(Status::Error {
                description: Cow::from("error to settle msg"),
            });
        }
    }
    span.end();

    settlement
}
