// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Loop
//!
//! Subscribes to the streets queue and feeds deliveries to the handler one at
//! a time. Prefetch is 1 and every delivery is settled before the next one is
//! pulled from the stream, so at most one message is ever in flight.

use crate::{
    applier::ConsumerHandler, consumer::consume, errors::AmqpError, otel::TRACER_NAME,
};
use futures_util::StreamExt;
use lapin::{
    options::{BasicConsumeOptions, BasicQosOptions},
    types::FieldTable,
    Channel,
};
use opentelemetry::global;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Unacked deliveries the broker may push before the current one is settled.
const PREFETCH_COUNT: u16 = 1;

fn qos_options() -> BasicQosOptions {
    BasicQosOptions { global: false }
}

/// Manual acknowledgment: nothing leaves the queue before it is settled.
fn consume_options() -> BasicConsumeOptions {
    BasicConsumeOptions {
        no_local: false,
        no_ack: false,
        exclusive: false,
        nowait: false,
    }
}

pub struct RabbitMQDispatcher {
    channel: Arc<Channel>,
    queue: String,
    consumer_tag: String,
    handler: Arc<dyn ConsumerHandler>,
}

impl RabbitMQDispatcher {
    pub fn new(
        channel: Arc<Channel>,
        queue: &str,
        consumer_tag: &str,
        handler: Arc<dyn ConsumerHandler>,
    ) -> Self {
        RabbitMQDispatcher {
            channel,
            queue: queue.to_owned(),
            consumer_tag: consumer_tag.to_owned(),
            handler,
        }
    }

    /// Consumes until the subscription ends.
    ///
    /// Sets a prefetch of one, subscribes with manual acknowledgment and
    /// settles every delivery through `consume` before pulling the next one.
    ///
    /// # Returns
    /// * `QoSDeclarationError` or `BindingConsumerError` when the subscription
    ///   could not be set up.
    ///
    /// Never returns `Ok`: the stream only ends when the channel or the
    /// connection is gone, which is reported as `AmqpError::ConsumerError`.
    /// Stop it by dropping the future.
    pub async fn consume_blocking(&self) -> Result<(), AmqpError> {
        if let Err(err) = self
            .channel
            .basic_qos(PREFETCH_COUNT, qos_options())
            .await
        {
            error!(error = err.to_string(), "error to configure qos");
            return Err(AmqpError::QoSDeclarationError(self.queue.clone()));
        }

        let mut consumer = match self
            .channel
            .basic_consume(
                &self.queue,
                &self.consumer_tag,
                consume_options(),
                FieldTable::default(),
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error to create the consumer");
                Err(AmqpError::BindingConsumerError(self.queue.clone()))
            }
            Ok(c) => Ok(c),
        }?;

        info!(queue = %self.queue, "listening for messages");

        let tracer = global::tracer(TRACER_NAME);

        while let Some(result) = consumer.next().await {
            match result {
                Ok(delivery) => {
                    match consume(
                        &tracer,
                        &self.queue,
                        &delivery.properties,
                        &delivery.data,
                        &delivery.acker,
                        self.handler.as_ref(),
                    )
                    .await
                    {
                        Ok(settlement) => debug!(
                            delivery_tag = delivery.delivery_tag,
                            redelivered = delivery.redelivered,
                            ?settlement,
                            "delivery settled"
                        ),
                        Err(err) => error!(error = err.to_string(), "error consume msg"),
                    }
                }

                Err(err) => error!(error = err.to_string(), "errors consume msg"),
            }
        }

        warn!(queue = %self.queue, "consumer stream closed");
        Err(AmqpError::ConsumerError(format!(
            "subscription to {} closed",
            self.queue
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_unacked_delivery_at_a_time() {
        assert_eq!(PREFETCH_COUNT, 1);
        assert!(!qos_options().global);
    }

    #[test]
    fn deliveries_need_an_explicit_ack() {
        let opts = consume_options();
        assert!(!opts.no_ack);
        assert!(!opts.exclusive);
        assert!(!opts.nowait);
    }
}
