// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Message Publisher
//!
//! Publishes street batches to the exchange. Messages are persistent JSON with
//! a fresh message id and the caller's trace context in their headers. The
//! channel runs in confirm mode, so `publish` only returns `Ok` once the broker
//! took responsibility for the message.

use crate::{errors::AmqpError, model::StreetsBatch, otel::inject_headers};
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions},
    types::{FieldTable, ShortString},
    BasicProperties, Channel,
};
use opentelemetry::Context;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// AMQP delivery mode for messages written to disk by the broker.
const PERSISTENT_DELIVERY_MODE: u8 = 2;

pub struct RabbitMQPublisher {
    channel: Arc<Channel>,
}

impl RabbitMQPublisher {
    /// Puts `channel` in confirm mode and wraps it.
    pub async fn new(channel: Arc<Channel>) -> Result<RabbitMQPublisher, AmqpError> {
        if let Err(err) = channel
            .confirm_select(ConfirmSelectOptions { nowait: false })
            .await
        {
            error!(error = err.to_string(), "error enabling publisher confirms");
            return Err(AmqpError::ChannelError);
        }

        Ok(RabbitMQPublisher { channel })
    }

    /// Publishes `batch` to `exchange` under `routing_key`.
    ///
    /// # Parameters
    /// * `ctx` - Trace context injected into the message headers
    /// * `exchange` - Target exchange
    /// * `routing_key` - Routing key, the queue name for the direct exchange
    /// * `batch` - Streets to publish, serialized as JSON
    ///
    /// # Returns
    /// Ok(()) once the broker confirmed the message, `PublishingError` when it
    /// was refused or never confirmed.
    pub async fn publish(
        &self,
        ctx: &Context,
        exchange: &str,
        routing_key: &str,
        batch: &StreetsBatch,
    ) -> Result<(), AmqpError> {
        let data = batch.encode().map_err(|err| {
            error!(error = err.to_string(), "error serializing batch");
            AmqpError::SerializePayloadError
        })?;

        let properties = BasicProperties::default()
            .with_content_type(ShortString::from(JSON_CONTENT_TYPE))
            .with_delivery_mode(PERSISTENT_DELIVERY_MODE)
            .with_message_id(ShortString::from(Uuid::new_v4().to_string()))
            .with_headers(FieldTable::from(inject_headers(ctx)));

        let confirm = match self
            .channel
            .basic_publish(
                exchange,
                routing_key,
                BasicPublishOptions {
                    immediate: false,
                    mandatory: false,
                },
                &data,
                properties,
            )
            .await
        {
            Err(err) => {
                error!(error = err.to_string(), "error publishing message");
                Err(AmqpError::PublishingError)
            }
            Ok(confirm) => Ok(confirm),
        }?;

        match confirm.await {
            Ok(confirmation) if confirmation.is_nack() => {
                error!(city = %batch.city, "broker refused the message");
                Err(AmqpError::PublishingError)
            }
            Ok(_) => {
                debug!(city = %batch.city, routing_key, "message published");
                Ok(())
            }
            Err(err) => {
                error!(error = err.to_string(), "error waiting for publisher confirm");
                Err(AmqpError::PublishingError)
            }
        }
    }
}
