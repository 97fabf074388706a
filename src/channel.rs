// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # AMQP Channel Management
//!
//! Opens the single connection and channel the consumer or the publisher works
//! on, and closes them again on shutdown.

use crate::{config::Configs, errors::AmqpError};
use lapin::{types::LongString, Channel, Connection, ConnectionProperties};
use std::sync::Arc;
use tracing::{debug, error};

/// Reply code sent with a normal channel or connection close.
const AMQP_REPLY_SUCCESS: u16 = 200;

/// Connects to RabbitMQ and creates a channel on the new connection.
///
/// The connection is named after `cfg.app_name` so it can be told apart in
/// the management UI. When the channel cannot be created the connection is
/// closed before returning.
///
/// # Parameters
/// * `cfg` - Configuration holding the AMQP url and the application name
///
/// # Returns
/// * `Result<(Arc<Connection>, Arc<Channel>), AmqpError>` -
///   The connection and its channel, `ConnectionError` when the broker is
///   unreachable or `ChannelError` when the channel could not be opened.
///
/// # Example
/// ```ignore
/// let (conn, channel) = new_amqp_channel(&cfg).await?;
/// ```
pub async fn new_amqp_channel(cfg: &Configs) -> Result<(Arc<Connection>, Arc<Channel>), AmqpError> {
    debug!("creating amqp connection...");
    let options = ConnectionProperties::default()
        .with_connection_name(LongString::from(cfg.app_name.clone()));

    let conn = match Connection::connect(&cfg.amqp_url, options).await {
        Ok(c) => Ok(c),
        Err(err) => {
            error!(error = err.to_string(), "failure to connect");
            Err(AmqpError::ConnectionError)
        }
    }?;
    debug!("amqp connected");

    debug!("creating amqp channel...");
    match conn.create_channel().await {
        Ok(c) => {
            debug!("channel created");
            Ok((Arc::new(conn), Arc::new(c)))
        }
        Err(err) => {
            error!(error = err.to_string(), "error to create the channel");
            if let Err(err) = close_connection(&conn).await {
                error!(error = err.to_string(), "failure to close the connection");
            }
            Err(AmqpError::ChannelError)
        }
    }
}

pub async fn close_channel(channel: &Channel) -> Result<(), AmqpError> {
    channel
        .close(AMQP_REPLY_SUCCESS, "OK")
        .await
        .map_err(|err| AmqpError::CloseError(format!("channel: {err}")))
}

pub async fn close_connection(conn: &Connection) -> Result<(), AmqpError> {
    conn.close(AMQP_REPLY_SUCCESS, "OK")
        .await
        .map_err(|err| AmqpError::CloseError(format!("connection: {err}")))
}
