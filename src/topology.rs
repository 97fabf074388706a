// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # RabbitMQ Topology Management
//!
//! Declares exchanges, queues and the bindings between them. Declarations are
//! idempotent on the broker side: re-declaring with the same flags is a no-op,
//! re-declaring with different flags (durability, type) is refused by the
//! broker and surfaces here as an error.
//!
//! The streets pipeline uses one layout, built by `streets_topology`: a durable
//! direct exchange and a durable queue bound under the queue's own name.

use crate::{
    errors::AmqpError,
    exchange::ExchangeDefinition,
    queue::{QueueBinding, QueueDefinition},
};
use async_trait::async_trait;
use lapin::{options::QueueBindOptions, types::FieldTable, Channel};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Interface for registering topology items and installing them.
#[async_trait]
pub trait Topology {
    fn exchange(self, def: ExchangeDefinition) -> Self;

    fn queue(self, def: QueueDefinition) -> Self;

    fn queue_binding(self, binding: QueueBinding) -> Self;

    /// Declares exchanges, then queues, then bindings.
    async fn install(&self) -> Result<(), AmqpError>;
}

pub struct AmqpTopology {
    channel: Arc<Channel>,
    pub(crate) queues: Vec<QueueDefinition>,
    pub(crate) queues_binding: Vec<QueueBinding>,
    pub(crate) exchanges: Vec<ExchangeDefinition>,
}

impl AmqpTopology {
    pub fn new(channel: Arc<Channel>) -> AmqpTopology {
        AmqpTopology {
            channel,
            queues: vec![],
            queues_binding: vec![],
            exchanges: vec![],
        }
    }
}

/// Registers the streets layout on `topology`.
pub fn streets_topology<T: Topology>(topology: T, exchange_name: &str, queue_name: &str) -> T {
    topology
        .exchange(ExchangeDefinition::new(exchange_name).direct().durable())
        .queue(QueueDefinition::new(queue_name).durable())
        .queue_binding(
            QueueBinding::new(queue_name)
                .exchange(exchange_name)
                .routing_key(queue_name),
        )
}

/// Declares the durable exchange, the durable queue and their binding.
pub async fn declare_topology(
    channel: Arc<Channel>,
    exchange_name: &str,
    queue_name: &str,
) -> Result<(), AmqpError> {
    streets_topology(AmqpTopology::new(channel), exchange_name, queue_name)
        .install()
        .await?;

    info!(
        exchange = exchange_name,
        queue = queue_name,
        "topology declared"
    );
    Ok(())
}

#[async_trait]
impl Topology for AmqpTopology {
    fn exchange(mut self, def: ExchangeDefinition) -> Self {
        self.exchanges.push(def);
        self
    }

    fn queue(mut self, def: QueueDefinition) -> Self {
        self.queues.push(def);
        self
    }

    fn queue_binding(mut self, binding: QueueBinding) -> Self {
        self.queues_binding.push(binding);
        self
    }

    async fn install(&self) -> Result<(), AmqpError> {
        self.install_exchange().await?;
        self.install_queue().await?;
        self.binding_queues().await
    }
}

impl AmqpTopology {
    async fn install_exchange(&self) -> Result<(), AmqpError> {
        for exch in &self.exchanges {
            debug!("creating exchange: {}", exch.name);

            match self
                .channel
                .exchange_declare(
                    &exch.name,
                    exch.kind.clone(),
                    exch.declare_options(),
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = %exch.name,
                        "error to declare the exchange"
                    );
                    Err(AmqpError::DeclareExchangeError(exch.name.clone()))
                }
                _ => Ok(()),
            }?;

            debug!("exchange: {} was created", exch.name);
        }

        Ok(())
    }

    async fn install_queue(&self) -> Result<(), AmqpError> {
        for def in &self.queues {
            debug!("creating queue: {}", def.name);

            match self
                .channel
                .queue_declare(&def.name, def.declare_options(), FieldTable::default())
                .await
            {
                Err(err) => {
                    error!(
                        error = err.to_string(),
                        name = %def.name,
                        "error to declare the queue"
                    );
                    Err(AmqpError::DeclareQueueError(def.name.clone()))
                }
                _ => {
                    debug!("queue: {} was created", def.name);
                    Ok(())
                }
            }?;
        }

        Ok(())
    }

    async fn binding_queues(&self) -> Result<(), AmqpError> {
        for binding in &self.queues_binding {
            debug!(
                "binding queue: {} to the exchange: {} with the key: {}",
                binding.queue_name, binding.exchange_name, binding.routing_key
            );

            match self
                .channel
                .queue_bind(
                    &binding.queue_name,
                    &binding.exchange_name,
                    &binding.routing_key,
                    QueueBindOptions { nowait: false },
                    FieldTable::default(),
                )
                .await
            {
                Err(err) => {
                    error!(error = err.to_string(), "error to bind queue to exchange");

                    Err(AmqpError::BindingExchangeToQueueError(
                        binding.exchange_name.clone(),
                        binding.queue_name.clone(),
                    ))
                }
                _ => Ok(()),
            }?;
        }

        debug!("queue was bounded");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::ExchangeKind;

    /// Records registrations without a broker.
    #[derive(Default)]
    struct Recorder {
        exchanges: Vec<ExchangeDefinition>,
        queues: Vec<QueueDefinition>,
        bindings: Vec<QueueBinding>,
    }

    #[async_trait]
    impl Topology for Recorder {
        fn exchange(mut self, def: ExchangeDefinition) -> Self {
            self.exchanges.push(def);
            self
        }

        fn queue(mut self, def: QueueDefinition) -> Self {
            self.queues.push(def);
            self
        }

        fn queue_binding(mut self, binding: QueueBinding) -> Self {
            self.bindings.push(binding);
            self
        }

        async fn install(&self) -> Result<(), AmqpError> {
            Ok(())
        }
    }

    #[test]
    fn streets_layout_is_durable_direct_bound_by_queue_name() {
        let rec = streets_topology(Recorder::default(), "streets_exchange", "streets_queue");

        assert_eq!(rec.exchanges.len(), 1);
        assert_eq!(rec.exchanges[0].name, "streets_exchange");
        assert!(matches!(rec.exchanges[0].kind, ExchangeKind::Direct));
        assert!(rec.exchanges[0].durable);

        assert_eq!(rec.queues.len(), 1);
        assert_eq!(rec.queues[0].name, "streets_queue");
        let opts = rec.queues[0].declare_options();
        assert!(opts.durable);
        assert!(!opts.exclusive);
        assert!(!opts.auto_delete);

        assert_eq!(
            rec.bindings,
            vec![QueueBinding::new("streets_queue")
                .exchange("streets_exchange")
                .routing_key("streets_queue")]
        );
    }
}
