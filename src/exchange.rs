// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Exchange Definitions
//!
//! Builder for the exchanges declared at startup.

use lapin::{options::ExchangeDeclareOptions, ExchangeKind};

/// Definition of a RabbitMQ exchange with its declaration flags.
///
/// Defaults to a non-durable `direct` exchange.
#[derive(Debug, Clone)]
pub struct ExchangeDefinition {
    pub(crate) name: String,
    pub(crate) kind: ExchangeKind,
    pub(crate) durable: bool,
}

impl ExchangeDefinition {
    pub fn new(name: &str) -> ExchangeDefinition {
        ExchangeDefinition {
            name: name.to_owned(),
            kind: ExchangeKind::Direct,
            durable: false,
        }
    }

    /// Sets the exchange type to Direct.
    pub fn direct(mut self) -> Self {
        self.kind = ExchangeKind::Direct;
        self
    }

    /// Makes the exchange durable, persisting across broker restarts.
    pub fn durable(mut self) -> Self {
        self.durable = true;
        self
    }

    pub(crate) fn declare_options(&self) -> ExchangeDeclareOptions {
        ExchangeDeclareOptions {
            passive: false,
            durable: self.durable,
            auto_delete: false,
            internal: false,
            nowait: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_transient_direct() {
        let def = ExchangeDefinition::new("streets");
        assert!(matches!(def.kind, ExchangeKind::Direct));

        let opts = def.declare_options();
        assert!(!opts.durable);
        assert!(!opts.passive);
        assert!(!opts.auto_delete);
        assert!(!opts.internal);
    }

    #[test]
    fn durable_flag_reaches_declare_options() {
        let def = ExchangeDefinition::new("streets").direct().durable();
        assert!(matches!(def.kind, ExchangeKind::Direct));

        let opts = def.declare_options();
        assert!(opts.durable);
        assert!(!opts.auto_delete);
        assert!(!opts.passive);
    }
}
