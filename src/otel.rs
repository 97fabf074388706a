// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Trace Context Propagation
//!
//! Carries the OpenTelemetry context across the broker inside AMQP headers.
//! The publisher injects it, the consumer extracts it and opens one consumer
//! span per delivery. Without a global tracer provider everything here is a
//! no-op.

use lapin::{
    protocol::basic::AMQPProperties,
    types::{AMQPValue, ShortString},
};
use opentelemetry::{
    global::{self, BoxedSpan, BoxedTracer},
    propagation::{Extractor, Injector},
    trace::{SpanKind, Tracer},
    Context, KeyValue,
};
use std::{borrow::Cow, collections::BTreeMap};
use tracing::error;

pub(crate) const TRACER_NAME: &str = "city-streets";

/// Reads and writes trace context entries in an AMQP header table.
pub(crate) struct AmqpHeaderPropagator<'a> {
    headers: &'a mut BTreeMap<ShortString, AMQPValue>,
}

impl<'a> AmqpHeaderPropagator<'a> {
    pub(crate) fn new(headers: &'a mut BTreeMap<ShortString, AMQPValue>) -> Self {
        Self { headers }
    }
}

impl Injector for AmqpHeaderPropagator<'_> {
    fn set(&mut self, key: &str, value: String) {
        self.headers.insert(
            key.to_lowercase().into(),
            AMQPValue::LongString(value.into()),
        );
    }
}

impl Extractor for AmqpHeaderPropagator<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.headers.get(key).and_then(|header_value| {
            if let AMQPValue::LongString(header_value) = header_value {
                std::str::from_utf8(header_value.as_bytes())
                    .map_err(|e| error!("Error decoding header value {:?}", e))
                    .ok()
            } else {
                None
            }
        })
    }

    fn keys(&self) -> Vec<&str> {
        self.headers.keys().map(|header| header.as_str()).collect()
    }
}

/// Writes the context of `ctx` into a fresh header table.
pub(crate) fn inject_headers(ctx: &Context) -> BTreeMap<ShortString, AMQPValue> {
    let mut headers = BTreeMap::default();
    global::get_text_map_propagator(|propagator| {
        propagator.inject_context(ctx, &mut AmqpHeaderPropagator::new(&mut headers))
    });
    headers
}

/// Opens a consumer span for a delivery from `queue`, parented on the context
/// found in its headers.
pub(crate) fn new_span(
    props: &AMQPProperties,
    tracer: &BoxedTracer,
    queue: &str,
) -> (Context, BoxedSpan) {
    let mut headers = props
        .headers()
        .clone()
        .map(|table| table.inner().clone())
        .unwrap_or_default();

    let ctx = global::get_text_map_propagator(|propagator| {
        propagator.extract(&AmqpHeaderPropagator::new(&mut headers))
    });

    let span = tracer
        .span_builder(Cow::from(format!("{queue} process")))
        .with_kind(SpanKind::Consumer)
        .with_attributes(vec![
            KeyValue::new("messaging.system", "rabbitmq"),
            KeyValue::new("messaging.destination.name", queue.to_owned()),
        ])
        .start_with_context(tracer, &ctx);

    (ctx, span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lapin::types::LongString;

    #[test]
    fn injector_lowercases_keys() {
        let mut headers = BTreeMap::new();
        AmqpHeaderPropagator::new(&mut headers).set("TraceParent", "00-abc".to_owned());

        assert_eq!(
            headers.get(&ShortString::from("traceparent")),
            Some(&AMQPValue::LongString(LongString::from("00-abc")))
        );
    }

    #[test]
    fn extractor_only_reads_long_strings() {
        let mut headers = BTreeMap::new();
        headers.insert(
            ShortString::from("traceparent"),
            AMQPValue::LongString(LongString::from("00-abc")),
        );
        headers.insert(ShortString::from("count"), AMQPValue::LongInt(3));

        let propagator = AmqpHeaderPropagator::new(&mut headers);
        assert_eq!(propagator.get("traceparent"), Some("00-abc"));
        assert_eq!(propagator.get("count"), None);
        assert_eq!(propagator.get("missing"), None);

        let mut keys = propagator.keys();
        keys.sort();
        assert_eq!(keys, vec!["count", "traceparent"]);
    }
}
