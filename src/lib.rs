// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

mod otel;

pub mod applier;
pub mod bootstrap;
pub mod channel;
pub mod config;
pub mod consumer;
pub mod dispatcher;
pub mod errors;
pub mod exchange;
pub mod lifecycle;
pub mod model;
pub mod publisher;
pub mod queue;
pub mod service;
pub mod source;
pub mod store;
pub mod topology;

pub use service::{start_consumer, start_publisher, ConsumerService};
