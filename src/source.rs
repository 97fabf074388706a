// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Street Sources
//!
//! Where a publisher gets the streets of a city from.

use crate::{errors::SourceError, model::Street};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::io::AsyncReadExt;
use tracing::debug;

#[async_trait]
pub trait StreetSource: Send + Sync {
    async fn streets_in_city(&self, city: &str) -> Result<Vec<Street>, SourceError>;
}

/// Reads a JSON array of `{ "streetId", "name" }` objects from a file, or
/// from stdin when no path is given. The same list is returned for any city.
pub struct JsonStreetSource {
    path: Option<PathBuf>,
}

impl JsonStreetSource {
    pub fn new(path: Option<PathBuf>) -> Self {
        JsonStreetSource { path }
    }
}

#[async_trait]
impl StreetSource for JsonStreetSource {
    async fn streets_in_city(&self, city: &str) -> Result<Vec<Street>, SourceError> {
        let raw = match &self.path {
            Some(path) => {
                debug!(city, path = %path.display(), "reading streets file");
                tokio::fs::read(path).await?
            }
            None => {
                debug!(city, "reading streets from stdin");
                let mut buf = Vec::new();
                tokio::io::stdin().read_to_end(&mut buf).await?;
                buf
            }
        };

        parse_streets(&raw)
    }
}

pub fn parse_streets(raw: &[u8]) -> Result<Vec<Street>, SourceError> {
    Ok(serde_json::from_slice(raw)?)
}
