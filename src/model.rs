// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Wire Model
//!
//! The JSON body carried by every message:
//!
//! ```json
//! { "city": "haifa", "streets": [ { "streetId": 1, "name": "Herzl" } ] }
//! ```
//!
//! `StreetsBatch` is what publishers produce. Consumers decode into
//! `RawStreetsBatch` first so a missing `city` or `streets` field can be told
//! apart from an empty one.

use crate::errors::ApplyError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Street {
    #[serde(rename = "streetId")]
    pub street_id: i64,
    pub name: String,
}

/// One message worth of streets, all belonging to the same city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreetsBatch {
    pub city: String,
    pub streets: Vec<Street>,
}

/// Collections under this prefix belong to the MongoDB server.
const RESERVED_COLLECTION_PREFIX: &str = "system.";

#[derive(Debug, Deserialize)]
struct RawStreetsBatch {
    city: Option<String>,
    streets: Option<Vec<Street>>,
}

impl StreetsBatch {
    pub fn new(city: impl Into<String>, streets: Vec<Street>) -> Self {
        StreetsBatch {
            city: city.into(),
            streets,
        }
    }

    /// Decodes and validates a message body.
    ///
    /// An empty `streets` array is valid. An absent or `null` one is not, and
    /// neither is an absent or empty `city`. The city names a MongoDB
    /// collection, so it may not contain `$` or NUL nor start with `system.`.
    pub fn decode(payload: &[u8]) -> Result<Self, ApplyError> {
        let raw: RawStreetsBatch = serde_json::from_slice(payload)
            .map_err(|err| ApplyError::Validation(format!("malformed json: {err}")))?;

        let city = match raw.city {
            Some(city) if !city.is_empty() => city,
            _ => return Err(ApplyError::Validation("missing city".to_owned())),
        };

        if city.contains(['$', '\0']) || city.starts_with(RESERVED_COLLECTION_PREFIX) {
            return Err(ApplyError::Validation(format!(
                "city {city:?} is not a valid collection name"
            )));
        }

        let Some(streets) = raw.streets else {
            return Err(ApplyError::Validation(format!(
                "missing streets for city {city}"
            )));
        };

        Ok(StreetsBatch { city, streets })
    }

    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
