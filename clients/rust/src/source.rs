//! Feature-definition sources.
//!
//! The client never fetches anything itself: a [`FeatureSource`] hands it a
//! complete feature map which is installed wholesale (replace-all, never an
//! incremental patch). Remote HTTP/cache/decryption pipelines implement this
//! trait at the boundary and surface their failures through the typed
//! [`FetchError`] taxonomy; the evaluation core is never exposed to them.

use std::collections::HashMap;

use thiserror::Error;

use crate::feature::Feature;

/// Errors a feature-definition source can surface.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("No response received from the feature endpoint")]
    NoResponse,

    #[error("Invalid response payload: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected HTTP status: {0}")]
    HttpStatus(u16),

    #[error("Unauthorized: the client key was rejected")]
    Unauthorized,

    #[error("Forbidden: the client key lacks access to this endpoint")]
    Forbidden,

    #[error("Feature endpoint not found")]
    NotFound,

    #[error("Feature endpoint server error: {0}")]
    ServerError(u16),

    #[error("{0}")]
    Unknown(String),
}

/// Supplier of a complete feature map.
pub trait FeatureSource: Send + Sync {
    fn fetch(&self) -> Result<HashMap<String, Feature>, FetchError>;
}

/// A source backed by an in-memory map, for tests and static hosts.
#[derive(Default)]
pub struct StaticFeatureSource {
    features: HashMap<String, Feature>,
}

impl StaticFeatureSource {
    pub fn new(features: HashMap<String, Feature>) -> Self {
        Self { features }
    }
}

impl FeatureSource for StaticFeatureSource {
    fn fetch(&self) -> Result<HashMap<String, Feature>, FetchError> {
        Ok(self.features.clone())
    }
}
