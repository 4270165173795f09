//! Feature-flag and A/B-test assignment client.
//!
//! A [`Client`] owns an immutable-per-evaluation snapshot of user attributes,
//! a wholesale-replaceable feature set, and the per-context tracking record.
//! Evaluation is deterministic and synchronous: given the same attributes,
//! features and config, every call produces the same assignment, and no call
//! can fail: malformed definitions resolve to "not assigned" results.
//!
//! ```
//! use serde_json::json;
//! use switchyard::Client;
//!
//! let features = r#"{
//!     "checkout-color": {
//!         "defaultValue": "blue",
//!         "rules": [{"condition": {"country": "US"}, "force": "red"}]
//!     }
//! }"#;
//!
//! let client = Client::builder()
//!     .with_features_json(features)
//!     .with_attributes(json!({"id": "user-1", "country": "US"}))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(client.get_feature("checkout-color").value, json!("red"));
//! ```

pub mod experiment;
pub mod feature;
pub mod logger;
pub mod source;
pub mod sticky;
pub mod track;

mod resolver;
mod runner;

pub use switchyard_evaluation as evaluation;

pub use experiment::{Experiment, ExperimentResult, ExperimentStatus, Filter, VariationMeta};
pub use feature::{
    Feature, FeatureResult, FeatureResultSource, FeatureRule, feature_map_from_json,
};
pub use logger::{LogLevel, Logger, NoopLogger, StderrLogger};
pub use source::{FeatureSource, FetchError, StaticFeatureSource};
pub use sticky::{InMemoryStickyBucketService, StickyAssignmentDoc, StickyBucketService};
pub use track::{TrackingCallback, TrackingError, ViewedExperiment};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Boundary configuration errors. Evaluation itself never fails; only
/// constructing a client from malformed input does, and it does so fast.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Invalid feature definitions: {0}")]
    InvalidFeatures(#[from] serde_json::Error),
}

/// Evaluator context: attributes, features, overrides and the tracking
/// record, owned exclusively by this instance.
pub struct Client {
    pub(crate) enabled: bool,
    pub(crate) qa_mode: bool,
    pub(crate) attributes: Value,
    pub(crate) url: Option<Url>,
    pub(crate) features: ArcSwap<HashMap<String, Feature>>,
    pub(crate) forced_variations: HashMap<String, i32>,
    pub(crate) forced_features: HashMap<String, Value>,
    pub(crate) tracking: Option<Box<dyn TrackingCallback>>,
    pub(crate) logger: Box<dyn Logger>,
    pub(crate) sticky: Option<Box<dyn StickyBucketService>>,
    pub(crate) tracks: Mutex<HashMap<String, ViewedExperiment>>,
}

impl Client {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Whether the feature resolves to a truthy value for this context.
    pub fn is_on(&self, key: &str) -> bool {
        self.get_feature(key).on
    }

    pub fn is_off(&self, key: &str) -> bool {
        self.get_feature(key).off
    }

    /// Resolve a feature value, substituting `fallback` when the feature is
    /// unknown or resolves to null.
    pub fn get_value(&self, key: &str, fallback: Value) -> Value {
        let result = self.get_feature(key);
        if result.value.is_null() {
            fallback
        } else {
            result.value
        }
    }

    /// Run a standalone experiment against the current context.
    pub fn run(&self, experiment: &Experiment) -> ExperimentResult {
        self.run_internal(experiment, None)
    }

    pub fn attributes(&self) -> &Value {
        &self.attributes
    }

    /// Replace the attribute snapshot wholesale.
    pub fn set_attributes(&mut self, attributes: Value) {
        self.attributes = attributes;
    }

    /// Replace the request URL used for querystring overrides.
    pub fn set_url(&mut self, url: &str) -> Result<(), ClientError> {
        let parsed = Url::parse(url).map_err(|source| ClientError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        self.url = Some(parsed);
        Ok(())
    }

    /// Current feature set snapshot.
    pub fn features(&self) -> Arc<HashMap<String, Feature>> {
        self.features.load_full()
    }

    /// Install a feature set. Replace-all semantics via atomic swap: an
    /// in-flight evaluation keeps reading the snapshot it started with.
    pub fn set_features(&self, features: HashMap<String, Feature>) {
        self.features.store(Arc::new(features));
    }

    /// Fetch a full feature map from a source and install it.
    pub fn load_features(&self, source: &dyn FeatureSource) -> Result<(), FetchError> {
        let features = source.fetch()?;
        self.set_features(features);
        Ok(())
    }

    /// Force a variation for an experiment key, ahead of hash bucketing.
    pub fn set_forced_variation(&mut self, key: impl Into<String>, variation: i32) {
        self.forced_variations.insert(key.into(), variation);
    }

    pub fn clear_forced_variation(&mut self, key: &str) {
        self.forced_variations.remove(key);
    }

    /// Snapshot of the tracking record: at most one entry per experiment
    /// key, the most recent result winning.
    pub fn viewed_experiments(&self) -> Vec<ViewedExperiment> {
        self.tracks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .values()
            .cloned()
            .collect()
    }
}

/// Builder for [`Client`]. Parsing of the URL and of feature JSON happens in
/// [`ClientBuilder::build`] so misconfiguration fails fast at the boundary.
pub struct ClientBuilder {
    enabled: bool,
    qa_mode: bool,
    attributes: Value,
    url: Option<String>,
    features: HashMap<String, Feature>,
    features_json: Option<String>,
    forced_variations: HashMap<String, i32>,
    forced_features: HashMap<String, Value>,
    tracking: Option<Box<dyn TrackingCallback>>,
    logger: Box<dyn Logger>,
    sticky: Option<Box<dyn StickyBucketService>>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            enabled: true,
            qa_mode: false,
            attributes: Value::Object(Default::default()),
            url: None,
            features: HashMap::new(),
            features_json: None,
            forced_variations: HashMap::new(),
            forced_features: HashMap::new(),
            tracking: None,
            logger: Box::new(NoopLogger),
            sticky: None,
        }
    }

    /// Globally enable or disable assignment (disabled clients abort every
    /// experiment).
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// QA mode short-circuits real bucketing for verification runs.
    pub fn with_qa_mode(mut self, qa_mode: bool) -> Self {
        self.qa_mode = qa_mode;
        self
    }

    pub fn with_attributes(mut self, attributes: Value) -> Self {
        self.attributes = attributes;
        self
    }

    /// The current request URL, parsed for querystring overrides. Always
    /// passed explicitly; ambient process state is never read.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_features(mut self, features: HashMap<String, Feature>) -> Self {
        self.features = features;
        self
    }

    /// Feature definitions in their JSON wire form.
    pub fn with_features_json(mut self, json: impl Into<String>) -> Self {
        self.features_json = Some(json.into());
        self
    }

    pub fn with_forced_variations(mut self, forced: HashMap<String, i32>) -> Self {
        self.forced_variations = forced;
        self
    }

    /// Force feature values verbatim, bypassing all rules.
    pub fn with_forced_features(mut self, forced: HashMap<String, Value>) -> Self {
        self.forced_features = forced;
        self
    }

    pub fn with_tracking_callback(mut self, callback: impl TrackingCallback + 'static) -> Self {
        self.tracking = Some(Box::new(callback));
        self
    }

    pub fn with_logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Box::new(logger);
        self
    }

    pub fn with_sticky_bucket_service(
        mut self,
        service: impl StickyBucketService + 'static,
    ) -> Self {
        self.sticky = Some(Box::new(service));
        self
    }

    pub fn build(self) -> Result<Client, ClientError> {
        let url = match self.url {
            Some(raw) => Some(Url::parse(&raw).map_err(|source| ClientError::InvalidUrl {
                url: raw.clone(),
                source,
            })?),
            None => None,
        };

        let mut features = self.features;
        if let Some(json) = self.features_json {
            features.extend(feature_map_from_json(&json)?);
        }

        Ok(Client {
            enabled: self.enabled,
            qa_mode: self.qa_mode,
            attributes: self.attributes,
            url,
            features: ArcSwap::from_pointee(features),
            forced_variations: self.forced_variations,
            forced_features: self.forced_features,
            tracking: self.tracking,
            logger: self.logger,
            sticky: self.sticky,
            tracks: Mutex::new(HashMap::new()),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
