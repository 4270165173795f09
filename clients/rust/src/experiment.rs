//! Experiment definitions and assignment results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchyard_evaluation::bucket::{BucketRange, Namespace};

/// Lifecycle status of an experiment. Anything other than `Running` is
/// treated as inactive by the runner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperimentStatus {
    Draft,
    #[default]
    Running,
    Stopped,
}

/// Display metadata for one variation. The key, when present, is used as
/// the reported variation id in results and sticky-bucket documents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VariationMeta {
    pub key: Option<String>,
    pub name: Option<String>,
    pub passthrough: bool,
}

/// A hash-space filter: the user's hash must land in one of the ranges for
/// the experiment to proceed. Several filters combine with AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    pub seed: String,
    pub ranges: Vec<BucketRange>,
    pub hash_version: i32,
    pub attribute: String,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            seed: String::new(),
            ranges: Vec::new(),
            hash_version: 2,
            attribute: "id".to_string(),
        }
    }
}

/// A single experiment definition.
///
/// Only `key` and `variations` are required; every optional field has the
/// documented default materialized by [`Experiment::new`] /
/// `Default::default` rather than checked ad hoc at evaluation sites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Experiment {
    /// Unique id; also the default seed and tracking key.
    pub key: String,
    /// Variation values; at least 2 are required for random assignment.
    pub variations: Vec<Value>,
    /// Per-variation weights summing to ~1; discarded otherwise.
    pub weights: Option<Vec<f64>>,
    /// Fraction of eligible traffic included, clamped to [0, 1].
    pub coverage: Option<f64>,
    /// Targeting condition evaluated against the current attributes.
    pub condition: Option<Value>,
    /// Legacy single-namespace exclusion tuple; ignored when `filters` set.
    pub namespace: Option<Namespace>,
    /// Pre-computed bucket ranges, overriding coverage/weights.
    pub ranges: Option<Vec<BucketRange>>,
    /// Hash-space filters, all of which must pass.
    pub filters: Option<Vec<Filter>>,
    pub active: bool,
    pub status: ExperimentStatus,
    /// Forced variation index, applied after bucketing gates.
    pub force: Option<i32>,
    /// Attribute used for hashing; defaults to `id`.
    pub hash_attribute: Option<String>,
    /// Attribute tried when the hash attribute is empty and sticky
    /// bucketing is configured.
    pub fallback_attribute: Option<String>,
    /// Hashing algorithm version; defaults to 1.
    pub hash_version: Option<i32>,
    /// Hash seed; defaults to the experiment key.
    pub seed: Option<String>,
    pub meta: Option<Vec<VariationMeta>>,
    pub name: Option<String>,
    pub phase: Option<String>,
    pub disable_sticky_bucketing: bool,
    pub bucket_version: Option<i32>,
    pub min_bucket_version: Option<i32>,
}

impl Default for Experiment {
    fn default() -> Self {
        Self {
            key: String::new(),
            variations: Vec::new(),
            weights: None,
            coverage: None,
            condition: None,
            namespace: None,
            ranges: None,
            filters: None,
            active: true,
            status: ExperimentStatus::Running,
            force: None,
            hash_attribute: None,
            fallback_attribute: None,
            hash_version: None,
            seed: None,
            meta: None,
            name: None,
            phase: None,
            disable_sticky_bucketing: false,
            bucket_version: None,
            min_bucket_version: None,
        }
    }
}

impl Experiment {
    pub fn new(key: impl Into<String>, variations: Vec<Value>) -> Self {
        Self {
            key: key.into(),
            variations,
            ..Self::default()
        }
    }

    pub fn with_weights(mut self, weights: Vec<f64>) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn with_coverage(mut self, coverage: f64) -> Self {
        self.coverage = Some(coverage);
        self
    }

    pub fn with_condition(mut self, condition: Value) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_namespace(mut self, namespace: Namespace) -> Self {
        self.namespace = Some(namespace);
        self
    }

    pub fn with_filters(mut self, filters: Vec<Filter>) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn with_force(mut self, variation: i32) -> Self {
        self.force = Some(variation);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn with_status(mut self, status: ExperimentStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_hash_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.hash_attribute = Some(attribute.into());
        self
    }

    pub fn with_hash_version(mut self, version: i32) -> Self {
        self.hash_version = Some(version);
        self
    }

    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    pub fn with_meta(mut self, meta: Vec<VariationMeta>) -> Self {
        self.meta = Some(meta);
        self
    }
}

/// Outcome of running one experiment for the current context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentResult {
    /// True only when every gate passed and a variation was organically
    /// assigned; overrides and forced variations report false.
    pub in_experiment: bool,
    /// Assigned variation index; -1 is normalized to 0 with
    /// `in_experiment == false`.
    pub variation_id: i32,
    /// The assigned variation's value (null when the experiment has no
    /// variations).
    pub value: Value,
    /// Whether hash-based bucketing produced the assignment.
    pub hash_used: bool,
    pub hash_attribute: String,
    pub hash_value: String,
    /// Feature key when this run came from a feature rule.
    pub feature_id: Option<String>,
    /// Reported variation id: the variation's meta key, else its index.
    pub key: String,
    pub name: Option<String>,
    /// Raw hash number used for bucketing, for traceability.
    pub bucket: Option<f64>,
    /// Signals the feature resolver to fall through to the next rule.
    pub passthrough: bool,
    pub sticky_bucket_used: bool,
}
