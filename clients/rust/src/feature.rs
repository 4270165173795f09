//! Feature definitions and resolution results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use switchyard_evaluation::bucket::{BucketRange, Namespace};
use switchyard_evaluation::value::is_truthy;

use crate::experiment::{Experiment, ExperimentResult, Filter, VariationMeta};

/// A feature: a default value plus an ordered rule list. The first rule
/// that matches and is not skipped decides the feature's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Feature {
    pub default_value: Option<Value>,
    pub rules: Vec<FeatureRule>,
}

impl Feature {
    pub fn new(default_value: Value) -> Self {
        Self {
            default_value: Some(default_value),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: FeatureRule) -> Self {
        self.rules.push(rule);
        self
    }
}

/// One targeting rule of a feature. A rule either forces a value (optionally
/// behind a rollout) or describes an experiment via `variations`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureRule {
    pub id: Option<String>,
    pub condition: Option<Value>,
    pub coverage: Option<f64>,
    pub force: Option<Value>,
    pub variations: Option<Vec<Value>>,
    /// Tracking key for the derived experiment; defaults to the feature key.
    pub key: Option<String>,
    pub weights: Option<Vec<f64>>,
    pub namespace: Option<Namespace>,
    pub hash_attribute: Option<String>,
    pub fallback_attribute: Option<String>,
    pub hash_version: Option<i32>,
    /// Rollout range for force rules; takes precedence over `coverage`.
    pub range: Option<BucketRange>,
    /// Pre-computed bucket ranges for experiment rules.
    pub ranges: Option<Vec<BucketRange>>,
    pub meta: Option<Vec<VariationMeta>>,
    pub filters: Option<Vec<Filter>>,
    pub seed: Option<String>,
    pub name: Option<String>,
    pub phase: Option<String>,
    pub disable_sticky_bucketing: bool,
    pub bucket_version: Option<i32>,
    pub min_bucket_version: Option<i32>,
}

impl FeatureRule {
    /// Convert an experiment rule into a runnable [`Experiment`], keyed by
    /// the rule's tracking key or the owning feature's key. Returns `None`
    /// for rules without variations.
    pub fn to_experiment(&self, feature_key: &str) -> Option<Experiment> {
        let variations = self.variations.clone()?;
        Some(Experiment {
            key: self.key.clone().unwrap_or_else(|| feature_key.to_string()),
            variations,
            weights: self.weights.clone(),
            coverage: self.coverage,
            namespace: self.namespace.clone(),
            ranges: self.ranges.clone(),
            filters: self.filters.clone(),
            hash_attribute: self.hash_attribute.clone(),
            fallback_attribute: self.fallback_attribute.clone(),
            hash_version: self.hash_version,
            seed: self.seed.clone(),
            meta: self.meta.clone(),
            name: self.name.clone(),
            phase: self.phase.clone(),
            disable_sticky_bucketing: self.disable_sticky_bucketing,
            bucket_version: self.bucket_version,
            min_bucket_version: self.min_bucket_version,
            ..Experiment::default()
        })
    }
}

/// Where a resolved feature value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FeatureResultSource {
    UnknownFeature,
    DefaultValue,
    Force,
    Experiment,
}

/// Outcome of resolving one feature. Always well-formed: unknown keys and
/// aborted pipelines yield a null value with a clear source tag rather than
/// an error.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureResult {
    pub value: Value,
    pub on: bool,
    pub off: bool,
    pub source: FeatureResultSource,
    pub experiment: Option<Experiment>,
    pub experiment_result: Option<ExperimentResult>,
    pub rule_id: Option<String>,
}

impl FeatureResult {
    pub(crate) fn new(
        value: Value,
        source: FeatureResultSource,
        experiment: Option<Experiment>,
        experiment_result: Option<ExperimentResult>,
        rule_id: Option<String>,
    ) -> Self {
        let on = is_truthy(&value);
        Self {
            value,
            on,
            off: !on,
            source,
            experiment,
            experiment_result,
            rule_id,
        }
    }
}

/// Parse a feature map from its JSON wire form (feature key → definition).
pub fn feature_map_from_json(json: &str) -> Result<HashMap<String, Feature>, serde_json::Error> {
    serde_json::from_str(json)
}
