//! The experiment runner: a single linear pass of early-exit gates that
//! turns one experiment definition plus the current context into an
//! assignment outcome.

use std::collections::HashMap;

use serde_json::{Value, json};
use switchyard_evaluation::bucket::{BucketRange, choose_variation, get_bucket_ranges, in_namespace, in_range};
use switchyard_evaluation::condition::eval_condition;
use switchyard_evaluation::hash::hash;
use switchyard_evaluation::url::get_query_string_override;
use switchyard_evaluation::value::{get_path, stringify};

use crate::Client;
use crate::experiment::{Experiment, ExperimentResult, ExperimentStatus, Filter};
use crate::logger::LogLevel;
use crate::sticky::{StickyAssignmentDoc, experiment_bucket_key};
use crate::track::ViewedExperiment;

/// Result of consulting the sticky-bucket store for an experiment.
enum StickyLookup {
    /// No usable stored assignment; bucket normally.
    Missing,
    /// The user holds an assignment from a version below `minBucketVersion`.
    Blocked,
    /// A stored assignment maps to this valid variation index.
    Found(i32),
}

impl Client {
    pub(crate) fn run_internal(
        &self,
        experiment: &Experiment,
        feature_id: Option<&str>,
    ) -> ExperimentResult {
        let key = &experiment.key;

        // 1. Random assignment needs at least two arms.
        if experiment.variations.len() < 2 {
            self.log_debug("experiment needs at least 2 variations", &json!({"experiment": key}));
            return self.experiment_result(experiment, -1, false, feature_id, None, false);
        }

        // 2. Evaluator globally disabled.
        if !self.enabled {
            self.log_debug("client disabled, skipping experiment", &json!({"experiment": key}));
            return self.experiment_result(experiment, -1, false, feature_id, None, false);
        }

        // 3. Resolve the hashing identity up front; override results below
        // still report it.
        let (hash_attribute, hash_value) = self.experiment_hash_identity(experiment);

        // 4. Querystring override bypasses the remaining gates but is not an
        // organic assignment: no hash, no tracking.
        if let Some(url) = &self.url
            && let Some(forced) =
                get_query_string_override(key, url.as_str(), experiment.variations.len())
        {
            self.log_debug("querystring override", &json!({"experiment": key, "variation": forced}));
            return self.experiment_result(experiment, forced, false, feature_id, None, false);
        }

        // 5. Context-level forced variations.
        if let Some(&forced) = self.forced_variations.get(key) {
            self.log_debug("forced variation", &json!({"experiment": key, "variation": forced}));
            return self.experiment_result(experiment, forced, false, feature_id, None, false);
        }

        // 6. Draft/stopped/inactive experiments never assign.
        if !experiment.active || experiment.status != ExperimentStatus::Running {
            self.log_debug("experiment not active", &json!({"experiment": key}));
            return self.experiment_result(experiment, -1, false, feature_id, None, false);
        }

        // 7. No identity, no hash.
        if hash_value.is_empty() {
            self.log_debug("empty hash attribute", &json!({"experiment": key, "attribute": hash_attribute}));
            return self.experiment_result(experiment, -1, false, feature_id, None, false);
        }

        // Sticky bucket: a stored assignment bypasses the targeting gates so
        // config changes cannot move an already-bucketed user.
        let sticky = self.sticky_bucket_variation(experiment, &hash_attribute, &hash_value);
        let mut sticky_variation = None;
        match sticky {
            StickyLookup::Blocked => {
                self.log_debug("blocked by sticky bucket version", &json!({"experiment": key}));
                return self.experiment_result(experiment, -1, false, feature_id, None, false);
            }
            StickyLookup::Found(variation) => sticky_variation = Some(variation),
            StickyLookup::Missing => {
                // 8. Filters, else the legacy namespace tuple.
                if let Some(filters) = &experiment.filters {
                    if self.is_filtered_out(filters) {
                        self.log_debug("filtered out", &json!({"experiment": key}));
                        return self.experiment_result(experiment, -1, false, feature_id, None, false);
                    }
                } else if let Some(namespace) = &experiment.namespace
                    && !in_namespace(&hash_value, namespace)
                {
                    self.log_debug("outside namespace", &json!({"experiment": key}));
                    return self.experiment_result(experiment, -1, false, feature_id, None, false);
                }

                // 9. Targeting condition.
                if let Some(condition) = &experiment.condition
                    && !eval_condition(&self.attributes, condition)
                {
                    self.log_debug("condition does not match", &json!({"experiment": key}));
                    return self.experiment_result(experiment, -1, false, feature_id, None, false);
                }
            }
        }

        // 10-12. Bucket by hash unless a sticky assignment already decided.
        let (variation, bucket) = match sticky_variation {
            Some(variation) => (variation, None),
            None => {
                let ranges = match &experiment.ranges {
                    Some(ranges) => ranges.clone(),
                    None => get_bucket_ranges(
                        experiment.variations.len(),
                        experiment.coverage.unwrap_or(1.0),
                        experiment.weights.as_deref(),
                    ),
                };
                let seed = experiment.seed.as_deref().unwrap_or(key);
                let Some(n) = hash(seed, &hash_value, experiment.hash_version.unwrap_or(1))
                else {
                    self.log_debug("unknown hash version", &json!({"experiment": key, "version": experiment.hash_version}));
                    return self.experiment_result(experiment, -1, false, feature_id, None, false);
                };
                let chosen = choose_variation(n, &ranges);
                if chosen < 0 {
                    self.log_debug("outside covered range", &json!({"experiment": key, "bucket": n}));
                    return self.experiment_result(experiment, -1, false, feature_id, None, false);
                }
                (chosen, Some(n))
            }
        };

        // 13. An explicit force overrides the computed assignment.
        if let Some(forced) = experiment.force {
            self.log_debug("experiment force", &json!({"experiment": key, "variation": forced}));
            return self.experiment_result(experiment, forced, false, feature_id, None, false);
        }

        // 14. QA mode short-circuits real assignment.
        if self.qa_mode {
            self.log_debug("qa mode", &json!({"experiment": key}));
            return self.experiment_result(experiment, -1, false, feature_id, None, false);
        }

        // 15. Finalize, persist, record and notify.
        let result = self.experiment_result(
            experiment,
            variation,
            true,
            feature_id,
            bucket,
            sticky_variation.is_some(),
        );
        if sticky_variation.is_none() {
            self.save_sticky_assignment(experiment, &hash_attribute, &hash_value, &result);
        }
        self.track(experiment, &result);
        result
    }

    /// Build a result for the given (possibly invalid) variation index.
    ///
    /// An index outside `[0, variations)` reports -1 with a null value and
    /// `in_experiment == false`; a valid index reports its variation value
    /// and meta. `hash_used` stays false for overrides and forces.
    fn experiment_result(
        &self,
        experiment: &Experiment,
        variation_id: i32,
        hash_used: bool,
        feature_id: Option<&str>,
        bucket: Option<f64>,
        sticky_bucket_used: bool,
    ) -> ExperimentResult {
        let (hash_attribute, hash_value) = self.experiment_hash_identity(experiment);
        let in_experiment =
            variation_id >= 0 && (variation_id as usize) < experiment.variations.len();

        let (variation_id, value) = if in_experiment {
            (variation_id, experiment.variations[variation_id as usize].clone())
        } else {
            (-1, Value::Null)
        };

        let meta = if in_experiment {
            experiment
                .meta
                .as_ref()
                .and_then(|meta| meta.get(variation_id as usize))
        } else {
            None
        };
        let key = meta
            .and_then(|m| m.key.clone())
            .unwrap_or_else(|| if in_experiment { variation_id.to_string() } else { String::new() });

        ExperimentResult {
            in_experiment,
            variation_id,
            value,
            hash_used,
            hash_attribute,
            hash_value,
            feature_id: feature_id.map(String::from),
            key,
            name: meta.and_then(|m| m.name.clone()),
            bucket,
            passthrough: meta.is_some_and(|m| m.passthrough),
            sticky_bucket_used,
        }
    }

    /// Resolve the (attribute, value) identity used for hashing.
    ///
    /// The fallback attribute is consulted only when the primary value is
    /// empty and sticky bucketing is in play for this experiment.
    fn experiment_hash_identity(&self, experiment: &Experiment) -> (String, String) {
        let allow_fallback = self.sticky.is_some() && !experiment.disable_sticky_bucketing;
        self.resolve_hash_identity(
            experiment.hash_attribute.as_deref(),
            allow_fallback
                .then_some(experiment.fallback_attribute.as_deref())
                .flatten(),
        )
    }

    pub(crate) fn resolve_hash_identity(
        &self,
        attribute: Option<&str>,
        fallback: Option<&str>,
    ) -> (String, String) {
        let attribute = attribute.unwrap_or("id");
        let value = stringify(get_path(&self.attributes, attribute));
        if value.is_empty() && let Some(fallback) = fallback {
            let fallback_value = stringify(get_path(&self.attributes, fallback));
            if !fallback_value.is_empty() {
                return (fallback.to_string(), fallback_value);
            }
        }
        (attribute.to_string(), value)
    }

    /// Percentage-rollout inclusion test for force rules.
    ///
    /// With neither a range nor a coverage the rule applies to everyone. An
    /// empty hash attribute excludes (the inverse of the filter check).
    pub(crate) fn is_included_in_rollout(
        &self,
        seed: &str,
        hash_attribute: Option<&str>,
        fallback_attribute: Option<&str>,
        range: Option<&BucketRange>,
        coverage: Option<f64>,
        hash_version: Option<i32>,
    ) -> bool {
        if range.is_none() && coverage.is_none() {
            return true;
        }

        let (_, hash_value) = self.resolve_hash_identity(hash_attribute, fallback_attribute);
        if hash_value.is_empty() {
            return false;
        }

        let Some(n) = hash(seed, &hash_value, hash_version.unwrap_or(1)) else {
            return false;
        };
        match range {
            Some(range) => in_range(n, range),
            None => coverage.is_none_or(|coverage| n <= coverage),
        }
    }

    /// Multi-filter exclusion test. All filters must pass; a filter passes
    /// when the hash lands in any of its ranges.
    ///
    /// An empty hash attribute is permissive (the user is NOT filtered
    /// out), the inverse of the rollout check above.
    pub(crate) fn is_filtered_out(&self, filters: &[Filter]) -> bool {
        for filter in filters {
            let hash_value = stringify(get_path(&self.attributes, &filter.attribute));
            if hash_value.is_empty() {
                return false;
            }
            let Some(n) = hash(&filter.seed, &hash_value, filter.hash_version) else {
                return false;
            };
            if !filter.ranges.iter().any(|range| in_range(n, range)) {
                return true;
            }
        }
        false
    }

    fn sticky_bucket_variation(
        &self,
        experiment: &Experiment,
        hash_attribute: &str,
        hash_value: &str,
    ) -> StickyLookup {
        let Some(service) = &self.sticky else {
            return StickyLookup::Missing;
        };
        if experiment.disable_sticky_bucketing {
            return StickyLookup::Missing;
        }

        // Merge the primary identity's document with the fallback identity's,
        // primary entries winning.
        let mut assignments: HashMap<String, String> = HashMap::new();
        if let Some(fallback) = experiment.fallback_attribute.as_deref() {
            let fallback_value = stringify(get_path(&self.attributes, fallback));
            if !fallback_value.is_empty()
                && let Some(doc) = service.get_assignments(fallback, &fallback_value)
            {
                assignments.extend(doc.assignments);
            }
        }
        if let Some(doc) = service.get_assignments(hash_attribute, hash_value) {
            assignments.extend(doc.assignments);
        }

        let bucket_version = experiment.bucket_version.unwrap_or(0);
        let Some(variation_key) =
            assignments.get(&experiment_bucket_key(&experiment.key, bucket_version))
        else {
            // An assignment surviving only under a blocked older version
            // excludes the user instead of re-bucketing them.
            let min_bucket_version = experiment.min_bucket_version.unwrap_or(0);
            for version in 0..min_bucket_version {
                if assignments.contains_key(&experiment_bucket_key(&experiment.key, version)) {
                    return StickyLookup::Blocked;
                }
            }
            return StickyLookup::Missing;
        };

        let index = experiment
            .meta
            .as_ref()
            .and_then(|meta| {
                meta.iter()
                    .position(|m| m.key.as_deref() == Some(variation_key.as_str()))
            })
            .or_else(|| variation_key.parse::<usize>().ok())
            .filter(|index| *index < experiment.variations.len());
        match index {
            Some(index) => StickyLookup::Found(index as i32),
            None => StickyLookup::Missing,
        }
    }

    fn save_sticky_assignment(
        &self,
        experiment: &Experiment,
        hash_attribute: &str,
        hash_value: &str,
        result: &ExperimentResult,
    ) {
        let Some(service) = &self.sticky else {
            return;
        };
        if experiment.disable_sticky_bucketing {
            return;
        }
        let doc = StickyAssignmentDoc {
            attribute_name: hash_attribute.to_string(),
            attribute_value: hash_value.to_string(),
            assignments: HashMap::from([(
                experiment_bucket_key(&experiment.key, experiment.bucket_version.unwrap_or(0)),
                result.key.clone(),
            )]),
        };
        service.save_assignments(&doc);
    }

    /// Record the assignment and notify the tracking sink.
    ///
    /// The per-key record is overwritten (at most one active record per
    /// experiment key) while the callback fires on every qualifying call.
    /// Callback failures are logged and swallowed.
    fn track(&self, experiment: &Experiment, result: &ExperimentResult) {
        self.tracks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(
                experiment.key.clone(),
                ViewedExperiment {
                    experiment: experiment.clone(),
                    result: result.clone(),
                },
            );

        if let Some(callback) = &self.tracking
            && let Err(error) = callback.on_assignment(experiment, result)
        {
            self.logger.log(
                LogLevel::Warn,
                "tracking callback failed",
                &json!({"experiment": experiment.key, "error": error.to_string()}),
            );
        }
    }

    pub(crate) fn log_debug(&self, message: &str, context: &Value) {
        self.logger.log(LogLevel::Debug, message, context);
    }
}
