//! The feature resolver: walks a feature's ordered rule list and
//! short-circuits on the first rule that matches and assigns.

use serde_json::{Value, json};
use switchyard_evaluation::condition::eval_condition;

use crate::Client;
use crate::feature::{FeatureResult, FeatureResultSource};

impl Client {
    /// Resolve a feature key to a value for the current context.
    ///
    /// Always returns a well-formed result; unknown keys and aborted rules
    /// resolve to a tagged "not assigned" outcome, never an error.
    pub fn get_feature(&self, key: &str) -> FeatureResult {
        let features = self.features.load();
        let Some(feature) = features.get(key) else {
            self.log_debug("unknown feature", &json!({"feature": key}));
            return FeatureResult::new(
                Value::Null,
                FeatureResultSource::UnknownFeature,
                None,
                None,
                None,
            );
        };

        // Context-level overrides win over every rule.
        if let Some(forced) = self.forced_features.get(key) {
            self.log_debug("forced feature value", &json!({"feature": key}));
            return FeatureResult::new(
                forced.clone(),
                FeatureResultSource::Force,
                None,
                None,
                None,
            );
        }

        for rule in &feature.rules {
            if let Some(condition) = &rule.condition
                && !eval_condition(&self.attributes, condition)
            {
                continue;
            }
            if let Some(filters) = &rule.filters
                && self.is_filtered_out(filters)
            {
                continue;
            }

            if let Some(force) = &rule.force {
                // Force rules may sit behind a percentage rollout.
                let allow_fallback = self.sticky.is_some() && !rule.disable_sticky_bucketing;
                let included = self.is_included_in_rollout(
                    rule.seed.as_deref().unwrap_or(key),
                    rule.hash_attribute.as_deref(),
                    allow_fallback
                        .then_some(rule.fallback_attribute.as_deref())
                        .flatten(),
                    rule.range.as_ref(),
                    rule.coverage,
                    rule.hash_version,
                );
                if !included {
                    self.log_debug("outside rollout", &json!({"feature": key, "rule": rule.id}));
                    continue;
                }
                return FeatureResult::new(
                    force.clone(),
                    FeatureResultSource::Force,
                    None,
                    None,
                    rule.id.clone(),
                );
            }

            // Anything else must describe an experiment to be runnable.
            let Some(experiment) = rule.to_experiment(key) else {
                continue;
            };
            let result = self.run_internal(&experiment, Some(key));
            if !result.in_experiment || result.passthrough {
                // Passthrough means "evaluated but defer to the next rule",
                // the holdout pattern; it is not an abort.
                continue;
            }
            let value = result.value.clone();
            return FeatureResult::new(
                value,
                FeatureResultSource::Experiment,
                Some(experiment),
                Some(result),
                rule.id.clone(),
            );
        }

        FeatureResult::new(
            feature.default_value.clone().unwrap_or(Value::Null),
            FeatureResultSource::DefaultValue,
            None,
            None,
            None,
        )
    }
}
