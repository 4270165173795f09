//! Sticky-bucket persistence.
//!
//! A sticky-bucket store pins a user's past assignment so a changed
//! experiment config (weights, coverage, targeting) cannot move them to a
//! different variation. Documents are keyed by `attribute||value` and map a
//! versioned experiment key to the assigned variation key.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Persisted assignments for one (attribute name, attribute value) identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StickyAssignmentDoc {
    pub attribute_name: String,
    pub attribute_value: String,
    /// Versioned experiment key (`key__v{bucketVersion}`) → variation key.
    pub assignments: HashMap<String, String>,
}

/// External key-value store for sticky assignments.
pub trait StickyBucketService: Send + Sync {
    fn get_assignments(
        &self,
        attribute_name: &str,
        attribute_value: &str,
    ) -> Option<StickyAssignmentDoc>;

    fn save_assignments(&self, doc: &StickyAssignmentDoc);
}

/// Versioned experiment key under which an assignment is stored.
pub(crate) fn experiment_bucket_key(experiment_key: &str, bucket_version: i32) -> String {
    format!("{experiment_key}__v{bucket_version}")
}

/// Process-local sticky store, useful for tests and single-process hosts.
#[derive(Default)]
pub struct InMemoryStickyBucketService {
    docs: Mutex<HashMap<String, StickyAssignmentDoc>>,
}

impl InMemoryStickyBucketService {
    pub fn new() -> Self {
        Self::default()
    }

    fn doc_key(attribute_name: &str, attribute_value: &str) -> String {
        format!("{attribute_name}||{attribute_value}")
    }
}

impl StickyBucketService for InMemoryStickyBucketService {
    fn get_assignments(
        &self,
        attribute_name: &str,
        attribute_value: &str,
    ) -> Option<StickyAssignmentDoc> {
        self.docs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&Self::doc_key(attribute_name, attribute_value))
            .cloned()
    }

    fn save_assignments(&self, doc: &StickyAssignmentDoc) {
        let mut docs = self
            .docs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let entry = docs
            .entry(Self::doc_key(&doc.attribute_name, &doc.attribute_value))
            .or_insert_with(|| StickyAssignmentDoc {
                attribute_name: doc.attribute_name.clone(),
                attribute_value: doc.attribute_value.clone(),
                assignments: HashMap::new(),
            });
        entry
            .assignments
            .extend(doc.assignments.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_round_trip() {
        let service = InMemoryStickyBucketService::new();
        assert!(service.get_assignments("id", "user-1").is_none());

        let doc = StickyAssignmentDoc {
            attribute_name: "id".to_string(),
            attribute_value: "user-1".to_string(),
            assignments: HashMap::from([(experiment_bucket_key("exp", 0), "control".to_string())]),
        };
        service.save_assignments(&doc);

        let loaded = service.get_assignments("id", "user-1").unwrap();
        assert_eq!(loaded.assignments.get("exp__v0"), Some(&"control".to_string()));
    }

    #[test]
    fn test_save_merges_assignments() {
        let service = InMemoryStickyBucketService::new();
        let mut doc = StickyAssignmentDoc {
            attribute_name: "id".to_string(),
            attribute_value: "user-1".to_string(),
            assignments: HashMap::from([("a__v0".to_string(), "0".to_string())]),
        };
        service.save_assignments(&doc);

        doc.assignments = HashMap::from([("b__v0".to_string(), "1".to_string())]);
        service.save_assignments(&doc);

        let loaded = service.get_assignments("id", "user-1").unwrap();
        assert_eq!(loaded.assignments.len(), 2);
    }
}
