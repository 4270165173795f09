//! Integration tests for standalone experiment runs: determinism,
//! distribution, coverage, weights and hash configuration.

use serde_json::json;
use switchyard::evaluation::bucket::Namespace;
use switchyard::{Client, Experiment, ExperimentStatus};

fn client_for(id: &str) -> Client {
    Client::builder()
        .with_attributes(json!({"id": id}))
        .build()
        .unwrap()
}

#[test]
fn test_assignment_is_deterministic_per_user() {
    let experiment = Experiment::new("nav-exp", vec![json!("a"), json!("b"), json!("c")]);
    for i in 0..20 {
        let id = format!("user-{i}");
        let first = client_for(&id).run(&experiment);
        let second = client_for(&id).run(&experiment);
        assert_eq!(first.variation_id, second.variation_id);
        assert_eq!(first.bucket, second.bucket);
        assert!(first.in_experiment);
    }
}

#[test]
fn test_even_split_across_many_users() {
    let experiment = Experiment::new("split-exp", vec![json!(0), json!(1)]);
    let mut counts = [0usize; 2];
    for i in 0..2000 {
        let result = client_for(&format!("user-{i}")).run(&experiment);
        counts[result.variation_id as usize] += 1;
    }
    // 50/50 weights over 2000 users: allow a generous tolerance
    assert!((850..=1150).contains(&counts[0]), "counts: {counts:?}");
    assert_eq!(counts[0] + counts[1], 2000);
}

#[test]
fn test_zero_coverage_assigns_nobody() {
    let experiment =
        Experiment::new("covered-exp", vec![json!(0), json!(1)]).with_coverage(0.0);
    for i in 0..50 {
        let result = client_for(&format!("user-{i}")).run(&experiment);
        assert!(!result.in_experiment);
        assert_eq!(result.variation_id, -1);
    }
}

#[test]
fn test_partial_coverage_excludes_a_share() {
    let experiment =
        Experiment::new("covered-exp", vec![json!(0), json!(1)]).with_coverage(0.4);
    let mut excluded = 0;
    for i in 0..2000 {
        let result = client_for(&format!("user-{i}")).run(&experiment);
        if !result.in_experiment {
            excluded += 1;
        }
    }
    // ~60% of users fall outside the covered span
    assert!((1050..=1350).contains(&excluded), "excluded: {excluded}");
}

#[test]
fn test_degenerate_weights_pin_the_variation() {
    let first_only =
        Experiment::new("pin-exp", vec![json!("a"), json!("b")]).with_weights(vec![1.0, 0.0]);
    let second_only =
        Experiment::new("pin-exp", vec![json!("a"), json!("b")]).with_weights(vec![0.0, 1.0]);
    for i in 0..50 {
        let id = format!("user-{i}");
        assert_eq!(client_for(&id).run(&first_only).variation_id, 0);
        assert_eq!(client_for(&id).run(&second_only).variation_id, 1);
    }
}

#[test]
fn test_invalid_weights_fall_back_to_equal() {
    // Sum far from 1: both arms keep getting traffic
    let experiment = Experiment::new("weights-exp", vec![json!(0), json!(1)])
        .with_weights(vec![0.2, 0.2]);
    let mut seen = [false; 2];
    for i in 0..200 {
        let result = client_for(&format!("user-{i}")).run(&experiment);
        seen[result.variation_id as usize] = true;
    }
    assert!(seen[0] && seen[1]);
}

#[test]
fn test_hash_version_2_changes_buckets() {
    let v1 = Experiment::new("versioned-exp", vec![json!(0), json!(1)]);
    let v2 = Experiment::new("versioned-exp", vec![json!(0), json!(1)]).with_hash_version(2);
    let mut moved = 0;
    for i in 0..500 {
        let id = format!("user-{i}");
        let a = client_for(&id).run(&v1);
        let b = client_for(&id).run(&v2);
        assert!(a.in_experiment && b.in_experiment);
        if a.variation_id != b.variation_id {
            moved += 1;
        }
    }
    // The two hash algorithms are unrelated, so a large share moves
    assert!(moved > 100, "moved: {moved}");
}

#[test]
fn test_unknown_hash_version_aborts() {
    let experiment = Experiment::new("exp", vec![json!(0), json!(1)]).with_hash_version(9);
    let result = client_for("user-1").run(&experiment);
    assert!(!result.in_experiment);
    assert_eq!(result.bucket, None);
}

#[test]
fn test_seed_decouples_experiments_from_keys() {
    // Same seed, different keys: identical bucketing
    let a = Experiment::new("exp-a", vec![json!(0), json!(1)]).with_seed("shared");
    let b = Experiment::new("exp-b", vec![json!(0), json!(1)]).with_seed("shared");
    for i in 0..100 {
        let id = format!("user-{i}");
        assert_eq!(
            client_for(&id).run(&a).variation_id,
            client_for(&id).run(&b).variation_id
        );
    }
}

#[test]
fn test_custom_hash_attribute() {
    let experiment = Experiment::new("org-exp", vec![json!(0), json!(1)])
        .with_hash_attribute("company");
    let client = Client::builder()
        .with_attributes(json!({"id": "user-1", "company": "acme"}))
        .build()
        .unwrap();
    let result = client.run(&experiment);
    assert!(result.in_experiment);
    assert_eq!(result.hash_attribute, "company");
    assert_eq!(result.hash_value, "acme");

    // All users of the same company land in the same variation
    let other = Client::builder()
        .with_attributes(json!({"id": "user-2", "company": "acme"}))
        .build()
        .unwrap();
    assert_eq!(other.run(&experiment).variation_id, result.variation_id);
}

#[test]
fn test_condition_gates_assignment() {
    let experiment = Experiment::new("gated-exp", vec![json!(0), json!(1)])
        .with_condition(json!({"beta": true}));

    let opted_in = Client::builder()
        .with_attributes(json!({"id": "user-1", "beta": true}))
        .build()
        .unwrap();
    assert!(opted_in.run(&experiment).in_experiment);

    let opted_out = Client::builder()
        .with_attributes(json!({"id": "user-1", "beta": false}))
        .build()
        .unwrap();
    assert!(!opted_out.run(&experiment).in_experiment);
}

#[test]
fn test_draft_and_stopped_experiments_never_assign() {
    for status in [ExperimentStatus::Draft, ExperimentStatus::Stopped] {
        let experiment =
            Experiment::new("lifecycle-exp", vec![json!(0), json!(1)]).with_status(status);
        assert!(!client_for("user-1").run(&experiment).in_experiment);
    }
    let inactive =
        Experiment::new("lifecycle-exp", vec![json!(0), json!(1)]).with_active(false);
    assert!(!client_for("user-1").run(&inactive).in_experiment);
}

#[test]
fn test_experiment_force_skips_tracking() {
    let experiment = Experiment::new("forced-exp", vec![json!(0), json!(1)]).with_force(1);
    let client = client_for("user-1");
    let result = client.run(&experiment);
    assert_eq!(result.variation_id, 1);
    assert!(!result.hash_used);
    assert!(client.viewed_experiments().is_empty());
}

#[test]
fn test_namespace_partition_is_exclusive() {
    let low = Experiment::new("ns-exp", vec![json!(0), json!(1)])
        .with_namespace(Namespace("shared".to_string(), 0.0, 0.5));
    let high = Experiment::new("ns-exp", vec![json!(0), json!(1)])
        .with_namespace(Namespace("shared".to_string(), 0.5, 1.0));
    for i in 0..200 {
        let id = format!("user-{i}");
        let in_low = client_for(&id).run(&low).in_experiment;
        let in_high = client_for(&id).run(&high).in_experiment;
        assert_ne!(in_low, in_high, "user {id} must be in exactly one half");
    }
}

#[test]
fn test_single_variation_never_assigns() {
    let experiment = Experiment::new("solo-exp", vec![json!("only")]);
    let result = client_for("user-1").run(&experiment);
    assert!(!result.in_experiment);
    assert_eq!(result.variation_id, -1);
    assert!(result.value.is_null());
}
