use criterion::{Criterion, black_box, criterion_group, criterion_main};
use serde_json::json;
use switchyard::{Client, Experiment};

fn bench_client() -> Client {
    let features = r#"{
        "checkout-layout": {
            "defaultValue": "classic",
            "rules": [
                {"condition": {"plan": "enterprise"}, "force": "dedicated"},
                {"condition": {"country": {"$in": ["US", "CA", "GB"]}}, "coverage": 0.5, "force": "regional"},
                {
                    "key": "layout-exp",
                    "variations": ["classic", "compact", "wide"],
                    "weights": [0.34, 0.33, 0.33],
                    "hashVersion": 2
                }
            ]
        }
    }"#;
    Client::builder()
        .with_features_json(features)
        .with_attributes(json!({
            "id": "user-123456",
            "country": "US",
            "plan": "free",
            "version": "2.14.0"
        }))
        .build()
        .unwrap()
}

fn bench_get_feature(c: &mut Criterion) {
    let client = bench_client();
    c.bench_function("get_feature", |b| {
        b.iter(|| black_box(client.get_feature(black_box("checkout-layout"))))
    });
}

fn bench_run_experiment(c: &mut Criterion) {
    let client = bench_client();
    let experiment = Experiment::new("bench-exp", vec![json!("a"), json!("b")])
        .with_condition(json!({"country": {"$in": ["US", "CA"]}, "version": {"$vgte": "2.0.0"}}));
    c.bench_function("run_experiment", |b| {
        b.iter(|| black_box(client.run(black_box(&experiment))))
    });
}

criterion_group!(benches, bench_get_feature, bench_run_experiment);
criterion_main!(benches);
