// crates/waveunits/tests/units_test.rs

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;
use wavecore::{
    EventEmitter, Manifest, OrchestratorConfig, RegistryError, RunStatus, SkipReason, Unit,
    UnitContext, UnitError, UnitResult, UnitSpec, UnitStatus,
};
use waveruntime::WaveRuntime;
use waveunits::standard_catalog;

// Helper function to create a test context
fn create_test_context(unit_id: &str, input: Value, results: HashMap<String, f64>) -> UnitContext {
    let run_id = Uuid::new_v4();
    let results = results
        .into_iter()
        .map(|(id, confidence)| (id, Arc::new(UnitResult::new(confidence))))
        .collect();

    UnitContext::new(
        run_id,
        unit_id,
        Arc::new(input),
        EventEmitter::detached(run_id, unit_id),
    )
    .with_results(Arc::new(results))
}

fn create_unit(spec: UnitSpec) -> Arc<dyn Unit> {
    standard_catalog().create_unit(&spec).unwrap()
}

#[tokio::test]
async fn test_keywords_score_coverage() {
    let unit = create_unit(
        UnitSpec::new("Tim", "text.keywords")
            .with_config("keywords", json!(["habit", "experiment", "fear"])),
    );
    let ctx = create_test_context(
        "Tim",
        json!({"text": "Every Habit is an experiment. Another habit follows."}),
        HashMap::new(),
    );

    assert!(unit.can_handle(&ctx));
    let result = unit.execute(ctx).await.unwrap();

    assert!((result.confidence - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(result.payload["matches"]["habit"], json!(2));
    assert_eq!(result.payload["matches"]["fear"], json!(0));
    assert_eq!(result.payload["matched"], json!(2));
    assert_eq!(result.payload["total"], json!(3));
}

#[tokio::test]
async fn test_keywords_respect_case_and_field() {
    let unit = create_unit(
        UnitSpec::new("Brene", "text.keywords")
            .with_config("keywords", json!(["Shame"]))
            .with_config("field", "notes")
            .with_config("case_sensitive", true),
    );

    let lower = create_test_context("Brene", json!({"notes": "shame and courage"}), HashMap::new());
    assert_eq!(unit.execute(lower).await.unwrap().confidence, 0.0);

    let exact = create_test_context("Brene", json!({"notes": "Shame and courage"}), HashMap::new());
    assert_eq!(unit.execute(exact).await.unwrap().confidence, 1.0);
}

#[test]
fn test_keywords_decline_without_text() {
    let unit = create_unit(
        UnitSpec::new("Tim", "text.keywords").with_config("keywords", json!(["habit"])),
    );

    let missing = create_test_context("Tim", json!({"body": "habit"}), HashMap::new());
    assert!(!unit.can_handle(&missing));

    let wrong_type = create_test_context("Tim", json!({"text": 42}), HashMap::new());
    assert!(!unit.can_handle(&wrong_type));
}

#[test]
fn test_keyword_factory_validates_config() {
    let catalog = standard_catalog();

    let missing = catalog
        .create_unit(&UnitSpec::new("Tim", "text.keywords"))
        .err()
        .unwrap();
    assert!(matches!(
        missing,
        RegistryError::Creation { source: UnitError::Configuration(_), .. }
    ));

    let empty = catalog
        .create_unit(&UnitSpec::new("Tim", "text.keywords").with_config("keywords", json!([])))
        .err()
        .unwrap();
    assert!(matches!(
        empty,
        RegistryError::Creation { source: UnitError::Configuration(_), .. }
    ));
}

#[tokio::test]
async fn test_aggregate_averages_dependencies() {
    let unit = create_unit(
        UnitSpec::new("Charlie", "aggregate.confidence")
            .depends_on("Daniel")
            .depends_on("Brene"),
    );

    let partial = create_test_context(
        "Charlie",
        json!({}),
        HashMap::from([("Daniel".to_string(), 0.5)]),
    );
    assert!(!unit.can_handle(&partial));

    let ctx = create_test_context(
        "Charlie",
        json!({}),
        HashMap::from([("Daniel".to_string(), 0.5), ("Brene".to_string(), 1.0)]),
    );
    assert!(unit.can_handle(&ctx));

    let result = unit.execute(ctx).await.unwrap();
    assert_eq!(result.confidence, 0.75);
    assert_eq!(result.payload["sources"]["Brene"], json!(1.0));
}

#[test]
fn test_aggregate_requires_dependencies() {
    let err = standard_catalog()
        .create_unit(&UnitSpec::new("Charlie", "aggregate.confidence"))
        .err()
        .unwrap();
    assert!(matches!(err, RegistryError::Creation { .. }));
}

#[tokio::test]
async fn test_echo_and_fail() {
    let echo = create_unit(UnitSpec::new("echo", "debug.echo").with_config("field", "name"));
    let ctx = create_test_context("echo", json!({"name": "atlas", "other": 1}), HashMap::new());
    assert_eq!(echo.execute(ctx).await.unwrap().payload, json!("atlas"));

    let fail = create_unit(UnitSpec::new("fail", "debug.fail").with_config("message", "nope"));
    let ctx = create_test_context("fail", json!({}), HashMap::new());
    assert_eq!(
        fail.execute(ctx).await.unwrap_err(),
        UnitError::ExecutionFailed("nope".to_string())
    );
}

#[tokio::test]
async fn test_delay_stops_when_cancelled() {
    let unit = create_unit(UnitSpec::new("wait", "time.delay").with_config("delay_ms", 5_000));
    let ctx = create_test_context("wait", json!({}), HashMap::new());
    let token = ctx.cancellation.clone();

    let start = Instant::now();
    let handle = tokio::spawn(async move { unit.execute(ctx).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    token.cancel();

    let result = handle.await.unwrap();
    assert!(result.is_err());
    assert!(start.elapsed() < Duration::from_millis(1_000));
}

fn persona_manifest(brene: UnitSpec) -> Manifest {
    let mut manifest = Manifest::new("personas");
    manifest
        .add_unit(
            UnitSpec::new("Tim", "text.keywords")
                .with_config("keywords", json!(["experiment", "habit"])),
        )
        .add_unit(
            UnitSpec::new("Daniel", "text.keywords")
                .depends_on("Tim")
                .with_config("keywords", json!(["bias", "habit"])),
        )
        .add_unit(brene)
        .add_unit(
            UnitSpec::new("Charlie", "aggregate.confidence")
                .depends_on("Daniel")
                .depends_on("Brene"),
        );
    manifest
}

#[tokio::test]
async fn test_manifest_end_to_end() {
    let manifest = persona_manifest(
        UnitSpec::new("Brene", "text.keywords")
            .depends_on("Tim")
            .with_config("keywords", json!(["courage"])),
    );
    let runtime = WaveRuntime::from_manifest(&manifest, &standard_catalog()).unwrap();

    let result = runtime
        .execute(
            json!({"text": "A habit of courage is an experiment without bias."}),
            Uuid::new_v4(),
        )
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.results["Tim"].confidence, 1.0);
    assert_eq!(result.results["Charlie"].confidence, 1.0);
    assert_eq!(result.plan.as_lists(), vec![vec!["Tim"], vec!["Daniel", "Brene"], vec!["Charlie"]]);
}

#[tokio::test]
async fn test_manifest_failure_propagation() {
    let manifest = persona_manifest(UnitSpec::new("Brene", "debug.fail").depends_on("Tim"));
    let runtime = WaveRuntime::from_manifest(&manifest, &standard_catalog()).unwrap();

    let result = runtime
        .execute(json!({"text": "habit"}), Uuid::new_v4())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::PartialFailure);
    assert_eq!(result.status_of("Daniel"), Some(UnitStatus::Completed));
    assert_eq!(result.status_of("Brene"), Some(UnitStatus::Failed));
    assert_eq!(
        result.executions["Charlie"].skip_reason,
        Some(SkipReason::DependencyFailed {
            dependency: "Brene".to_string()
        })
    );
}

#[tokio::test]
async fn test_manifest_timeout_cancels_delay() {
    let mut manifest = Manifest::new("slow");
    manifest.settings = OrchestratorConfig::default().with_default_timeout(20);
    manifest.add_unit(UnitSpec::new("wait", "time.delay").with_config("delay_ms", 5_000));

    let runtime = WaveRuntime::from_manifest(&manifest, &standard_catalog()).unwrap();
    let start = Instant::now();
    let result = runtime.execute(json!({}), Uuid::new_v4()).await.unwrap();

    assert!(start.elapsed() < Duration::from_millis(1_000));
    assert_eq!(result.status_of("wait"), Some(UnitStatus::Failed));
    assert!(result.executions["wait"].error.as_deref().unwrap().contains("20ms"));
}

#[tokio::test]
async fn test_missing_text_fails_keyword_units() {
    let manifest = persona_manifest(
        UnitSpec::new("Brene", "text.keywords")
            .depends_on("Tim")
            .with_config("keywords", json!(["courage"])),
    );
    let runtime = WaveRuntime::from_manifest(&manifest, &standard_catalog()).unwrap();

    let result = runtime.execute(json!({"body": "no text field"}), Uuid::new_v4()).await.unwrap();

    assert_eq!(result.status_of("Tim"), Some(UnitStatus::Failed));
    assert_eq!(result.errors[0].kind, wavecore::ErrorKind::ContextIncompatible);
    assert_eq!(result.skipped_count, 3);
}
