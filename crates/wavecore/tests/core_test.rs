// crates/wavecore/tests/core_test.rs

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;
use wavecore::{
    ErrorKind, EventBus, Manifest, OrchestrationEvent, OrchestratorConfig, SkipReason, UnitContext,
    UnitError, UnitErrorRecord, UnitEvent, UnitResult, UnitStatus, DEFAULT_TIMEOUT_MS,
    WAVE_OPTION,
};

#[test]
fn test_manifest_defaults() {
    let manifest = Manifest::from_json(
        r#"{
            "name": "personas",
            "units": [
                { "id": "Tim", "type": "text.keywords", "config": { "keywords": ["habit"] } },
                { "id": "Daniel", "type": "debug.echo", "dependencies": ["Tim"], "timeout_ms": 500 }
            ]
        }"#,
    )
    .unwrap();

    assert_eq!(manifest.units.len(), 2);
    assert!(manifest.units[0].dependencies.is_empty());
    assert_eq!(manifest.find_unit("Daniel").unwrap().timeout_ms, Some(500));
    assert_eq!(manifest.settings, OrchestratorConfig::default());
    assert_eq!(manifest.settings.default_timeout_ms, DEFAULT_TIMEOUT_MS);
    assert!(manifest.settings.continue_on_error);
    assert_eq!(manifest.settings.max_parallelism, None);
}

#[test]
fn test_partial_settings_keep_defaults() {
    let manifest = Manifest::from_json(
        r#"{
            "name": "strict",
            "units": [],
            "settings": { "continue_on_error": false, "unit_timeouts": { "Tim": 10 } }
        }"#,
    )
    .unwrap();

    assert!(!manifest.settings.continue_on_error);
    assert_eq!(manifest.settings.default_timeout_ms, DEFAULT_TIMEOUT_MS);
    assert_eq!(manifest.settings.timeout_ms_for("Tim"), 10);
    assert_eq!(manifest.settings.timeout_ms_for("Brene"), DEFAULT_TIMEOUT_MS);
}

#[test]
fn test_effective_config_prefers_explicit_overrides() {
    let mut manifest = Manifest::new("timeouts");
    manifest.settings = OrchestratorConfig::default().with_unit_timeout("a", 100);
    manifest
        .add_unit(wavecore::UnitSpec::new("a", "debug.echo").with_timeout(5))
        .add_unit(wavecore::UnitSpec::new("b", "debug.echo").with_timeout(7));

    let config = manifest.effective_config();
    assert_eq!(config.timeout_ms_for("a"), 100);
    assert_eq!(config.timeout_ms_for("b"), 7);
    assert_eq!(config.timeout_for("c").as_millis() as u64, DEFAULT_TIMEOUT_MS);
}

#[test]
fn test_context_accessors() {
    let mut results = HashMap::new();
    results.insert(
        "Tim".to_string(),
        Arc::new(UnitResult::new(0.75).with_payload(json!({"score": 3}))),
    );

    let run_id = Uuid::new_v4();
    let ctx = UnitContext::new(
        run_id,
        "Daniel",
        Arc::new(json!({"text": "be curious"})),
        wavecore::EventEmitter::detached(run_id, "Daniel"),
    )
    .with_results(Arc::new(results))
    .with_option(WAVE_OPTION, 1);

    assert_eq!(ctx.wave(), Some(1));
    assert_eq!(ctx.input_field("text"), Some(&json!("be curious")));
    assert_eq!(ctx.require_result("Tim").unwrap().confidence, 0.75);
    assert_eq!(
        ctx.require_result("Brene").unwrap_err(),
        UnitError::MissingDependency("Brene".to_string())
    );
    assert!(!ctx.cancellation.is_cancelled());
}

#[tokio::test]
async fn test_emitter_publishes_unit_events() {
    let bus = EventBus::new(16);
    let mut rx = bus.subscribe();
    let run_id = Uuid::new_v4();

    let emitter = bus.create_emitter(run_id, "Brene".to_string());
    emitter.info("scanning");
    emitter.progress(50.0, Some("halfway".to_string()));

    match rx.recv().await.unwrap() {
        OrchestrationEvent::UnitEvent {
            run_id: id,
            unit_id,
            event: UnitEvent::Info { message },
            ..
        } => {
            assert_eq!(id, run_id);
            assert_eq!(unit_id, "Brene");
            assert_eq!(message, "scanning");
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(matches!(
        rx.recv().await.unwrap(),
        OrchestrationEvent::UnitEvent {
            event: UnitEvent::Progress { percent, .. },
            ..
        } if percent == 50.0
    ));

    emitter.warn("slow source");
    assert!(matches!(
        rx.recv().await.unwrap(),
        OrchestrationEvent::UnitEvent {
            event: UnitEvent::Warning { message },
            ..
        } if message == "slow source"
    ));
}

#[tokio::test]
async fn test_zero_capacity_bus_still_delivers() {
    let bus = EventBus::new(0);
    let mut rx = bus.subscribe();
    let run_id = Uuid::new_v4();

    bus.create_emitter(run_id, "Tim".to_string()).info("ready");

    assert!(matches!(
        rx.recv().await.unwrap(),
        OrchestrationEvent::UnitEvent { unit_id, .. } if unit_id == "Tim"
    ));
}

#[test]
fn test_error_records_classify_errors() {
    let timeout = UnitErrorRecord::new("a", 2, &UnitError::Timeout { timeout_ms: 10 });
    assert_eq!(timeout.kind, ErrorKind::Timeout);
    assert_eq!(timeout.wave, 2);
    assert_eq!(timeout.message, "Timed out after 10ms");

    let declined = UnitErrorRecord::new("b", 0, &UnitError::ContextIncompatible("b".to_string()));
    assert_eq!(declined.kind, ErrorKind::ContextIncompatible);
    assert!(UnitError::Timeout { timeout_ms: 1 }.is_timeout());
    assert!(!UnitError::ExecutionFailed("x".to_string()).is_timeout());
}

#[test]
fn test_outcome_serialization_shape() {
    let reason = SkipReason::DependencyFailed {
        dependency: "Daniel".to_string(),
    };
    assert_eq!(
        serde_json::to_value(&reason).unwrap(),
        json!({"reason": "dependency_failed", "dependency": "Daniel"})
    );
    assert_eq!(
        serde_json::to_value(UnitStatus::Skipped).unwrap(),
        json!("skipped")
    );
    assert!(UnitStatus::Failed.is_terminal());
    assert!(!UnitStatus::Running.is_terminal());
}
