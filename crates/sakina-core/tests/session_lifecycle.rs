//! Session management through the orchestrator: lifecycle guards and the
//! guarantee that exporting or ending never drops clinical notes.

use sakina_core::{FunctionCall, PersonaId, PersonaOrchestrator, ToolDeps};
use serde_json::{json, Value};

fn session_call(args: Value) -> FunctionCall {
    FunctionCall::new("manage_session", args)
}

fn counts(orch: &PersonaOrchestrator) -> (usize, usize, usize) {
    let data = orch
        .registry()
        .get("session_management")
        .map(|h| h.clinical_data())
        .unwrap_or(Value::Null);
    let len = |v: &Value| v.as_array().map_or(0, Vec::len);
    (
        len(&data["session_notes"]),
        len(&data["therapeutic_goals"]["goals"]),
        len(&data["progress_markers"]),
    )
}

#[tokio::test]
async fn test_double_start_and_end_without_start() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let mut orch = PersonaOrchestrator::standard(ToolDeps::default(), PersonaId::General).unwrap();

    let reply = orch.handle_function_call(&session_call(json!({"action": "end_session"}))).await;
    assert_eq!(reply, "No active session to end.");

    let reply = orch
        .handle_function_call(&session_call(json!({
            "action": "start_session",
            "consent_details": {"recording_consent": true},
            "cultural_preferences": {"religious_considerations": true}
        })))
        .await;
    assert!(reply.contains("✅ Session recording: Consented"));
    assert!(reply.contains("❌ Clinical data storage: Not consented"));
    assert!(reply.contains("بسم الله"));

    let reply = orch.handle_function_call(&session_call(json!({"action": "start_session"}))).await;
    assert!(reply.starts_with("A session is already active"));
}

#[tokio::test]
async fn test_export_then_end_keeps_counts() {
    let mut orch = PersonaOrchestrator::standard(ToolDeps::default(), PersonaId::General).unwrap();
    for args in [
        json!({"action": "start_session"}),
        json!({"action": "update_notes", "session_notes": "Client reports better sleep"}),
        json!({"action": "track_therapeutic_goals", "therapeutic_goals": ["sleep better", "walk daily"]}),
        json!({"action": "document_progress", "session_notes": "Feeling better and more hopeful"}),
    ] {
        let reply = orch.handle_function_call(&session_call(args)).await;
        assert!(!reply.is_empty());
    }
    let before = counts(&orch);
    assert_eq!(before, (1, 2, 1));

    let summary = orch
        .handle_function_call(&session_call(json!({"action": "export_session_summary"})))
        .await;
    assert!(summary.contains("Session summary has been generated"), "{summary}");
    let after_export = counts(&orch);

    orch.handle_function_call(&session_call(json!({"action": "end_session", "session_notes": "Closing notes"})))
        .await;
    let after_end = counts(&orch);

    assert!(after_export.0 >= before.0 && after_export.1 >= before.1 && after_export.2 >= before.2);
    assert!(after_end.0 >= after_export.0 && after_end.1 >= after_export.1 && after_end.2 >= after_export.2);
}

#[tokio::test]
async fn test_privacy_and_interruption() {
    let mut orch = PersonaOrchestrator::standard(ToolDeps::default(), PersonaId::General).unwrap();
    let reply = orch
        .handle_function_call(&session_call(json!({"action": "handle_session_interruption"})))
        .await;
    assert_eq!(reply, "No active session to handle interruption for.");

    let reply = orch
        .handle_function_call(&session_call(json!({"action": "manage_privacy_settings", "privacy_level": "secret"})))
        .await;
    assert!(reply.starts_with("Invalid privacy level."));

    orch.handle_function_call(&session_call(json!({"action": "start_session"}))).await;
    let reply = orch
        .handle_function_call(&session_call(json!({"action": "handle_session_interruption"})))
        .await;
    assert!(!reply.is_empty());
    let data = orch.registry().get("session_management").unwrap().clinical_data();
    assert_eq!(data["phase"], "ended");
}
