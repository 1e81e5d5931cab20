//! End-to-end persona scenarios: tool binding, switching and crisis escalation
//! driven through model function calls.

use std::sync::Arc;

use sakina_core::{
    ClientHub, FunctionCall, Persona, PersonaId, PersonaOrchestrator, ToolDeps, ToolKind, ToolRegistry,
};
use serde_json::json;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// General persona without the CBT tool, plus the standard crisis and CBT personas.
fn orchestrator_without_general_cbt() -> PersonaOrchestrator {
    let mut orch = PersonaOrchestrator::new(ToolRegistry::with_default_tools(), ToolDeps::default(), PersonaId::General);
    orch.register_persona(Persona::new(
        PersonaId::General,
        vec![ToolKind::CrisisDetection, ToolKind::EmotionalAnalysis, ToolKind::SessionManagement],
    ))
    .unwrap();
    orch.register_persona(Persona::standard(PersonaId::Crisis)).unwrap();
    orch.register_persona(Persona::standard(PersonaId::Cbt)).unwrap();
    orch
}

#[tokio::test]
async fn test_unbound_tool_rejected_until_switch() {
    init_tracing();
    let mut orch = orchestrator_without_general_cbt();
    let call = FunctionCall::new("apply_cbt_technique", json!({"technique": "mood_monitoring", "mood_rating": 4}));

    let rejected = orch.handle_function_call(&call).await;
    assert!(rejected.contains("apply_cbt_technique"), "{rejected}");
    assert!(rejected.contains("general"));

    let announcement = orch.switch(PersonaId::Cbt, "Thought work requested", None).await.unwrap();
    assert!(announcement.contains("Reason for this change: Thought work requested"));

    let reply = orch.handle_function_call(&call).await;
    assert!(!reply.is_empty());
    assert!(reply.contains("Your current mood rating: 4/10 (low to moderate"));
}

#[tokio::test]
async fn test_crisis_keyword_escalates_once_within_call() {
    init_tracing();
    let mut orch = PersonaOrchestrator::standard(ToolDeps::default(), PersonaId::General).unwrap();

    let reply = orch
        .handle_function_call(&FunctionCall::new(
            "detect_crisis",
            json!({"action": "assess_risk", "user_input": "I want to kill myself"}),
        ))
        .await;
    assert!(!reply.is_empty());
    assert_eq!(orch.active_persona(), PersonaId::Crisis);
    assert!(orch.clinical_state().crisis_active);
    assert_eq!(orch.switch_history().len(), 1);
    assert_eq!(
        orch.switch_history()[0].reason,
        "Crisis escalation: emergency_escalation"
    );

    // Crisis persona is already active and the handler has escalated once.
    orch.handle_function_call(&FunctionCall::new(
        "detect_crisis",
        json!({"action": "escalate_emergency", "urgency_level": "imminent"}),
    ))
    .await;
    orch.handle_crisis_escalation("emergency_escalation", json!({})).await;
    assert_eq!(orch.switch_history().len(), 1);
    assert!(orch.system_status().tool_crisis_status.emergency_escalation_needed);
}

#[tokio::test]
async fn test_switch_history_counts() {
    let mut orch = PersonaOrchestrator::standard(ToolDeps::default(), PersonaId::General).unwrap();
    orch.switch(PersonaId::General, "noop", None).await.unwrap();
    assert_eq!(orch.switch_history().len(), 0);
    orch.switch(PersonaId::Crisis, "first", None).await.unwrap();
    assert_eq!(orch.switch_history().len(), 1);
    orch.switch(PersonaId::Crisis, "second", None).await.unwrap();
    assert_eq!(orch.switch_history().len(), 1);
    orch.switch_named("general_therapy", "back", None).await.unwrap();
    assert_eq!(orch.switch_history().len(), 2);
    assert_eq!(orch.system_status().persona_switches_count, 2);
}

#[tokio::test]
async fn test_switch_merges_cultural_context_and_notifies() {
    let hub = Arc::new(ClientHub::new());
    let mut rx = hub.register("observer");
    let mut orch = PersonaOrchestrator::standard(ToolDeps::default(), PersonaId::General).unwrap();
    orch.bind_hub(hub.clone());

    let cultural = json!({"preferred_language": "arabic", "religious_considerations": true});
    let message = orch
        .switch(PersonaId::Cbt, "", cultural.as_object())
        .await
        .unwrap();
    assert!(message.starts_with("سأقوم بتحويلك"));
    assert!(orch.cultural_context().prefers_arabic());
    assert_eq!(orch.switch_history()[0].cultural_context.preferred_language(), Some("arabic"));

    let event = rx.try_recv().unwrap();
    assert_eq!(event.kind, "persona_switched");
    assert_eq!(event.data["to"], "cbt");
}

#[tokio::test]
async fn test_recommendations_follow_clinical_state() {
    let mut orch = PersonaOrchestrator::standard(ToolDeps::default(), PersonaId::General).unwrap();
    assert_eq!(orch.recommend(Some("I want to kill myself")).persona, PersonaId::Crisis);
    assert_eq!(orch.recommend(Some("I'm so anxious")).persona, PersonaId::Cbt);
    assert_eq!(orch.recommend(Some("")).persona, PersonaId::General);
    assert_eq!(orch.recommend(None).persona, PersonaId::General);

    orch.handle_crisis_escalation("imminent_risk", json!({})).await;
    assert_eq!(orch.recommend(Some("I'm so anxious")).persona, PersonaId::Crisis);
}
