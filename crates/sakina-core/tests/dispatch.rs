//! Function-call routing: every failure comes back as a reported string.

use std::sync::Arc;

use sakina_core::tools::cbt::mood_tier;
use sakina_core::{classify, Category, ClientHub, FunctionCall, PersonaId, PersonaOrchestrator, ToolDeps};
use serde_json::json;

fn orchestrator() -> PersonaOrchestrator {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    PersonaOrchestrator::standard(ToolDeps::default(), PersonaId::General).unwrap()
}

#[tokio::test]
async fn test_unknown_function_is_reported() {
    let mut orch = orchestrator();
    let reply = orch.handle_function_call(&FunctionCall::new("play_music", json!({}))).await;
    assert!(reply.starts_with("Unknown therapeutic function: play_music"));
    assert!(reply.contains("manage_session"));
}

#[tokio::test]
async fn test_invalid_action_lists_valid_ones() {
    let mut orch = orchestrator();
    let reply = orch
        .handle_function_call(&FunctionCall::new("detect_crisis", json!({"action": "dance"})))
        .await;
    assert!(reply.starts_with("Invalid crisis_detection action 'dance'"), "{reply}");
    assert!(reply.contains("assess_risk"));
}

#[tokio::test]
async fn test_unbound_tool_on_crisis_persona() {
    let mut orch = orchestrator();
    orch.switch(PersonaId::Crisis, "", None).await.unwrap();
    let reply = orch
        .handle_function_call(&FunctionCall::new("analyze_emotion", json!({"analysis_type": "detect_emotions"})))
        .await;
    assert_eq!(
        reply,
        "Tool 'analyze_emotion' is not available for the current persona (crisis)"
    );
}

#[tokio::test]
async fn test_action_alias_accepted_for_every_tool() {
    let mut orch = orchestrator();
    let reply = orch
        .handle_function_call(&FunctionCall::new(
            "analyze_emotion",
            json!({"action": "detect_emotions", "user_input": "I feel so sad and alone"}),
        ))
        .await;
    assert!(!reply.is_empty());
    assert!(!reply.starts_with("Invalid"));

    let reply = orch
        .handle_function_call(&FunctionCall::new(
            "apply_cbt_technique",
            json!({"action": "mood_monitoring", "mood_rating": "7"}),
        ))
        .await;
    assert!(reply.contains("7/10 (moderate"));
}

#[tokio::test]
async fn test_tool_events_reach_hub() {
    let hub = Arc::new(ClientHub::new());
    let mut rx = hub.register("ui");
    let mut orch = orchestrator();
    orch.bind_hub(hub);

    orch.handle_function_call(&FunctionCall::new(
        "apply_cbt_technique",
        json!({"technique": "mood_monitoring", "mood_rating": 2}),
    ))
    .await;

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind);
    }
    assert!(kinds.contains(&"therapeutic_mood_log_entry".to_string()), "{kinds:?}");
    assert!(kinds.contains(&"therapeutic_clinical_log".to_string()));
}

#[test]
fn test_mood_tier_boundaries() {
    assert_eq!(mood_tier(3).description, "very low");
    assert_eq!(mood_tier(4).description, "low to moderate");
    assert_eq!(mood_tier(5).description, "low to moderate");
    assert_eq!(mood_tier(6).description, "moderate");
    assert_eq!(mood_tier(7).description, "moderate");
    assert_eq!(mood_tier(8).description, "good");
}

#[test]
fn test_crisis_classification_ignores_missing_factors() {
    let result = classify(Some("I keep thinking I should end it all"), Category::CrisisRisk);
    assert!(result.crisis_detected);
    assert_eq!(result.risk_level.map(|r| r.as_str()), Some("imminent"));
    assert!(!classify(None, Category::CrisisRisk).crisis_detected);
}

async fn intensity_reply(user_input: &str, voice: serde_json::Value) -> (String, PersonaId) {
    let mut orch = orchestrator();
    let reply = orch
        .handle_function_call(&FunctionCall::new(
            "analyze_emotion",
            json!({
                "analysis_type": "emotional_intensity_assessment",
                "user_input": user_input,
                "voice_features": {"intensity_from_voice": voice},
            }),
        ))
        .await;
    (reply, orch.active_persona())
}

#[tokio::test]
async fn test_intensity_levels_combine_text_and_voice() {
    const LOW: &str = "manageable levels of distress";
    const MODERATE: &str = "significant emotional intensity";
    const HIGH: &str = "very intense feelings";

    // "hard" scores 1, "unbearable" scores 3.
    let cases = [
        ("it is hard", json!(3), LOW),
        ("it is hard", json!(4), MODERATE),
        ("this is unbearable", json!(4), MODERATE),
        ("this is unbearable", json!(5), HIGH),
        ("this is unbearable", json!(4294967295u64), HIGH),
        ("this is unbearable", json!(-7), LOW),
    ];
    for (text, voice, expected) in cases {
        let (reply, persona) = intensity_reply(text, voice.clone()).await;
        assert!(reply.contains(expected), "{text} + {voice}: {reply}");
        let escalated = expected == HIGH;
        assert_eq!(persona == PersonaId::Crisis, escalated, "{text} + {voice}");
    }
}
