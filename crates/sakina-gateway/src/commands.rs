//! JSON command protocol of the `/ws/tools` channel.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sakina_core::{FunctionCall, PersonaOrchestrator};

pub const AVAILABLE_COMMANDS: [&str; 9] = [
    "get_agent_status",
    "switch_agent",
    "get_tools",
    "check_crisis_status",
    "update_cultural_context",
    "get_session_info",
    "function_call",
    "recommend_agent",
    "reset_crisis_status",
];

pub const CULTURAL_FEATURES: [&str; 3] = ["omani_arabic", "islamic_integration", "gulf_family_dynamics"];

const SAFETY_PROTOCOLS: [&str; 3] = ["crisis_detection", "emergency_escalation", "professional_referral"];

fn default_agent() -> String {
    "general".to_string()
}

fn default_reason() -> String {
    "Client request".to_string()
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolCommand {
    GetAgentStatus,
    SwitchAgent {
        #[serde(default = "default_agent")]
        agent: String,
        #[serde(default = "default_reason")]
        reason: String,
        #[serde(default)]
        cultural_context: Map<String, Value>,
    },
    GetTools,
    CheckCrisisStatus,
    UpdateCulturalContext {
        #[serde(default)]
        cultural_context: Map<String, Value>,
    },
    GetSessionInfo,
    FunctionCall(FunctionCall),
    RecommendAgent {
        #[serde(default)]
        text: Option<String>,
    },
    ResetCrisisStatus,
}

pub fn error_frame(message: impl Into<String>, client_id: &str) -> Value {
    json!({"type": "error", "message": message.into(), "client_id": client_id})
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn frame(kind: &str, data: Value, client_id: &str) -> Value {
    json!({"type": kind, "data": data, "client_id": client_id})
}

/// Parses one text frame and runs it against the connection's orchestrator.
/// Always yields a response frame.
pub async fn handle_command(
    raw: &str,
    orchestrator: &mut PersonaOrchestrator,
    client_id: &str,
    connected_clients: usize,
) -> Value {
    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return error_frame("Invalid JSON format. Please send valid JSON commands.", client_id),
    };
    let kind = value.get("type").and_then(Value::as_str).unwrap_or("unknown").to_string();
    if !AVAILABLE_COMMANDS.contains(&kind.as_str()) {
        return error_frame(
            format!("Unknown command type: {kind}. Available: {}", AVAILABLE_COMMANDS.join(", ")),
            client_id,
        );
    }
    let command: ToolCommand = match serde_json::from_value(value) {
        Ok(c) => c,
        Err(e) => return error_frame(format!("Error processing command: {e}"), client_id),
    };
    tracing::info!(target: "sakina::gateway", client_id, command = %kind, "tool command received");

    match run(command, orchestrator, connected_clients).await {
        Ok((response, data)) => frame(response, data, client_id),
        Err(message) => {
            tracing::warn!(target: "sakina::gateway", client_id, command = %kind, error = %message, "tool command failed");
            error_frame(format!("Error executing command: {message}"), client_id)
        }
    }
}

async fn run(
    command: ToolCommand,
    orch: &mut PersonaOrchestrator,
    connected_clients: usize,
) -> Result<(&'static str, Value), String> {
    Ok(match command {
        ToolCommand::GetAgentStatus => {
            let info = orch
                .current_persona_info()
                .ok_or_else(|| "No active persona registered".to_string())?;
            ("agent_status_response", to_json(&info))
        }
        ToolCommand::SwitchAgent {
            agent,
            reason,
            cultural_context,
        } => {
            let cultural = (!cultural_context.is_empty()).then_some(&cultural_context);
            let result = orch
                .switch_named(&agent, &reason, cultural)
                .await
                .map_err(|e| e.to_string())?;
            (
                "agent_switch_response",
                json!({"result": result, "new_agent": orch.active_persona()}),
            )
        }
        ToolCommand::GetTools => {
            let registry = orch.registry();
            (
                "tools_response",
                json!({
                    "available_tools": registry.list_registered(),
                    "active_tools": registry.list_active(),
                    "tool_stats": to_json(&registry.stats()),
                    "persona_tools": to_json(&orch.tool_definitions(orch.active_persona())),
                }),
            )
        }
        ToolCommand::CheckCrisisStatus => {
            let mut data = to_json(&orch.registry().crisis_status());
            if let Value::Object(map) = &mut data {
                map.insert("crisis_active".into(), json!(orch.clinical_state().crisis_active));
            }
            ("crisis_status_response", data)
        }
        ToolCommand::UpdateCulturalContext { cultural_context } => {
            orch.update_cultural_context(&cultural_context);
            (
                "cultural_context_updated",
                json!({
                    "updated_context": cultural_context,
                    "cultural_context": to_json(orch.cultural_context()),
                }),
            )
        }
        ToolCommand::GetSessionInfo => {
            let mut data = to_json(&orch.system_status());
            if let Value::Object(map) = &mut data {
                map.insert("connected_clients".into(), json!(connected_clients));
                map.insert("service_status".into(), json!("active"));
                map.insert("cultural_adaptations".into(), json!(CULTURAL_FEATURES));
                map.insert("safety_protocols".into(), json!(SAFETY_PROTOCOLS));
            }
            ("session_info_response", data)
        }
        ToolCommand::FunctionCall(call) => {
            let result = orch.handle_function_call(&call).await;
            (
                "function_call_response",
                json!({"name": call.name, "result": result, "current_persona": orch.active_persona()}),
            )
        }
        ToolCommand::RecommendAgent { text } => {
            let recommendation = orch.recommend(text.as_deref());
            ("agent_recommendation", to_json(&recommendation))
        }
        ToolCommand::ResetCrisisStatus => {
            orch.reset_crisis();
            ("crisis_status_reset", to_json(&orch.registry().crisis_status()))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sakina_core::{PersonaId, ToolDeps};

    fn orchestrator() -> PersonaOrchestrator {
        PersonaOrchestrator::standard(ToolDeps::default(), PersonaId::General).unwrap()
    }

    #[tokio::test]
    async fn test_malformed_and_unknown_commands() {
        let mut orch = orchestrator();
        let reply = handle_command("{not json", &mut orch, "c1", 1).await;
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["client_id"], "c1");

        let reply = handle_command(r#"{"type": "play_music"}"#, &mut orch, "c1", 1).await;
        assert!(reply["message"].as_str().unwrap().starts_with("Unknown command type: play_music"));
    }

    #[tokio::test]
    async fn test_switch_agent_accepts_legacy_names() {
        let mut orch = orchestrator();
        let reply = handle_command(
            r#"{"type": "switch_agent", "agent": "cbt_specialist", "reason": "thought work"}"#,
            &mut orch,
            "c1",
            1,
        )
        .await;
        assert_eq!(reply["type"], "agent_switch_response");
        assert_eq!(reply["data"]["new_agent"], "cbt");

        let reply = handle_command(r#"{"type": "switch_agent", "agent": "nutritionist"}"#, &mut orch, "c1", 1).await;
        assert_eq!(reply["type"], "error");
        assert!(reply["message"].as_str().unwrap().contains("not available"));
    }

    #[tokio::test]
    async fn test_function_call_and_reset() {
        let mut orch = orchestrator();
        let reply = handle_command(
            r#"{"type": "function_call", "name": "detect_crisis", "arguments": {"action": "assess_risk", "user_input": "I want to kill myself"}}"#,
            &mut orch,
            "c1",
            1,
        )
        .await;
        assert_eq!(reply["type"], "function_call_response");
        assert_eq!(reply["data"]["current_persona"], "crisis");

        let status = handle_command(r#"{"type": "check_crisis_status"}"#, &mut orch, "c1", 1).await;
        assert_eq!(status["data"]["crisis_active"], true);

        let reset = handle_command(r#"{"type": "reset_crisis_status"}"#, &mut orch, "c1", 1).await;
        assert_eq!(reset["type"], "crisis_status_reset");
        assert_eq!(reset["data"]["any_crisis_detected"], false);
    }

    #[tokio::test]
    async fn test_session_info_and_recommendation() {
        let mut orch = orchestrator();
        let info = handle_command(r#"{"type": "get_session_info"}"#, &mut orch, "c1", 3).await;
        assert_eq!(info["data"]["connected_clients"], 3);
        assert_eq!(info["data"]["current_persona"], "general");

        let rec = handle_command(r#"{"type": "recommend_agent", "text": "I'm so anxious"}"#, &mut orch, "c1", 1).await;
        assert_eq!(rec["data"]["persona"], "cbt");
    }
}
