//! `/ws/tools`: one persona orchestrator per connection.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use sakina_core::{
    ClientEvent, ClientHub, PersonaOrchestrator, RecreateError, SessionRecreator, ToolDefinition,
};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};

use crate::commands::{handle_command, AVAILABLE_COMMANDS, CULTURAL_FEATURES};
use crate::AppState;

/// Forwards recreate requests to the connected client, which owns the realtime
/// model session.
struct ClientRecreator {
    hub: Arc<ClientHub>,
    client_id: String,
}

#[async_trait::async_trait]
impl SessionRecreator for ClientRecreator {
    async fn recreate(&self, prompt: &str, tools: &[ToolDefinition]) -> Result<(), RecreateError> {
        let event = ClientEvent::session(
            "session_recreate",
            json!({"instructions": prompt, "tools": tools}),
        );
        if self.hub.send_to(&self.client_id, event) {
            Ok(())
        } else {
            Err(format!("client {} is not connected", self.client_id).into())
        }
    }
}

pub async fn tools_socket(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_tools_socket(socket, state))
}

async fn handle_tools_socket(socket: WebSocket, state: Arc<AppState>) {
    let client_id = uuid::Uuid::new_v4().to_string();
    let mut orchestrator = match PersonaOrchestrator::from_config(&state.config) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!(target: "sakina::gateway", error = %e, "failed to build session orchestrator");
            return;
        }
    };
    orchestrator.bind_hub(state.hub.clone());
    orchestrator.bind_recreator(Arc::new(ClientRecreator {
        hub: state.hub.clone(),
        client_id: client_id.clone(),
    }));
    let session_id = orchestrator.session_id().to_string();
    let orchestrator = Arc::new(Mutex::new(orchestrator));
    state.sessions.insert(session_id.clone(), orchestrator.clone());

    let mut events = state.hub.register(client_id.clone());
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<Value>();
    let (mut sender, mut receiver) = socket.split();
    tracing::info!(target: "sakina::gateway", %client_id, %session_id, "tool socket connected");

    let _ = reply_tx.send(json!({
        "type": "connection_established",
        "message": "أهلاً وسهلاً! Welcome to the Sakina therapeutic tool interface",
        "client_id": client_id,
        "session_id": session_id,
        "available_commands": AVAILABLE_COMMANDS,
        "cultural_features": CULTURAL_FEATURES,
    }));

    // Command replies and hub events share the socket's write half.
    let sender_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                Some(reply) = reply_rx.recv() => reply,
                Some(event) = events.recv() => serde_json::to_value(&event).unwrap_or(Value::Null),
                else => break,
            };
            if sender.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let reply = {
                    let mut orch = orchestrator.lock().await;
                    handle_command(&text, &mut orch, &client_id, state.hub.len()).await
                };
                if reply_tx.send(reply).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::warn!(target: "sakina::gateway", %client_id, error = %e, "tool socket error");
                break;
            }
            _ => {}
        }
    }

    sender_task.abort();
    state.hub.unregister(&client_id);
    state.sessions.remove(&session_id);
    tracing::info!(target: "sakina::gateway", %client_id, %session_id, "tool socket closed");
}
