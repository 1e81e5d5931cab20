//! Best-effort client notifications.
//!
//! Tool handlers describe UI side effects as [`ClientEvent`]s. The orchestrator
//! hands them to a [`ClientHub`], which fans them out to every connected observer.
//! Delivery is not guaranteed and nothing clinical depends on it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::tools::ClinicalContext;

/// `{type, tool?, data, timestamp, clinical_context?}` as sent to UI observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinical_context: Option<ClinicalContext>,
}

impl ClientEvent {
    /// Tool-originated event; the type is prefixed with `therapeutic_`.
    pub fn therapeutic(
        command: &str,
        tool: &str,
        data: serde_json::Value,
        clinical_context: ClinicalContext,
    ) -> Self {
        Self {
            kind: format!("therapeutic_{command}"),
            tool: Some(tool.to_string()),
            data,
            timestamp: Utc::now(),
            clinical_context: Some(clinical_context),
        }
    }

    /// Session-level event not tied to a tool (persona switches, recreate requests).
    pub fn session(kind: &str, data: serde_json::Value) -> Self {
        Self {
            kind: kind.to_string(),
            tool: None,
            data,
            timestamp: Utc::now(),
            clinical_context: None,
        }
    }
}

/// Process-wide registry of notification observers, keyed by client id.
#[derive(Debug, Default)]
pub struct ClientHub {
    clients: DashMap<String, mpsc::UnboundedSender<ClientEvent>>,
}

impl ClientHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer and returns its receiving end. Re-registering an id replaces the old channel.
    pub fn register(&self, client_id: impl Into<String>) -> mpsc::UnboundedReceiver<ClientEvent> {
        let client_id = client_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients.insert(client_id.clone(), tx);
        tracing::info!(target: "sakina::notify", client_id = %client_id, total = self.clients.len(), "observer registered");
        rx
    }

    pub fn unregister(&self, client_id: &str) -> bool {
        let removed = self.clients.remove(client_id).is_some();
        if removed {
            tracing::info!(target: "sakina::notify", client_id, "observer removed");
        }
        removed
    }

    /// Sends to every observer. Observers whose channel is closed are pruned after
    /// the pass. Returns how many sends succeeded.
    pub fn broadcast(&self, event: &ClientEvent) -> usize {
        let snapshot: Vec<(String, mpsc::UnboundedSender<ClientEvent>)> = self
            .clients
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut sent = 0;
        let mut failed = Vec::new();
        for (id, tx) in snapshot {
            if tx.send(event.clone()).is_ok() {
                sent += 1;
            } else {
                failed.push(id);
            }
        }

        for id in &failed {
            self.clients.remove(id);
        }
        if !failed.is_empty() {
            tracing::debug!(target: "sakina::notify", pruned = failed.len(), "dropped disconnected observers");
        }
        if sent == 0 {
            tracing::debug!(target: "sakina::notify", kind = %event.kind, "no observers for event");
        }
        sent
    }

    pub fn send_to(&self, client_id: &str, event: ClientEvent) -> bool {
        let Some(tx) = self.clients.get(client_id).map(|e| e.value().clone()) else {
            return false;
        };
        if tx.send(event).is_ok() {
            true
        } else {
            self.clients.remove(client_id);
            false
        }
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn client_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_broadcast_prunes_closed_observers() {
        let hub = ClientHub::new();
        let mut alive = hub.register("alive");
        let dropped = hub.register("gone");
        drop(dropped);

        let sent = hub.broadcast(&ClientEvent::session("ping", json!({})));
        assert_eq!(sent, 1);
        assert_eq!(hub.client_ids(), vec!["alive".to_string()]);
        assert_eq!(alive.recv().await.map(|e| e.kind), Some("ping".to_string()));
    }

    #[test]
    fn test_send_to_unknown_client() {
        let hub = ClientHub::new();
        assert!(!hub.send_to("nobody", ClientEvent::session("x", json!(null))));
        assert!(hub.is_empty());
    }

    #[test]
    fn test_therapeutic_event_shape() {
        let event = ClientEvent::therapeutic(
            "risk_assessment",
            "crisis_detection",
            json!({"risk_level": "low"}),
            ClinicalContext::default(),
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "therapeutic_risk_assessment");
        assert_eq!(value["tool"], "crisis_detection");
        assert!(value["timestamp"].is_string());
    }
}
