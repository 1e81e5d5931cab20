//! Session-wide context shared by every persona and tool of one connection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Truthiness used for loosely typed preference flags coming from the model or UI.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => {
            let s = s.trim();
            !s.is_empty() && !s.eq_ignore_ascii_case("false") && !s.eq_ignore_ascii_case("no")
        }
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

/// Cultural preferences (language, religious integration, family involvement).
/// Merge-updated; keys are open-ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CulturalContext(Map<String, Value>);

impl CulturalContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn merge(&mut self, updates: &Map<String, Value>) {
        for (k, v) in updates {
            self.0.insert(k.clone(), v.clone());
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(truthy)
    }

    pub fn preferred_language(&self) -> Option<&str> {
        self.0.get("preferred_language").and_then(Value::as_str)
    }

    pub fn prefers_arabic(&self) -> bool {
        self.preferred_language()
            .is_some_and(|l| l.eq_ignore_ascii_case("arabic") || l.eq_ignore_ascii_case("ar"))
            || self.flag("arabic_preferred")
    }

    /// Any of the religious-integration spellings used by the different tools.
    pub fn religious(&self) -> bool {
        ["religious_considerations", "religious_integration", "religious_beliefs"]
            .iter()
            .any(|k| self.flag(k))
    }

    pub fn family_involvement(&self) -> bool {
        ["family_involvement", "family_involvement_preferred"]
            .iter()
            .any(|k| self.flag(k))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Clinical flags shared across personas. `crisis_active` never clears on merge;
/// only [`ClinicalState::reset_crisis`] clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClinicalState {
    #[serde(default)]
    pub crisis_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crisis_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crisis_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crisis_timestamp: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClinicalState {
    pub fn mark_crisis(&mut self, crisis_type: &str, data: Value) {
        self.crisis_active = true;
        self.crisis_type = Some(crisis_type.to_string());
        self.crisis_data = Some(data);
        self.crisis_timestamp = Some(Utc::now());
    }

    pub fn merge(&mut self, updates: &Map<String, Value>) {
        for (key, value) in updates {
            match key.as_str() {
                "crisis_active" => {
                    if truthy(value) {
                        self.crisis_active = true;
                    } else if self.crisis_active {
                        tracing::warn!(target: "sakina::persona", "ignoring crisis_active=false in merge; use an explicit reset");
                    }
                }
                "crisis_type" => self.crisis_type = value.as_str().map(str::to_string),
                "crisis_data" => self.crisis_data = Some(value.clone()),
                "crisis_timestamp" => {
                    self.crisis_timestamp = value
                        .as_str()
                        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                        .map(|dt| dt.with_timezone(&Utc));
                }
                _ => {
                    self.extra.insert(key.clone(), value.clone());
                }
            }
        }
    }

    pub fn reset_crisis(&mut self) {
        self.crisis_active = false;
        self.crisis_type = None;
        self.crisis_data = None;
        self.crisis_timestamp = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_cultural_merge_and_flags() {
        let mut ctx = CulturalContext::new();
        ctx.merge(&map(json!({"preferred_language": "arabic", "religious_integration": "yes"})));
        ctx.merge(&map(json!({"family_involvement_preferred": true})));
        assert!(ctx.prefers_arabic());
        assert!(ctx.religious());
        assert!(ctx.family_involvement());
        assert!(!CulturalContext::new().religious());
    }

    #[test]
    fn test_crisis_active_survives_merge() {
        let mut state = ClinicalState::default();
        state.mark_crisis("emergency_escalation", json!({"urgency": "imminent"}));
        state.merge(&map(json!({"crisis_active": false, "mood": 3})));
        assert!(state.crisis_active);
        assert_eq!(state.extra["mood"], 3);

        state.reset_crisis();
        assert!(!state.crisis_active);
        assert!(state.crisis_type.is_none());
    }

    #[test]
    fn test_clinical_state_serializes_flat() {
        let mut state = ClinicalState::default();
        state.merge(&map(json!({"session_phase": "assessment"})));
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["crisis_active"], false);
        assert_eq!(value["session_phase"], "assessment");
    }
}
