//! Clinical bookkeeping shared by every tool handler: safety flags, the
//! append-only action log and pending client events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::ToolKind;
use crate::matchers::crisis::find_crisis_keyword;
use crate::notify::ClientEvent;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyFlags {
    pub crisis_detected: bool,
    pub emergency_escalation_needed: bool,
    pub professional_referral_suggested: bool,
}

/// Safety snapshot attached to every log entry and client event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClinicalContext {
    pub crisis_detected: bool,
    pub emergency_escalation: bool,
    pub referral_suggested: bool,
    pub tool_active: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClinicalAction {
    pub timestamp: DateTime<Utc>,
    pub tool: &'static str,
    pub action: String,
    pub details: Value,
    pub clinical_context: ClinicalContext,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSessionSummary {
    pub tool_name: &'static str,
    pub total_actions: usize,
    pub crisis_flags: SafetyFlags,
}

/// Per-tool section of the session documentation export.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDocumentation {
    pub session_summary: ToolSessionSummary,
    pub clinical_actions: Vec<ClinicalAction>,
    pub safety_assessment: ClinicalContext,
    pub recommendations: Vec<&'static str>,
}

const CRISIS_ACTION_WORDS: &[&str] = &["crisis", "emergency", "risk", "escalation"];

#[derive(Debug)]
pub struct ClinicalRecord {
    tool: ToolKind,
    flags: SafetyFlags,
    actions: Vec<ClinicalAction>,
    pending: Vec<ClientEvent>,
}

impl ClinicalRecord {
    pub fn new(tool: ToolKind) -> Self {
        Self {
            tool,
            flags: SafetyFlags::default(),
            actions: Vec::new(),
            pending: Vec::new(),
        }
    }

    pub fn flags(&self) -> SafetyFlags {
        self.flags
    }

    pub fn actions(&self) -> &[ClinicalAction] {
        &self.actions
    }

    pub fn context(&self) -> ClinicalContext {
        ClinicalContext {
            crisis_detected: self.flags.crisis_detected,
            emergency_escalation: self.flags.emergency_escalation_needed,
            referral_suggested: self.flags.professional_referral_suggested,
            tool_active: self.tool.key().to_string(),
        }
    }

    pub fn mark_crisis_detected(&mut self) {
        self.flags.crisis_detected = true;
    }

    /// Queue a `therapeutic_<command>` event for the UI.
    pub fn emit(&mut self, command: &str, data: Value) {
        let event = ClientEvent::therapeutic(command, self.tool.key(), data, self.context());
        self.pending.push(event);
    }

    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Append to the action log. Crisis-related actions also produce crisis documentation.
    pub fn log_action(&mut self, action: impl Into<String>, details: Value) {
        let action = action.into();
        let entry = ClinicalAction {
            timestamp: Utc::now(),
            tool: self.tool.key(),
            action: action.clone(),
            details,
            clinical_context: self.context(),
        };
        tracing::info!(target: "sakina::tools", tool = self.tool.key(), action = %action, "clinical action logged");

        let payload = serde_json::to_value(&entry).unwrap_or(Value::Null);
        self.actions.push(entry);
        self.emit("clinical_log", payload.clone());

        let lower = action.to_lowercase();
        if CRISIS_ACTION_WORDS.iter().any(|w| lower.contains(w)) {
            tracing::warn!(target: "sakina::tools", tool = self.tool.key(), action = %action, "crisis documentation");
            let mut doc = payload;
            if let Value::Object(map) = &mut doc {
                map.insert(
                    "crisis_documentation".into(),
                    json!({
                        "protocol_activated": true,
                        "cultural_considerations": "gulf_arabic_islamic_context",
                        "family_notification_status": "pending_assessment",
                        "emergency_resources_provided": true,
                        "follow_up_required": true,
                    }),
                );
            }
            self.emit("crisis_documentation", doc);
        }
    }

    /// Sets `crisis_detected` and logs when `text` contains a crisis keyword.
    pub fn check_crisis_indicators(&mut self, text: &str) -> bool {
        let Some(keyword) = find_crisis_keyword(text) else {
            return false;
        };
        self.flags.crisis_detected = true;
        let arabic = keyword.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c));
        self.log_action(
            "crisis_indicator_detected",
            json!({
                "keyword": keyword,
                "user_input_length": text.chars().count(),
                "immediate_action": "crisis_protocol_activated",
                "cultural_context": if arabic { "gulf_arabic_expression" } else { "english_expression" },
            }),
        );
        true
    }

    pub fn trigger_emergency_protocol(&mut self, reason: &str, details: Value) {
        self.flags.emergency_escalation_needed = true;
        let data = json!({
            "reason": reason,
            "details": details,
            "timestamp": Utc::now(),
            "tool": self.tool.key(),
            "severity": "high",
        });
        self.log_action("emergency_protocol_activated", data.clone());
        self.emit("emergency_escalation", data);
        tracing::error!(target: "sakina::tools", tool = self.tool.key(), reason, "emergency protocol activated");
    }

    /// Bilingual referral message; marks the referral flag.
    pub fn suggest_referral(&mut self, reason: &str) -> String {
        self.flags.professional_referral_suggested = true;
        format!(
            "أعتقد أنه من المفيد لك التحدث مع معالج نفسي مختص. هذا أمر طبيعي وإيجابي.\n\
             I believe it would be beneficial for you to speak with a licensed mental health professional. \
             This is a normal and positive step.\n\n\
             السبب: {reason}\nReason: {reason}\n\n\
             يمكنني مساعدتك في العثور على معالج يفهم ثقافتنا العربية.\n\
             I can help you find a therapist who understands our Arab culture."
        )
    }

    pub fn reset_flags(&mut self) {
        self.flags = SafetyFlags::default();
    }

    pub fn recommendations(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if self.flags.crisis_detected {
            out.extend([
                "Continue crisis monitoring and safety assessment",
                "Ensure 24-hour safety plan is in place",
                "Consider family involvement per cultural preferences",
            ]);
        }
        if self.flags.emergency_escalation_needed {
            out.extend([
                "Immediate professional intervention required",
                "Coordinate with local mental health services",
                "Provide emergency contact information",
            ]);
        }
        if self.flags.professional_referral_suggested {
            out.extend([
                "Schedule follow-up with licensed mental health professional",
                "Provide culturally appropriate referral options",
                "Ensure continuity of care documentation",
            ]);
        }
        out.extend([
            "Maintain cultural sensitivity in all interventions",
            "Respect Islamic values and Gulf Arab customs",
            "Consider family dynamics in treatment planning",
        ]);
        out
    }

    pub fn documentation(&self) -> ToolDocumentation {
        ToolDocumentation {
            session_summary: ToolSessionSummary {
                tool_name: self.tool.key(),
                total_actions: self.actions.len(),
                crisis_flags: self.flags,
            },
            clinical_actions: self.actions.clone(),
            safety_assessment: self.context(),
            recommendations: self.recommendations(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crisis_actions_emit_documentation() {
        let mut record = ClinicalRecord::new(ToolKind::CrisisDetection);
        record.log_action("crisis_detection_assess_risk", json!({}));
        record.log_action("cbt_mood_monitoring", json!({}));

        let kinds: Vec<String> = record.take_events().into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                "therapeutic_clinical_log",
                "therapeutic_crisis_documentation",
                "therapeutic_clinical_log",
            ]
        );
        assert_eq!(record.actions().len(), 2);
        assert!(record.take_events().is_empty());
    }

    #[test]
    fn test_check_crisis_indicators_sets_flag() {
        let mut record = ClinicalRecord::new(ToolKind::EmotionalAnalysis);
        assert!(!record.check_crisis_indicators("a quiet evening"));
        assert!(!record.flags().crisis_detected);
        assert!(record.check_crisis_indicators("خلاص تعبت من كل شي"));
        assert!(record.flags().crisis_detected);
        assert_eq!(record.actions()[0].details["cultural_context"], "gulf_arabic_expression");
    }

    #[test]
    fn test_recommendations_follow_flags() {
        let mut record = ClinicalRecord::new(ToolKind::SessionManagement);
        assert_eq!(record.recommendations().len(), 3);
        record.trigger_emergency_protocol("test", json!({}));
        let _ = record.suggest_referral("ongoing distress");
        let doc = record.documentation();
        assert_eq!(doc.recommendations.len(), 9);
        assert!(doc.session_summary.crisis_flags.emergency_escalation_needed);
        assert!(doc.safety_assessment.referral_suggested);

        record.reset_flags();
        assert_eq!(record.flags(), SafetyFlags::default());
    }
}
